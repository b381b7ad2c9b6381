/// Application settings loading.
pub mod config;
/// Connector: publication, descriptors, watchers, transport registry.
pub mod connector;
/// Common error types and status codes.
pub mod error;
/// Component model: components, endpoints, message sinks and sources.
pub mod hub;
/// Structured logging setup.
pub mod logging;
/// Pub/Sub core: messages, futures, subscription multiplexer.
pub mod pubsub;
/// Topic addressing: codec and filter matcher.
pub mod topic;
/// Transport boundary and the in-memory bus.
pub mod transport;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Application settings.
pub use crate::config::HubSettings;
/// Connector and remote addressing.
pub use connector::{
    AddressTable, Connector, ConnectorOptions, ConnectorRegistry, Descriptor, EndpointRef,
    Publication, TransportFactory, WatchScope, Watcher,
};
/// Operation errors and result types.
pub use error::{ErrorExt, HubError, HubResult, StatusCode};
/// Component model.
pub use hub::{
    sink_fn, sink_typed, sink_unit, BasicComponent, ChannelSink, Component, ComponentRef,
    DataPoint, Endpoint, MessageSink, MessageSource, Reactor, SinkRef,
};
/// Logging.
pub use logging::{init_logging, LogFormat, LoggingConfig};
/// Pub/Sub API.
pub use pubsub::{
    Acknowledger, BusFuture, GroupState, HandlerRef, Message, PendingGroup, Registration,
    TopicHandlerMap,
};
/// Topics.
pub use topic::{EndpointKind, TopicAddress, TopicFilter};
/// Transports.
pub use transport::{InboundHandler, MemoryBus, MemoryTransport, Transport, TransportRef};
