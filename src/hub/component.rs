use std::{fmt, sync::Arc};

use super::Endpoint;

/// Единица, которую можно опубликовать в хабе.
///
/// Дерево компонентов ацикличное и читается один раз при экспорте.
pub trait Component: Send + Sync {
    fn id(&self) -> &str;

    /// Endpoint-ы компонента в порядке объявления.
    fn endpoints(&self) -> Vec<Endpoint>;

    /// Вложенные компоненты; пусто для некомпозитных.
    fn components(&self) -> Vec<ComponentRef> {
        Vec::new()
    }
}

pub type ComponentRef = Arc<dyn Component>;

/// Компонент из готовых частей.
///
/// ```
/// use std::sync::Arc;
/// use topichub::hub::{BasicComponent, DataPoint};
///
/// let state = Arc::new(DataPoint::retained("state0"));
/// let comp = BasicComponent::new("pub0")
///     .with_endpoint(state.clone())
///     .with_component(BasicComponent::new("comp0"));
/// assert_eq!(comp.endpoint_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct BasicComponent {
    id: String,
    endpoints: Vec<Endpoint>,
    components: Vec<ComponentRef>,
}

impl BasicComponent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(
        mut self,
        endpoint: impl Into<Endpoint>,
    ) -> Self {
        self.add_endpoint(endpoint);
        self
    }

    pub fn with_component<C: Component + 'static>(
        mut self,
        component: C,
    ) -> Self {
        self.add_component(Arc::new(component));
        self
    }

    pub fn add_endpoint(
        &mut self,
        endpoint: impl Into<Endpoint>,
    ) {
        self.endpoints.push(endpoint.into());
    }

    pub fn add_component(
        &mut self,
        component: ComponentRef,
    ) {
        self.components.push(component);
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    pub fn into_ref(self) -> ComponentRef {
        Arc::new(self)
    }
}

impl Component for BasicComponent {
    fn id(&self) -> &str {
        &self.id
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.clone()
    }

    fn components(&self) -> Vec<ComponentRef> {
        self.components.clone()
    }
}

impl fmt::Debug for BasicComponent {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("BasicComponent")
            .field("id", &self.id)
            .field("endpoints", &self.endpoints)
            .field("components", &self.components.len())
            .finish()
    }
}
