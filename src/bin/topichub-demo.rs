//! Демонстрация topichub
//!
//! Публикует компонент с точками данных и реактором на шине в памяти,
//! наблюдает за ним со второго клиента и прогоняет команду туда и обратно.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::timeout;
use topichub::{
    connector::MEMORY_PROTOCOL, init_logging, BasicComponent, ChannelSink, Connector,
    ConnectorOptions, ConnectorRegistry, DataPoint, HubSettings, MemoryBus, Message, MessageSink,
    Reactor,
};
use tracing::info;
use url::Url;

#[derive(Parser)]
#[command(name = "topichub-demo")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT"), ")"))]
#[command(about = "topichub demo - publish, watch and command a component", long_about = None)]
struct Cli {
    /// Файл настроек (toml/json/yaml)
    #[arg(short, long, env = "TOPICHUB_CONFIG")]
    config: Option<PathBuf>,
    /// URL подключения, перекрывает настройки
    #[arg(short, long)]
    url: Option<String>,
    /// Включить подробный вывод (debug)
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Отправить команду реактору и дождаться обновления точки данных
    Roundtrip {
        #[arg(default_value_t = 42)]
        value: i64,
    },
    /// Показать топики, которые получит компонент
    Topics,
}

/// Компонент демонстрации: `pub0/comp0` с двумя точками данных и реактором
/// `a`, пересылающим команды в `state0`.
fn sample_component() -> (BasicComponent, Arc<DataPoint>) {
    let state0 = Arc::new(DataPoint::retained("state0"));
    let state1 = Arc::new(DataPoint::new("state1"));
    let forward = {
        let state0 = state0.clone();
        Reactor::typed("a", move |value: i64| {
            let _ = state0.update(value);
        })
    };
    let comp0 = BasicComponent::new("comp0")
        .with_endpoint(state0.clone())
        .with_endpoint(state1)
        .with_endpoint(Arc::new(forward));
    (BasicComponent::new("pub0").with_component(comp0), state0)
}

fn open(
    registry: &ConnectorRegistry,
    url: &Url,
    client_id: String,
    dedup: bool,
) -> Result<Connector> {
    let options = ConnectorOptions::from_url(url)
        .client_id(client_id)
        .dedup_handlers(dedup);
    registry
        .open(url, options)
        .with_context(|| format!("cannot open connector for {url}"))
}

async fn roundtrip(
    settings: &HubSettings,
    url: &Url,
    value: i64,
) -> Result<()> {
    let bus = MemoryBus::new();
    let registry = ConnectorRegistry::new();
    registry.register(MEMORY_PROTOCOL, bus.factory());

    let base_id = settings.client_id.clone().unwrap_or_else(|| "demo".into());
    let host = open(&registry, url, format!("{base_id}-host"), settings.dedup_handlers)?;
    let client = open(&registry, url, format!("{base_id}-client"), settings.dedup_handlers)?;
    host.connect().await?;
    client.connect().await?;

    let (component, state0) = sample_component();
    let publication = host.publish(component.into_ref()).await?;
    state0.update(1).await?;

    let desc = client.describe("pub0").sub_component(&["comp0"]);
    let (sink, mut rx) = ChannelSink::new();
    let watcher = desc.endpoint("state0").watch(sink.into_ref()).await?;

    let first = next_message(&mut rx).await?;
    info!(value = first.decode::<i64>()?, retained = first.is_state(), "initial state");

    desc.endpoint("a")
        .reactor()?
        .consume_message(Message::event(value))
        .await?;
    let echoed = next_message(&mut rx).await?;
    println!(
        "{}/{} = {}",
        echoed.component(),
        echoed.endpoint(),
        echoed.decode::<i64>()?
    );

    watcher.close().await?;
    publication.close().await?;
    client.disconnect().await?;
    host.disconnect().await?;
    Ok(())
}

async fn next_message(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Message>) -> Result<Message> {
    timeout(Duration::from_secs(3), rx.recv())
        .await
        .context("timed out waiting for a message")?
        .ok_or_else(|| anyhow!("watch channel closed"))
}

fn print_topics(url: &Url) -> Result<()> {
    let namespace = ConnectorOptions::from_url(url).namespace;
    let (component, _) = sample_component();
    let base = topichub::topic::join(&topichub::topic::normalize_namespace(&namespace), "pub0");
    let table = topichub::AddressTable::build(&base, &component);
    for topic in table.emit_topics() {
        println!("emit  {topic}");
    }
    for topic in table.sink_topics() {
        println!("sink  {topic}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings =
        HubSettings::load_from(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(url) = cli.url {
        settings.url = url;
    }
    if cli.verbose {
        settings.logging.level = "debug".into();
    }
    init_logging(settings.logging.clone())?;

    let url = Url::parse(&settings.url).with_context(|| format!("invalid url {}", settings.url))?;
    match cli.command.unwrap_or(Commands::Roundtrip { value: 42 }) {
        Commands::Roundtrip { value } => roundtrip(&settings, &url, value).await,
        Commands::Topics => print_topics(&url),
    }
}
