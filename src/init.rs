use crate::error::SinkError;
use crate::layer::GelfLayer;
use crate::stream::GelfStream;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the GELF logging layer.
///
/// **Fields**
/// - `name`: application name, sent as the GELF `facility`.
/// - `max_level`: most verbose level forwarded to the GELF server.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added next to [`GelfLayer`] so events also show up on the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub name: String,
    pub max_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            max_level: Level::INFO,
            enable_stdout: true,
        }
    }
}

/// Install a global `tracing` subscriber that writes events to `stream`.
///
/// **Parameters**
/// - `stream`: [`GelfStream`] receiving one record per event.
/// - `config`: [`LayerConfig`] with the application name and level filter.
///
/// **Returns**
/// - `Err(SinkError::Init)` if a global subscriber is already installed.
pub fn init_tracing_with_config(stream: GelfStream, config: LayerConfig) -> Result<(), SinkError> {
    let layer = GelfLayer::new(stream, config.name, config.max_level);

    // The two subscriber shapes have different types, hence two branches.
    let installed = if config.enable_stdout {
        let subscriber = Registry::default()
            .with(layer)
            .with(tracing_subscriber::fmt::layer());
        tracing::subscriber::set_global_default(subscriber)
    } else {
        tracing::subscriber::set_global_default(Registry::default().with(layer))
    };
    installed.map_err(|e| SinkError::Init(e.to_string()))
}

/// Equivalent to [`init_tracing_with_config`] with
/// [`LayerConfig::default`] and the given application name.
pub fn init_tracing(stream: GelfStream, name: impl Into<String>) -> Result<(), SinkError> {
    init_tracing_with_config(
        stream,
        LayerConfig {
            name: name.into(),
            ..LayerConfig::default()
        },
    )
}
