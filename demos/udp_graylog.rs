use gelf_log_sink::config::GelfConfig;
use gelf_log_sink::init::init_tracing;
use gelf_log_sink::stream::GelfStream;
use serde_json::json;
use tracing::{error, info};

/// Sends a few records to a GELF UDP input, configured through the
/// `GELF_SINK_*` environment variables (defaults to 127.0.0.1:12201).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = GelfConfig::from_env()?;
    let stream = GelfStream::from_config(&config).await?;

    stream.write(json!({
        "name": "udp-demo",
        "hostname": "demo.local",
        "level": 30,
        "msg": "written as a leveled-logger record",
        "time": "2024-05-01T12:34:56.789Z",
        "req": { "method": "GET", "url": "/path?q=1" }
    }))?;
    stream.write(json!(r#"{"level":50,"msg":"written as a JSON string","err":{"message":"boom","stack":"at main"}}"#))?;

    init_tracing(stream.clone(), "udp-demo")?;
    info!(user_id = 42, "tracing events go to Graylog too");
    error!(reason = "invalid password", "authentication failed");

    stream.end(None).await;
    Ok(())
}
