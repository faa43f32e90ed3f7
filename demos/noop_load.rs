use gelf_log_sink::stream::GelfStream;
use gelf_log_sink::transport::NoopTransport;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() {
    let stream = GelfStream::new(Arc::new(NoopTransport));

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        let record = json!({
            "name": "load",
            "level": 50,
            "msg": "noop load test error",
            "iteration": i,
            "src": { "file": "noop_load.rs", "line": 17 }
        });
        if stream.write(record).is_err() {
            break;
        }
    }
    stream.end(None).await;

    let elapsed = start.elapsed();
    println!("noop transport: converted {} records in {:?} (~{:.0} rec/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
}
