use async_trait::async_trait;
use gelf_log_sink::stream::GelfStream;
use gelf_log_sink::transport::{GelfTransport, NoopTransport};
use gelf_log_sink::{GelfMessage, SinkError, SinkEvent};
use serde_json::json;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::oneshot;

/// Transport whose deliveries only complete when the test releases them.
#[derive(Default)]
struct GatedTransport {
    emitted: Mutex<Vec<(GelfMessage, Option<oneshot::Sender<Option<String>>>)>>,
}

impl GatedTransport {
    async fn wait_for_emits(&self, count: usize) {
        while self.emitted.lock().unwrap().len() < count {
            tokio::task::yield_now().await;
        }
    }

    fn release(&self, index: usize, failure: Option<&str>) {
        let gate = self.emitted.lock().unwrap()[index].1.take().expect("released twice");
        gate.send(failure.map(str::to_string)).unwrap();
    }

    fn message(&self, index: usize) -> GelfMessage {
        self.emitted.lock().unwrap()[index].0.clone()
    }

    fn emit_count(&self) -> usize {
        self.emitted.lock().unwrap().len()
    }
}

#[async_trait]
impl GelfTransport for GatedTransport {
    async fn emit(&self, _event: &str, message: &GelfMessage) -> Result<(), Box<dyn Error + Send + Sync>> {
        let (tx, rx) = oneshot::channel();
        self.emitted.lock().unwrap().push((message.clone(), Some(tx)));
        match rx.await {
            Ok(None) => Ok(()),
            Ok(Some(failure)) => Err(failure.into()),
            Err(_) => Err("gate dropped".into()),
        }
    }
}

fn gated() -> (Arc<GatedTransport>, GelfStream) {
    let transport = Arc::new(GatedTransport::default());
    let stream = GelfStream::new(transport.clone());
    (transport, stream)
}

#[tokio::test]
async fn drain_fires_once_after_the_last_completion() {
    let (transport, stream) = gated();
    let mut events = stream.subscribe();

    let mut handles: Vec<_> = (0..3)
        .map(|i| Some(stream.write(json!({ "msg": format!("record {}", i) })).unwrap()))
        .collect();
    assert_eq!(stream.pending(), 3);
    transport.wait_for_emits(3).await;

    for (step, index) in [2, 0, 1].into_iter().enumerate() {
        transport.release(index, None);
        handles[index].take().unwrap().await.unwrap();
        if step < 2 {
            assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
        }
    }

    assert_eq!(events.try_recv(), Ok(SinkEvent::Drain));
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(stream.pending(), 0);
}

#[tokio::test]
async fn completion_is_reported_after_write_returns() {
    let stream = GelfStream::new(Arc::new(NoopTransport));
    let handle = stream.write(json!({ "msg": "hello" })).unwrap();
    assert_eq!(stream.pending(), 1);
    handle.await.unwrap();
    assert_eq!(stream.pending(), 0);
}

#[tokio::test]
async fn write_after_end_is_rejected_without_delivery() {
    let (transport, stream) = gated();
    stream.end(None).wait().await;

    let err = stream.write(json!({ "msg": "too late" })).unwrap_err();
    assert!(matches!(err, SinkError::NotWritable));
    assert_eq!(stream.pending(), 0);
    assert!(!stream.is_writable());

    tokio::task::yield_now().await;
    assert_eq!(transport.emit_count(), 0);
}

#[tokio::test]
async fn end_waits_for_in_flight_writes() {
    let (transport, stream) = gated();
    let write = stream.write(json!({ "msg": "slow" })).unwrap();
    transport.wait_for_emits(1).await;

    let drained = tokio::spawn(stream.end(None).wait());
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!drained.is_finished());

    transport.release(0, None);
    write.await.unwrap();
    drained.await.unwrap();
    assert_eq!(stream.pending(), 0);
}

#[tokio::test]
async fn end_writes_the_final_record() {
    let (transport, stream) = gated();
    let drained = tokio::spawn(stream.end(Some(json!({ "msg": "bye" }))).wait());
    assert!(!stream.is_writable());

    transport.wait_for_emits(1).await;
    assert_eq!(transport.message(0).get("short_message"), Some(&json!("bye")));
    transport.release(0, None);
    drained.await.unwrap();
}

#[tokio::test]
async fn transport_errors_reach_the_writer_untouched() {
    let (transport, stream) = gated();
    let mut events = stream.subscribe();
    let write = stream.write(json!({ "msg": "lost" })).unwrap();
    transport.wait_for_emits(1).await;

    transport.release(0, Some("socket closed"));
    match write.await {
        Err(SinkError::Transport(e)) => assert_eq!(e.to_string(), "socket closed"),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(stream.pending(), 0);
    assert_eq!(events.try_recv(), Ok(SinkEvent::Drain));
}

#[tokio::test]
async fn destroy_closes_without_waiting() {
    let (transport, stream) = gated();
    let mut events = stream.subscribe();
    let write = stream.write(json!({ "msg": "in flight" })).unwrap();
    transport.wait_for_emits(1).await;

    stream.destroy_soon();
    assert_eq!(events.try_recv(), Ok(SinkEvent::Close));
    assert!(matches!(stream.write(json!({})), Err(SinkError::NotWritable)));
    assert_eq!(stream.pending(), 1);

    transport.release(0, None);
    write.await.unwrap();
    assert_eq!(events.try_recv(), Ok(SinkEvent::Drain));
}

#[tokio::test]
async fn malformed_input_is_sent_as_a_diagnostic_record() {
    let (transport, stream) = gated();
    stream.write(json!("{ not_a_json}")).unwrap();
    stream.write(json!(r#"{"msg":"from a string","pid":7}"#)).unwrap();
    stream.write(json!(12)).unwrap();
    transport.wait_for_emits(3).await;

    let invalid = transport.message(0);
    assert_eq!(invalid.get("_invalidRecord"), Some(&json!("{ not_a_json}")));
    assert_eq!(invalid.get("facility"), Some(&json!("gelf-log-sink")));
    assert_eq!(invalid.get("_level"), Some(&json!(40)));
    assert_eq!(invalid.get("level"), Some(&json!(5)));
    assert!(invalid.get("_short_message").is_some());

    let parsed = transport.message(1);
    assert_eq!(parsed.get("short_message"), Some(&json!("from a string")));
    assert_eq!(parsed.get("_pid"), Some(&json!(7)));

    let wrong_type = transport.message(2);
    assert_eq!(wrong_type.get("_invalidRecord"), Some(&json!(12)));
    assert_eq!(wrong_type.get("_short_message"), Some(&json!("invalid type number")));

    for index in 0..3 {
        transport.release(index, None);
    }
    stream.end(None).wait().await;
}

#[tokio::test]
async fn slow_subscriber_sees_every_drain_then_close() {
    let stream = GelfStream::new(Arc::new(NoopTransport));
    let mut events = stream.subscribe();

    const WRITES: usize = 200;
    for i in 0..WRITES {
        stream.write(json!({ "msg": format!("record {}", i) })).unwrap().await.unwrap();
    }
    stream.destroy();

    for i in 0..WRITES {
        assert_eq!(events.recv().await, Some(SinkEvent::Drain), "drain {}", i);
    }
    assert_eq!(events.recv().await, Some(SinkEvent::Close));
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn dropped_subscribers_do_not_block_others() {
    let stream = GelfStream::new(Arc::new(NoopTransport));
    drop(stream.subscribe());
    let mut events = stream.subscribe();

    stream.write(json!({ "msg": "one" })).unwrap().await.unwrap();
    assert_eq!(events.try_recv(), Ok(SinkEvent::Drain));
}
