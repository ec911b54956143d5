// codewarden-core/tests/panic_hook_tests.rs
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use codewarden_core::{
    install_panic_hook, Client, ClientOptions, DeliveryError, EventSink, SendMode, WireBody,
};

#[derive(Default)]
struct Collect {
    bodies: Mutex<Vec<WireBody>>,
}

#[async_trait]
impl EventSink for Collect {
    fn name(&self) -> &str {
        "collect"
    }

    async fn deliver(&self, body: &WireBody) -> Result<(), DeliveryError> {
        self.bodies.lock().unwrap().push(body.clone());
        Ok(())
    }
}

#[test_log::test(tokio::test)]
async fn panics_become_error_events() -> Result<()> {
    let sink = Arc::new(Collect::default());
    let mut options = ClientOptions::new("https://key@ingest.example.com").with_send_mode(SendMode::Batched);
    options.flush_interval_ms = 3_600_000;
    let client = Client::with_sink(options, sink.clone())?;
    install_panic_hook(client.clone());

    let joined = std::thread::Builder::new()
        .name("exploder".into())
        .spawn(|| panic!("worker exploded"))?
        .join();
    assert!(joined.is_err());

    client.flush().await;
    let bodies = sink.bodies.lock().unwrap();
    let envelope = match &bodies[0] {
        WireBody::Batch(batch) => serde_json::to_value(&batch.events[0])?,
        WireBody::Single(envelope) => serde_json::to_value(envelope)?,
    };
    assert_eq!(envelope["severity"], "high");
    assert_eq!(envelope["payload"]["error_type"], "Panic");
    assert_eq!(envelope["payload"]["error_message"], "worker exploded");
    assert_eq!(envelope["payload"]["tags"]["mechanism"], "panic");
    assert!(envelope["payload"]["file"]
        .as_str()
        .unwrap()
        .ends_with("panic_hook_tests.rs"));
    Ok(())
}
