//! Mock construction helpers

use super::builders::test_config;
use super::test_timeout;
use serial_telemetry::backend::{MockLink, MockLinkHandle};
use serial_telemetry::config::AppConfig;
use serial_telemetry::listener::FnListener;
use serial_telemetry::{Controller, Reading};
use std::sync::{Arc, Mutex};

/// Shared list of readings seen by a listener
pub type Collected = Arc<Mutex<Vec<Reading>>>;

/// Listener that stores every reading it receives
pub fn collecting_listener(
    name: &'static str,
) -> (Arc<FnListener<impl Fn(&Reading) -> anyhow::Result<()> + Send + Sync>>, Collected) {
    let collected: Collected = Arc::new(Mutex::new(Vec::new()));
    let sink = collected.clone();
    let listener = FnListener::new(name, move |reading: &Reading| {
        sink.lock().unwrap().push(reading.clone());
        Ok(())
    });
    (Arc::new(listener), collected)
}

/// Controller on a mock link with the given config
pub fn mock_controller_with(config: &AppConfig) -> (Controller, MockLinkHandle) {
    let (link, device) = MockLink::new(test_timeout());
    (Controller::new(config, Box::new(link)), device)
}

/// Controller on a mock link with the default test config
pub fn mock_controller() -> (Controller, MockLinkHandle) {
    mock_controller_with(&test_config())
}
