//! Test data builders for frames and configs

use serial_telemetry::config::{AppConfig, ResetConfig};

/// Builder for wire frames
pub struct FrameBuilder {
    header: String,
    fields: Vec<String>,
}

impl FrameBuilder {
    pub fn format() -> Self {
        Self::new("log_format")
    }

    pub fn readings() -> Self {
        Self::new("sensor_readings")
    }

    pub fn new(header: &str) -> Self {
        Self {
            header: header.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn float(self, name: &str) -> Self {
        self.field(&format!("f:{}", name))
    }

    pub fn int(self, name: &str) -> Self {
        self.field(&format!("i:{}", name))
    }

    pub fn value(self, value: impl ToString) -> Self {
        self.field(&value.to_string())
    }

    pub fn field(mut self, raw: &str) -> Self {
        self.fields.push(raw.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut line = format!("!{}", self.header);
        for field in &self.fields {
            line.push(';');
            line.push_str(field);
        }
        line.push('|');
        line
    }
}

/// Config tuned for mock links: no reset delays, short timeouts
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.link.port = "mock".to_string();
    config.link.read_timeout_ms = 20;
    config.link.reset = ResetConfig::disabled();
    config
}

/// Test config with a fast reset handshake
pub fn test_config_with_reset() -> AppConfig {
    let mut config = test_config();
    config.link.reset = ResetConfig {
        enabled: true,
        low_ms: 1,
        settle_ms: 1,
    };
    config
}
