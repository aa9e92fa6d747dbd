use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispenserConfig {
    pub ack_delay_ms: u64,
    pub wifi_retry_delay_ms: u64,
    pub mqtt_retry_delay_ms: u64,
    pub max_payload_bytes: usize,
}

impl Default for DispenserConfig {
    fn default() -> Self {
        Self {
            ack_delay_ms: 3_000,
            wifi_retry_delay_ms: 500,
            mqtt_retry_delay_ms: 2_000,
            max_payload_bytes: 512,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
            mqtt_host: "192.168.0.210".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub dispenser: DispenserConfig,
    pub network: NetworkConfig,
}
