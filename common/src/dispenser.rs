use crate::config::DispenserConfig;
use crate::topics::TOPIC_DISPENSE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineAction {
    /// Run the pill-release hardware cycle.
    BeginDispense,
    /// Wait the given number of milliseconds before the next action.
    Delay(u64),
    /// Publish the fixed acknowledgment payload to the ack topic.
    PublishAck,
}

/// Decides what an incoming broker message triggers. Pure logic shared by
/// the ESP32 and host targets; the targets own transport and timing.
#[derive(Debug, Clone)]
pub struct DispenserEngine {
    config: DispenserConfig,
}

impl DispenserEngine {
    pub fn new(config: DispenserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DispenserConfig {
        &self.config
    }

    /// Only an exact match on the dispense command topic produces work; the
    /// payload content is never a gate. Oversized payloads are dropped.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> Vec<EngineAction> {
        if topic != TOPIC_DISPENSE {
            return Vec::new();
        }

        if payload.len() > self.config.max_payload_bytes {
            return Vec::new();
        }

        vec![
            EngineAction::BeginDispense,
            EngineAction::Delay(self.config.ack_delay_ms),
            EngineAction::PublishAck,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DispenserEngine {
        DispenserEngine::new(DispenserConfig::default())
    }

    #[test]
    fn dispense_topic_triggers_delayed_ack() {
        let actions = engine().handle_message(TOPIC_DISPENSE, b"{\"amounts\":[]}");

        assert_eq!(
            actions,
            vec![
                EngineAction::BeginDispense,
                EngineAction::Delay(3_000),
                EngineAction::PublishAck,
            ]
        );
    }

    #[test]
    fn payload_content_is_irrelevant() {
        let from_json = engine().handle_message(TOPIC_DISPENSE, b"{\"amounts\":[]}");
        let from_garbage = engine().handle_message(TOPIC_DISPENSE, &[0xFF, 0x00, 0x42]);
        let from_empty = engine().handle_message(TOPIC_DISPENSE, b"");

        assert_eq!(from_json, from_garbage);
        assert_eq!(from_json, from_empty);
    }

    #[test]
    fn other_topics_produce_no_actions() {
        assert!(engine().handle_message("medbox/01/dispensed", b"true").is_empty());
        assert!(engine().handle_message("medbox/02/dispense", b"{}").is_empty());
        assert!(engine()
            .handle_message("medbox/01/dispense/extra", b"{}")
            .is_empty());
    }

    #[test]
    fn oversized_payloads_are_dropped() {
        let config = DispenserConfig::default();
        let oversized = vec![b'x'; config.max_payload_bytes + 1];
        let at_limit = vec![b'x'; config.max_payload_bytes];

        let engine = DispenserEngine::new(config);
        assert!(engine.handle_message(TOPIC_DISPENSE, &oversized).is_empty());
        assert_eq!(engine.handle_message(TOPIC_DISPENSE, &at_limit).len(), 3);
    }

    #[test]
    fn ack_delay_follows_configuration() {
        let config = DispenserConfig {
            ack_delay_ms: 1_500,
            ..DispenserConfig::default()
        };
        let actions = DispenserEngine::new(config).handle_message(TOPIC_DISPENSE, b"{}");

        assert!(actions.contains(&EngineAction::Delay(1_500)));
    }
}
