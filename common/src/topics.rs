pub const BOX_ID: &str = "01";

pub const TOPIC_DISPENSE: &str = "medbox/01/dispense";
pub const TOPIC_DISPENSED: &str = "medbox/01/dispensed";
pub const TOPIC_EVENTS: &str = "medbox/01/events";

pub const ACK_PAYLOAD: &str = "true";
pub const ONLINE_PAYLOAD: &str = "online";

/// Builds a `medbox/<box>/<command>` topic for an arbitrary box identifier.
pub fn command_topic(box_id: &str, command: &str) -> String {
    format!("medbox/{box_id}/{command}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_topic_matches_wired_constants() {
        assert_eq!(command_topic(BOX_ID, "dispense"), TOPIC_DISPENSE);
        assert_eq!(command_topic(BOX_ID, "dispensed"), TOPIC_DISPENSED);
        assert_eq!(command_topic(BOX_ID, "events"), TOPIC_EVENTS);
    }
}
