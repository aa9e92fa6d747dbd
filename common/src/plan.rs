use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("payload is not valid UTF-8")]
    NotUtf8,
    #[error("payload is not a dispense plan: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    #[serde(rename = "magazineId")]
    pub magazine_id: u32,
    #[serde(rename = "magazineName")]
    pub magazine_name: String,
    pub amount: u32,
}

/// Payload shape the scheduling backend publishes with a dispense command.
/// Parsing is informational only: a command triggers a dispense whether or
/// not its payload decodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispensePlan {
    #[serde(default)]
    pub amounts: Vec<PlanItem>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl DispensePlan {
    pub fn from_payload(payload: &[u8]) -> Result<Self, PlanError> {
        let text = core::str::from_utf8(payload).map_err(|_| PlanError::NotUtf8)?;
        Ok(serde_json::from_str(text)?)
    }

    pub fn total_pills(&self) -> u32 {
        self.amounts
            .iter()
            .fold(0_u32, |total, item| total.saturating_add(item.amount))
    }

    pub fn summary(&self) -> String {
        format!(
            "{} magazine(s), {} pill(s)",
            self.amounts.len(),
            self.total_pills()
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_backend_plan_payload() {
        let payload = br#"{
            "amounts": [
                {"magazineId": 1, "magazineName": "Morning Mix", "amount": 2},
                {"magazineId": 2, "magazineName": "Pain Relief", "amount": 1}
            ],
            "timestamp": "2026-08-06T08:00:00.000Z"
        }"#;

        let plan = DispensePlan::from_payload(payload).unwrap();

        assert_eq!(
            plan,
            DispensePlan {
                amounts: vec![
                    PlanItem {
                        magazine_id: 1,
                        magazine_name: "Morning Mix".to_string(),
                        amount: 2,
                    },
                    PlanItem {
                        magazine_id: 2,
                        magazine_name: "Pain Relief".to_string(),
                        amount: 1,
                    },
                ],
                timestamp: Some("2026-08-06T08:00:00.000Z".to_string()),
            }
        );
        assert_eq!(plan.total_pills(), 3);
        assert_eq!(plan.summary(), "2 magazine(s), 3 pill(s)");
    }

    #[test]
    fn empty_object_is_an_empty_plan() {
        let plan = DispensePlan::from_payload(b"{}").unwrap();
        assert!(plan.amounts.is_empty());
        assert_eq!(plan.timestamp, None);
    }

    #[test]
    fn rejects_unstructured_payloads() {
        assert!(matches!(
            DispensePlan::from_payload(b"now"),
            Err(PlanError::Json(_))
        ));
        assert!(matches!(
            DispensePlan::from_payload(&[0xFF, 0xFE]),
            Err(PlanError::NotUtf8)
        ));
    }
}
