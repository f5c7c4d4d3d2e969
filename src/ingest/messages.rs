//! Queue message envelopes

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::consumer::IngestError;

/// Reading published to the wearable queue
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WearableMessage {
    pub id: String,
    pub user_id: String,
    pub device_type: String,
    pub data_type: String,
    /// Producers send either a string or a bare number
    #[serde(deserialize_with = "string_or_scalar")]
    pub data_value: String,
    pub recorded_timestamp: String,
}

impl WearableMessage {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.id.trim().is_empty() {
            return Err(IngestError::Invalid("wearable reading without id".into()));
        }
        if self.user_id.trim().is_empty() {
            return Err(IngestError::Invalid("wearable reading without user_id".into()));
        }
        Ok(())
    }
}

/// Recommendation published to the recommendations queue
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecommendationMessage {
    pub user_id: String,
    pub recommendation_type: String,
    pub description: String,
    pub priority: i32,
}

impl RecommendationMessage {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.user_id.trim().is_empty() {
            return Err(IngestError::Invalid("recommendation without user_id".into()));
        }
        Ok(())
    }
}

fn string_or_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wearable_numeric_value() {
        let message: WearableMessage = serde_json::from_str(
            r#"{"id":"w1","user_id":"u1","device_type":"watch","data_type":"heart_rate","data_value":72,"recorded_timestamp":"2024-05-01T08:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(message.data_value, "72");
        assert!(message.validate().is_ok());
    }

    #[test]
    fn test_wearable_requires_ids() {
        let message: WearableMessage = serde_json::from_str(r#"{"user_id":"u1"}"#).unwrap();
        assert!(matches!(message.validate(), Err(IngestError::Invalid(_))));
    }

    #[test]
    fn test_recommendation_requires_user() {
        let message: RecommendationMessage =
            serde_json::from_str(r#"{"recommendation_type":"diet","priority":1}"#).unwrap();
        assert!(matches!(message.validate(), Err(IngestError::Invalid(_))));
    }

    #[test]
    fn test_recommendation_rejects_text_priority() {
        let result = serde_json::from_str::<RecommendationMessage>(
            r#"{"user_id":"u1","priority":"high"}"#,
        );
        assert!(result.is_err());
    }
}
