use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ordering::Ranked;
use crate::errors::StoreError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

// ── Public shapes (what the API serves) ───────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lane {
    pub uuid: String,
    pub board_uuid: String,
    pub name: String,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub uuid: String,
    pub lane_uuid: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Ranked for Lane {
    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }
}

impl Ranked for Card {
    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }
}

// ── Request payloads ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewBoard {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BoardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewLane {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LanePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewCard {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane_uuid: Option<String>,
}

impl CardPatch {
    /// True when the patch changes where the card sits.
    pub fn relocates(&self) -> bool {
        self.position.is_some() || self.lane_uuid.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveCard {
    pub lane_uuid: String,
    pub position: i64,
}

// ── Verification report ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyChecks {
    pub connection: bool,
    pub read: bool,
    pub write: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifyReport {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tests: VerifyChecks,
}

impl VerifyReport {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

// ── Storage rows (internal keys included) ─────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BoardRow {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_updated: Option<String>,
}

impl BoardRow {
    pub fn into_board(self) -> Board {
        Board {
            uuid: self.uuid,
            name: self.name,
            description: self.description.unwrap_or_default(),
            created_at: self.date_created.unwrap_or_default(),
            updated_at: self.date_updated.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LaneRow {
    pub id: i64,
    pub uuid: String,
    pub board_id: i64,
    pub board_uuid: String,
    pub name: String,
    pub position: i64,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_updated: Option<String>,
}

impl LaneRow {
    pub fn into_lane(self) -> Lane {
        Lane {
            uuid: self.uuid,
            board_uuid: self.board_uuid,
            name: self.name,
            position: self.position,
            created_at: self.date_created.unwrap_or_default(),
            updated_at: self.date_updated.unwrap_or_default(),
        }
    }
}

impl Ranked for LaneRow {
    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CardRow {
    pub id: i64,
    pub uuid: String,
    pub lane_id: i64,
    pub lane_uuid: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    pub position: i64,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_updated: Option<String>,
}

impl CardRow {
    pub fn into_card(self) -> Result<Card, StoreError> {
        let priority = match self.priority.as_deref() {
            Some(p) => Priority::from_str(p).map_err(StoreError::Decode)?,
            None => Priority::default(),
        };
        Ok(Card {
            uuid: self.uuid,
            lane_uuid: self.lane_uuid,
            title: self.title,
            description: self.description.unwrap_or_default(),
            priority,
            position: self.position,
            created_at: self.date_created.unwrap_or_default(),
            updated_at: self.date_updated.unwrap_or_default(),
        })
    }
}

impl Ranked for CardRow {
    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_roundtrip() {
        for s in &["Low", "Medium", "High"] {
            let parsed: Priority = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_priority_serde_uses_capitalized_names() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"High\"");
        assert_eq!(
            serde_json::from_str::<Priority>("\"Low\"").unwrap(),
            Priority::Low
        );
    }

    #[test]
    fn test_card_serialization_hides_internal_ids() {
        let row = CardRow {
            id: 7,
            uuid: "c-1".into(),
            lane_id: 3,
            lane_uuid: "l-1".into(),
            title: "Fix bug".into(),
            description: None,
            priority: Some("High".into()),
            position: 0,
            date_created: Some("2024-01-01 00:00:00".into()),
            date_updated: None,
        };
        let card = row.into_card().unwrap();
        let json = serde_json::to_value(&card).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("lane_id").is_none());
        assert_eq!(json["lane_uuid"], "l-1");
        assert_eq!(json["priority"], "High");
        assert_eq!(json["description"], "");
    }

    #[test]
    fn test_card_row_with_unknown_priority_is_a_decode_error() {
        let row = CardRow {
            id: 1,
            uuid: "c".into(),
            lane_id: 1,
            lane_uuid: "l".into(),
            title: "t".into(),
            description: None,
            priority: Some("Critical".into()),
            position: 0,
            date_created: None,
            date_updated: None,
        };
        assert!(matches!(row.into_card(), Err(StoreError::Decode(_))));
    }

    #[test]
    fn test_card_patch_relocates() {
        assert!(!CardPatch::default().relocates());
        let patch = CardPatch {
            position: Some(2),
            ..Default::default()
        };
        assert!(patch.relocates());
    }

    #[test]
    fn test_new_card_defaults_to_medium_priority() {
        let card: NewCard = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(card.priority, Priority::Medium);
        assert_eq!(card.position, None);
    }
}
