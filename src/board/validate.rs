//! Request-body validation.
//!
//! Bodies arrive as raw JSON so that type mismatches become field-level
//! messages (HTTP 400) instead of extractor rejections. Every check runs and
//! all failures are reported together.

use std::str::FromStr;

use serde_json::{Map, Value};

use super::models::{BoardPatch, CardPatch, LanePatch, MoveCard, NewBoard, NewCard, NewLane, Priority};
use crate::errors::{BoardError, FieldError};

struct Fields<'a> {
    body: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> Fields<'a> {
    fn new(body: &'a Value) -> Result<Self, BoardError> {
        match body.as_object() {
            Some(body) => Ok(Self {
                body,
                errors: Vec::new(),
            }),
            None => Err(BoardError::invalid("body", "Request body must be a JSON object")),
        }
    }

    fn present(&self, field: &str) -> Option<&'a Value> {
        self.body.get(field).filter(|v| !v.is_null())
    }

    fn fail(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError::new(field, message));
    }

    /// A non-empty string that must be supplied.
    fn required_text(&mut self, field: &str, message: &str) -> String {
        match self.present(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            _ => {
                self.fail(field, message);
                String::new()
            }
        }
    }

    /// A string that may be absent; when present it must be a string and,
    /// if `non_empty`, not blank.
    fn optional_text(&mut self, field: &str, non_empty: bool) -> Option<String> {
        match self.present(field)? {
            Value::String(s) if non_empty && s.trim().is_empty() => {
                self.fail(field, &format!("{} must not be empty", capitalize(field)));
                None
            }
            Value::String(s) => Some(s.clone()),
            _ => {
                self.fail(field, &format!("{} must be a string", capitalize(field)));
                None
            }
        }
    }

    /// A non-negative integer. Integral floats and numeric strings are accepted
    /// the way a form post would send them.
    fn optional_position(&mut self, field: &str, message: &str) -> Option<i64> {
        let value = self.present(field)?;
        let parsed = match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        match parsed {
            Some(p) if p >= 0 => Some(p),
            _ => {
                self.fail(field, message);
                None
            }
        }
    }

    fn required_position(&mut self, field: &str, message: &str) -> i64 {
        if self.present(field).is_none() {
            self.fail(field, message);
            return 0;
        }
        self.optional_position(field, message).unwrap_or(0)
    }

    fn optional_priority(&mut self, field: &str) -> Option<Priority> {
        let raw = self.optional_text(field, true)?;
        match Priority::from_str(&raw) {
            Ok(p) => Some(p),
            Err(_) => {
                self.fail(field, "Priority must be one of Low, Medium, High");
                None
            }
        }
    }

    fn finish<T>(self, value: T) -> Result<T, BoardError> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(BoardError::Validation(self.errors))
        }
    }
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>().replace('_', " "),
        None => String::new(),
    }
}

const POSITION_MESSAGE: &str = "Position must be a non-negative integer";

pub fn new_board(body: &Value) -> Result<NewBoard, BoardError> {
    let mut f = Fields::new(body)?;
    let name = f.required_text("name", "Name is required");
    let description = f.optional_text("description", false).unwrap_or_default();
    f.finish(NewBoard { name, description })
}

pub fn board_patch(body: &Value) -> Result<BoardPatch, BoardError> {
    let mut f = Fields::new(body)?;
    let name = f.optional_text("name", true);
    let description = f.optional_text("description", false);
    f.finish(BoardPatch { name, description })
}

pub fn new_lane(body: &Value) -> Result<NewLane, BoardError> {
    let mut f = Fields::new(body)?;
    let name = f.required_text("name", "Name is required");
    let position = f.optional_position("position", POSITION_MESSAGE);
    f.finish(NewLane { name, position })
}

pub fn lane_patch(body: &Value) -> Result<LanePatch, BoardError> {
    let mut f = Fields::new(body)?;
    let name = f.optional_text("name", true);
    let position = f.optional_position("position", POSITION_MESSAGE);
    f.finish(LanePatch { name, position })
}

pub fn new_card(body: &Value) -> Result<NewCard, BoardError> {
    let mut f = Fields::new(body)?;
    let title = f.required_text("title", "Title is required");
    let description = f.optional_text("description", false).unwrap_or_default();
    let priority = f.optional_priority("priority").unwrap_or_default();
    let position = f.optional_position("position", POSITION_MESSAGE);
    f.finish(NewCard {
        title,
        description,
        priority,
        position,
    })
}

pub fn card_patch(body: &Value) -> Result<CardPatch, BoardError> {
    let mut f = Fields::new(body)?;
    let title = f.optional_text("title", true);
    let description = f.optional_text("description", false);
    let priority = f.optional_priority("priority");
    let position = f.optional_position("position", POSITION_MESSAGE);
    let lane_uuid = f.optional_text("lane_uuid", true);
    f.finish(CardPatch {
        title,
        description,
        priority,
        position,
        lane_uuid,
    })
}

pub fn move_card(body: &Value) -> Result<MoveCard, BoardError> {
    let mut f = Fields::new(body)?;
    let lane_uuid = f.required_text("lane_uuid", "Lane UUID is required");
    let position = f.required_position("position", POSITION_MESSAGE);
    f.finish(MoveCard { lane_uuid, position })
}
