//! Output envelopes for the `tsearch` binary.
//!
//! Robot mode wraps every payload in a [`RobotResponse`]; human mode renders
//! through [`HumanLayout`].

use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;

use crate::error::{Result, SearchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Robot,
}

#[derive(Serialize)]
pub struct RobotResponse<T> {
    pub status: RobotStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    Ok,
    Error { code: String, message: String },
}

pub fn robot_ok<T: Serialize>(data: T) -> RobotResponse<T> {
    RobotResponse {
        status: RobotStatus::Ok,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
        warnings: Vec::new(),
    }
}

impl<T> RobotResponse<T> {
    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Error envelope keyed by [`SearchError::code`].
pub fn robot_error(err: &SearchError) -> RobotResponse<serde_json::Value> {
    let data = match err.stage() {
        Some(stage) => serde_json::json!({ "stage": stage.to_string() }),
        None => serde_json::Value::Null,
    };
    RobotResponse {
        status: RobotStatus::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        },
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
        warnings: Vec::new(),
    }
}

pub fn emit_robot<T: Serialize>(response: &RobotResponse<T>) -> Result<()> {
    emit_json(response)
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)?;
    println!("{payload}");
    Ok(())
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 18,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self.lines.push(String::new());
        self
    }

    pub fn section(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self.lines.push("-".repeat(text.len().max(3)));
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        let padded = format!("{key:width$}", width = self.key_width);
        self.lines
            .push(format!("{} {value}", style(padded).dim()));
        self
    }

    pub fn bullet(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("- {text}"));
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

pub fn emit_human(layout: HumanLayout) {
    println!("{}", layout.build());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    #[test]
    fn robot_error_carries_code_and_stage() {
        let err = SearchError::Timeout {
            engine: "sqlite".to_string(),
            stage: Stage::Executed,
            deadline_ms: 250,
        };
        let value = serde_json::to_value(robot_error(&err)).unwrap();
        assert_eq!(value["status"]["error"]["code"], "timeout_error");
        assert_eq!(value["data"]["stage"], "executed");
    }

    #[test]
    fn robot_ok_omits_empty_warnings() {
        let value = serde_json::to_value(robot_ok(serde_json::json!({"n": 1}))).unwrap();
        assert_eq!(value["status"], "ok");
        assert!(value.get("warnings").is_none());

        let value =
            serde_json::to_value(robot_ok(1).with_warning("fallback engine used")).unwrap();
        assert_eq!(value["warnings"][0], "fallback engine used");
    }

    #[test]
    fn human_layout_renders_in_order() {
        console::set_colors_enabled(false);
        let mut layout = HumanLayout::new();
        layout.title("Results").kv("engine", "sqlite").bullet("T-1001");
        let text = layout.build();
        let engine_at = text.find("engine").unwrap();
        let bullet_at = text.find("- T-1001").unwrap();
        assert!(text.starts_with("Results"));
        assert!(engine_at < bullet_at);
    }
}
