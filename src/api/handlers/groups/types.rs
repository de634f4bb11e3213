//! Request/response types for group endpoints.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use utoipa::ToSchema;

pub const NAME_MIN_CHARS: usize = 1;
pub const NAME_MAX_CHARS: usize = 50;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateGroupRequest {
    pub name: String,
    pub color: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GroupResponse {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub created_at: String,
    pub task_count: i64,
}

fn color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^#[0-9A-Fa-f]{6}$").unwrap())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    let chars = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&chars) {
        return Err(format!(
            "group name must be {NAME_MIN_CHARS}-{NAME_MAX_CHARS} characters"
        ));
    }
    Ok(())
}

pub fn validate_color(color: &str) -> Result<(), String> {
    if !color_pattern().is_match(color) {
        return Err("color must be in #RRGGBB format".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_bounds() {
        assert!(validate_name("inbox").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(&"x".repeat(51)).is_err());
    }

    #[test]
    fn color_format() {
        assert!(validate_color("#3B82F6").is_ok());
        assert!(validate_color("#abcdef").is_ok());
        assert!(validate_color("3B82F6").is_err());
        assert!(validate_color("#3B82F").is_err());
        assert!(validate_color("#3B82F6F").is_err());
        assert!(validate_color("#GGGGGG").is_err());
    }
}
