//! Request/response types for task endpoints.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const TITLE_MIN_CHARS: usize = 1;
pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Completed,
    Priority,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
            Self::Completed => "completed",
            Self::Priority => "priority",
        }
    }
}

impl SortOrder {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksQuery {
    pub sort_field: Option<SortField>,
    pub sort_order: Option<SortOrder>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub group_id: Option<Uuid>,
}

/// Partial update. `group_id` distinguishes "leave alone" (absent) from
/// "detach" (explicit null), so it is a doubled `Option`.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_id: Option<Option<Uuid>>,
}

fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Uuid>::deserialize(deserializer).map(Some)
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TaskGroupInfo {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub group: Option<TaskGroupInfo>,
    pub created_at: String,
    pub updated_at: String,
}

pub fn validate_title(title: &str) -> Result<(), String> {
    let chars = title.chars().count();
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&chars) {
        return Err(format!(
            "title must be {TITLE_MIN_CHARS}-{TITLE_MAX_CHARS} characters"
        ));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), String> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(format!(
            "description must be at most {DESCRIPTION_MAX_CHARS} characters"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_wire_names_are_uppercase() {
        let priority: Priority = serde_json::from_str(r#""HIGH""#).unwrap();
        assert_eq!(priority, Priority::High);
        assert_eq!(serde_json::to_string(&Priority::Low).unwrap(), r#""LOW""#);
        assert!(serde_json::from_str::<Priority>(r#""high""#).is_err());
    }

    #[test]
    fn update_distinguishes_absent_from_null_group() {
        let absent: UpdateTaskRequest = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(absent.group_id, None);

        let null: UpdateTaskRequest =
            serde_json::from_str(r#"{"title":"x","groupId":null}"#).unwrap();
        assert_eq!(null.group_id, Some(None));

        let id = Uuid::now_v7();
        let set: UpdateTaskRequest =
            serde_json::from_str(&format!(r#"{{"groupId":"{id}"}}"#)).unwrap();
        assert_eq!(set.group_id, Some(Some(id)));
    }

    #[test]
    fn sort_params_parse_from_camel_case() {
        let query: ListTasksQuery =
            serde_json::from_str(r#"{"sortField":"updatedAt","sortOrder":"asc"}"#).unwrap();
        assert_eq!(query.sort_field, Some(SortField::UpdatedAt));
        assert_eq!(query.sort_order, Some(SortOrder::Asc));
    }

    #[test]
    fn title_and_description_bounds() {
        assert!(validate_title("write tests").is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title(&"x".repeat(201)).is_err());
        assert!(validate_description(&"x".repeat(1000)).is_ok());
        assert!(validate_description(&"x".repeat(1001)).is_err());
    }
}
