//! OpenAPI document, served at `/api-docs/openapi.json`.

use axum::Json;
use utoipa::{
    openapi::{
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
        Contact, InfoBuilder, License,
    },
    Modify, OpenApi,
};

use super::handlers::{auth, groups, health, tasks};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::handlers::register,
        auth::handlers::login,
        auth::handlers::refresh_token,
        auth::handlers::reset_password,
        auth::handlers::logout,
        tasks::list_tasks,
        tasks::create_task,
        tasks::update_task,
        tasks::toggle_task,
        tasks::delete_task,
        groups::list_groups,
        groups::create_group,
        groups::update_group,
        groups::delete_group,
    ),
    components(schemas(
        health::Health,
        auth::types::RegisterRequest,
        auth::types::LoginRequest,
        auth::types::RefreshTokenRequest,
        auth::types::ResetPasswordRequest,
        auth::types::LogoutRequest,
        auth::types::AccountResponse,
        auth::types::UserSummary,
        auth::types::LoginResponse,
        auth::types::RefreshTokenResponse,
        tasks::types::Priority,
        tasks::types::SortField,
        tasks::types::SortOrder,
        tasks::types::CreateTaskRequest,
        tasks::types::UpdateTaskRequest,
        tasks::types::TaskGroupInfo,
        tasks::types::TaskResponse,
        groups::types::CreateGroupRequest,
        groups::types::UpdateGroupRequest,
        groups::types::GroupResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Accounts and token-based sessions"),
        (name = "todos", description = "Owner-scoped tasks"),
        (name = "groups", description = "Task groups"),
        (name = "health", description = "Liveness and database health")
    )
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .build(),
                ),
            );
        }
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut spec = ApiDoc::openapi();

    // Use Cargo.toml metadata instead of the derive defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    info.contact = cargo_contact();
    info.license = cargo_license();
    spec.info = info;

    spec
}

pub async fn serve() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));

        let contact = spec.info.contact.expect("contact");
        assert_eq!(contact.name.as_deref(), Some("Team Taskden"));
        assert_eq!(contact.email.as_deref(), Some("team@taskden.dev"));
    }

    #[test]
    fn every_route_group_is_documented() {
        let spec = openapi();
        for path in [
            "/health",
            "/api/auth/register",
            "/api/auth/login",
            "/api/auth/refresh-token",
            "/api/auth/reset-password",
            "/api/auth/logout",
            "/api/todos",
            "/api/todos/{id}",
            "/api/todos/{id}/toggle",
            "/api/groups",
            "/api/groups/{id}",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn author_parsing() {
        assert_eq!(
            parse_author("Jane Dev <jane@example.com>"),
            (Some("Jane Dev"), Some("jane@example.com"))
        );
        assert_eq!(parse_author("solo"), (Some("solo"), None));
        assert_eq!(parse_author("<only@example.com>"), (None, Some("only@example.com")));
    }
}
