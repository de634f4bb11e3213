//! Session-aware API client.
//!
//! Every authenticated call goes through [`ApiClient::execute`], which owns
//! the silent-refresh protocol: at most one refresh and one replay per call,
//! with the attempt number as explicit control flow rather than a marker on
//! the request. A 401 on the replay is returned as-is, so a broken refresh
//! path can never loop.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::api::handlers::{
    auth::types::{AccountResponse, LoginResponse, UserSummary},
    groups::types::{CreateGroupRequest, GroupResponse, UpdateGroupRequest},
    tasks::types::{
        CreateTaskRequest, SortField, SortOrder, TaskResponse, UpdateTaskRequest,
    },
};

use super::session::{Session, SessionStore};
use super::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("session expired, please log in again")]
    SessionExpired,

    #[error("server returned {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

type SessionExpiredHook = Box<dyn Fn() + Send + Sync>;

pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: SessionStore,
    on_session_expired: Option<SessionExpiredHook>,
}

impl ApiClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            session: SessionStore::new(),
            on_session_expired: None,
        }
    }

    /// Convenience constructor for the reqwest transport.
    ///
    /// # Errors
    /// Returns an error for an unparseable base URL.
    pub fn connect(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self::new(Arc::new(HttpTransport::new(base_url)?)))
    }

    /// Register a callback fired when the session is cleared because a
    /// refresh was impossible or rejected. UIs hang re-login flows off this.
    #[must_use]
    pub fn with_session_expired_hook(mut self, hook: SessionExpiredHook) -> Self {
        self.on_session_expired = Some(hook);
        self
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Send an authenticated request with the silent-refresh protocol.
    ///
    /// Attempt 0 carries the current access token. On a 401 the stored
    /// refresh token is exchanged once; success overwrites the access token
    /// and the request is replayed exactly once. The replay's response is
    /// returned untouched. Any other refresh outcome clears the session; a
    /// rejected refresh surfaces `SessionExpired`, a refresh that failed on
    /// the wire surfaces `Transport`.
    ///
    /// # Errors
    /// `SessionExpired`, or `Transport` for wire-level failures.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ClientError> {
        request.bearer = self.session.access_token();
        let response = self.transport.send(&request).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(refresh_token) = self.session.refresh_token() else {
            return Err(self.expire());
        };

        debug!("access token rejected, attempting silent refresh");

        let refresh_request = ApiRequest::post(
            "/api/auth/refresh-token",
            json!({"refreshToken": refresh_token}),
        );
        // A refresh that dies on the wire is as unrecoverable as a rejected
        // one: drop the session before surfacing the error.
        let refresh_response = match self.transport.send(&refresh_request).await {
            Ok(response) => response,
            Err(err) => {
                self.expire();
                return Err(ClientError::Transport(err));
            }
        };
        if refresh_response.status != StatusCode::OK {
            return Err(self.expire());
        }

        let Some(access_token) = refresh_response.body["data"]["accessToken"].as_str() else {
            return Err(self.expire());
        };

        self.session.set_access_token(access_token.to_string());
        request.bearer = Some(access_token.to_string());

        // Attempt 1, returned as-is whatever the status.
        Ok(self.transport.send(&request).await?)
    }

    fn expire(&self) -> ClientError {
        self.session.clear();
        if let Some(hook) = &self.on_session_expired {
            hook();
        }
        ClientError::SessionExpired
    }

    /// Send without the refresh protocol. Auth endpoints use this: a 401
    /// from login means bad credentials, not an expired session.
    async fn execute_plain(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        Ok(self.transport.send(&request).await?)
    }

    // -- auth ---------------------------------------------------------------

    /// # Errors
    /// `Api` for rejected input or a taken username.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AccountResponse, ClientError> {
        let response = self
            .execute_plain(ApiRequest::post(
                "/api/auth/register",
                json!({"username": username, "password": password}),
            ))
            .await?;
        unwrap_data(response)
    }

    /// Log in and install the returned session.
    ///
    /// # Errors
    /// `Api` with status 401 for bad credentials.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserSummary, ClientError> {
        let response = self
            .execute_plain(ApiRequest::post(
                "/api/auth/login",
                json!({"username": username, "password": password}),
            ))
            .await?;
        let login: LoginResponse = unwrap_data(response)?;

        let user = login.user.clone();
        self.session.install(Session {
            access_token: login.access_token,
            refresh_token: login.refresh_token,
            user: login.user,
        });

        info!(username = %user.username, "logged in");

        Ok(user)
    }

    /// Change the password. The server revokes every session on success, so
    /// the local one is cleared too; the caller must log in again.
    ///
    /// # Errors
    /// `Api`, or `SessionExpired` when not logged in.
    pub async fn reset_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ClientError> {
        let response = self
            .execute(ApiRequest::post(
                "/api/auth/reset-password",
                json!({"oldPassword": old_password, "newPassword": new_password}),
            ))
            .await?;
        expect_ok(&response)?;
        self.session.clear();
        Ok(())
    }

    /// Discard the server-side session for the stored refresh token, then
    /// clear the local store. Works even when no session is held.
    ///
    /// # Errors
    /// `Api` or `Transport`; the local store is cleared regardless.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let refresh_token = self.session.refresh_token();
        self.session.clear();

        if let Some(refresh_token) = refresh_token {
            let response = self
                .execute_plain(ApiRequest::post(
                    "/api/auth/logout",
                    json!({"refreshToken": refresh_token}),
                ))
                .await?;
            expect_ok(&response)?;
        }

        Ok(())
    }

    // -- tasks --------------------------------------------------------------

    /// # Errors
    /// `Api`, `SessionExpired`, or `Transport`.
    pub async fn list_tasks(
        &self,
        sort_field: Option<SortField>,
        sort_order: Option<SortOrder>,
    ) -> Result<Vec<TaskResponse>, ClientError> {
        let mut path = "/api/todos".to_string();
        let mut separator = '?';
        if let Some(field) = sort_field {
            path.push(separator);
            path.push_str("sortField=");
            path.push_str(field.as_str());
            separator = '&';
        }
        if let Some(order) = sort_order {
            path.push(separator);
            path.push_str("sortOrder=");
            path.push_str(order.as_str());
        }

        let response = self.execute(ApiRequest::get(&path)).await?;
        unwrap_data(response)
    }

    /// # Errors
    /// `Api`, `SessionExpired`, or `Transport`.
    pub async fn create_task(
        &self,
        request: &CreateTaskRequest,
    ) -> Result<TaskResponse, ClientError> {
        let body = serde_json::to_value(request).map_err(anyhow::Error::from)?;
        let response = self
            .execute(ApiRequest::post("/api/todos", body))
            .await?;
        unwrap_data(response)
    }

    /// # Errors
    /// `Api`, `SessionExpired`, or `Transport`.
    pub async fn update_task(
        &self,
        task_id: &str,
        request: &UpdateTaskRequest,
    ) -> Result<TaskResponse, ClientError> {
        let body = serde_json::to_value(request).map_err(anyhow::Error::from)?;
        let response = self
            .execute(ApiRequest::put(&format!("/api/todos/{task_id}"), body))
            .await?;
        unwrap_data(response)
    }

    /// # Errors
    /// `Api`, `SessionExpired`, or `Transport`.
    pub async fn toggle_task(&self, task_id: &str) -> Result<TaskResponse, ClientError> {
        let response = self
            .execute(ApiRequest::patch(&format!("/api/todos/{task_id}/toggle")))
            .await?;
        unwrap_data(response)
    }

    /// # Errors
    /// `Api`, `SessionExpired`, or `Transport`.
    pub async fn delete_task(&self, task_id: &str) -> Result<(), ClientError> {
        let response = self
            .execute(ApiRequest::delete(&format!("/api/todos/{task_id}")))
            .await?;
        expect_ok(&response)
    }

    // -- groups -------------------------------------------------------------

    /// # Errors
    /// `Api`, `SessionExpired`, or `Transport`.
    pub async fn list_groups(&self) -> Result<Vec<GroupResponse>, ClientError> {
        let response = self.execute(ApiRequest::get("/api/groups")).await?;
        unwrap_data(response)
    }

    /// # Errors
    /// `Api`, `SessionExpired`, or `Transport`.
    pub async fn create_group(
        &self,
        request: &CreateGroupRequest,
    ) -> Result<GroupResponse, ClientError> {
        let body = serde_json::to_value(request).map_err(anyhow::Error::from)?;
        let response = self
            .execute(ApiRequest::post("/api/groups", body))
            .await?;
        unwrap_data(response)
    }

    /// # Errors
    /// `Api`, `SessionExpired`, or `Transport`.
    pub async fn update_group(
        &self,
        group_id: &str,
        request: &UpdateGroupRequest,
    ) -> Result<GroupResponse, ClientError> {
        let body = serde_json::to_value(request).map_err(anyhow::Error::from)?;
        let response = self
            .execute(ApiRequest::put(&format!("/api/groups/{group_id}"), body))
            .await?;
        unwrap_data(response)
    }

    /// # Errors
    /// `Api`, `SessionExpired`, or `Transport`.
    pub async fn delete_group(&self, group_id: &str) -> Result<(), ClientError> {
        let response = self
            .execute(ApiRequest::delete(&format!("/api/groups/{group_id}")))
            .await?;
        expect_ok(&response)
    }
}

fn envelope_message(response: &ApiResponse) -> String {
    response.body["message"]
        .as_str()
        .unwrap_or("request failed")
        .to_string()
}

fn unwrap_data<T: DeserializeOwned>(response: ApiResponse) -> Result<T, ClientError> {
    expect_ok(&response)?;
    serde_json::from_value(response.body["data"].clone()).map_err(|err| ClientError::Api {
        status: response.status,
        message: format!("malformed response payload: {err}"),
    })
}

fn expect_ok(response: &ApiResponse) -> Result<(), ClientError> {
    if response.status.is_success() && response.body["code"] == 0 {
        Ok(())
    } else {
        Err(ClientError::Api {
            status: response.status,
            message: envelope_message(response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    /// Replays a fixed script of responses and records every request.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<ApiResponse>>,
        sent: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<ApiResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<ApiRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
            self.sent.lock().unwrap().push(request.clone());
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("more requests sent than scripted"))
        }
    }

    fn ok(data: serde_json::Value) -> ApiResponse {
        ApiResponse {
            status: StatusCode::OK,
            body: json!({"code": 0, "message": "success", "data": data}),
        }
    }

    fn unauthorized() -> ApiResponse {
        ApiResponse {
            status: StatusCode::UNAUTHORIZED,
            body: json!({"code": 1, "message": "unauthorized"}),
        }
    }

    fn refreshed(access_token: &str) -> ApiResponse {
        ok(json!({"accessToken": access_token}))
    }

    fn client_with_session(transport: Arc<ScriptedTransport>) -> ApiClient {
        let client = ApiClient::new(transport);
        client.session.install(Session {
            access_token: "stale-access".to_string(),
            refresh_token: "refresh-1".to_string(),
            user: UserSummary {
                id: "u-1".to_string(),
                username: "alice".to_string(),
            },
        });
        client
    }

    #[tokio::test]
    async fn success_passes_through_with_one_call() {
        let transport = ScriptedTransport::new(vec![ok(json!([]))]);
        let client = client_with_session(transport.clone());

        let tasks = client.list_tasks(None, None).await.unwrap();
        assert!(tasks.is_empty());

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bearer.as_deref(), Some("stale-access"));
    }

    #[tokio::test]
    async fn rejected_access_token_refreshes_once_and_replays_once() {
        let transport = ScriptedTransport::new(vec![
            unauthorized(),
            refreshed("fresh-access"),
            ok(json!([])),
        ]);
        let client = client_with_session(transport.clone());

        client.list_tasks(None, None).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].path, "/api/auth/refresh-token");
        assert_eq!(
            sent[1].body.as_ref().unwrap()["refreshToken"],
            "refresh-1"
        );
        assert_eq!(sent[2].path, sent[0].path);
        assert_eq!(sent[2].bearer.as_deref(), Some("fresh-access"));
        assert_eq!(
            client.session.access_token().as_deref(),
            Some("fresh-access")
        );
    }

    #[tokio::test]
    async fn rejected_refresh_clears_session_and_fires_hook() {
        let transport = ScriptedTransport::new(vec![unauthorized(), unauthorized()]);
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let client = client_with_session(transport.clone()).with_session_expired_hook(Box::new(
            move || fired_clone.store(true, Ordering::SeqCst),
        ));

        let err = client.list_tasks(None, None).await.unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired));

        // no replay after a failed refresh
        assert_eq!(transport.sent().len(), 2);
        assert!(client.session.access_token().is_none());
        assert!(fired.load(Ordering::SeqCst));
    }

    /// Answers everything with a 401 except the refresh endpoint, where the
    /// connection drops.
    struct DroppedRefreshTransport {
        sent: Mutex<Vec<ApiRequest>>,
    }

    #[async_trait]
    impl Transport for DroppedRefreshTransport {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
            self.sent.lock().unwrap().push(request.clone());
            if request.path == "/api/auth/refresh-token" {
                anyhow::bail!("connection reset during refresh");
            }
            Ok(unauthorized())
        }
    }

    #[tokio::test]
    async fn refresh_transport_failure_clears_the_session() {
        let transport = Arc::new(DroppedRefreshTransport {
            sent: Mutex::new(Vec::new()),
        });
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let client = ApiClient::new(transport.clone()).with_session_expired_hook(Box::new(
            move || fired_clone.store(true, Ordering::SeqCst),
        ));
        client.session.install(Session {
            access_token: "stale-access".to_string(),
            refresh_token: "refresh-1".to_string(),
            user: UserSummary {
                id: "u-1".to_string(),
                username: "alice".to_string(),
            },
        });

        let err = client.list_tasks(None, None).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));

        // original call plus the refresh, no replay
        assert_eq!(transport.sent.lock().unwrap().len(), 2);
        assert!(client.session.access_token().is_none());
        assert!(client.session.refresh_token().is_none());
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_without_a_refresh_call() {
        let transport = ScriptedTransport::new(vec![unauthorized()]);
        let client = ApiClient::new(transport.clone());

        let err = client.list_tasks(None, None).await.unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn replayed_401_is_returned_as_is() {
        let transport = ScriptedTransport::new(vec![
            unauthorized(),
            refreshed("fresh-access"),
            unauthorized(),
        ]);
        let client = client_with_session(transport.clone());

        let response = client
            .execute(ApiRequest::get("/api/todos"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);

        // exactly one refresh and one replay, never a second round
        assert_eq!(transport.sent().len(), 3);
    }

    #[tokio::test]
    async fn login_installs_the_returned_session() {
        let transport = ScriptedTransport::new(vec![ok(json!({
            "user": {"id": "u-1", "username": "alice"},
            "accessToken": "a-1",
            "refreshToken": "r-1"
        }))]);
        let client = ApiClient::new(transport.clone());

        let user = client.login("alice", "hunter22").await.unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(client.session.access_token().as_deref(), Some("a-1"));
        assert_eq!(client.session.refresh_token().as_deref(), Some("r-1"));
    }

    #[tokio::test]
    async fn failed_login_does_not_trigger_the_refresh_protocol() {
        let transport = ScriptedTransport::new(vec![unauthorized()]);
        let client = ApiClient::new(transport.clone());

        let err = client.login("alice", "wrong").await.unwrap_err();
        match err {
            ClientError::Api { status, .. } => assert_eq!(status, StatusCode::UNAUTHORIZED),
            other => panic!("expected Api error, got {other:?}"),
        }
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn logout_sends_the_stored_refresh_token_and_clears() {
        let transport = ScriptedTransport::new(vec![ok(json!(null))]);
        let client = client_with_session(transport.clone());

        client.logout().await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].path, "/api/auth/logout");
        assert_eq!(
            sent[0].body.as_ref().unwrap()["refreshToken"],
            "refresh-1"
        );
        assert!(client.session.refresh_token().is_none());
    }
}
