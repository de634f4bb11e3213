pub mod auth;
pub mod groups;
pub mod health;
pub mod tasks;

/// Uniform `{code, message, data}` response envelope.
///
/// `code` is `0` for success and `1` for failures; clients branch on it
/// rather than on HTTP status alone.
pub mod envelope {
    use axum::Json;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Envelope<T: Serialize> {
        code: u8,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<T>,
    }

    pub fn ok<T: Serialize>(data: T) -> Response {
        with_message(data, "success")
    }

    pub fn with_message<T: Serialize>(data: T, message: &str) -> Response {
        (
            StatusCode::OK,
            Json(Envelope {
                code: 0,
                message: message.to_string(),
                data: Some(data),
            }),
        )
            .into_response()
    }

    pub fn ok_empty(message: &str) -> Response {
        (
            StatusCode::OK,
            Json(Envelope::<()> {
                code: 0,
                message: message.to_string(),
                data: None,
            }),
        )
            .into_response()
    }

    pub fn fail(status: StatusCode, message: &str) -> Response {
        (
            status,
            Json(Envelope::<()> {
                code: 1,
                message: message.to_string(),
                data: None,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::envelope;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn envelope_shapes() {
        let response = envelope::ok(serde_json::json!({"id": 1}));
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["code"], 0);
        assert_eq!(value["message"], "success");
        assert_eq!(value["data"]["id"], 1);

        let response = envelope::fail(StatusCode::UNAUTHORIZED, "unauthorized");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["code"], 1);
        assert!(value.get("data").is_none());
    }
}
