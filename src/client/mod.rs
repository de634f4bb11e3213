//! API client with silent token refresh.
//!
//! [`ApiClient`] wraps every server endpoint and transparently exchanges the
//! refresh token for a new access token when a call comes back 401, retrying
//! the call exactly once. See [`ApiClient::execute`] for the protocol.

pub mod api;
pub mod session;
pub mod transport;

pub use api::{ApiClient, ClientError};
pub use session::{Session, SessionStore};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
