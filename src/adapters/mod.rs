// Adapters layer: concrete implementations for external systems (http transport, auth session).

pub mod http;
pub mod session;

pub use http::ReqwestTransport;
pub use session::AuthSession;
