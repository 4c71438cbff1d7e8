//! Domain models for grants and the access audit trail.

pub mod access_log;
pub mod grant;

pub use access_log::{AccessAction, AccessLogEntry, ClientInfo};
pub use grant::{Grant, GrantStatus, GrantView};
