//! Session credentials and their persistence.
//!
//! Cookies captured after an interactive login are stored as JSON and
//! re-used by later runs, both for browser contexts and for the HTTP client
//! that fetches the table of contents.

mod credentials;
mod store;

pub use credentials::{SessionCookie, SessionCredentials};
pub use store::{SessionStore, StoreError, default_session_path};
