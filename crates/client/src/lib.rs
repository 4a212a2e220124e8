//! Client code for pricetag.
//!
//! This crate talks to the external product catalog: it negotiates and keeps
//! alive the catalog session and turns item lookups into [`pricetag_core::Product`]s.

pub mod session;

pub use session::{Session, SessionClient, SessionConfig, SessionError, SessionStatus};
