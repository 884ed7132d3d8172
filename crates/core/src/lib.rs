#![warn(clippy::all, missing_docs)]

//! Core logic for the busbook booking client.
//!
//! This crate hosts the wire models, configuration, credential persistence,
//! the REST client, session management with inactivity logout, and section
//! fare pricing used by the terminal UI.

pub mod api;
pub mod config;
pub mod error;
pub mod fare;
pub mod models;
pub mod navigation;
pub mod session;
pub mod storage;
pub mod validation;

pub use api::{ApiClient, ApiEvent};
pub use config::AppConfig;
pub use error::{ApiError, ConfigError, StoreError};
pub use fare::{quote, section_price_per_seat, FareQuote};
pub use navigation::{AdminSection, View};
pub use session::{
    evaluate, ActivitySignal, GuardOutcome, GuardPolicy, IdentityProvider, SessionManager,
    SessionNotice, SessionState,
};
pub use storage::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
