//! Domain layer for the directory authenticator.

pub mod directory;
pub mod error;
pub mod local_client;
pub mod query;
pub mod resolver;
pub mod service;
pub mod verifier;

pub use error::DomainError;
pub use local_client::DirectoryAuthnLocalClient;
pub use service::{AuthState, Service};
