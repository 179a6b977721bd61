//! Directory `AuthN` SDK
//!
//! This crate provides the public API for the `directory_authn` module:
//!
//! - [`DirectoryAuthenticatorClient`] - Public API trait for consumers
//! - [`Credential`] - Username/password pair submitted at login
//! - [`IdentityFacts`] - Identity attributes resolved from the directory
//! - [`DirectoryAuthnError`] / [`DenyReason`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use directory_authn_sdk::{Credential, DirectoryAuthenticatorClient};
//!
//! let credential = Credential::new("alice", "correct-pw");
//! let authenticated = authn.authenticate(&credential).await?;
//!
//! // Thread the facts into the launch step; nothing is kept process-wide.
//! let facts = authenticated.facts;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod models;

// Re-export main types at crate root
pub use api::DirectoryAuthenticatorClient;
pub use error::{DenyReason, DirectoryAuthnError, ErrorKind};
pub use models::{Authenticated, Credential, GroupId, GroupMembership, IdentityFacts};
