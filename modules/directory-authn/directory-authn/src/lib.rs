//! Directory `AuthN` Module
//!
//! Verifies credentials against a directory service and resolves the
//! caller's numeric identity and group memberships.
//!
//! The login runs as a strict sequence on one connection:
//! bind, user lookup (plus the optional allowed-groups check), primary
//! group lookup, supplementary group search. Any failure ends in a denial
//! with no partial identity exposed.
//!
//! ## Configuration
//!
//! ```yaml
//! directory:
//!   backend: ldap
//!   server:
//!     address: "ldap01.example.org"
//!     use_ssl: true
//!   bind_dn_templates:
//!     - "uid={username},ou=People,dc=example,dc=org"
//!   user_search_base: "ou=People,dc=example,dc=org"
//!   group_search_base: "ou=Group,dc=example,dc=org"
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod infra;
pub mod module;

pub use module::DirectoryAuthnModule;
