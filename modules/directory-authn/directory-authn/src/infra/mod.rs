//! Directory implementations.

#[cfg(feature = "ldap")]
pub mod ldap;
pub mod memory;

#[cfg(feature = "ldap")]
pub use ldap::LdapConnector;
pub use memory::StaticDirectory;
