//! Domain layer for workload placement.

pub mod catalog;
pub mod document;
pub mod environment;
pub mod error;
pub mod image;
pub mod local_client;
pub mod policy;
pub mod service;
pub mod workload;

pub use error::DomainError;
pub use local_client::WorkloadPlacementLocalClient;
pub use service::Service;
