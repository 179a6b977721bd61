//! Workload Placement SDK
//!
//! This crate provides the public API for the `workload_placement` module:
//!
//! - [`WorkloadPlacementClient`] - Policy selection and workload building
//! - [`LaunchHook`] / [`LaunchTarget`] - Pre-launch callback contract
//! - [`PlacementDocument`] - Ordered placement rules with node defaults
//! - [`ResourceSpec`] / [`WorkloadSpec`] - Placement decisions
//! - [`PlacementError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use workload_placement_sdk::{LaunchHook, LaunchTarget, UserOptions};
//!
//! let mut target = LaunchTarget::default();
//! let spec = hook.pre_launch(&facts, &UserOptions::default(), &mut target)?;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod models;

// Re-export main types at crate root
pub use api::{LaunchHook, WorkloadPlacementClient};
pub use error::PlacementError;
pub use models::{
    ImageCatalog, ImageEntry, ImageSection, LaunchTarget, NodeDefaults, PlacementDocument,
    PlacementRule, ResourceOverrides, ResourceSpec, RuleFilter, UserOptions, WorkloadParts,
    WorkloadSpec,
};
