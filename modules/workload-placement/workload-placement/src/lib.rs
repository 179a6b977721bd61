//! Workload Placement Module
//!
//! Turns the identity facts of an authenticated session and the requested
//! image into a finished workload specification:
//!
//! 1. the placement policy engine walks the ordered `node_selectors` rules
//!    and overrides `node_defaults` with the first match;
//! 2. the workload builder adds image naming, launch environment defaults
//!    and the reserved identity variables.
//!
//! ## Configuration
//!
//! ```yaml
//! placement:
//!   placement_file: "/opt/jupyterhub/config/node-selectors.yaml"
//!   images_dir: "/opt/jupyterhub/config/images.d"
//!   default_image: "slaclab/lab:latest"
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod module;

pub use module::WorkloadPlacementModule;
