//! Lab spawner
//!
//! Login and pre-launch callbacks for a per-user interactive compute
//! platform, backed by a directory service and an ordered placement
//! document.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod app;
pub mod config;
pub mod hooks;
pub mod logging;

pub use app::App;
