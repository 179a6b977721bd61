//! Public API traits for the workload placement module.

use directory_authn_sdk::IdentityFacts;

use crate::error::PlacementError;
use crate::models::{LaunchTarget, ResourceSpec, UserOptions, WorkloadSpec};

/// Placement decisions for one workload launch.
///
/// Every method is a pure computation over the identity facts handed in
/// and configuration loaded at startup; nothing here talks to the
/// directory.
pub trait WorkloadPlacementClient: Send + Sync {
    /// Pick the resource spec for `image` from the ordered placement rules.
    ///
    /// # Errors
    ///
    /// `InvalidImage` if the image reference cannot be parsed.
    fn select_policy(
        &self,
        facts: &IdentityFacts,
        image: &str,
    ) -> Result<ResourceSpec, PlacementError>;

    /// Build the finished workload spec.
    ///
    /// # Errors
    ///
    /// - `NoImage` if neither the options nor the configuration name an image
    /// - `InvalidImage` if the image reference cannot be parsed
    /// - `NonNumericGroupId` if the primary group id is not numeric
    fn build_workload(
        &self,
        facts: &IdentityFacts,
        options: &UserOptions,
    ) -> Result<WorkloadSpec, PlacementError>;

    /// HTML options form listing the image catalog.
    fn options_form(&self) -> String;
}

/// Callback invoked by the hosting launch layer before a workload starts.
pub trait LaunchHook: Send + Sync {
    /// Populate `target` for the session owning `facts` and return the
    /// finished spec.
    ///
    /// # Errors
    ///
    /// As [`WorkloadPlacementClient::build_workload`]; `target` is left
    /// untouched on error.
    fn pre_launch(
        &self,
        facts: &IdentityFacts,
        options: &UserOptions,
        target: &mut LaunchTarget,
    ) -> Result<WorkloadSpec, PlacementError>;
}
