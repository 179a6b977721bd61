//! Local (in-process) client for workload placement.

use std::sync::Arc;

use directory_authn_sdk::IdentityFacts;
use workload_placement_sdk::{
    LaunchHook, LaunchTarget, PlacementError, ResourceSpec, UserOptions, WorkloadPlacementClient,
    WorkloadSpec,
};

use super::{DomainError, Service};

/// Local client wrapping the service.
pub struct WorkloadPlacementLocalClient {
    svc: Arc<Service>,
}

impl WorkloadPlacementLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> PlacementError {
    match &e {
        DomainError::InvalidDocument { .. }
        | DomainError::InvalidEnvironment { .. }
        | DomainError::IoError { .. }
        | DomainError::ParseError { .. }
        | DomainError::NoImage => {
            tracing::error!(operation = op, error = %e, "workload_placement call failed");
        }
        DomainError::InvalidImage { .. } | DomainError::NonNumericGroupId { .. } => {
            tracing::warn!(operation = op, error = %e, "workload_placement call rejected");
        }
    }
    e.into()
}

impl WorkloadPlacementClient for WorkloadPlacementLocalClient {
    fn select_policy(
        &self,
        facts: &IdentityFacts,
        image: &str,
    ) -> Result<ResourceSpec, PlacementError> {
        self.svc
            .select_policy(facts, image)
            .map_err(|e| log_and_convert("select_policy", e))
    }

    fn build_workload(
        &self,
        facts: &IdentityFacts,
        options: &UserOptions,
    ) -> Result<WorkloadSpec, PlacementError> {
        self.svc
            .build_workload(facts, options)
            .map_err(|e| log_and_convert("build_workload", e))
    }

    fn options_form(&self) -> String {
        self.svc.options_form()
    }
}

impl LaunchHook for WorkloadPlacementLocalClient {
    fn pre_launch(
        &self,
        facts: &IdentityFacts,
        options: &UserOptions,
        target: &mut LaunchTarget,
    ) -> Result<WorkloadSpec, PlacementError> {
        self.svc
            .pre_launch(facts, options, target)
            .map_err(|e| log_and_convert("pre_launch", e))
    }
}
