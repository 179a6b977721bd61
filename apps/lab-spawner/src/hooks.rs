//! Adapters between the hosting platform's callbacks and the modules.
//!
//! The login hook hands back a [`Session`] value; the caller stores it
//! and passes it to the launch hook. Nothing is kept between calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use directory_authn::domain::Service as AuthnService;
use directory_authn_sdk::{Credential, DirectoryAuthnError, IdentityFacts};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use workload_placement::domain::catalog::options_from_form;
use workload_placement_sdk::{
    LaunchHook, LaunchTarget, PlacementError, WorkloadPlacementClient, WorkloadSpec,
};

/// Identity of one logged-in session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub facts: IdentityFacts,
}

/// Result of a login submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Accepted(Session),
    /// `message` is the only detail shown to the submitter.
    Denied { message: &'static str },
}

impl LoginOutcome {
    /// The canonical username on success.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Accepted(session) => Some(&session.username),
            Self::Denied { .. } => None,
        }
    }
}

/// Login-submission callback.
pub struct LoginHook {
    service: Arc<AuthnService>,
}

impl LoginHook {
    #[must_use]
    pub fn new(service: Arc<AuthnService>) -> Self {
        Self { service }
    }

    /// Authenticate `username`. A cancelled login is a denial.
    pub async fn login(
        &self,
        username: &str,
        password: SecretString,
        cancel: &CancellationToken,
    ) -> LoginOutcome {
        let credential = Credential::new(username, password);
        match self.service.authenticate_until(&credential, cancel).await {
            Ok(authenticated) => LoginOutcome::Accepted(Session {
                username: authenticated.canonical_username,
                facts: authenticated.facts,
            }),
            Err(e) => LoginOutcome::Denied {
                message: DirectoryAuthnError::from(e).user_message(),
            },
        }
    }
}

/// Pre-launch callback and options form.
pub struct SpawnHook {
    placement: Arc<dyn WorkloadPlacementClient>,
    launch: Arc<dyn LaunchHook>,
}

impl SpawnHook {
    #[must_use]
    pub fn new(placement: Arc<dyn WorkloadPlacementClient>, launch: Arc<dyn LaunchHook>) -> Self {
        Self { placement, launch }
    }

    #[must_use]
    pub fn options_form(&self) -> String {
        self.placement.options_form()
    }

    /// Populate `target` for `session` from submitted form data.
    ///
    /// # Errors
    ///
    /// As [`LaunchHook::pre_launch`].
    pub fn pre_spawn(
        &self,
        session: &Session,
        form: &BTreeMap<String, Vec<String>>,
        target: &mut LaunchTarget,
    ) -> Result<WorkloadSpec, PlacementError> {
        let options = options_from_form(form);
        self.launch.pre_launch(&session.facts, &options, target)
    }
}
