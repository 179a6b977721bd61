//! Workload placement service over the configuration loaded at startup.

use std::collections::BTreeMap;

use directory_authn_sdk::IdentityFacts;
use tracing::{debug, info, warn};
use workload_placement_sdk::{
    ImageCatalog, LaunchTarget, PlacementDocument, ResourceSpec, UserOptions, WorkloadSpec,
};

use super::catalog::render_options_form;
use super::document::validate_document;
use super::error::DomainError;
use super::image::ImageRef;
use super::policy::{PolicyContext, select_policy};
use super::workload::WorkloadBuilder;

/// Workload placement service.
///
/// Holds only configuration loaded at startup; every call is a pure
/// computation over the identity facts passed in.
#[derive(Debug)]
pub struct Service {
    document: PlacementDocument,
    catalog: ImageCatalog,
    default_image: Option<String>,
    builder: WorkloadBuilder,
}

impl Service {
    /// # Errors
    ///
    /// `InvalidDocument` if a placement rule is malformed, `InvalidImage` if
    /// the default image does not parse.
    pub fn new(
        document: PlacementDocument,
        catalog: ImageCatalog,
        default_image: Option<String>,
        builder: WorkloadBuilder,
    ) -> Result<Self, DomainError> {
        validate_document(&document)?;
        let default_image = default_image.filter(|image| !image.trim().is_empty());
        if let Some(image) = &default_image {
            ImageRef::parse(image)?;
        }
        Ok(Self {
            document,
            catalog,
            default_image,
            builder,
        })
    }

    #[must_use]
    pub fn document(&self) -> &PlacementDocument {
        &self.document
    }

    #[must_use]
    pub fn catalog(&self) -> &ImageCatalog {
        &self.catalog
    }

    /// Select the resource spec for `image`.
    ///
    /// # Errors
    ///
    /// `InvalidImage` if `image` does not parse.
    pub fn select_policy(
        &self,
        facts: &IdentityFacts,
        image: &str,
    ) -> Result<ResourceSpec, DomainError> {
        let image = ImageRef::parse(image)?;
        Ok(select_policy(
            &PolicyContext::from_facts(facts, &image),
            &self.document,
        ))
    }

    /// Image to launch for `options`.
    ///
    /// A requested image is honored only when it is listed in the catalog;
    /// anything else falls back to the default image.
    ///
    /// # Errors
    ///
    /// `NoImage` if the fallback is needed and no default is configured.
    pub fn resolve_image(&self, options: &UserOptions) -> Result<ImageRef, DomainError> {
        if let Some(requested) = options
            .kernel_image
            .as_deref()
            .map(str::trim)
            .filter(|image| !image.is_empty())
        {
            if self.catalog.contains(requested) {
                return ImageRef::parse(requested);
            }
            warn!(image = requested, "Requested image is not in the catalog, using default");
        }

        let default = self.default_image.as_deref().ok_or(DomainError::NoImage)?;
        ImageRef::parse(default)
    }

    /// Build the workload spec for `facts`.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve_image`]; `NonNumericGroupId` if the primary group
    /// id is not numeric.
    #[tracing::instrument(skip_all, fields(username = %facts.canonical_username()))]
    pub fn build_workload(
        &self,
        facts: &IdentityFacts,
        options: &UserOptions,
    ) -> Result<WorkloadSpec, DomainError> {
        self.build(facts, options, &BTreeMap::new())
    }

    /// Populate `target` and return the finished spec. Environment entries
    /// already on `target` win over policy and computed values.
    ///
    /// # Errors
    ///
    /// As [`Self::build_workload`]; `target` is untouched on error.
    #[tracing::instrument(skip_all, fields(username = %facts.canonical_username()))]
    pub fn pre_launch(
        &self,
        facts: &IdentityFacts,
        options: &UserOptions,
        target: &mut LaunchTarget,
    ) -> Result<WorkloadSpec, DomainError> {
        let spec = self.build(facts, options, &target.environment)?;
        target.apply(&spec);
        info!(
            name = spec.name(),
            image = spec.image(),
            uid = spec.run_as_uid(),
            gid = spec.fs_gid(),
            "Launch target populated"
        );
        Ok(spec)
    }

    #[must_use]
    pub fn options_form(&self) -> String {
        render_options_form(&self.catalog)
    }

    fn build(
        &self,
        facts: &IdentityFacts,
        options: &UserOptions,
        platform_env: &BTreeMap<String, String>,
    ) -> Result<WorkloadSpec, DomainError> {
        let image = self.resolve_image(options)?;
        let policy = select_policy(&PolicyContext::from_facts(facts, &image), &self.document);
        let spec = self.builder.build(facts, &image, policy, platform_env)?;
        debug!(
            name = spec.name(),
            image = spec.image(),
            node_selector = ?spec.node_selector(),
            "Workload spec built"
        );
        Ok(spec)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use directory_authn_sdk::GroupMembership;
    use workload_placement_sdk::{ImageEntry, ImageSection, RuleFilter};

    use super::*;
    use crate::domain::environment::LaunchEnvironment;
    use crate::domain::workload::WorkloadSettings;

    fn facts() -> IdentityFacts {
        IdentityFacts::new(
            "alice",
            1001,
            GroupMembership::new("staff", "2000"),
            vec![GroupMembership::new("lsst", "3000")],
            BTreeMap::new(),
        )
    }

    fn document() -> PlacementDocument {
        serde_saphyr::from_str(
            "node_defaults:\n  spawn_on:\n    pool: general\nnode_selectors:\n  - filter:\n      groups: [lsst]\n      images: [lab]\n    spawn_on:\n      pool: lsst\n",
        )
        .unwrap()
    }

    fn catalog() -> ImageCatalog {
        ImageCatalog::new(vec![ImageSection {
            title: Some("Recommended".to_owned()),
            updated: None,
            images: vec![ImageEntry {
                image: "slaclab/lab:w_2024_01".to_owned(),
                description: "Weekly".to_owned(),
            }],
        }])
    }

    fn service(default_image: Option<&str>) -> Service {
        Service::new(
            document(),
            catalog(),
            default_image.map(str::to_owned),
            WorkloadBuilder::new(
                WorkloadSettings {
                    default_url: "/lab".to_owned(),
                    image_pull_policy: "Always".to_owned(),
                    start_timeout_secs: 600,
                    http_timeout_secs: 600,
                },
                LaunchEnvironment::default(),
            ),
        )
        .unwrap()
    }

    fn options(image: &str) -> UserOptions {
        UserOptions {
            kernel_image: Some(image.to_owned()),
        }
    }

    #[test]
    fn catalog_image_overrides_default() {
        let svc = service(Some("team/custom:v2"));
        let image = svc.resolve_image(&options("slaclab/lab:w_2024_01")).unwrap();
        assert_eq!(image.reference(), "slaclab/lab:w_2024_01");
    }

    #[test]
    fn image_outside_catalog_falls_back_to_default() {
        let svc = service(Some("team/custom:v2"));
        let image = svc.resolve_image(&options("evil/miner:latest")).unwrap();
        assert_eq!(image.reference(), "team/custom:v2");
    }

    #[test]
    fn missing_default_is_no_image() {
        let svc = service(None);
        assert_eq!(
            svc.resolve_image(&UserOptions::default()).unwrap_err(),
            DomainError::NoImage
        );
    }

    #[test]
    fn invalid_rule_fails_at_construction() {
        let mut doc = document();
        doc.node_selectors[0].filter = RuleFilter {
            groups: Some(std::collections::BTreeSet::new()),
            ..RuleFilter::default()
        };
        let err = Service::new(
            doc,
            catalog(),
            None,
            WorkloadBuilder::new(
                WorkloadSettings {
                    default_url: "/lab".to_owned(),
                    image_pull_policy: "Always".to_owned(),
                    start_timeout_secs: 600,
                    http_timeout_secs: 600,
                },
                LaunchEnvironment::default(),
            ),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidDocument { .. }));
    }

    #[test]
    fn pre_launch_keeps_platform_env_and_fills_target() {
        let svc = service(Some("team/custom:v2"));
        let mut target = LaunchTarget {
            environment: BTreeMap::from([("JUPYTERHUB_API_TOKEN".to_owned(), "tok".to_owned())]),
            ..LaunchTarget::default()
        };

        let spec = svc
            .pre_launch(&facts(), &options("slaclab/lab:w_2024_01"), &mut target)
            .unwrap();

        assert_eq!(target.name.as_deref(), Some("lab-alice-w.2024.01"));
        assert_eq!(target.uid, Some(1001));
        assert_eq!(target.gid, Some(2000));
        assert_eq!(target.node_selector.get("pool").map(String::as_str), Some("lsst"));
        assert_eq!(
            target.environment.get("JUPYTERHUB_API_TOKEN").map(String::as_str),
            Some("tok")
        );
        assert_eq!(&target.environment, spec.env());
    }

    #[test]
    fn failed_pre_launch_leaves_target_untouched() {
        let svc = service(None);
        let mut target = LaunchTarget::default();
        assert!(svc.pre_launch(&facts(), &UserOptions::default(), &mut target).is_err());
        assert_eq!(target, LaunchTarget::default());
    }

    #[test]
    fn select_policy_rejects_malformed_image() {
        let svc = service(None);
        assert!(matches!(
            svc.select_policy(&facts(), "team/"),
            Err(DomainError::InvalidImage { .. })
        ));
    }
}
