//! Placement policy engine.
//!
//! A pure function of the request facts and the placement document: rules
//! are tried in declaration order and the first rule whose filter matches
//! overrides the node defaults field by field.

use std::collections::BTreeSet;

use directory_authn_sdk::IdentityFacts;
use tracing::debug;
use workload_placement_sdk::{
    NodeDefaults, PlacementDocument, PlacementRule, ResourceOverrides, ResourceSpec, RuleFilter,
};

use super::image::ImageRef;

/// Request facts placement rules are matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyContext {
    groups: BTreeSet<String>,
    images: BTreeSet<String>,
    uid: u32,
}

impl PolicyContext {
    #[must_use]
    pub fn new<I, S>(groups: I, image: &ImageRef, uid: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
            images: image
                .match_candidates()
                .into_iter()
                .map(str::to_owned)
                .collect(),
            uid,
        }
    }

    /// Context for the session owning `facts`. Group names come only from
    /// the facts; nothing is looked up.
    #[must_use]
    pub fn from_facts(facts: &IdentityFacts, image: &ImageRef) -> Self {
        Self::new(facts.group_names(), image, facts.uid())
    }

    fn matches(&self, filter: &RuleFilter) -> bool {
        intersects(filter.groups.as_ref(), &self.groups)
            && intersects(filter.images.as_ref(), &self.images)
            && filter.uid.as_ref().is_none_or(|uids| uids.contains(&self.uid))
    }
}

fn intersects(allowed: Option<&BTreeSet<String>>, candidates: &BTreeSet<String>) -> bool {
    allowed.is_none_or(|allowed| !allowed.is_disjoint(candidates))
}

/// Select the resource spec for one launch.
///
/// Returns the node defaults untouched when no rule matches.
#[must_use]
pub fn select_policy(ctx: &PolicyContext, document: &PlacementDocument) -> ResourceSpec {
    let mut spec = defaults(&document.node_defaults);

    let matched = document
        .node_selectors
        .iter()
        .enumerate()
        .find(|(_, rule)| ctx.matches(&rule.filter));

    if let Some((index, rule)) = matched {
        apply_rule(&mut spec, rule);
        spec.matched_rule = Some(index);
        debug!(rule = index, node_selector = ?spec.node_selector, "Placement rule matched");
    } else {
        debug!(node_selector = ?spec.node_selector, "No placement rule matched, using node defaults");
    }
    spec
}

fn defaults(node_defaults: &NodeDefaults) -> ResourceSpec {
    let mut spec = ResourceSpec {
        node_selector: node_defaults.spawn_on.clone(),
        ..ResourceSpec::default()
    };
    apply_overrides(&mut spec, &node_defaults.spec);
    spec
}

fn apply_rule(spec: &mut ResourceSpec, rule: &PlacementRule) {
    if let Some(spawn_on) = &rule.spawn_on {
        spec.node_selector.clone_from(spawn_on);
    }
    apply_overrides(spec, &rule.spec);
}

fn apply_overrides(spec: &mut ResourceSpec, overrides: &ResourceOverrides) {
    if let Some(cpu) = overrides.cpu {
        spec.cpu_limit = Some(cpu);
    }
    if let Some(memory) = &overrides.memory {
        spec.memory_limit = Some(memory.clone());
    }
    if let Some(volumes) = &overrides.volumes {
        spec.volumes.clone_from(volumes);
    }
    if let Some(mounts) = &overrides.volume_mounts {
        spec.volume_mounts.clone_from(mounts);
    }
    spec.env.extend(overrides.rendered_env());
    if let Some(limits) = &overrides.extra_resource_limits {
        spec.extra_resource_limits.clone_from(limits);
    }
    if let Some(pod) = &overrides.extra_pod_config {
        spec.extra_pod_config.clone_from(pod);
    }
    if let Some(container) = &overrides.extra_container_config {
        spec.extra_container_config.clone_from(container);
    }
}
