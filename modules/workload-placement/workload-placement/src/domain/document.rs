//! Loading and load-time validation of the placement document.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::info;
use workload_placement_sdk::{PlacementDocument, ResourceOverrides, RuleFilter};

use super::error::DomainError;

/// Parse and validate a placement document.
///
/// # Errors
///
/// `ParseError` for malformed YAML or unknown keys, `InvalidDocument` for
/// a filter or spec that cannot match sensibly.
pub fn parse_document(raw: &str, origin: &str) -> Result<PlacementDocument, DomainError> {
    let document: PlacementDocument =
        serde_saphyr::from_str(raw).map_err(|e| DomainError::parse_error(origin, e.to_string()))?;
    validate_document(&document)?;
    Ok(document)
}

/// Read, parse and validate the placement document at `path`.
///
/// # Errors
///
/// `IoError` if the file cannot be read, otherwise as [`parse_document`].
pub fn load_document(path: &Path) -> Result<PlacementDocument, DomainError> {
    let origin = path.display().to_string();
    let raw =
        std::fs::read_to_string(path).map_err(|e| DomainError::io_error(&origin, e.to_string()))?;
    let document = parse_document(&raw, &origin)?;
    info!(
        path = %origin,
        rules = document.node_selectors.len(),
        "Loaded placement document"
    );
    Ok(document)
}

/// Reject filters and specs that would only fail at request time.
///
/// # Errors
///
/// `InvalidDocument` naming the offending entry.
pub fn validate_document(document: &PlacementDocument) -> Result<(), DomainError> {
    validate_overrides("node_defaults.spec", &document.node_defaults.spec)?;
    for (index, rule) in document.node_selectors.iter().enumerate() {
        validate_filter(index, &rule.filter)?;
        validate_overrides(&format!("node_selectors[{index}].spec"), &rule.spec)?;
    }
    Ok(())
}

fn validate_filter(index: usize, filter: &RuleFilter) -> Result<(), DomainError> {
    let empty = [
        ("groups", filter.groups.as_ref().map(BTreeSet::is_empty)),
        ("images", filter.images.as_ref().map(BTreeSet::is_empty)),
        ("uid", filter.uid.as_ref().map(BTreeSet::is_empty)),
    ];
    for (attribute, is_empty) in empty {
        if is_empty == Some(true) {
            return Err(DomainError::invalid_document(format!(
                "node_selectors[{index}].filter.{attribute} is empty and can never match"
            )));
        }
    }
    if filter
        .groups
        .iter()
        .chain(filter.images.iter())
        .flatten()
        .any(|value| value.trim().is_empty())
    {
        return Err(DomainError::invalid_document(format!(
            "node_selectors[{index}].filter contains a blank value"
        )));
    }
    Ok(())
}

fn validate_overrides(at: &str, spec: &ResourceOverrides) -> Result<(), DomainError> {
    if let Some(cpu) = spec.cpu
        && !(cpu.is_finite() && cpu > 0.0)
    {
        return Err(DomainError::invalid_document(format!(
            "{at}.cpu must be a positive number, got {cpu}"
        )));
    }
    if spec.memory.as_deref().is_some_and(|m| m.trim().is_empty()) {
        return Err(DomainError::invalid_document(format!("{at}.memory is blank")));
    }
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_set_fails_at_load() {
        let err = parse_document("node_selectors:\n  - filter:\n      groups: []\n", "inline")
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidDocument { ref message } if message.contains("groups")));
    }

    #[test]
    fn unknown_filter_key_fails_at_load() {
        let err = parse_document("node_selectors:\n  - filter:\n      group: [lsst]\n", "inline")
            .unwrap_err();
        assert!(matches!(err, DomainError::ParseError { .. }));
    }

    #[test]
    fn non_positive_cpu_fails_at_load() {
        let err = parse_document("node_defaults:\n  spec:\n    cpu: 0\n", "inline").unwrap_err();
        assert!(matches!(err, DomainError::InvalidDocument { .. }));
    }

    #[test]
    fn filterless_rule_is_valid() {
        let doc = parse_document(
            "node_selectors:\n  - spawn_on:\n      pool: any\n",
            "inline",
        )
        .unwrap();
        assert!(doc.node_selectors[0].filter.is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_document(Path::new("/nonexistent/node-selectors.yaml")).unwrap_err();
        assert!(matches!(err, DomainError::IoError { .. }));
    }
}
