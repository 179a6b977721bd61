//! Image references and deterministic workload naming.

use super::error::DomainError;

const DEFAULT_TAG: &str = "latest";

/// A parsed container image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    reference: String,
    short_name: String,
    tag: String,
}

impl ImageRef {
    /// Parse `registry/path/name:tag`.
    ///
    /// The short name is the last path segment without its tag; the tag is
    /// whatever follows the last `:` of that segment, `latest` if absent.
    /// A trailing `@digest` is ignored for naming.
    ///
    /// # Errors
    ///
    /// `InvalidImage` for a blank reference, embedded whitespace, or an
    /// empty name or tag.
    pub fn parse(reference: &str) -> Result<Self, DomainError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(DomainError::invalid_image(reference, "empty reference"));
        }
        if reference.chars().any(char::is_whitespace) {
            return Err(DomainError::invalid_image(reference, "contains whitespace"));
        }

        let last_segment = reference.rsplit('/').next().unwrap_or(reference);
        let without_digest = last_segment.split('@').next().unwrap_or(last_segment);
        let (short_name, tag) = without_digest
            .rsplit_once(':')
            .unwrap_or((without_digest, DEFAULT_TAG));

        if short_name.is_empty() {
            return Err(DomainError::invalid_image(reference, "empty image name"));
        }
        if tag.is_empty() {
            return Err(DomainError::invalid_image(reference, "empty tag"));
        }

        Ok(Self {
            reference: reference.to_owned(),
            short_name: short_name.to_owned(),
            tag: tag.to_owned(),
        })
    }

    /// The full reference as given.
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    #[must_use]
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Names a placement `images` filter is matched against.
    #[must_use]
    pub fn match_candidates(&self) -> [&str; 2] {
        [&self.short_name, &self.reference]
    }

    /// `{short_name}-{escaped user}-{tag}`, lowercased and restricted to
    /// characters valid in a pod name. Underscores in the tag become dots.
    #[must_use]
    pub fn pod_name(&self, username: &str) -> String {
        let raw = format!(
            "{}-{}-{}",
            self.short_name,
            escape_username(username),
            self.tag.replace('_', ".")
        );
        raw.chars()
            .map(|c| {
                let c = c.to_ascii_lowercase();
                if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                    c
                } else {
                    '-'
                }
            })
            .collect()
    }
}

/// Escape a username for pod names and label values.
///
/// `[a-z0-9]` pass through; every other byte becomes `-` followed by two
/// lowercase hex digits, so distinct usernames never collide.
#[must_use]
pub fn escape_username(username: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";

    let mut out = String::with_capacity(username.len());
    for byte in username.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() {
            out.push(char::from(byte));
        } else {
            out.push('-');
            out.push(char::from(HEX[usize::from(byte >> 4)]));
            out.push(char::from(HEX[usize::from(byte & 0x0f)]));
        }
    }
    out
}
