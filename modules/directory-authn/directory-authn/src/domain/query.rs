//! Injection-safe construction of directory filters and bind DNs.
//!
//! Templates are parsed once at configuration time into literal and
//! placeholder segments. Rendering substitutes values into placeholders
//! only; filter values are always escaped with [`ldap3::ldap_escape`], so
//! user input can never change the structure of a filter.

use std::borrow::Cow;

/// Template parse errors, reported at configuration load.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unterminated placeholder in template '{template}'")]
    Unterminated { template: String },

    #[error("unknown placeholder {{{name}}} in template '{template}'")]
    UnknownPlaceholder { template: String, name: String },

    #[error("template '{template}' must contain {{{name}}}")]
    MissingPlaceholder { template: String, name: String },

    #[error("unbalanced '}}' in template '{template}'")]
    UnbalancedBrace { template: String },
}

/// Escape commas not already preceded by a backslash.
///
/// Applied to names resolved from a `cn` attribute before they are
/// rendered into a bind DN. Unlike [`ldap3::dn_escape`] an existing `\,`
/// is kept as is, and the comma stays in its `\,` form rather than `\2c`.
#[must_use]
pub fn escape_unescaped_commas(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev = None;
    for c in value.chars() {
        if c == ',' && prev != Some('\\') {
            out.push('\\');
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed `{name}`-style template. `{{` and `}}` are literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Template {
    raw: String,
    segments: Vec<Segment>,
}

impl Template {
    fn parse(raw: &str, allowed: &[&str]) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => {
                                return Err(TemplateError::Unterminated {
                                    template: raw.to_owned(),
                                });
                            }
                        }
                    }
                    if !allowed.contains(&name.as_str()) {
                        return Err(TemplateError::UnknownPlaceholder {
                            template: raw.to_owned(),
                            name,
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(TemplateError::UnbalancedBrace {
                        template: raw.to_owned(),
                    });
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    fn require(&self, name: &str) -> Result<(), TemplateError> {
        let present = self
            .segments
            .iter()
            .any(|s| matches!(s, Segment::Placeholder(p) if p == name));
        if present {
            Ok(())
        } else {
            Err(TemplateError::MissingPlaceholder {
                template: self.raw.clone(),
                name: name.to_owned(),
            })
        }
    }

    fn render<'a, F>(&self, params: &[(&str, &'a str)], transform: F) -> String
    where
        F: Fn(&'a str) -> Cow<'a, str>,
    {
        let mut out = String::with_capacity(self.raw.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    // Placeholders were checked against the allowed names at parse time.
                    let value = params
                        .iter()
                        .find(|(key, _)| *key == name.as_str())
                        .map_or("", |(_, value)| *value);
                    out.push_str(&transform(value));
                }
            }
        }
        out
    }
}

/// Search filter template; every substituted value is escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTemplate(Template);

impl FilterTemplate {
    /// Parse a filter template, accepting only the `allowed` placeholders.
    ///
    /// # Errors
    ///
    /// Malformed template or unknown placeholder.
    pub fn parse(raw: &str, allowed: &[&str]) -> Result<Self, TemplateError> {
        Template::parse(raw, allowed).map(Self)
    }

    #[must_use]
    pub fn render(&self, params: &[(&str, &str)]) -> String {
        self.0.render(params, ldap3::ldap_escape)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0.raw
    }
}

/// Bind DN template with a single `{username}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnTemplate(Template);

impl DnTemplate {
    /// # Errors
    ///
    /// Malformed template, or `{username}` missing.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let template = Template::parse(raw, &["username"])?;
        template.require("username")?;
        Ok(Self(template))
    }

    /// Substitute `value` for `{username}` verbatim.
    ///
    /// Any escaping of the value happens before it is handed in.
    #[must_use]
    pub fn render(&self, value: &str) -> String {
        self.0.render(&[("username", value)], Cow::Borrowed)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0.raw
    }
}
