//! In-memory directory for development and testing.
//!
//! Serves a fixed set of entries, evaluates the subset of search filter
//! syntax the authenticator emits (`&`, `|`, `!`, equality, presence and
//! `*` substrings), and records every operation so callers can assert
//! exactly which directory calls were made.

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};

use crate::config::StaticEntryConfig;
use crate::domain::directory::{
    DirectoryConnection, DirectoryConnector, DirectoryEntry, DirectoryError, SearchRequest,
    SearchScope,
};

/// One recorded directory call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryOp {
    Connect,
    Bind { dn: String },
    Search { base: String, filter: String },
    Close,
}

struct StaticEntry {
    entry: DirectoryEntry,
    password: Option<SecretString>,
}

struct Inner {
    entries: Vec<StaticEntry>,
    ops: Mutex<Vec<DirectoryOp>>,
    failing_connects: AtomicU32,
}

/// In-memory directory. Clones share entries and the operation log.
#[derive(Clone)]
pub struct StaticDirectory {
    inner: Arc<Inner>,
}

impl StaticDirectory {
    /// Entries paired with their bind password.
    #[must_use]
    pub fn new(entries: Vec<(DirectoryEntry, Option<&str>)>) -> Self {
        Self::build(
            entries
                .into_iter()
                .map(|(entry, password)| StaticEntry {
                    entry,
                    password: password.map(|p| SecretString::from(p.to_owned())),
                })
                .collect(),
        )
    }

    /// Entries that cannot be bound.
    #[must_use]
    pub fn from_entries(entries: Vec<DirectoryEntry>) -> Self {
        Self::new(entries.into_iter().map(|e| (e, None)).collect())
    }

    #[must_use]
    pub fn from_config(entries: &[StaticEntryConfig]) -> Self {
        Self::build(
            entries
                .iter()
                .map(|cfg| StaticEntry {
                    entry: DirectoryEntry {
                        dn: cfg.dn.clone(),
                        attributes: cfg.attributes.clone(),
                    },
                    password: cfg.password.clone(),
                })
                .collect(),
        )
    }

    fn build(entries: Vec<StaticEntry>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries,
                ops: Mutex::new(Vec::new()),
                failing_connects: AtomicU32::new(0),
            }),
        }
    }

    /// Make the next `count` connection attempts fail as unreachable.
    pub fn fail_next_connects(&self, count: u32) {
        self.inner.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Every operation recorded so far.
    #[must_use]
    pub fn operations(&self) -> Vec<DirectoryOp> {
        self.inner.ops.lock().clone()
    }

    /// Number of calls that would have reached a real directory.
    #[must_use]
    pub fn network_calls(&self) -> usize {
        self.inner.ops.lock().len()
    }

    /// Number of opened connections not yet closed.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        let ops = self.inner.ops.lock();
        let opened = ops.iter().filter(|op| **op == DirectoryOp::Connect).count();
        let closed = ops.iter().filter(|op| **op == DirectoryOp::Close).count();
        opened.saturating_sub(closed)
    }

    fn record(&self, op: DirectoryOp) {
        self.inner.ops.lock().push(op);
    }
}

#[async_trait]
impl DirectoryConnector for StaticDirectory {
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>, DirectoryError> {
        let failing = self
            .inner
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DirectoryError::Unavailable("connection refused".to_owned()));
        }

        self.record(DirectoryOp::Connect);
        Ok(Box::new(StaticConnection {
            directory: self.clone(),
            closed: false,
        }))
    }
}

struct StaticConnection {
    directory: StaticDirectory,
    closed: bool,
}

#[async_trait]
impl DirectoryConnection for StaticConnection {
    async fn bind(&mut self, dn: &str, password: &SecretString) -> Result<(), DirectoryError> {
        self.directory.record(DirectoryOp::Bind { dn: dn.to_owned() });
        if dn.is_empty() {
            return Ok(());
        }

        let given = password.expose_secret();
        let accepted = self.directory.inner.entries.iter().any(|e| {
            e.entry.dn.eq_ignore_ascii_case(dn)
                && !given.is_empty()
                && e.password
                    .as_ref()
                    .is_some_and(|p| p.expose_secret() == given)
        });
        if accepted {
            Ok(())
        } else {
            Err(DirectoryError::BindRejected("invalid credentials".to_owned()))
        }
    }

    async fn search(
        &mut self,
        request: &SearchRequest,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        self.directory.record(DirectoryOp::Search {
            base: request.base.clone(),
            filter: request.filter.clone(),
        });
        let filter = Filter::parse(&request.filter).map_err(DirectoryError::Search)?;

        Ok(self
            .directory
            .inner
            .entries
            .iter()
            .map(|e| &e.entry)
            .filter(|entry| in_scope(&entry.dn, &request.base, request.scope))
            .filter(|entry| filter.matches(entry))
            .map(|entry| project(entry, &request.attributes))
            .collect())
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.directory.record(DirectoryOp::Close);
        }
    }
}

impl Drop for StaticConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.directory.record(DirectoryOp::Close);
        }
    }
}

fn in_scope(dn: &str, base: &str, scope: SearchScope) -> bool {
    match scope {
        SearchScope::Base => dn.eq_ignore_ascii_case(base),
        SearchScope::Subtree => {
            if base.is_empty() || dn.eq_ignore_ascii_case(base) {
                return true;
            }
            let dn = dn.to_ascii_lowercase();
            let suffix = format!(",{}", base.to_ascii_lowercase());
            dn.ends_with(&suffix)
        }
    }
}

fn project(entry: &DirectoryEntry, attributes: &[String]) -> DirectoryEntry {
    if attributes.is_empty() {
        return entry.clone();
    }
    DirectoryEntry {
        dn: entry.dn.clone(),
        attributes: entry
            .attributes
            .iter()
            .filter(|(name, _)| attributes.iter().any(|a| a.eq_ignore_ascii_case(name)))
            .map(|(name, values)| (name.clone(), values.clone()))
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Present(String),
    Equal(String, String),
    Substring(String, Vec<String>),
}

impl Filter {
    fn parse(input: &str) -> Result<Self, String> {
        let mut parser = FilterParser { input, pos: 0 };
        let filter = parser.filter()?;
        if parser.pos == input.len() {
            Ok(filter)
        } else {
            Err(format!("trailing characters in filter {input:?}"))
        }
    }

    fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Self::And(items) => items.iter().all(|f| f.matches(entry)),
            Self::Or(items) => items.iter().any(|f| f.matches(entry)),
            Self::Not(inner) => !inner.matches(entry),
            Self::Present(attr) => entry.values(attr).is_some_and(|v| !v.is_empty()),
            Self::Equal(attr, expected) => entry
                .values(attr)
                .is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case(expected))),
            Self::Substring(attr, parts) => entry
                .values(attr)
                .is_some_and(|values| values.iter().any(|v| glob_match(v, parts))),
        }
    }
}

/// Match `parts` joined by `*` wildcards, case-insensitively.
fn glob_match(value: &str, parts: &[String]) -> bool {
    let value = value.to_ascii_lowercase();
    let mut rest = value.as_str();
    let last = parts.len().saturating_sub(1);
    for (i, part) in parts.iter().enumerate() {
        let part = part.to_ascii_lowercase();
        if i == 0 {
            let Some(stripped) = rest.strip_prefix(part.as_str()) else {
                return false;
            };
            rest = stripped;
        } else if i == last {
            return rest.ends_with(part.as_str());
        } else {
            let Some(idx) = rest.find(part.as_str()) else {
                return false;
            };
            rest = &rest[idx + part.len()..];
        }
    }
    true
}

struct FilterParser<'a> {
    input: &'a str,
    pos: usize,
}

impl FilterParser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(format!(
                "expected {c:?} at offset {} in filter {:?}",
                self.pos, self.input
            ))
        }
    }

    fn filter(&mut self) -> Result<Filter, String> {
        self.expect('(')?;
        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.list()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.list()?)
            }
            Some('!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.filter()?))
            }
            _ => self.item()?,
        };
        self.expect(')')?;
        Ok(filter)
    }

    fn list(&mut self) -> Result<Vec<Filter>, String> {
        let mut items = Vec::new();
        while self.peek() == Some('(') {
            items.push(self.filter()?);
        }
        Ok(items)
    }

    fn item(&mut self) -> Result<Filter, String> {
        let rest = &self.input[self.pos..];
        let end = rest
            .find(')')
            .ok_or_else(|| format!("unterminated item in filter {:?}", self.input))?;
        let item = &rest[..end];
        self.pos += end;

        let (attr, raw) = item
            .split_once('=')
            .ok_or_else(|| format!("missing '=' in filter item {item:?}"))?;
        if attr.is_empty() {
            return Err(format!("empty attribute in filter item {item:?}"));
        }

        if raw == "*" {
            return Ok(Filter::Present(attr.to_owned()));
        }
        if raw.contains('*') {
            let parts = raw.split('*').map(filter_value).collect::<Result<_, _>>()?;
            return Ok(Filter::Substring(attr.to_owned(), parts));
        }
        Ok(Filter::Equal(attr.to_owned(), filter_value(raw)?))
    }
}

fn filter_value(raw: &str) -> Result<String, String> {
    ldap3::ldap_unescape(raw)
        .map(Cow::into_owned)
        .map_err(|e| format!("invalid escape in filter value '{raw}': {e}"))
}
