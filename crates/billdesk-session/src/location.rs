//! In-app locations.

use std::fmt;
use std::str::FromStr;

use billdesk_core::Error;
use billdesk_core::error::InvalidInputError;

/// An application location: path plus optional query and fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl Location {
    /// Parse an absolute in-app location such as `/invoices?status=due#top`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInputError::Path`] when the location does not start
    /// with `/` or contains whitespace.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if !s.starts_with('/') {
            return Err(invalid(s, "location must start with '/'"));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(invalid(s, "location must not contain whitespace"));
        }

        let (rest, fragment) = match s.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (s, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (rest, None),
        };

        Ok(Self {
            path: path.to_string(),
            query,
            fragment,
        })
    }

    /// Path, query and fragment as one string.
    pub fn full_path(&self) -> String {
        let mut out = self.path.clone();
        if let Some(query) = &self.query {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = &self.fragment {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path())
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The path portion of `destination` with query and fragment stripped and
/// any trailing slash removed (except for the root).
pub(crate) fn normalized_path(destination: &str) -> &str {
    let end = destination.find(['?', '#']).unwrap_or(destination.len());
    let path = &destination[..end];
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn invalid(value: &str, reason: &str) -> Error {
    InvalidInputError::Path {
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
