//! Per-call parse options.
//!
//! Options are plain values passed to [`parse_with`](crate::parse_with).
//! They can also be read from a TOML document with a `[query]` table:
//!
//! ```toml
//! [query]
//! lower_case_wildcard = true
//! ```

use std::{fs, path::Path};

use serde::Deserialize;

use crate::error::OptionsError;

/// Options controlling how values are classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseOptions {
    /// Fold wildcard literals to lower case before compiling them.
    pub lower_case_wildcard: bool,
}

/// Top-level layout of an options file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawOptionsFile {
    /// The `[query]` table.
    query: ParseOptions,
}

impl ParseOptions {
    /// Returns the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether wildcard literals are lower-cased.
    pub fn lower_case_wildcard(mut self, enabled: bool) -> Self {
        self.lower_case_wildcard = enabled;
        self
    }

    /// Parses options from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, OptionsError> {
        let raw: RawOptionsFile =
            toml::from_str(content).map_err(|source| OptionsError::ParseToml { source })?;
        Ok(raw.query)
    }

    /// Reads options from a TOML file.
    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let content = fs::read_to_string(path).map_err(|source| OptionsError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}
