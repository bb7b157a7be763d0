use crate::config::FacetConfig;
use crate::hash::{hash_term, TermHash};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::script::ScriptRegistry;

/// Facet request as it arrives on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacetRequest {
    pub field: String,
    #[serde(default)]
    pub size: Option<usize>,
    #[serde(default)]
    pub fetch_size: Option<usize>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub output_script: Option<String>,
}

impl FacetRequest {
    pub fn new(field: impl Into<String>, size: usize) -> Self {
        Self {
            field: field.into(),
            size: Some(size),
            ..Default::default()
        }
    }

    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = Some(fetch_size);
        self
    }

    pub fn with_exclude<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn with_output_script(mut self, name: impl Into<String>) -> Self {
        self.output_script = Some(name.into());
        self
    }

    /// Validate and normalize. `size == 0` is rejected; a `fetch_size`
    /// below `size` is raised to `size`, never rejected.
    pub fn parse(&self, config: &FacetConfig) -> Result<ParsedFacetRequest> {
        if self.field.trim().is_empty() {
            return Err(Error::InvalidRequest("field must not be empty".to_string()));
        }

        let size = self.size.unwrap_or(config.default_size);
        if size == 0 {
            return Err(Error::InvalidRequest(format!(
                "size must be positive for field '{}'",
                self.field
            )));
        }

        let fetch_size = self
            .fetch_size
            .unwrap_or(size)
            .min(config.max_fetch_size)
            .max(size);

        Ok(ParsedFacetRequest {
            field: self.field.clone(),
            size,
            fetch_size,
            excluded: self.exclude.iter().map(|t| hash_term(t)).collect(),
            output_script: self.output_script.clone(),
        })
    }
}

/// Normalized request shared by collectors and the reducer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFacetRequest {
    pub field: String,
    pub size: usize,
    /// Always `>= size`
    pub fetch_size: usize,
    pub excluded: HashSet<TermHash>,
    pub output_script: Option<String>,
}

impl ParsedFacetRequest {
    pub fn is_excluded(&self, hash: TermHash) -> bool {
        self.excluded.contains(&hash)
    }

    /// Fail early when the request names a script nobody registered.
    pub fn validate_script(&self, scripts: &ScriptRegistry) -> Result<()> {
        match &self.output_script {
            Some(name) if !scripts.contains(name) => Err(Error::UnknownScript(name.clone())),
            _ => Ok(()),
        }
    }
}
