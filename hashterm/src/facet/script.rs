//! Output scripts: turn a selected term's original value into the string
//! shown in the response. The engine only calls them; it never embeds a
//! scripting runtime.

use crate::source::{DocAddress, SegmentSource};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// The document backing a selected term, as seen by a script.
pub struct DocumentContext<'a> {
    pub shard_id: &'a str,
    pub address: DocAddress,
    pub field: &'a str,
    pub source: &'a dyn SegmentSource,
}

impl DocumentContext<'_> {
    /// Raw values of any field of the same document.
    pub fn values(&self, field: &str) -> Result<Vec<String>> {
        self.source.field_values(self.address.doc, field)
    }
}

pub trait OutputScript: Send + Sync {
    fn render(&self, value: &str, ctx: &DocumentContext<'_>) -> Result<String>;
}

impl<F> OutputScript for F
where
    F: Fn(&str, &DocumentContext<'_>) -> Result<String> + Send + Sync,
{
    fn render(&self, value: &str, ctx: &DocumentContext<'_>) -> Result<String> {
        self(value, ctx)
    }
}

/// Scripts addressable by the name carried in `output_script`.
#[derive(Clone, Default)]
pub struct ScriptRegistry {
    scripts: HashMap<String, Arc<dyn OutputScript>>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, script: Arc<dyn OutputScript>) {
        self.scripts.insert(name.into(), script);
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, script: F)
    where
        F: Fn(&str, &DocumentContext<'_>) -> Result<String> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(script));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OutputScript>> {
        self.scripts.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scripts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRegistry")
            .field("scripts", &self.names())
            .finish()
    }
}
