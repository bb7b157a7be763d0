//! Display-string resolution for selected hashes.
//!
//! A hash cannot be turned back into text, so the coordinator goes back to
//! the document that contributed it, re-reads the field, and keeps the value
//! that hashes to the selected code.

use super::script::{DocumentContext, OutputScript, ScriptRegistry};
use super::shard::ShardContext;
use super::types::TermOwner;
use crate::hash::{hash_term, normalize, TermHash};
use crate::source::{DocAddress, SegmentSource};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait TermResolver: Send + Sync {
    async fn resolve(&self, owner: &TermOwner, hash: TermHash) -> Result<Option<String>>;
}

/// Display string for `hash` from one document: the script's output, or
/// the normalized original value when no script is configured.
pub fn resolve_in_segment(
    source: &dyn SegmentSource,
    shard_id: &str,
    address: DocAddress,
    field: &str,
    hash: TermHash,
    script: Option<&dyn OutputScript>,
) -> Result<Option<String>> {
    let original = source
        .field_values(address.doc, field)?
        .into_iter()
        .find(|value| hash_term(value) == hash);

    let Some(original) = original else {
        return Ok(None);
    };

    match script {
        Some(script) => {
            let ctx = DocumentContext {
                shard_id,
                address,
                field,
                source,
            };
            script.render(&original, &ctx).map(Some)
        }
        None => Ok(Some(normalize(&original))),
    }
}

/// Resolver over shards living in this process.
pub struct LocalTermResolver {
    field: String,
    shards: HashMap<String, Arc<ShardContext>>,
    script: Option<Arc<dyn OutputScript>>,
}

impl LocalTermResolver {
    pub fn new(
        field: impl Into<String>,
        shards: impl IntoIterator<Item = Arc<ShardContext>>,
    ) -> Self {
        Self {
            field: field.into(),
            shards: shards
                .into_iter()
                .map(|shard| (shard.shard_id().to_string(), shard))
                .collect(),
            script: None,
        }
    }

    pub fn with_script(mut self, script: Arc<dyn OutputScript>) -> Self {
        self.script = Some(script);
        self
    }

    /// Look the request's script up by name; unknown names are an error.
    pub fn with_named_script(self, name: Option<&str>, scripts: &ScriptRegistry) -> Result<Self> {
        match name {
            None => Ok(self),
            Some(name) => {
                let script = scripts
                    .get(name)
                    .ok_or_else(|| Error::UnknownScript(name.to_string()))?;
                Ok(self.with_script(script))
            }
        }
    }
}

#[async_trait]
impl TermResolver for LocalTermResolver {
    async fn resolve(&self, owner: &TermOwner, hash: TermHash) -> Result<Option<String>> {
        let shard = self
            .shards
            .get(&owner.shard_id)
            .ok_or_else(|| Error::Storage(format!("unknown shard '{}'", owner.shard_id)))?;
        shard
            .resolve(owner.address, &self.field, hash, self.script.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Document, MemorySegment};
    use serde_json::json;

    fn segment() -> MemorySegment {
        MemorySegment::from_docs(
            "seg-0",
            vec![Document::new("1").with_field("tag", json!(["Alpha", "BETA"]))],
        )
    }

    #[test]
    fn test_picks_value_matching_hash() {
        let seg = segment();
        let address = DocAddress::new(0, 0);

        let beta =
            resolve_in_segment(&seg, "s0", address, "tag", hash_term("beta"), None).unwrap();
        assert_eq!(beta.as_deref(), Some("beta"));

        let none =
            resolve_in_segment(&seg, "s0", address, "tag", hash_term("gamma"), None).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_script_sees_original_case() {
        let seg = segment();
        let script = |value: &str, ctx: &DocumentContext<'_>| -> Result<String> {
            Ok(format!("{}/{}", value, ctx.shard_id))
        };

        let alpha = resolve_in_segment(
            &seg,
            "s0",
            DocAddress::new(0, 0),
            "tag",
            hash_term("alpha"),
            Some(&script as &dyn OutputScript),
        )
        .unwrap();
        assert_eq!(alpha.as_deref(), Some("Alpha/s0"));
    }

    #[test]
    fn test_script_errors_propagate() {
        let seg = segment();
        let script = |_: &str, _: &DocumentContext<'_>| -> Result<String> {
            Err(Error::Script("boom".to_string()))
        };

        let err = resolve_in_segment(
            &seg,
            "s0",
            DocAddress::new(0, 0),
            "tag",
            hash_term("alpha"),
            Some(&script as &dyn OutputScript),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Script(_)));
    }
}
