//! Federation tests: healthy, failing, flaky and slow shards.

use async_trait::async_trait;
use hashterm::facet::{
    DocumentContext, FacetRequest, ParsedFacetRequest, ScriptRegistry, ShardContext,
    ShardFacetResult, TermOwner,
};
use hashterm::source::{Document, MemorySegment, SegmentSource};
use hashterm::{FieldStoreCache, TermHash};
use hashterm_cluster::{
    ClusterError, FacetFederation, FacetShard, FederationConfig, LocalShard, Result,
};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn scripts() -> ScriptRegistry {
    let mut scripts = ScriptRegistry::new();
    scripts.register_fn("shout", |value: &str, _: &DocumentContext<'_>| {
        Ok(format!("{}!", value.to_uppercase()))
    });
    scripts
}

fn local(shard_id: &str, tags: &[Option<&str>]) -> Arc<LocalShard> {
    let docs = tags
        .iter()
        .enumerate()
        .map(|(i, tag)| match tag {
            Some(tag) => Document::new(i.to_string()).with_field("tag", json!(tag)),
            None => Document::new(i.to_string()),
        })
        .collect();
    let segment: Arc<dyn SegmentSource> =
        Arc::new(MemorySegment::from_docs(format!("{}-seg0", shard_id), docs));
    let context = Arc::new(ShardContext::new(
        shard_id,
        vec![segment],
        Arc::new(FieldStoreCache::default()),
    ));
    Arc::new(LocalShard::new(context, scripts()))
}

fn shard0() -> Arc<LocalShard> {
    local("shard-0", &[Some("red"), Some("Red"), Some("blue")])
}

fn shard1() -> Arc<LocalShard> {
    local("shard-1", &[Some("red"), Some("green")])
}

fn shard2() -> Arc<LocalShard> {
    local("shard-2", &[Some("blue"), Some("BLUE"), Some("green"), None])
}

/// Fails its first `fail_first` collects, then delegates to `inner` when it
/// has one.
struct FailingShard {
    id: String,
    inner: Option<Arc<LocalShard>>,
    fail_first: u32,
    retryable: bool,
    attempts: AtomicU32,
}

impl FailingShard {
    fn broken(id: &str) -> Self {
        Self {
            id: id.to_string(),
            inner: None,
            fail_first: u32::MAX,
            retryable: false,
            attempts: AtomicU32::new(0),
        }
    }

    fn flaky(inner: Arc<LocalShard>, fail_first: u32) -> Self {
        Self {
            id: inner.shard_id().to_string(),
            inner: Some(inner),
            fail_first,
            retryable: true,
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl FacetShard for FailingShard {
    fn shard_id(&self) -> &str {
        &self.id
    }

    async fn collect(&self, request: &ParsedFacetRequest) -> Result<ShardFacetResult> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        match &self.inner {
            Some(inner) if attempt >= self.fail_first => inner.collect(request).await,
            _ => Err(ClusterError::Shard {
                shard_id: self.id.clone(),
                reason: "segment unreadable".to_string(),
                retryable: self.retryable,
            }),
        }
    }

    async fn resolve(
        &self,
        owner: &TermOwner,
        field: &str,
        hash: TermHash,
        script: Option<&str>,
    ) -> Result<Option<String>> {
        match &self.inner {
            Some(inner) => inner.resolve(owner, field, hash, script).await,
            None => Ok(None),
        }
    }
}

/// Answers after `delay`.
struct SlowShard {
    inner: Arc<LocalShard>,
    delay: Duration,
}

#[async_trait]
impl FacetShard for SlowShard {
    fn shard_id(&self) -> &str {
        self.inner.shard_id()
    }

    async fn collect(&self, request: &ParsedFacetRequest) -> Result<ShardFacetResult> {
        tokio::time::sleep(self.delay).await;
        self.inner.collect(request).await
    }

    async fn resolve(
        &self,
        owner: &TermOwner,
        field: &str,
        hash: TermHash,
        script: Option<&str>,
    ) -> Result<Option<String>> {
        self.inner.resolve(owner, field, hash, script).await
    }
}

/// Collects fine, cannot name anything.
struct ForgetfulShard(Arc<LocalShard>);

#[async_trait]
impl FacetShard for ForgetfulShard {
    fn shard_id(&self) -> &str {
        self.0.shard_id()
    }

    async fn collect(&self, request: &ParsedFacetRequest) -> Result<ShardFacetResult> {
        self.0.collect(request).await
    }

    async fn resolve(
        &self,
        _: &TermOwner,
        _: &str,
        _: TermHash,
        _: Option<&str>,
    ) -> Result<Option<String>> {
        Err(ClusterError::Shard {
            shard_id: self.0.shard_id().to_string(),
            reason: "connection reset".to_string(),
            retryable: true,
        })
    }
}

/// Collects at once, takes `delay` to name each term.
struct SlowResolvingShard {
    inner: Arc<LocalShard>,
    delay: Duration,
}

#[async_trait]
impl FacetShard for SlowResolvingShard {
    fn shard_id(&self) -> &str {
        self.inner.shard_id()
    }

    async fn collect(&self, request: &ParsedFacetRequest) -> Result<ShardFacetResult> {
        self.inner.collect(request).await
    }

    async fn resolve(
        &self,
        owner: &TermOwner,
        field: &str,
        hash: TermHash,
        script: Option<&str>,
    ) -> Result<Option<String>> {
        tokio::time::sleep(self.delay).await;
        self.inner.resolve(owner, field, hash, script).await
    }
}

/// Ten distinct tags, `c0` most frequent.
fn wide_shard() -> Arc<LocalShard> {
    let tags: Vec<String> = (0..10)
        .flat_map(|i| std::iter::repeat(format!("c{}", i)).take(20 - i))
        .collect();
    let tags: Vec<Option<&str>> = tags.iter().map(|t| Some(t.as_str())).collect();
    local("wide", &tags)
}

fn entries(facet: &hashterm_cluster::FederatedFacet) -> Vec<(String, u64)> {
    facet
        .response
        .entries
        .iter()
        .map(|e| (e.term.clone(), e.count))
        .collect()
}

fn pairs(expected: &[(&str, u64)]) -> Vec<(String, u64)> {
    expected.iter().map(|(t, c)| (t.to_string(), *c)).collect()
}

#[tokio::test]
async fn test_healthy_shards() {
    let federation = FacetFederation::new(
        vec![shard0() as Arc<dyn FacetShard>, shard1(), shard2()],
        FederationConfig::default(),
    );

    let facet = federation.facet(&FacetRequest::new("tag", 10)).await.unwrap();
    assert!(!facet.is_partial);
    assert_eq!(facet.shard_status.successful, 3);
    assert_eq!(entries(&facet), pairs(&[("red", 3), ("blue", 3), ("green", 2)]));
    assert_eq!(facet.response.total_count, 9);
    assert_eq!(facet.response.missing_count, 1);
}

#[tokio::test]
async fn test_output_script_runs_on_owning_shard() {
    let federation = FacetFederation::new(
        vec![shard0() as Arc<dyn FacetShard>, shard1(), shard2()],
        FederationConfig::default(),
    );

    let request = FacetRequest::new("tag", 2).with_output_script("shout");
    let facet = federation.facet(&request).await.unwrap();
    assert_eq!(entries(&facet), pairs(&[("RED!", 3), ("BLUE!", 3)]));
    assert_eq!(facet.response.other_count, 2);
}

#[tokio::test]
async fn test_failing_shard_gives_partial_results() {
    let federation = FacetFederation::new(
        vec![
            shard0() as Arc<dyn FacetShard>,
            Arc::new(FailingShard::broken("shard-1")),
            shard2(),
        ],
        FederationConfig::default(),
    );

    let facet = federation.facet(&FacetRequest::new("tag", 10)).await.unwrap();
    assert!(facet.is_partial);
    assert_eq!(facet.shard_status.successful, 2);
    assert_eq!(facet.shard_status.failed, 1);
    assert_eq!(facet.shard_status.failures[0].shard_id, "shard-1");
    assert!(!facet.shard_status.failures[0].is_timeout);
    assert_eq!(entries(&facet), pairs(&[("blue", 3), ("red", 2), ("green", 1)]));
    assert_eq!(facet.response.total_count, 7);
}

#[tokio::test]
async fn test_flaky_shard_retried() {
    let flaky = Arc::new(FailingShard::flaky(shard1(), 1));
    let federation = FacetFederation::new(
        vec![shard0() as Arc<dyn FacetShard>, flaky.clone(), shard2()],
        FederationConfig::default(),
    );

    let facet = federation.facet(&FacetRequest::new("tag", 10)).await.unwrap();
    assert!(!facet.is_partial);
    assert_eq!(flaky.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(entries(&facet), pairs(&[("red", 3), ("blue", 3), ("green", 2)]));
}

#[tokio::test]
async fn test_retries_exhausted() {
    let flaky = Arc::new(FailingShard::flaky(shard1(), 5));
    let config = FederationConfig {
        shard_retries: 2,
        ..Default::default()
    };
    let federation =
        FacetFederation::new(vec![shard0() as Arc<dyn FacetShard>, flaky.clone()], config);

    let facet = federation.facet(&FacetRequest::new("tag", 10)).await.unwrap();
    assert!(facet.is_partial);
    assert_eq!(flaky.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(facet.shard_status.failures[0].attempts, 3);
}

#[tokio::test]
async fn test_slow_shard_times_out() {
    let slow = Arc::new(SlowShard {
        inner: shard1(),
        delay: Duration::from_secs(5),
    });
    let config = FederationConfig {
        shard_timeout_ms: 200,
        ..Default::default()
    };
    let federation =
        FacetFederation::new(vec![shard0() as Arc<dyn FacetShard>, slow, shard2()], config);

    let facet = federation.facet(&FacetRequest::new("tag", 10)).await.unwrap();
    assert!(facet.is_partial);
    assert_eq!(facet.shard_status.timed_out(), 1);
    assert_eq!(facet.shard_status.failures[0].shard_id, "shard-1");
    assert_eq!(entries(&facet), pairs(&[("blue", 3), ("red", 2), ("green", 1)]));
}

#[tokio::test]
async fn test_timeout_without_partial_results_fails() {
    let slow = Arc::new(SlowShard {
        inner: shard1(),
        delay: Duration::from_secs(5),
    });
    let config = FederationConfig {
        shard_timeout_ms: 200,
        allow_partial_results: false,
        ..Default::default()
    };
    let federation =
        FacetFederation::new(vec![shard0() as Arc<dyn FacetShard>, slow], config);

    let err = federation.facet(&FacetRequest::new("tag", 10)).await.unwrap_err();
    assert!(matches!(err, ClusterError::Timeout(_)));
}

#[tokio::test]
async fn test_shard_error_keeps_retryability() {
    let config = FederationConfig {
        allow_partial_results: false,
        shard_retries: 0,
        ..Default::default()
    };
    let flaky = Arc::new(FailingShard::flaky(shard1(), 5));
    let federation =
        FacetFederation::new(vec![shard0() as Arc<dyn FacetShard>, flaky], config.clone());

    let err = federation.facet(&FacetRequest::new("tag", 10)).await.unwrap_err();
    assert!(matches!(
        &err,
        ClusterError::Shard { shard_id, retryable: true, .. } if shard_id == "shard-1"
    ));
    assert!(err.is_retryable());

    let broken = Arc::new(FailingShard::broken("shard-1"));
    let federation = FacetFederation::new(vec![shard0() as Arc<dyn FacetShard>, broken], config);
    let err = federation.facet(&FacetRequest::new("tag", 10)).await.unwrap_err();
    assert!(matches!(err, ClusterError::Shard { retryable: false, .. }));
}

#[tokio::test]
async fn test_terms_resolved_concurrently() {
    let shard = Arc::new(SlowResolvingShard {
        inner: wide_shard(),
        delay: Duration::from_millis(100),
    });
    let config = FederationConfig {
        shard_timeout_ms: 400,
        ..Default::default()
    };
    let federation = FacetFederation::new(vec![shard as Arc<dyn FacetShard>], config);

    let start = Instant::now();
    let facet = federation.facet(&FacetRequest::new("tag", 10)).await.unwrap();

    // One at a time these lookups would need a whole second.
    assert!(start.elapsed() < Duration::from_millis(800));
    let expected: Vec<(String, u64)> = (0..10).map(|i| (format!("c{}", i), 20 - i)).collect();
    assert_eq!(entries(&facet), expected);
}

#[tokio::test]
async fn test_resolution_bounded_by_shard_timeout() {
    let shard = Arc::new(SlowResolvingShard {
        inner: wide_shard(),
        delay: Duration::from_secs(5),
    });
    let config = FederationConfig {
        shard_timeout_ms: 200,
        ..Default::default()
    };
    let federation = FacetFederation::new(vec![shard as Arc<dyn FacetShard>], config);

    let start = Instant::now();
    let facet = federation.facet(&FacetRequest::new("tag", 10)).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(facet.response.entries.len(), 10);
    assert_eq!(
        facet.response.entries[0].term,
        hashterm::hash_term("c0").to_string()
    );
    assert_eq!(facet.response.entries[0].count, 20);
}

#[tokio::test]
async fn test_all_shards_failing() {
    let federation = FacetFederation::new(
        vec![
            Arc::new(FailingShard::broken("shard-0")) as Arc<dyn FacetShard>,
            Arc::new(FailingShard::broken("shard-1")),
        ],
        FederationConfig::default(),
    );

    let err = federation.facet(&FacetRequest::new("tag", 10)).await.unwrap_err();
    assert!(matches!(err, ClusterError::AllShardsFailed(2)));
    assert_eq!(err.error_type(), "all_shards_failed");
}

#[tokio::test]
async fn test_minimum_successful_shards() {
    let config = FederationConfig {
        min_successful_shards: 3,
        ..Default::default()
    };
    let federation = FacetFederation::new(
        vec![
            shard0() as Arc<dyn FacetShard>,
            Arc::new(FailingShard::broken("shard-1")),
            shard2(),
        ],
        config,
    );

    let err = federation.facet(&FacetRequest::new("tag", 10)).await.unwrap_err();
    assert!(matches!(
        err,
        ClusterError::InsufficientShards {
            successful: 2,
            required: 3
        }
    ));
}

#[tokio::test]
async fn test_invalid_requests_rejected() {
    let federation = FacetFederation::new(
        vec![shard0() as Arc<dyn FacetShard>, shard1()],
        FederationConfig::default(),
    );

    let err = federation.facet(&FacetRequest::new("tag", 0)).await.unwrap_err();
    assert!(matches!(err, ClusterError::InvalidRequest(_)));

    let request = FacetRequest::new("tag", 3).with_output_script("nope");
    let err = federation.facet(&request).await.unwrap_err();
    assert!(matches!(err, ClusterError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_unresolvable_term_shown_as_hash() {
    let federation = FacetFederation::new(
        vec![shard0() as Arc<dyn FacetShard>, Arc::new(ForgetfulShard(shard1()))],
        FederationConfig::default(),
    );

    let facet = federation.facet(&FacetRequest::new("tag", 10)).await.unwrap();
    assert!(!facet.is_partial);
    assert_eq!(
        entries(&facet),
        pairs(&[
            ("red", 3),
            ("blue", 1),
            (hashterm::hash_term("green").to_string().as_str(), 1),
        ])
    );
}

#[tokio::test]
async fn test_no_shards() {
    let federation = FacetFederation::new(Vec::new(), FederationConfig::default());
    let facet = federation.facet(&FacetRequest::new("tag", 10)).await.unwrap();
    assert!(facet.response.entries.is_empty());
    assert_eq!(facet.shard_status.total, 0);
}
