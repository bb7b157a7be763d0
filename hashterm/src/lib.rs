pub mod config;
pub mod error;
pub mod facet;
pub mod field;
pub mod hash;
pub mod metrics;
pub mod observability;
pub mod source;

pub use config::Config;
pub use error::{Error, Result};
pub use facet::{
    FacetRequest, FacetResponse, HashedTermsCollector, HashedTermsReducer, LocalTermResolver,
    MatchSet, ParsedFacetRequest, ScriptRegistry, ShardContext, ShardFacetResult, TermResolver,
};
pub use field::{FieldStoreCache, FieldValueStore};
pub use hash::{hash_term, normalize, TermHash};
