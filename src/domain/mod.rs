//! Domain layer - Core types, traits and errors

pub mod cache;
pub mod error;
pub mod scheduler;
pub mod semantic_cache;
pub mod task;

pub use cache::{Cache, CacheClass, CacheEntry, CacheExt, CacheKeyParams, CacheStats};
pub use error::DomainError;
pub use scheduler::{ResourceSampler, ResourceUsage};
pub use semantic_cache::{
    CacheHit, CacheRequest, HitType, NormalizedRequest, RequestTemplate, SemanticCacheConfig,
    SimilarMatch, SimilarityIndex,
};
pub use task::{
    BatchSummary, ExperimentFunction, ExperimentOutcome, ExperimentTask,
    ParallelExecutionResult, TaskRunner, WorkerRequest,
};
