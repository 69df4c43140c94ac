//! Grantscan Extraction Engine
//!
//! Vendor-agnostic mechanisms every fetcher is built on:
//! - TaskPool: bounded-concurrency job execution, every job attempted exactly once
//! - ProvenanceAggregator: single-writer fan-in of ledger fragments
//! - Paginator: exhausts any paged API through a `PageFetch` adapter
//! - MembershipGraph: transitive group/role membership closure

pub mod aggregator;
pub mod closure;
pub mod error;
pub mod pagination;
pub mod pool;

pub use aggregator::{LedgerSink, ProvenanceAggregator};
pub use closure::MembershipGraph;
pub use error::EngineError;
pub use pagination::{page_fn, FetchedPage, ItemKey, Page, PageFetch, PageFn, Paged, Paginator};
pub use pool::{job_fn, BoxedJob, Job, JobFailure, JobFn, PoolOutcome, TaskPool};

pub type Result<T> = std::result::Result<T, EngineError>;
