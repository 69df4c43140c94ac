//! Grantscan Connector Layer
//!
//! Contracts every source connector implements, and the helpers vendor
//! fetchers are assembled from:
//! - Connector / PrincipalLister: capability accessors and the listing contract
//! - RecordedHttpClient: header-injecting GETs that return their own provenance
//! - RecordedQuery: SQL over the `sqlx` Any driver with positional parameter capture
//! - Links: RFC 8288 `Link` header parsing
//! - paging: continuation adapters for the engine's `Paginator`
//! - FanOutLister: base listing plus per-principal role lookups on the task pool
//! - GraphLister / SqlGraphSource: nested-role closure for relational catalogs

pub mod connector;
pub mod error;
pub mod fanout;
pub mod graph;
pub mod http;
pub mod link_header;
pub mod paging;
pub mod sql;

pub use connector::{list_principals, Connector, PrincipalLister};
pub use error::{ConnectorError, ConnectorResult};
pub use fanout::{FanOutLister, FanOutSource};
pub use graph::{
    GraphEntry, GraphLister, GraphSource, NestedGraph, PrincipalGraph, SqlConnector,
    SqlGraphQueries, SqlGraphSource,
};
pub use http::{RecordedHttpClient, RecordedResponse};
pub use link_header::{Link, Links};
pub use paging::{
    next_link_from_headers, next_range_from_headers, Cursor, LinkHeaderFetch, Marker, PageNumber,
    PageNumberFetch,
};
pub use sql::{connect, RecordedQuery, SqlParam};
