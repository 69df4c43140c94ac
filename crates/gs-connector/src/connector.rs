//! Connector contracts
//!
//! A connector wraps one source system. Capabilities are requested through
//! accessor methods; a connector that lacks a capability keeps the default
//! accessor and reports `NotImplemented`.

use async_trait::async_trait;
use gs_common::Listing;
use tracing::info;

use crate::{ConnectorError, ConnectorResult};

/// Produces the full principal listing of a source system.
///
/// Any error aborts the whole listing; partial results are never returned.
#[async_trait]
pub trait PrincipalLister: Send + Sync {
    async fn list_principals(&self) -> ConnectorResult<Listing>;
}

pub trait Connector: Send + Sync {
    /// Short identifier used in logs, e.g. `"okta"` or `"mssql"`.
    fn name(&self) -> &str;

    fn user_interface(&self) -> ConnectorResult<Box<dyn PrincipalLister>> {
        Err(ConnectorError::NotImplemented)
    }
}

/// Request a connector's user interface and run one listing.
pub async fn list_principals(connector: &dyn Connector) -> ConnectorResult<Listing> {
    let lister = connector.user_interface()?;
    let listing = lister.list_principals().await?;

    info!(
        connector = connector.name(),
        principals = listing.principals.len(),
        commands = listing.ledger.len(),
        "Principal listing completed"
    );
    Ok(listing)
}
