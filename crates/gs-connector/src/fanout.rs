//! Fan-out listing: one base listing, then one role lookup per entity.
//!
//! Role lookups run through the `TaskPool`. Each job pushes its ledger
//! fragment to the `ProvenanceAggregator` and returns its roles as a value.
//! Principals are assembled after the pool returns, in base listing order.

use std::sync::Arc;

use async_trait::async_trait;
use gs_common::{Listing, Principal, ProvenanceLedger, SharedRole};
use gs_config::EngineConfig;
use gs_engine::{job_fn, ProvenanceAggregator, TaskPool};
use tracing::{debug, info};

use crate::connector::PrincipalLister;
use crate::{ConnectorError, ConnectorResult};

/// A source whose roles must be fetched per entity.
#[async_trait]
pub trait FanOutSource: Send + Sync + 'static {
    type Entity: Send + Sync + 'static;

    /// List every base entity once, with the ledger of that listing.
    async fn list_entities(&self) -> ConnectorResult<(Vec<Self::Entity>, ProvenanceLedger)>;

    /// Fetch the roles of one entity.
    async fn fetch_roles(
        &self,
        entity: &Self::Entity,
    ) -> ConnectorResult<(Vec<SharedRole>, ProvenanceLedger)>;

    fn to_principal(&self, entity: &Self::Entity) -> Principal;
}

pub struct FanOutLister<S> {
    source: Arc<S>,
    engine: EngineConfig,
}

impl<S: FanOutSource> FanOutLister<S> {
    pub fn new(source: S, engine: EngineConfig) -> Self {
        Self {
            source: Arc::new(source),
            engine,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[async_trait]
impl<S: FanOutSource> PrincipalLister for FanOutLister<S> {
    async fn list_principals(&self) -> ConnectorResult<Listing> {
        let (entities, base_ledger) = self.source.list_entities().await?;
        let entities: Vec<Arc<S::Entity>> = entities.into_iter().map(Arc::new).collect();
        debug!(entities = entities.len(), "Base listing fetched");

        let aggregator =
            ProvenanceAggregator::with_ledger(base_ledger, self.engine.aggregator_buffer);

        let mut pool = TaskPool::new(self.engine.concurrency);
        for entity in &entities {
            let source = Arc::clone(&self.source);
            let entity = Arc::clone(entity);
            let sink = aggregator.sink();

            pool.add_job(job_fn(move || {
                let source = Arc::clone(&source);
                let entity = Arc::clone(&entity);
                let sink = sink.clone();
                async move {
                    let (roles, ledger) = source.fetch_roles(&entity).await?;
                    sink.push(ledger).await?;
                    Ok::<_, ConnectorError>(roles)
                }
            }));
        }

        let outcome = pool.execute().await;
        let ledger = aggregator.finish().await?;
        let per_entity_roles = outcome.into_result()?;

        let principals: Vec<Principal> = entities
            .iter()
            .zip(per_entity_roles)
            .map(|(entity, roles)| {
                let mut principal = self.source.to_principal(entity);
                for role in roles {
                    principal.add_role(role);
                }
                principal
            })
            .collect();

        info!(
            principals = principals.len(),
            commands = ledger.len(),
            "Fan-out listing assembled"
        );
        Ok(Listing::new(principals, ledger))
    }
}
