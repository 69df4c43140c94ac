//! ProvenanceAggregator - single-writer fan-in of ledger fragments
//!
//! One consumer task owns the ledger. Producers only ever push fragments
//! through a bounded channel, so the ledger itself needs no lock.

use gs_common::ProvenanceLedger;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{EngineError, Result};

/// Producer handle for pushing ledger fragments to the aggregator.
#[derive(Clone)]
pub struct LedgerSink {
    tx: mpsc::Sender<ProvenanceLedger>,
}

impl LedgerSink {
    /// Queue a fragment for merging. Waits while the aggregator's buffer is full.
    pub async fn push(&self, fragment: ProvenanceLedger) -> Result<()> {
        if fragment.is_empty() {
            return Ok(());
        }
        self.tx
            .send(fragment)
            .await
            .map_err(|_| EngineError::AggregatorClosed)
    }
}

/// Owns the merged ledger and the task that builds it.
pub struct ProvenanceAggregator {
    tx: mpsc::Sender<ProvenanceLedger>,
    handle: JoinHandle<ProvenanceLedger>,
}

impl ProvenanceAggregator {
    /// Start an aggregator with an empty ledger.
    pub fn spawn(buffer: usize) -> Self {
        Self::with_ledger(ProvenanceLedger::new(), buffer)
    }

    /// Start an aggregator whose ledger begins with `initial`. Fragments are
    /// appended after it in the order they are received.
    pub fn with_ledger(initial: ProvenanceLedger, buffer: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<ProvenanceLedger>(buffer.max(1));

        let handle = tokio::spawn(async move {
            let mut ledger = initial;
            let mut fragments = 0usize;

            while let Some(fragment) = rx.recv().await {
                fragments += 1;
                ledger.merge(fragment);
            }

            debug!(fragments, commands = ledger.len(), "Provenance aggregator drained");
            ledger
        });

        Self { tx, handle }
    }

    pub fn sink(&self) -> LedgerSink {
        LedgerSink {
            tx: self.tx.clone(),
        }
    }

    /// Close the aggregator and return the merged ledger.
    ///
    /// Call only after every producer has finished pushing. The consumer keeps
    /// running while any [`LedgerSink`] is alive.
    pub async fn finish(self) -> Result<ProvenanceLedger> {
        drop(self.tx);
        self.handle
            .await
            .map_err(|e| EngineError::AggregatorFailed(e.to_string()))
    }
}
