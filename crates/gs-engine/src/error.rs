use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Provenance aggregator is closed")]
    AggregatorClosed,

    #[error("Provenance aggregator failed: {0}")]
    AggregatorFailed(String),
}
