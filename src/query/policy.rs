use crate::analytics::{QueryOutcome, SourceError};

/// Reason reported when analytics are degraded rather than failed.
pub const UNAUTHORIZED_REASON: &str = "unauthorized";

/// Collective availability of a request's backend outcomes.
#[derive(Debug)]
pub enum Resolved<T> {
    /// Every query succeeded; data is in input order.
    Available(Vec<T>),
    /// At least one query was rejected as unauthorized. The caller must zero
    /// every metric and report `analyticsEnabled=false`; partial data never
    /// leaks into a degraded response.
    Unavailable,
}

/// Fold per-query outcomes into one availability decision.
///
/// A hard failure wins over degradation: zeroed metrics would be
/// indistinguishable from "no engagement", so a broken backend must fail the
/// whole request instead.
pub fn resolve<T>(outcomes: Vec<QueryOutcome<T>>) -> Result<Resolved<T>, SourceError> {
    let mut data = Vec::with_capacity(outcomes.len());
    let mut unauthorized = false;
    for outcome in outcomes {
        match outcome {
            QueryOutcome::Success(value) => data.push(value),
            QueryOutcome::Unauthorized => unauthorized = true,
            QueryOutcome::Failed(error) => return Err(error),
        }
    }
    if unauthorized {
        Ok(Resolved::Unavailable)
    } else {
        Ok(Resolved::Available(data))
    }
}
