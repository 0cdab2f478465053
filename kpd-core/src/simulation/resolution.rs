//! Execution of committed groupings against edge failures and reneging.

use std::collections::BTreeSet;

use crate::{
    error::PoolError,
    grouping::{EdgeRef, Grouping},
    pool::{Pool, VertexId},
    trial::Trial,
};

/// Result of resolving one committed grouping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// An edge failed before any kidney changed hands; the pool is untouched.
    Failed,
    /// At least one transplant went ahead.
    Executed {
        /// Patients who received a kidney.
        transplants: usize,
        /// Altruist created from the last recipient's donor, if any.
        bridge: Option<VertexId>,
    },
}

/// Draws whether each transplant edge goes ahead, stopping at the first
/// failure, and returns the edges that executed.
fn executed_prefix<'g, T: Trial + ?Sized>(
    pool: &Pool,
    edges: &'g [EdgeRef],
    failures: &mut T,
) -> Result<&'g [EdgeRef], PoolError> {
    for (position, edge) in edges.iter().enumerate() {
        let probability = pool.failure_probability(edge.source, edge.target)?;
        if failures.trial(probability) {
            return Ok(edges.get(..position).unwrap_or_default());
        }
    }
    Ok(edges)
}

/// Resolves a cycle: every edge must survive or nothing happens.
pub(crate) fn resolve_cycle<T: Trial + ?Sized>(
    pool: &mut Pool,
    cycle: &Grouping,
    failures: &mut T,
) -> Result<Outcome, PoolError> {
    let edges = cycle.transplant_edges();
    if executed_prefix(pool, edges, failures)?.len() < edges.len() {
        return Ok(Outcome::Failed);
    }
    let members: BTreeSet<VertexId> = cycle.pairs().collect();
    pool.remove_vertices(&members)?;
    Ok(Outcome::Executed {
        transplants: edges.len(),
        bridge: None,
    })
}

/// Resolves a chain link by link, head to tail.
///
/// Only the edges before the first failure can execute. Once the altruist
/// has donated, each recipient's donor draws against `renege_probability`
/// before giving onwards; a renege ends the chain and leaves every later
/// pair in the pool. A donor still willing after the last executed link
/// becomes a bridge altruist.
///
/// At most one bridge is created per chain, and only from the last pair
/// that received, so no earlier conversion ever has to be undone.
pub(crate) fn resolve_chain<F, R>(
    pool: &mut Pool,
    chain: &Grouping,
    failures: &mut F,
    reneging: &mut R,
    renege_probability: f64,
) -> Result<Outcome, PoolError>
where
    F: Trial + ?Sized,
    R: Trial + ?Sized,
{
    let executed = executed_prefix(pool, chain.transplant_edges(), failures)?;
    let recipients: Vec<VertexId> = executed.iter().map(|edge| edge.target).collect();
    let Some((last, received)) = recipients.split_last() else {
        return Ok(Outcome::Failed);
    };
    pool.remove_vertex(chain.anchor())?;

    for (transplants, recipient) in (1..).zip(received) {
        pool.remove_vertex(*recipient)?;
        if reneging.trial(renege_probability) {
            return Ok(Outcome::Executed {
                transplants,
                bridge: None,
            });
        }
    }

    let bridge = if reneging.trial(renege_probability) {
        pool.remove_vertex(*last)?;
        None
    } else {
        Some(pool.convert_to_bridge(*last)?)
    };
    Ok(Outcome::Executed {
        transplants: recipients.len(),
        bridge,
    })
}
