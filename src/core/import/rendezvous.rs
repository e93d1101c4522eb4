//! Rendezvous primitives for the commit coordinator
//!
//! Every partition worker reports its [`WorkOutcome`] exactly once through
//! [`Rendezvous::arrive`] and receives the batch's [`GlobalDecision`]. Both
//! implementations guarantee:
//!
//! - no decision is derived before every party has reported, unless the wait
//!   times out, in which case the decision is ABORT;
//! - the decision is set once and every party observes the same value.
//!
//! A rendezvous is used for a single batch.

use crate::config::CommitStrategy;
use crate::domain::{GlobalDecision, TransferError, WorkOutcome};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Barrier, Notify};
use tokio::time::Instant;

/// Convergence point of one batch's partition workers
#[async_trait]
pub trait Rendezvous: Send + Sync {
    /// Report `outcome` and wait for the global decision
    ///
    /// Never blocks longer than the rendezvous timeout.
    async fn arrive(&self, outcome: WorkOutcome) -> GlobalDecision;

    /// The decision, once one has been reached
    fn decision(&self) -> Option<GlobalDecision>;
}

/// Build the rendezvous selected by `strategy` for `parties` workers
pub fn for_strategy(
    strategy: CommitStrategy,
    parties: usize,
    timeout: Duration,
) -> Arc<dyn Rendezvous> {
    match strategy {
        CommitStrategy::Barrier => Arc::new(BarrierRendezvous::new(parties, timeout)),
        CommitStrategy::Latch => Arc::new(LatchRendezvous::new(parties, timeout)),
    }
}

/// Shared outcome registry plus a barrier sized to the party count
///
/// Each worker writes its outcome before arriving at the barrier, and the
/// barrier only releases once all have arrived, so every registry write
/// happens-before any post-release read. The first released worker derives
/// the decision; the rest read it.
pub struct BarrierRendezvous {
    parties: usize,
    barrier: Barrier,
    registry: Mutex<Vec<WorkOutcome>>,
    decision: OnceLock<GlobalDecision>,
    aborted: Notify,
    timeout: Duration,
}

impl BarrierRendezvous {
    /// Create a barrier rendezvous for `parties` workers
    pub fn new(parties: usize, timeout: Duration) -> Self {
        Self {
            parties,
            barrier: Barrier::new(parties),
            registry: Mutex::new(Vec::with_capacity(parties)),
            decision: OnceLock::new(),
            aborted: Notify::new(),
            timeout,
        }
    }

    fn decide_from_registry(&self) -> GlobalDecision {
        *self.decision.get_or_init(|| {
            let outcomes = self.registry.lock().unwrap_or_else(|p| p.into_inner());
            GlobalDecision::from_outcomes(&outcomes, self.parties)
        })
    }

    fn abort(&self, partition_id: usize) -> GlobalDecision {
        let decision = *self.decision.get_or_init(|| {
            let error = TransferError::CoordinationTimeout(format!(
                "partition {partition_id} waited {}ms at the barrier",
                self.timeout.as_millis()
            ));
            tracing::warn!(error = %error, "Rendezvous timed out; aborting batch");
            GlobalDecision::Abort
        });
        self.aborted.notify_waiters();
        decision
    }
}

#[async_trait]
impl Rendezvous for BarrierRendezvous {
    async fn arrive(&self, outcome: WorkOutcome) -> GlobalDecision {
        let partition_id = outcome.partition_id;
        self.registry
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(outcome);

        let notified = self.aborted.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        // A peer may already have timed out and aborted
        if let Some(decision) = self.decision.get() {
            return *decision;
        }

        tokio::select! {
            _ = self.barrier.wait() => self.decide_from_registry(),
            _ = &mut notified => self.abort(partition_id),
            _ = tokio::time::sleep(self.timeout) => self.abort(partition_id),
        }
    }

    fn decision(&self) -> Option<GlobalDecision> {
        self.decision.get().copied()
    }
}

/// Countdown of arrivals feeding a coordinating task, which publishes the
/// decision once on a watch channel
///
/// The coordinator collects outcomes until all parties have reported or the
/// deadline passes, derives the decision and publishes it. Workers read it
/// only after publication. A worker whose own wait times out publishes ABORT
/// through the same first-writer-wins path, so the value never changes once
/// set.
pub struct LatchRendezvous {
    arrivals: mpsc::UnboundedSender<WorkOutcome>,
    decision: Arc<watch::Sender<Option<GlobalDecision>>>,
    timeout: Duration,
}

impl LatchRendezvous {
    /// Create a latch rendezvous and spawn its coordinating task
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(parties: usize, timeout: Duration) -> Self {
        let (arrivals, countdown) = mpsc::unbounded_channel();
        let (decision, _) = watch::channel(None);
        let decision = Arc::new(decision);

        tokio::spawn(coordinate(
            parties,
            Instant::now() + timeout,
            countdown,
            decision.clone(),
        ));

        Self {
            arrivals,
            decision,
            timeout,
        }
    }
}

/// Set the decision unless one is already set; return the value in force
fn publish_once(
    slot: &watch::Sender<Option<GlobalDecision>>,
    decision: GlobalDecision,
) -> GlobalDecision {
    slot.send_if_modified(|current| {
        if current.is_none() {
            *current = Some(decision);
            true
        } else {
            false
        }
    });
    let published = *slot.borrow();
    published.unwrap_or(decision)
}

async fn coordinate(
    parties: usize,
    deadline: Instant,
    mut countdown: mpsc::UnboundedReceiver<WorkOutcome>,
    decision: Arc<watch::Sender<Option<GlobalDecision>>>,
) {
    let mut outcomes = Vec::with_capacity(parties);

    while outcomes.len() < parties {
        match tokio::time::timeout_at(deadline, countdown.recv()).await {
            Ok(Some(outcome)) => outcomes.push(outcome),
            Ok(None) => break,
            Err(_) => {
                let error = TransferError::CoordinationTimeout(format!(
                    "{} of {parties} partitions reported before the deadline",
                    outcomes.len()
                ));
                tracing::warn!(error = %error, "Rendezvous timed out; aborting batch");
                break;
            }
        }
    }

    publish_once(
        &decision,
        GlobalDecision::from_outcomes(&outcomes, parties),
    );
}

#[async_trait]
impl Rendezvous for LatchRendezvous {
    async fn arrive(&self, outcome: WorkOutcome) -> GlobalDecision {
        let partition_id = outcome.partition_id;
        if self.arrivals.send(outcome).is_err() {
            // The coordinator already gave up on this batch
            return publish_once(&self.decision, GlobalDecision::Abort);
        }

        let mut published = self.decision.subscribe();
        let waited =
            tokio::time::timeout(self.timeout, published.wait_for(Option::is_some)).await;
        match waited {
            Ok(Ok(value)) => {
                let decision = *value;
                decision.unwrap_or(GlobalDecision::Abort)
            }
            _ => {
                tracing::warn!(partition_id, "Timed out waiting for decision");
                publish_once(&self.decision, GlobalDecision::Abort)
            }
        }
    }

    fn decision(&self) -> Option<GlobalDecision> {
        *self.decision.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::JoinSet;

    async fn run(
        rendezvous: Arc<dyn Rendezvous>,
        outcomes: Vec<WorkOutcome>,
    ) -> Vec<GlobalDecision> {
        let mut tasks = JoinSet::new();
        for outcome in outcomes {
            let rendezvous = rendezvous.clone();
            tasks.spawn(async move { rendezvous.arrive(outcome).await });
        }
        let mut decisions = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            decisions.push(joined.unwrap());
        }
        decisions
    }

    fn strategies() -> [CommitStrategy; 2] {
        [CommitStrategy::Barrier, CommitStrategy::Latch]
    }

    #[tokio::test]
    async fn test_all_succeed_commits() {
        for strategy in strategies() {
            let rendezvous = for_strategy(strategy, 5, Duration::from_secs(5));
            let decisions = run(rendezvous.clone(), (0..5).map(WorkOutcome::success).collect()).await;

            assert_eq!(decisions, vec![GlobalDecision::Commit; 5], "{strategy}");
            assert_eq!(rendezvous.decision(), Some(GlobalDecision::Commit));
        }
    }

    #[tokio::test]
    async fn test_one_failure_aborts_everyone() {
        for strategy in strategies() {
            let rendezvous = for_strategy(strategy, 4, Duration::from_secs(5));
            let mut outcomes: Vec<_> = (0..4).map(WorkOutcome::success).collect();
            outcomes[1] = WorkOutcome::failure(1, "constraint violation");

            let decisions = run(rendezvous, outcomes).await;
            assert_eq!(decisions, vec![GlobalDecision::Abort; 4], "{strategy}");
        }
    }

    #[tokio::test]
    async fn test_missing_party_times_out_to_abort() {
        for strategy in strategies() {
            let rendezvous = for_strategy(strategy, 3, Duration::from_millis(50));
            let decisions = run(rendezvous.clone(), (0..2).map(WorkOutcome::success).collect()).await;

            assert_eq!(decisions, vec![GlobalDecision::Abort; 2], "{strategy}");
            assert_eq!(rendezvous.decision(), Some(GlobalDecision::Abort));
        }
    }

    #[tokio::test]
    async fn test_late_arrival_sees_abort() {
        for strategy in strategies() {
            let rendezvous = for_strategy(strategy, 2, Duration::from_millis(30));
            let early = run(rendezvous.clone(), vec![WorkOutcome::success(0)]).await;
            let late = rendezvous.arrive(WorkOutcome::success(1)).await;

            assert_eq!(early, vec![GlobalDecision::Abort], "{strategy}");
            assert_eq!(late, GlobalDecision::Abort, "{strategy}");
        }
    }
}
