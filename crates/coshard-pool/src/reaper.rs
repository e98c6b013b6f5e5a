//! Idle connection reaper

use std::sync::{Arc, Weak};
use std::time::Duration;

use coshard_core::Connection;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::pool::{Shared, close_detached};

/// Outcome of one reaper cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Idle connections closed because they expired, were closed or failed a ping
    pub evicted: usize,
    /// New connections dialed to restore the warm floor
    pub replenished: usize,
}

/// Start the background reaper for a pool.
///
/// Holds only a weak reference so a forgotten pool can still be dropped.
pub(crate) fn spawn(shared: Weak<Shared>, shutdown: CancellationToken, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(shared) = shared.upgrade() else {
                break;
            };
            let report = reap_once(&shared).await;
            if report.evicted > 0 || report.replenished > 0 {
                tracing::debug!(
                    address = %shared.label,
                    evicted = report.evicted,
                    replenished = report.replenished,
                    "reaper cycle finished"
                );
            }
        }
        tracing::trace!("reaper stopped");
    });
}

/// Run one sweep over the idle queue followed by a warm-floor refill
pub(crate) async fn reap_once(shared: &Shared) -> ReapReport {
    let mut report = ReapReport::default();

    // One lap: members released after this snapshot wait for the next cycle.
    let lap: Vec<u64> = {
        let state = shared.state.lock();
        if !state.is_open() {
            return report;
        }
        state.idle.iter().copied().collect()
    };

    for id in lap {
        let checkout = match inspect(shared, id) {
            Inspect::Stop => break,
            Inspect::Skip => continue,
            Inspect::Evict(conn) => {
                report.evicted += 1;
                close_evicted(shared, id, conn).await;
                continue;
            }
            Inspect::Check(checkout) => checkout,
        };

        let healthy = checkout.conn.is_healthy().await;
        if let Some(conn) = checkout.finish(healthy) {
            if !healthy {
                tracing::debug!(address = %shared.label, connection_id = id, "idle connection failed health check");
                report.evicted += 1;
            }
            close_evicted(shared, id, conn).await;
        }
    }

    if report.evicted > 0 {
        tracing::info!(address = %shared.label, count = report.evicted, "evicted idle connections");
    }

    report.replenished = replenish(shared).await;
    report
}

enum Inspect<'a> {
    /// The pool closed; end the sweep
    Stop,
    /// Borrowed or gone since the lap started
    Skip,
    /// Removed from the pool; close it
    Evict(Arc<dyn Connection>),
    /// Taken out of the idle queue for a health check
    Check(Checkout<'a>),
}

/// Decide what to do with one idle member, under the lock.
///
/// Dead members are evicted regardless of the warm floor, expired ones only
/// while the pool stays above `min_size`. Everything else is checked out so
/// acquire cannot hand it out while it is pinged.
fn inspect(shared: &Shared, id: u64) -> Inspect<'_> {
    let mut state = shared.state.lock();
    if !state.is_open() {
        return Inspect::Stop;
    }
    let Some(pos) = state.idle.iter().position(|&idle| idle == id) else {
        return Inspect::Skip;
    };
    state.idle.remove(pos);

    let above_floor = state.members.len() > shared.config.min_size();
    let Some(member) = state.members.get_mut(&id) else {
        tracing::error!(connection_id = id, "idle queue entry without pool member");
        return Inspect::Skip;
    };

    let expired = Instant::now().saturating_duration_since(member.last_active_at)
        > shared.config.idle_timeout();
    if member.conn.is_closed() || (expired && above_floor) {
        let conn = member.conn.clone();
        state.members.remove(&id);
        drop(state);
        shared.available.notify_one();
        return Inspect::Evict(conn);
    }

    member.borrowed = true;
    Inspect::Check(Checkout {
        shared,
        id,
        conn: member.conn.clone(),
        settled: false,
    })
}

/// An idle member held by the reaper during its health check.
///
/// Dropped without [`finish`](Checkout::finish) it goes back to the idle
/// queue, so an abandoned sweep never strands a member as borrowed.
struct Checkout<'a> {
    shared: &'a Shared,
    id: u64,
    conn: Arc<dyn Connection>,
    settled: bool,
}

impl Checkout<'_> {
    /// Requeue a healthy member; otherwise remove it and hand back the
    /// connection to close
    fn finish(mut self, healthy: bool) -> Option<Arc<dyn Connection>> {
        self.settle(healthy)
    }

    fn settle(&mut self, healthy: bool) -> Option<Arc<dyn Connection>> {
        self.settled = true;
        let mut state = self.shared.state.lock();
        let open = state.is_open();

        if healthy && open {
            if let Some(member) = state.members.get_mut(&self.id) {
                // The idle age is kept; a passing check is not activity.
                member.borrowed = false;
                state.idle.push_back(self.id);
            }
        } else if state.members.remove(&self.id).is_none() {
            return None;
        }
        drop(state);

        self.shared.available.notify_one();
        (!healthy || !open).then(|| self.conn.clone())
    }
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        if !self.settled {
            if let Some(conn) = self.settle(true) {
                close_detached(conn);
            }
        }
    }
}

async fn close_evicted(shared: &Shared, id: u64, conn: Arc<dyn Connection>) {
    if let Err(e) = conn.close().await {
        tracing::warn!(address = %shared.label, connection_id = id, error = %e, "failed to close evicted connection");
    }
}

async fn replenish(shared: &Shared) -> usize {
    let mut created = 0;
    while let Some(reservation) = shared.reserve_for_floor() {
        let conn = match shared.factory.connect(&shared.endpoint).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(address = %shared.label, error = %e, "failed to restore warm connection");
                break;
            }
        };
        if reservation.commit(conn.clone(), false).is_none() {
            if let Err(e) = conn.close().await {
                tracing::warn!(error = %e, "failed to close connection opened during shutdown");
            }
            break;
        }
        created += 1;
    }
    created
}
