//! Data source pool implementation

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use coshard_core::{Connection, ConnectionFactory, CoshardError, Endpoint, Result};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::PoolConfig;
use crate::pooled::{Member, PooledConnection};
use crate::reaper::{self, ReapReport};
use crate::stats::PoolStats;

/// Pool lifecycle, guarded by the same lock as membership
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Open,
    /// Close has started; members are being shut down
    Closing,
    Closed,
}

/// Membership bookkeeping. Only mutated under [`Shared::state`].
pub(crate) struct PoolState {
    pub(crate) lifecycle: Lifecycle,
    /// Every connection owned by the pool, borrowed or idle
    pub(crate) members: HashMap<u64, Member>,
    /// Idle members in release order; holds exactly the non-borrowed members
    pub(crate) idle: VecDeque<u64>,
    /// Slots reserved by dials in flight
    pub(crate) pending: usize,
    /// Callers blocked on an exhausted pool
    pub(crate) waiting: usize,
    next_id: u64,
}

/// What an acquire attempt should do next
enum Step {
    Closed,
    Reuse(u64, Arc<dyn Connection>),
    /// A slot was reserved; dial a new connection
    Grow,
    Wait,
}

impl PoolState {
    fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Open,
            members: HashMap::new(),
            idle: VecDeque::new(),
            pending: 0,
            waiting: 0,
            next_id: 1,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.lifecycle == Lifecycle::Open
    }

    /// Live plus reserved connections
    pub(crate) fn committed(&self) -> usize {
        self.members.len() + self.pending
    }

    pub(crate) fn insert_member(&mut self, conn: Arc<dyn Connection>, borrowed: bool) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.members.insert(id, Member::new(conn, borrowed));
        if !borrowed {
            self.idle.push_back(id);
        }
        id
    }

    fn next_step(&mut self, max_size: usize) -> Step {
        if !self.is_open() {
            return Step::Closed;
        }

        while let Some(id) = self.idle.pop_front() {
            match self.members.get_mut(&id) {
                Some(member) => {
                    debug_assert!(!member.borrowed, "idle connection marked borrowed");
                    member.borrowed = true;
                    return Step::Reuse(id, member.conn.clone());
                }
                None => {
                    tracing::error!(connection_id = id, "idle queue entry without pool member");
                }
            }
        }

        if self.committed() < max_size {
            self.pending += 1;
            return Step::Grow;
        }
        Step::Wait
    }

    fn release_reservation(&mut self) {
        if self.pending == 0 {
            tracing::error!("released a dial reservation that was never taken");
            debug_assert!(false, "pending reservation underflow");
            return;
        }
        self.pending -= 1;
    }
}

/// State shared by every handle to one data source
pub(crate) struct Shared {
    /// Backend address, used in logs
    pub(crate) label: String,
    pub(crate) endpoint: Endpoint,
    pub(crate) config: PoolConfig,
    pub(crate) factory: Arc<dyn ConnectionFactory>,
    pub(crate) state: Mutex<PoolState>,
    /// Signalled when a connection is released or capacity frees up
    pub(crate) available: Notify,
    /// Stops the reaper
    pub(crate) shutdown: CancellationToken,
}

impl Shared {
    pub(crate) fn release(&self, id: u64, conn: Arc<dyn Connection>) {
        enum Outcome {
            Requeued,
            Removed,
            Close,
        }

        let outcome = {
            let mut state = self.state.lock();
            if !state.is_open() {
                state.members.remove(&id);
                Outcome::Close
            } else if let Some(member) = state.members.get_mut(&id) {
                if !member.borrowed {
                    tracing::error!(connection_id = id, "connection released while not borrowed");
                    debug_assert!(false, "double release");
                    return;
                }
                if member.conn.is_closed() {
                    state.members.remove(&id);
                    Outcome::Removed
                } else {
                    member.borrowed = false;
                    member.last_active_at = Instant::now();
                    state.idle.push_back(id);
                    Outcome::Requeued
                }
            } else {
                tracing::error!(connection_id = id, pool = %self.label, "released connection is not a member of this pool");
                Outcome::Close
            }
        };

        match outcome {
            Outcome::Requeued => self.available.notify_one(),
            Outcome::Removed => {
                tracing::debug!(connection_id = id, "dropped closed connection on release");
                self.available.notify_one();
            }
            Outcome::Close => {
                tracing::debug!(connection_id = id, "pool closed, closing released connection");
                close_detached(conn);
            }
        }
    }

    pub(crate) async fn discard(&self, id: u64, conn: Arc<dyn Connection>) {
        self.state.lock().members.remove(&id);
        self.available.notify_one();
        if let Err(e) = conn.close().await {
            tracing::warn!(connection_id = id, error = %e, "failed to close discarded connection");
        }
    }

    /// Reserve a slot for refilling the warm floor
    pub(crate) fn reserve_for_floor(&self) -> Option<Reservation<'_>> {
        let mut state = self.state.lock();
        let wanted = state.is_open()
            && state.committed() < self.config.min_size()
            && state.committed() < self.config.max_size();
        if !wanted {
            return None;
        }
        state.pending += 1;
        Some(Reservation::adopt(self))
    }

    /// Mark the pool closing and collect every member connection to shut down
    fn begin_close(&self) -> Option<Vec<Arc<dyn Connection>>> {
        let mut state = self.state.lock();
        if state.lifecycle != Lifecycle::Open {
            return None;
        }
        state.lifecycle = Lifecycle::Closing;

        let idle: Vec<u64> = state.idle.drain(..).collect();
        let mut connections = Vec::with_capacity(state.members.len());
        for id in idle {
            if let Some(member) = state.members.remove(&id) {
                connections.push(member.conn);
            }
        }
        // Borrowed members stay until their borrower releases them.
        connections.extend(state.members.values().map(|m| m.conn.clone()));
        Some(connections)
    }

    fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        let total = state.members.len();
        let idle = state.idle.len();
        PoolStats::new(total, idle, total - idle, state.pending, state.waiting)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// A slot counted against `max_size` while a dial is in flight.
///
/// Dropping it without [`commit`](Reservation::commit) gives the slot back,
/// so a failed or cancelled dial never leaves a phantom member.
pub(crate) struct Reservation<'a> {
    shared: &'a Shared,
    active: bool,
}

impl<'a> Reservation<'a> {
    /// Take over a slot already counted in `pending`
    fn adopt(shared: &'a Shared) -> Self {
        Self {
            shared,
            active: true,
        }
    }

    /// Turn the slot into a member. Returns `None` if the pool closed meanwhile.
    pub(crate) fn commit(mut self, conn: Arc<dyn Connection>, borrowed: bool) -> Option<u64> {
        self.active = false;
        let mut state = self.shared.state.lock();
        state.release_reservation();
        if !state.is_open() {
            return None;
        }
        let id = state.insert_member(conn, borrowed);
        drop(state);
        if !borrowed {
            self.shared.available.notify_one();
        }
        Some(id)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.active {
            self.shared.state.lock().release_reservation();
            self.shared.available.notify_one();
        }
    }
}

/// Keeps the waiting-caller count accurate even if acquire is cancelled
struct WaitGuard<'a> {
    shared: &'a Shared,
}

impl<'a> WaitGuard<'a> {
    fn new(shared: &'a Shared) -> Self {
        shared.state.lock().waiting += 1;
        Self { shared }
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.waiting = state.waiting.saturating_sub(1);
    }
}

/// Close a connection without blocking the caller
pub(crate) fn close_detached(conn: Arc<dyn Connection>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = conn.close().await {
                    tracing::warn!(error = %e, "failed to close backend connection");
                }
            });
        }
        Err(_) => {
            tracing::debug!("no runtime available, dropping backend connection without close");
        }
    }
}

/// A bounded pool of connections to one backend data server
///
/// Handles are cheap to clone and share the same pool.
#[derive(Clone)]
pub struct DataSource {
    shared: Arc<Shared>,
}

impl DataSource {
    /// Create the pool, dial `min_size` warm connections and start the reaper.
    ///
    /// Warm-up dial failures are logged and only shrink the warm set; the
    /// call fails only on an invalid configuration.
    #[tracing::instrument(skip(config, factory), fields(address = %endpoint.address))]
    pub async fn connect(
        endpoint: Endpoint,
        config: PoolConfig,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            label: endpoint.address.clone(),
            endpoint,
            config,
            factory,
            state: Mutex::new(PoolState::new()),
            available: Notify::new(),
            shutdown: CancellationToken::new(),
        });

        let mut warm = 0;
        for _ in 0..shared.config.min_size() {
            match shared.factory.connect(&shared.endpoint).await {
                Ok(conn) => {
                    shared.state.lock().insert_member(conn, false);
                    warm += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to open warm connection");
                }
            }
        }

        reaper::spawn(
            Arc::downgrade(&shared),
            shared.shutdown.clone(),
            shared.config.reap_interval(),
        );

        tracing::info!(
            warm = warm,
            min_size = shared.config.min_size(),
            max_size = shared.config.max_size(),
            "data source initialized"
        );
        Ok(Self { shared })
    }

    /// Get a connection, waiting at most the configured acquire timeout
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let deadline = self
            .shared
            .config
            .acquire_timeout()
            .map(|timeout| Instant::now() + timeout);
        self.acquire_by(deadline).await
    }

    /// Get a connection, waiting until `deadline` if the pool is exhausted
    ///
    /// This will:
    /// 1. Take an idle connection if one is queued
    /// 2. If none is idle and the pool is under max_size, dial a new connection
    /// 3. If at max_size, wait for a release or for the pool to close
    ///
    /// On expiry no connection is taken and no slot stays reserved.
    #[tracing::instrument(level = "debug", skip_all, fields(address = %self.shared.label))]
    pub async fn acquire_by(&self, deadline: Option<Instant>) -> Result<PooledConnection> {
        let Some(deadline) = deadline else {
            return self.acquire_inner().await;
        };

        match tokio::time::timeout_at(deadline, self.acquire_inner()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("timed out waiting for a backend connection");
                Err(CoshardError::Timeout(format!(
                    "Timed out waiting for a connection to {}",
                    self.shared.label
                )))
            }
        }
    }

    async fn acquire_inner(&self) -> Result<PooledConnection> {
        let shared = &*self.shared;
        let mut waiting: Option<WaitGuard<'_>> = None;

        loop {
            // Registered before inspecting state so a release between the
            // check and the await is not missed.
            let notified = shared.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let step = shared.state.lock().next_step(shared.config.max_size());
            match step {
                Step::Closed => return Err(CoshardError::PoolClosed),
                Step::Reuse(id, conn) => {
                    let pooled = PooledConnection::new(id, conn, self.shared.clone());
                    if shared.config.test_on_acquire() && !pooled.is_healthy().await {
                        tracing::warn!(connection_id = id, "discarding unhealthy idle connection");
                        pooled.discard().await;
                        continue;
                    }
                    return Ok(pooled);
                }
                Step::Grow => return self.grow(Reservation::adopt(shared)).await,
                Step::Wait => {
                    if waiting.is_none() {
                        tracing::debug!("pool exhausted, waiting for a release");
                        waiting = Some(WaitGuard::new(shared));
                    }
                    notified.await;
                }
            }
        }
    }

    async fn grow(&self, reservation: Reservation<'_>) -> Result<PooledConnection> {
        let shared = &*self.shared;
        tracing::debug!("opening new backend connection");

        let conn = match shared.factory.connect(&shared.endpoint).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "failed to open backend connection");
                return Err(e);
            }
        };

        match reservation.commit(conn.clone(), true) {
            Some(id) => Ok(PooledConnection::new(id, conn, self.shared.clone())),
            None => {
                if let Err(e) = conn.close().await {
                    tracing::warn!(error = %e, "failed to close connection opened during shutdown");
                }
                Err(CoshardError::PoolClosed)
            }
        }
    }

    /// Return a connection acquired from this pool
    ///
    /// Never blocks. On a closed pool the connection is closed instead of
    /// being requeued.
    pub fn release(&self, conn: PooledConnection) {
        if !conn.belongs_to(&self.shared) {
            tracing::error!(
                connection_id = conn.id(),
                pool = %self.shared.label,
                "connection released to a pool that does not own it"
            );
        }
        conn.release();
    }

    /// Close the pool: wake every waiting caller with `PoolClosed`, stop the
    /// reaper and close all member connections. A second call is a no-op.
    #[tracing::instrument(skip_all, fields(address = %self.shared.label))]
    pub async fn close(&self) {
        let Some(connections) = self.shared.begin_close() else {
            tracing::debug!("data source already closed");
            return;
        };

        self.shared.shutdown.cancel();
        self.shared.available.notify_waiters();

        for conn in &connections {
            if let Err(e) = conn.close().await {
                tracing::warn!(error = %e, "failed to close member connection");
            }
        }

        self.shared.state.lock().lifecycle = Lifecycle::Closed;
        tracing::info!(closed = connections.len(), "data source closed");
    }

    /// Run one reaper cycle now
    pub async fn reap(&self) -> ReapReport {
        reaper::reap_once(&self.shared).await
    }

    /// Whether close has been called
    pub fn is_closed(&self) -> bool {
        !self.shared.state.lock().is_open()
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Get the backend this pool dials
    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("address", &self.shared.label)
            .field("stats", &self.stats())
            .finish()
    }
}
