//! Connection accounting and idle shutdown
//!
//! The active connection count and the idle-shutdown timer live behind one
//! mutex, so "count reached zero, arm the timer" and "a connection arrived,
//! cancel the timer" never interleave. The timer still re-checks the count,
//! its own epoch and the backend state when it fires, because firing and
//! cancellation race outside the lock.

use log::{debug, error, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::state::{ConnectionState, StateMachine};
use crate::backend::BackendClient;

/// Idle-shutdown settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleShutdown {
    /// Whether the backend is stopped at all when idle
    pub enabled: bool,
    /// How long the count must stay at zero
    pub timeout: Duration,
}

/// Active connection counter with a cancellable idle-shutdown timer
///
/// Cheap to clone; clones share the same counter.
#[derive(Clone)]
pub struct ConnectionAccounting {
    inner: Arc<AccountingInner>,
}

struct AccountingInner {
    counter: Mutex<Counter>,
    state: Arc<StateMachine>,
    backend: Arc<dyn BackendClient>,
    backend_port: u16,
    idle: IdleShutdown,
    label: String,
}

#[derive(Default)]
struct Counter {
    count: i64,
    timer: Option<JoinHandle<()>>,
    // Bumped every time a timer is armed; a woken timer with a stale epoch
    // has been superseded.
    epoch: u64,
}

/// Keeps one connection counted for as long as it lives
pub struct ConnectionGuard {
    accounting: ConnectionAccounting,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.accounting.decrement();
    }
}

impl ConnectionAccounting {
    /// Create the accounting for one proxied address
    ///
    /// # Parameters
    ///
    /// * `state` - State machine of the same proxy server
    /// * `backend` - Control client used for the stop request
    /// * `backend_port` - Port identifying the backend to the control API
    /// * `idle` - Idle-shutdown settings
    /// * `label` - Listen address, used in logs and metrics
    pub fn new(
        state: Arc<StateMachine>,
        backend: Arc<dyn BackendClient>,
        backend_port: u16,
        idle: IdleShutdown,
        label: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(AccountingInner {
                counter: Mutex::new(Counter::default()),
                state,
                backend,
                backend_port,
                idle,
                label: label.into(),
            }),
        }
    }

    /// Current number of active connections
    pub fn count(&self) -> i64 {
        self.lock().count
    }

    /// Whether an idle-shutdown timer is armed
    pub fn has_pending_shutdown(&self) -> bool {
        self.lock().timer.is_some()
    }

    /// Count a connection until the returned guard is dropped
    pub fn track(&self) -> ConnectionGuard {
        self.increment();
        ConnectionGuard {
            accounting: self.clone(),
        }
    }

    /// Add a connection and cancel any pending idle shutdown
    ///
    /// The first connection after an idle period also moves the backend
    /// `Empty -> Running`, so `Empty` never coexists with a live connection.
    pub fn increment(&self) {
        let mut counter = self.lock();
        counter.count += 1;

        if let Some(timer) = counter.timer.take() {
            timer.abort();
            debug!("{}: new connection, cancelled pending shutdown", self.inner.label);
        }

        if counter.count == 1 {
            self.inner.state.transition_from(ConnectionState::Empty, ConnectionState::Running);
        }

        self.record(counter.count);
    }

    /// Remove a connection; arm the idle timer when none are left
    ///
    /// Must be called from within a Tokio runtime.
    pub fn decrement(&self) {
        let mut counter = self.lock();
        counter.count -= 1;
        self.record(counter.count);

        if counter.count > 0 {
            return;
        }
        if counter.count < 0 {
            error!("{}: connection count dropped to {}", self.inner.label, counter.count);
            return;
        }

        self.inner.state.transition(ConnectionState::Empty);

        if !self.inner.idle.enabled {
            return;
        }

        counter.epoch += 1;
        let epoch = counter.epoch;
        if let Some(old) = counter.timer.take() {
            old.abort();
        }

        let timeout = self.inner.idle.timeout;
        let this = self.clone();
        counter.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            this.fire_idle_shutdown(epoch).await;
        }));

        debug!(
            "{}: no connections left, backend stops in {:?} unless someone connects",
            self.inner.label, timeout
        );
    }

    async fn fire_idle_shutdown(self, epoch: u64) {
        let claimed = {
            let mut counter = self.lock();
            if counter.epoch != epoch || counter.count != 0 {
                debug!("{}: idle timer superseded", self.inner.label);
                return;
            }
            counter.timer = None;

            // Claim the idle backend with table edges only, still under the lock
            let state = &self.inner.state;
            state.transition_from(ConnectionState::Empty, ConnectionState::Running)
                && state.transition_from(ConnectionState::Running, ConnectionState::ShuttingDown)
        };

        if !claimed {
            debug!(
                "{}: idle timer fired in state {}, not stopping",
                self.inner.label,
                self.inner.state.get()
            );
            return;
        }

        let port = self.inner.backend_port;
        info!("{}: no connections left, shutting down backend with port {}", self.inner.label, port);
        metrics::counter!("proxy_backend_stop_requests_total", "port" => port.to_string()).increment(1);

        match self.inner.backend.stop_backend(port).await {
            Ok(()) => info!("{}: backend with port {} stopped", self.inner.label, port),
            Err(e) => error!("{}: failed to stop backend with port {}: {}", self.inner.label, port, e),
        }

        self.inner.state.transition(ConnectionState::Off);
    }

    fn record(&self, count: i64) {
        metrics::gauge!("proxy_active_connections", "listen" => self.inner.label.clone()).set(count as f64);
    }

    fn lock(&self) -> MutexGuard<'_, Counter> {
        self.inner.counter.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackendClient;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PORT: u16 = 25566;

    fn stop_counting_backend() -> (Arc<dyn BackendClient>, Arc<AtomicUsize>) {
        let stops = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&stops);

        let mut mock = MockBackendClient::new();
        mock.expect_start_backend().never();
        mock.expect_stop_backend()
            .withf(|port| *port == PORT)
            .returning(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });

        (Arc::new(mock), stops)
    }

    fn accounting(
        state: ConnectionState,
        enabled: bool,
        timeout: Duration,
    ) -> (ConnectionAccounting, Arc<StateMachine>, Arc<AtomicUsize>) {
        let sm = Arc::new(StateMachine::new(state));
        let (backend, stops) = stop_counting_backend();
        let accounting = ConnectionAccounting::new(
            Arc::clone(&sm),
            backend,
            PORT,
            IdleShutdown { enabled, timeout },
            "127.0.0.1:25565",
        );
        (accounting, sm, stops)
    }

    #[tokio::test]
    async fn test_count_is_net_sum() {
        let (acc, _, _) = accounting(ConnectionState::Running, false, Duration::from_millis(50));

        let ops = [1, 1, -1, 1, 1, -1, -1, 1, -1, -1];
        let mut expected = 0;
        for op in ops {
            if op > 0 {
                acc.increment();
            } else {
                acc.decrement();
            }
            expected += op;
            assert_eq!(acc.count(), expected);
            assert!(acc.count() >= 0);
        }
        assert_eq!(acc.count(), 0);
    }

    #[tokio::test]
    async fn test_guard_decrements_on_drop() {
        let (acc, sm, _) = accounting(ConnectionState::Running, false, Duration::from_millis(50));

        {
            let _a = acc.track();
            let _b = acc.track();
            assert_eq!(acc.count(), 2);
        }

        assert_eq!(acc.count(), 0);
        assert_eq!(sm.get(), ConnectionState::Empty);
    }

    #[tokio::test]
    async fn test_increment_cancels_pending_shutdown() {
        let (acc, sm, stops) = accounting(ConnectionState::Running, true, Duration::from_millis(100));

        acc.increment();
        acc.decrement();
        assert!(acc.has_pending_shutdown());
        assert_eq!(sm.get(), ConnectionState::Empty);

        tokio::time::sleep(Duration::from_millis(30)).await;
        // What the handler does for a connection arriving while idle
        assert!(sm.transition(ConnectionState::Running));
        acc.increment();
        assert!(!acc.has_pending_shutdown());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(stops.load(Ordering::SeqCst), 0);
        assert_eq!(sm.get(), ConnectionState::Running);
        assert_eq!(acc.count(), 1);
    }

    #[tokio::test]
    async fn test_first_connection_moves_empty_to_running() {
        let (acc, sm, stops) = accounting(ConnectionState::Running, true, Duration::from_millis(100));

        // A is connected; B has read `Running` and is still dialing
        let a = acc.track();
        assert_eq!(sm.get(), ConnectionState::Running);

        // A leaves before B is counted
        drop(a);
        assert_eq!(sm.get(), ConnectionState::Empty);
        assert!(acc.has_pending_shutdown());

        let _b = acc.track();
        assert_eq!(sm.get(), ConnectionState::Running);
        assert!(!acc.has_pending_shutdown());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(stops.load(Ordering::SeqCst), 0);
        assert_eq!(sm.get(), ConnectionState::Running);
    }

    #[tokio::test]
    async fn test_idle_shutdown_fires_once() {
        let (acc, sm, stops) = accounting(ConnectionState::Running, true, Duration::from_millis(100));

        acc.increment();
        acc.decrement();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(sm.get(), ConnectionState::Off);
        assert!(!acc.has_pending_shutdown());
    }

    #[tokio::test]
    async fn test_racing_decrements_issue_one_stop() {
        let (acc, sm, stops) = accounting(ConnectionState::Running, true, Duration::from_millis(100));

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let acc = acc.clone();
                tokio::spawn(async move {
                    let guard = acc.track();
                    tokio::time::sleep(Duration::from_millis(i % 4)).await;
                    drop(guard);
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(acc.count(), 0);
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(sm.get(), ConnectionState::Off);
    }

    #[tokio::test]
    async fn test_disabled_auto_shutdown_never_stops() {
        let (acc, sm, stops) = accounting(ConnectionState::Running, false, Duration::from_millis(20));

        acc.increment();
        acc.decrement();
        assert!(!acc.has_pending_shutdown());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(stops.load(Ordering::SeqCst), 0);
        assert_eq!(sm.get(), ConnectionState::Empty);
    }

    #[tokio::test]
    async fn test_timer_rechecks_state() {
        // The count reached zero while the backend was still starting
        let (acc, sm, stops) = accounting(ConnectionState::StartingUp, true, Duration::from_millis(50));

        acc.increment();
        acc.decrement();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(stops.load(Ordering::SeqCst), 0);
        assert_eq!(sm.get(), ConnectionState::StartingUp);
    }
}
