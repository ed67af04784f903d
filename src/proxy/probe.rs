//! Backend reachability probes
//!
//! [`dial`] is a connect-with-timeout; it doubles as the liveness probe used
//! to seed the state machine. [`await_ready`] polls it on a fixed interval
//! until the backend answers, an overall deadline passes or the process is
//! shutting down.

use log::{debug, info};
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::common::{ProxyError, Result};

/// Readiness polling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Connect timeout of a single attempt
    pub dial_timeout: Duration,
    /// Interval between attempts
    pub poll_interval: Duration,
    /// Overall deadline of the wait
    pub ready_timeout: Duration,
}

/// Connect to `addr`, giving up after `dial_timeout`
pub async fn dial(addr: &str, dial_timeout: Duration) -> io::Result<TcpStream> {
    match timeout(dial_timeout, TcpStream::connect(addr)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "Connection timed out")),
    }
}

/// Whether something accepts connections on `addr` right now
pub async fn is_reachable(addr: &str, dial_timeout: Duration) -> bool {
    dial(addr, dial_timeout).await.is_ok()
}

/// Poll `addr` until it accepts a connection
///
/// The first attempt happens one `poll_interval` after the call.
///
/// # Errors
///
/// * [`ProxyError::Timeout`] once `ready_timeout` has elapsed
/// * [`ProxyError::Cancelled`] when `cancel` fires first
pub async fn await_ready(
    addr: &str,
    settings: &ProbeSettings,
    cancel: &CancellationToken,
) -> Result<TcpStream> {
    let deadline = tokio::time::sleep(settings.ready_timeout);
    tokio::pin!(deadline);

    let mut ticker = interval_at(Instant::now() + settings.poll_interval, settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut attempt: u32 = 1;
    info!("Waiting for backend {} to start...", addr);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(ProxyError::Cancelled),
            _ = &mut deadline => {
                return Err(ProxyError::Timeout(settings.ready_timeout, addr.to_string()));
            }
            _ = ticker.tick() => {
                debug!("Attempt {}: connecting to {}", attempt, addr);
                match dial(addr, settings.dial_timeout).await {
                    Ok(stream) => {
                        info!("Backend {} is up! Connected on attempt {}", addr, attempt);
                        return Ok(stream);
                    }
                    Err(e) => {
                        debug!("Connection attempt {} to {} failed: {}", attempt, addr, e);
                        attempt += 1;
                    }
                }
            }
        }
    }
}
