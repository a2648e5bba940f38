//! Resource limits around one guarded execution.
//!
//! A guarded execution holds the process-wide call lock, lowers the address
//! space ceiling, applies a patch stack, and runs the job on a worker thread
//! that the caller waits on for at most the time limit. Teardown runs in the
//! reverse order of acquisition on every exit path.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

#[cfg(unix)]
use nix::sys::resource::{Resource, getrlimit, rlim_t, setrlimit};
use tracing::{debug, instrument, warn};

use crate::error::Interrupt;
use crate::patch::{Patch, PatchStack};
use crate::runtime::{self, CancelToken, lock};

const GIB: f64 = (1u64 << 30) as f64;

/// Limits for one guarded execution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub time_limit: Duration,
    /// Address space ceiling in GiB; `None` leaves the current limit alone.
    pub memory_limit_gib: Option<f64>,
}

impl Limits {
    /// Default limits: 1s, 1.4 GiB.
    pub fn default_limits() -> Self {
        Self {
            time_limit: Duration::from_secs(1),
            memory_limit_gib: Some(1.4),
        }
    }
}

static CALL_LOCK: Mutex<()> = Mutex::new(());

/// Serializes guarded executions; patches and the memory ceiling are process-wide.
pub fn call_lock() -> MutexGuard<'static, ()> {
    lock(&CALL_LOCK)
}

/// Lowered `RLIMIT_AS` soft limit, restored on drop.
pub struct MemoryCeiling {
    #[cfg(unix)]
    previous: Option<(rlim_t, rlim_t)>,
}

impl MemoryCeiling {
    /// Lower the soft address space limit to `gib`, clamped to the hard limit.
    ///
    /// Failure to read or set the limit is logged and tolerated.
    pub fn raise(gib: f64) -> Self {
        #[cfg(unix)]
        {
            let max_bytes = (gib * GIB) as u64;
            let previous = match getrlimit(Resource::RLIMIT_AS) {
                Ok(limits) => limits,
                Err(err) => {
                    warn!(err = %err, "failed to read RLIMIT_AS");
                    return Self { previous: None };
                }
            };
            let (_, hard) = previous;
            let soft = (max_bytes as rlim_t).min(hard);
            if let Err(err) = setrlimit(Resource::RLIMIT_AS, soft, hard) {
                warn!(err = %err, limit_gib = gib, "failed to apply RLIMIT_AS");
                return Self { previous: None };
            }
            debug!(limit_gib = gib, soft, "memory ceiling applied");
            Self {
                previous: Some(previous),
            }
        }
        #[cfg(not(unix))]
        {
            debug!(limit_gib = gib, "memory ceiling unsupported on this platform");
            Self {}
        }
    }
}

impl Drop for MemoryCeiling {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some((soft, hard)) = self.previous.take()
            && let Err(err) = setrlimit(Resource::RLIMIT_AS, soft, hard)
        {
            warn!(err = %err, "failed to restore RLIMIT_AS");
        }
    }
}

/// Current `(soft, hard)` address space limit in bytes.
#[cfg(unix)]
pub fn address_space_limit() -> std::io::Result<(u64, u64)> {
    let (soft, hard) = getrlimit(Resource::RLIMIT_AS).map_err(std::io::Error::from)?;
    Ok((soft as u64, hard as u64))
}

/// Run `job` under `limits` with `patches` applied.
///
/// The job runs on a worker thread carrying a cancellation token. If the time
/// limit passes first the token is tripped, the worker is abandoned, and the
/// call fails with [`Interrupt::TimedOut`]. Panics inside the job are caught and
/// converted with [`Interrupt::from_panic`].
#[instrument(
    skip_all,
    fields(time_limit_ms = limits.time_limit.as_millis() as u64, patches = patches.len())
)]
pub fn run_guarded<T, F>(limits: &Limits, patches: &[Patch], job: F) -> Result<T, Interrupt>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Interrupt> + Send + 'static,
{
    let _call = call_lock();
    let _memory = limits.memory_limit_gib.map(MemoryCeiling::raise);
    let _patches = PatchStack::apply(patches)?;

    let token = CancelToken::new();
    let worker_token = token.clone();
    let (tx, rx) = mpsc::channel();

    debug!("spawning target worker");
    thread::Builder::new()
        .name("harness-target".to_string())
        .spawn(move || {
            let _scope = runtime::enter(worker_token);
            let result = panic::catch_unwind(AssertUnwindSafe(job))
                .unwrap_or_else(|payload| Err(Interrupt::from_panic(payload)));
            tx.send(result).ok();
        })
        .map_err(|err| Interrupt::raised("OSError", format!("spawn worker: {err}")))?;

    match rx.recv_timeout(limits.time_limit) {
        Ok(result) => {
            debug!(ok = result.is_ok(), "target worker finished");
            result
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                time_limit_ms = limits.time_limit.as_millis() as u64,
                "target timed out, abandoning worker"
            );
            token.cancel();
            Err(Interrupt::TimedOut)
        }
        Err(RecvTimeoutError::Disconnected) => Err(Interrupt::raised(
            "RuntimeError",
            "target worker exited without a result",
        )),
    }
}
