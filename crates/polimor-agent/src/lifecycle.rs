//! The stop-flag loop driver and process-level lifecycle glue every agent
//! binary shares.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A single boolean flag agents check between loop iterations. A pending
/// `receive` completes (up to its broker deadline) before the flag is
/// checked — there is no mid-operation cancellation.
#[derive(Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Spawns a task that flips `stop` on SIGINT or SIGTERM, so the agent's main
/// loop winds down on its own next iteration instead of being killed.
pub fn install_signal_handler(stop: StopFlag) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            {
                Ok(term) => term,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    stop.stop();
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        tracing::info!("shutdown signal received, stopping agent loop");
        stop.stop();
    });
}

/// Sets `PR_SET_PDEATHSIG` on Linux so a killed parent (the process
/// supervisor) takes this agent down with it. Best-effort: failures are
/// logged, not fatal, since the agent still functions without the
/// correlation.
pub fn set_parent_death_signal() {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: prctl(PR_SET_PDEATHSIG, ...) takes no pointers and has no
        // preconditions beyond being called on Linux.
        let rc = unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) };
        if rc != 0 {
            tracing::warn!(
                error = %std::io::Error::last_os_error(),
                "failed to set PR_SET_PDEATHSIG"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_flag_starts_clear_and_latches() {
        let flag = StopFlag::new();
        assert!(!flag.is_stopped());
        flag.stop();
        assert!(flag.is_stopped());
    }

    #[test]
    fn stop_flag_clones_share_state() {
        let flag = StopFlag::new();
        let clone = flag.clone();
        clone.stop();
        assert!(flag.is_stopped());
    }
}
