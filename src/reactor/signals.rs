//! Signal handling.
//!
//! Signal handlers only ever set flags; all real work happens from the
//! cycle task, never from the handler itself. `signal_hook`'s iterator
//! facility (registering a dedicated `signal-hook-registry` callback for
//! `AT_EXIT`-style cleanup would be overkill here) gives us a dedicated
//! thread that blocks on signal delivery and only ever touches atomics,
//! never reactor state directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use signal_hook::consts::{SIGCHLD, SIGINT, SIGTERM, SIGUSR1};
use signal_hook::iterator::Signals;

/// Flags flipped by the signal-watcher thread and polled by the reactor
/// cycle task. No reactor mutation happens on the signal thread itself.
#[derive(Debug, Default)]
pub struct SignalFlags {
    /// SIGINT or SIGTERM observed: request a graceful stop.
    pub stop_requested: AtomicBool,
    /// SIGUSR1 observed: hot-restart — broadcast shutdown to children, then
    /// respawn them (root only; ignored in worker processes that don't
    /// compile in SIGUSR1 support, per §6).
    pub hot_restart_requested: AtomicBool,
    /// SIGCHLD observed: a child may have exited; the sentinel thread's
    /// blocking `waitpid` already handles reaping, this flag just lets the
    /// cycle task log/react promptly rather than waiting for the next
    /// scheduled poll.
    pub child_exited: AtomicBool,
}

/// Spawns the signal-watcher thread. SIGPIPE is ignored outright (never
/// surfaced as a flag) so that writing to a peer that has reset its
/// connection reports `EPIPE` through the normal write-error path instead
/// of terminating the process.
pub fn install(flags: Arc<SignalFlags>) -> std::io::Result<()> {
    ignore_sigpipe()?;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGUSR1, SIGCHLD])?;
    thread::Builder::new()
        .name("revio-signals".into())
        .spawn(move || {
            for signal in signals.forever() {
                match signal {
                    SIGINT | SIGTERM => flags.stop_requested.store(true, Ordering::SeqCst),
                    SIGUSR1 => flags.hot_restart_requested.store(true, Ordering::SeqCst),
                    SIGCHLD => flags.child_exited.store(true, Ordering::SeqCst),
                    _ => {}
                }
            }
        })?;
    Ok(())
}

fn ignore_sigpipe() -> std::io::Result<()> {
    let res = unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN) };
    if res == libc::SIG_ERR {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}
