//! Readiness polling on a socket descriptor.
//!
//! Frame reads are blocking. To honour a caller deadline the engine first
//! waits for the socket to become readable with `poll(2)`, and only then
//! performs the read.

use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{Result, TransportError};

/// Outcome of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The descriptor has data (or EOF / an error condition) to read.
    Ready,
    /// The timeout elapsed first.
    TimedOut,
}

/// Wait until `fd` is readable or `timeout` elapses.
///
/// `None` waits forever. Interrupted waits (`EINTR`) are resumed with the
/// remaining budget rather than the original timeout.
pub fn wait_readable(fd: RawFd, timeout: Option<Duration>) -> Result<Readiness> {
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        let timeout_ms = match deadline {
            None => -1,
            Some(deadline) => to_poll_millis(deadline.saturating_duration_since(Instant::now())),
        };

        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };

        // SAFETY: `pfd` is a valid, writable pollfd and we pass a count of one.
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };

        match rc {
            0 => {
                trace!(fd, "poll timed out");
                return Ok(Readiness::TimedOut);
            }
            n if n > 0 => return Ok(Readiness::Ready),
            _ => {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(TransportError::Poll(err));
            }
        }
    }
}

/// Round up to whole milliseconds so a sub-millisecond budget still waits.
fn to_poll_millis(remaining: Duration) -> libc::c_int {
    let mut millis = remaining.as_millis();
    if remaining.subsec_nanos() % 1_000_000 != 0 {
        millis += 1;
    }
    millis.min(libc::c_int::MAX as u128) as libc::c_int
}
