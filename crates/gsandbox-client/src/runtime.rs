//! Tokio runtime for the binary.
//!
//! The code prompt reads stdin on a blocking thread that cannot be
//! cancelled. Dropping a runtime waits for such threads, so a timed-out
//! invocation would hang until the user pressed Enter. The runtime here is
//! shut down with a grace period instead and stray blocking work is abandoned.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// How long blocking tasks get to finish once the invocation is over.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Runs `future` to completion on a fresh multi-threaded runtime.
pub fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let output = runtime.block_on(future);
    debug!("shutting down runtime");
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn returns_future_output() {
        assert_eq!(block_on(async { 41 + 1 }).unwrap(), 42);
    }

    #[test]
    fn timed_out_blocking_read_does_not_hold_the_process() {
        let started = Instant::now();

        let outcome = block_on(async {
            let stuck = tokio::task::spawn_blocking(|| {
                std::thread::sleep(Duration::from_secs(60));
            });
            tokio::time::timeout(Duration::from_millis(50), stuck).await
        })
        .unwrap();

        assert!(outcome.is_err());
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
