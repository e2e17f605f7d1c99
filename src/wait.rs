//! Bounded polling wait used for every "wait until rendered" step.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::page::PageError;

/// Poll `probe` until it yields a value or `timeout` elapses.
///
/// The probe runs at least once. `Ok(None)` means "not yet". A fatal
/// [`PageError`] ends the wait immediately; any other probe error counts as
/// "not yet" since the page may still be re-rendering.
pub fn poll_until<T, F>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<T, PageError>
where
    F: FnMut() -> Result<Option<T>, PageError>,
{
    let started = Instant::now();
    loop {
        match probe() {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("Probe for {} failed, still waiting: {}", what, e),
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(PageError::Timeout {
                what: what.to_string(),
                waited_ms: elapsed.as_millis() as u64,
            });
        }

        std::thread::sleep(interval.min(timeout - elapsed));
    }
}
