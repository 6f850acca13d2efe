//! Deadlines for blocking provider calls.

use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use crate::error::ProviderError;

/// Run `call` on a helper thread and wait at most `timeout` for its result.
///
/// On timeout the helper thread is left to finish on its own; its result is
/// discarded.
pub fn call_with_timeout<T, F>(name: &str, timeout: Duration, call: F) -> Result<T, ProviderError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProviderError> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::Builder::new()
        .name(format!("fieldmap-{name}"))
        .spawn(move || {
            let _ = tx.send(call());
        })
        .map_err(|e| ProviderError::Unavailable(format!("failed to spawn {name} call: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(ProviderError::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(ProviderError::Unavailable(format!(
            "{name} call ended without a result"
        ))),
    }
}
