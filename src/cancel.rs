//! Cooperative cancellation for back-end and store calls.
//!
//! Every suspension point in a run (generation calls, store reads and writes)
//! is raced against the caller's [`CancellationToken`]. The losing future is
//! dropped; nothing already written is rolled back.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

/// Await `fut` unless `token` fires first.
///
/// An already-cancelled token short-circuits without polling `fut`.
pub async fn cancellable<F, T, E>(token: &CancellationToken, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<Cancelled>,
{
    if token.is_cancelled() {
        return Err(Cancelled.into());
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Cancelled.into()),
        result = fut => result,
    }
}
