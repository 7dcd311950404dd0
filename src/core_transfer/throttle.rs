// Speed limiting for the transfer loop

use crate::core_transfer::state::TransferState;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long the loop must pause so that the average rate since the start of the transfer
/// falls back to `max_speed` bytes/sec. `None` when no pause is needed or no cap is set.
pub fn throttle_delay(state: &TransferState, max_speed: i64) -> Option<Duration> {
    if max_speed <= 0 {
        return None;
    }
    let expected = Duration::from_secs_f64(state.bytes() as f64 / max_speed as f64);
    expected
        .checked_sub(state.elapsed())
        .filter(|delay| !delay.is_zero())
}

/// Sleeps off any excess over `max_speed`. Returns `false` when cancelled during the sleep.
pub async fn speed_limit_sleep(
    state: &TransferState,
    max_speed: i64,
    cancel: &CancellationToken,
) -> bool {
    let Some(delay) = throttle_delay(state, max_speed) else {
        return true;
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
