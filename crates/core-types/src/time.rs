/// Length of one snapshot frame in seconds.
pub const FIVE_MINUTES: i64 = 300;

/// Rounds an epoch (seconds) to the nearest five-minute boundary; exact halves round up.
pub fn round_to_five_minutes(epoch_secs: i64) -> i64 {
    let remainder = epoch_secs.rem_euclid(FIVE_MINUTES);
    if remainder * 2 >= FIVE_MINUTES {
        epoch_secs - remainder + FIVE_MINUTES
    } else {
        epoch_secs - remainder
    }
}

/// Timestamp of the frame `frames_back` steps before `base`.
pub fn frame_timestamp(base: i64, frames_back: usize) -> i64 {
    base - frames_back as i64 * FIVE_MINUTES
}

/// The frame immediately before `timestamp`.
pub fn previous_frame(timestamp: i64) -> i64 {
    timestamp - FIVE_MINUTES
}
