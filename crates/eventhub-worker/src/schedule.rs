//! Tick alignment.

/// Seconds to wait from `now_ts` (unix millis) until `secs_before_min`
/// seconds before the next minute boundary.
///
/// If that point is already behind us for the current minute, the following
/// minute is used, so the result is always in `1..=60`.
pub fn get_start_delay(now_ts: i64, secs_before_min: u64) -> u64 {
    let secs_to_next_minute = 60 - (now_ts.max(0) as u64 / 1000) % 60;
    if secs_to_next_minute > secs_before_min {
        secs_to_next_minute - secs_before_min
    } else {
        secs_to_next_minute + (60 - secs_before_min)
    }
}
