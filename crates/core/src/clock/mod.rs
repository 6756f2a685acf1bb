pub mod announcement;
pub mod performance_time;
pub mod resolver;

/// Milliseconds since the UNIX epoch, as used for cue occurrence times.
pub fn epoch_ms_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
