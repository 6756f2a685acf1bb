use crate::agenda::{SourceSpec, TrackSpec};
use crate::clock::performance_time::PerformanceTimeClient;

/// Query surface over the cue history needed to resolve tracks.
///
/// Results must be recomputed against the current wall clock on every call;
/// a negative value means the cue has not fired.
pub trait CueClock: Send + Sync {
    fn since_cue(&self, name: &str) -> f64;
}

impl CueClock for PerformanceTimeClient {
    fn since_cue(&self, name: &str) -> f64 {
        PerformanceTimeClient::since_cue(self, name)
    }
}

/// The track of `source` whose cue fired most recently, or `None` if no
/// track's cue has fired yet.
///
/// Among all fired cues, the smallest elapsed time wins rather than the
/// track latest in script order. An operator can therefore re-trigger an
/// earlier cue to go back in time, and every client will treat that earlier
/// cue as authoritative again.
pub fn latest_cued_track<'a>(clock: &dyn CueClock, source: &'a SourceSpec) -> Option<&'a TrackSpec> {
    let mut latest: Option<(&TrackSpec, f64)> = None;

    for track in &source.tracks {
        let since = clock.since_cue(&track.cue);
        if since < 0.0 {
            continue;
        }
        if latest.map_or(true, |(_, best)| since < best) {
            latest = Some((track, since));
        }
    }

    latest.map(|(track, _)| track)
}

/// Seconds since the currently-active track's cue, or `0.0` if no track of
/// `source` has been cued. Callers treat zero-with-no-track as "nothing to
/// play", not an error.
pub fn since_latest_track_cue(clock: &dyn CueClock, source: &SourceSpec) -> f64 {
    match latest_cued_track(clock, source) {
        Some(track) => clock.since_cue(&track.cue),
        None => 0.0,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::CueClock;

    /// Deterministic clock for tests: cue name -> seconds since it fired.
    #[derive(Default)]
    pub struct FakeClock {
        cues: Mutex<HashMap<String, f64>>,
    }

    impl FakeClock {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fire(&self, name: &str, since_secs: f64) {
            self.cues.lock().insert(name.to_string(), since_secs);
        }

        pub fn clear(&self, name: &str) {
            self.cues.lock().remove(name);
        }
    }

    impl CueClock for FakeClock {
        fn since_cue(&self, name: &str) -> f64 {
            self.cues.lock().get(name).copied().unwrap_or(-1.0)
        }
    }
}
