use serde::Deserialize;

/// Announcement cause indicating that a specific cue has just been triggered.
/// Any other cause is treated as a periodic timing heartbeat.
pub const CUE_NOTIFICATION: &str = "cue";

/// One cue and its time offset as carried on the wire.
///
/// The server reports an offset (seconds elapsed since the cue fired at send
/// time) rather than a timestamp so that clients need not be time-synchronized
/// to the server.
#[derive(Debug, Clone, Deserialize)]
pub struct TimePoint {
    pub cue: String,
    #[serde(default)]
    pub offset: f64,
}

/// A performance time broadcast from the server.
#[derive(Debug, Clone, Deserialize)]
pub struct Announcement {
    #[serde(default)]
    pub cause: String,
    #[serde(default)]
    pub time_points: Vec<TimePoint>,
}

/// A cue's occurrence, reconstructed to local wall-clock time at receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuePoint {
    pub name: String,
    pub occurred_at_epoch_ms: i64,
}

impl Announcement {
    /// Parse a raw broadcast body. Malformed messages yield `None` and are
    /// dropped by the caller without any state change.
    pub fn decode(raw: &str) -> Option<Announcement> {
        match serde_json::from_str(raw) {
            Ok(announcement) => Some(announcement),
            Err(err) => {
                log::debug!("dropping malformed announcement: {}", err);
                None
            }
        }
    }

    pub fn is_cue_trigger(&self) -> bool {
        self.cause == CUE_NOTIFICATION
    }

    /// Convert the announcement's time points into cue points anchored to the
    /// receipt time. Duplicated cue names keep only the last occurrence, in
    /// broadcast order, so the final entry is always the most recently
    /// announced cue.
    pub fn cue_points(&self, received_at_epoch_ms: i64) -> Vec<CuePoint> {
        let mut points: Vec<CuePoint> = Vec::with_capacity(self.time_points.len());

        for tp in &self.time_points {
            points.retain(|p| p.name != tp.cue);
            points.push(CuePoint {
                name: tp.cue.clone(),
                occurred_at_epoch_ms: received_at_epoch_ms - (tp.offset * 1000.0) as i64,
            });
        }

        points
    }
}
