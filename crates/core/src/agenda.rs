use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Agenda describes the order of service and details of a performance.
///
/// It is supplied externally (served by the performance server at
/// `/agenda.json` or loaded from a local file) and is immutable for the
/// session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Agenda {
    pub title: String,
    pub cues: Vec<CueSpec>,
    pub rooms: Vec<RoomSpec>,
}

/// A named point in the performance timeline, with the server-generated ID
/// used to trigger it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CueSpec {
    pub id: String,
    pub name: String,
}

/// A virtual room in which audio may be played.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomSpec {
    pub id: String,
    pub name: String,
    pub label_text: String,
    pub sources: Vec<SourceSpec>,
}

/// A unique audio sequence emanating from a location in the room.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSpec {
    pub id: String,
    pub name: String,
    pub location: Point,
    pub tracks: Vec<TrackSpec>,
}

/// 3-dimensional coordinate of a source within its room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A single set of potentially-cued audio files.
///
/// `audio_files` lists the same content in alternative formats; playback
/// uses whichever it can decode. `load_cue` optionally defers loading until
/// a preceding cue, and `kill_cue` tears the track down whether or not it
/// has finished.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackSpec {
    pub id: String,
    pub cue: String,
    pub audio_files: Vec<String>,
    pub load_cue: Option<String>,
    pub load_window: f64,
    pub kill_cue: Option<String>,
    pub repeat: bool,
}

#[derive(Debug)]
pub enum AgendaError {
    ReadError(String),
    ParseError(String),
}

impl std::fmt::Display for AgendaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgendaError::ReadError(msg) => write!(f, "Failed to read agenda: {}", msg),
            AgendaError::ParseError(msg) => write!(f, "Failed to parse agenda: {}", msg),
        }
    }
}

impl std::error::Error for AgendaError {}

impl Agenda {
    /// Load an agenda from a local JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Agenda, AgendaError> {
        let content = fs::read_to_string(path).map_err(|e| AgendaError::ReadError(e.to_string()))?;
        Agenda::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Agenda, AgendaError> {
        serde_json::from_str(content).map_err(|e| AgendaError::ParseError(e.to_string()))
    }

    /// Fetch the agenda served by a performance server.
    pub async fn fetch(client: &reqwest::Client, base_url: &str) -> anyhow::Result<Agenda> {
        let url = format!("{}/agenda.json", base_url.trim_end_matches('/'));
        let agenda = client
            .get(&url)
            .send()
            .await
            .context("failed to retrieve agenda")?
            .error_for_status()
            .context("agenda request rejected")?
            .json::<Agenda>()
            .await
            .context("failed to decode agenda")?;
        Ok(agenda)
    }

    pub fn room(&self, name: &str) -> Option<&RoomSpec> {
        self.rooms.iter().find(|r| r.name == name)
    }

    /// Resolve a human-friendly cue name to its server-generated ID.
    pub fn cue_id(&self, name: &str) -> Option<&str> {
        self.cues
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id.as_str())
    }
}
