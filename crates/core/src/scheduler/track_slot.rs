use crate::agenda::TrackSpec;
use crate::media::MediaTransport;

/// One of a source's two rotating playback buffers.
///
/// Slots are created once when the scheduler attaches to a source and live
/// for the whole session; only their bound track changes. Keeping two lets
/// the next cue's track be armed while the current one is still audible, so
/// a cue change never waits on a load.
pub struct TrackSlot {
    bound: Option<TrackSpec>,
    pub(crate) media: Box<dyn MediaTransport>,
    loaded: bool,
}

impl TrackSlot {
    pub fn new(media: Box<dyn MediaTransport>) -> Self {
        Self {
            bound: None,
            media,
            loaded: false,
        }
    }

    /// The cue of the track currently bound to this slot, if any.
    pub fn bound_cue(&self) -> Option<&str> {
        self.bound.as_ref().map(|t| t.cue.as_str())
    }

    pub(crate) fn bound(&self) -> Option<&TrackSpec> {
        self.bound.as_ref()
    }

    pub(crate) fn rebind(&mut self, track: TrackSpec, loaded: bool) {
        self.bound = Some(track);
        self.loaded = loaded;
    }

    /// Whether a load has been triggered for the bound track.
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub(crate) fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }
}
