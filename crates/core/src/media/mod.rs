pub mod rodio_player;

/// Notifications a media backend delivers back to its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    /// A previously requested seek has completed.
    Seeked,
    /// Track metadata (notably duration) became available after a load.
    LoadedMetadata,
    /// More of the track has buffered.
    Progress,
}

/// Playback contract a track slot drives.
///
/// Implementations wrap whatever library actually produces sound behind an
/// owned adapter; the scheduler never touches the third-party type directly.
/// Failures (a missing file, an output device refusing playback) are logged
/// by the implementation and surface only as "not loaded" or a stale
/// position; the scheduler then keeps the slot silent and retries on the
/// next triggering event.
pub trait MediaTransport: Send {
    /// Replace the slot's source material. Implicitly unloads.
    fn set_source(&mut self, audio_files: &[String]);

    /// Begin loading the current source material.
    ///
    /// Returns true when the media and its metadata are already usable on
    /// return. Backends that load in the background return false and deliver
    /// [`MediaEvent::LoadedMetadata`] once ready.
    fn load(&mut self) -> bool;

    /// Release the loaded media immediately.
    fn unload(&mut self);

    fn play(&mut self);

    fn pause(&mut self);

    /// Jump playback to the given position (seconds from track start).
    ///
    /// Returns true when the new position is already in effect on return.
    /// Backends that seek in the background return false and deliver
    /// [`MediaEvent::Seeked`] once the seek lands.
    fn seek(&mut self, position_secs: f64) -> bool;

    fn set_volume(&mut self, volume: f32);

    /// Current playback position in seconds; `0.0` when nothing is loaded.
    fn current_time(&self) -> f64;

    /// Total track length in seconds, if known yet.
    fn duration(&self) -> Option<f64>;

    fn is_loaded(&self) -> bool;
}
