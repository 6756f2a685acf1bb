use std::sync::Arc;

use crate::agenda::{SourceSpec, TrackSpec};
use crate::clock::resolver::{latest_cued_track, CueClock};
use crate::config::SyncConfig;
use crate::media::{MediaEvent, MediaTransport};
use crate::scheduler::track_slot::TrackSlot;

/// Number of rotating playback buffers per source.
pub const SLOT_COUNT: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Maximum drift (seconds) between performance time and media position
    /// before a force-reseek. Exceeding the tolerance reseeks; exactly
    /// meeting it does not.
    pub sync_tolerance_secs: f64,

    /// Gap between consecutive time syncs (milliseconds) beyond which the
    /// scheduler assumes the host slept and re-resolves the active track.
    pub wake_check_interval_ms: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_tolerance_secs: 3.0,
            wake_check_interval_ms: 6000,
        }
    }
}

impl From<&SyncConfig> for SchedulerConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            sync_tolerance_secs: config.sync_tolerance_secs,
            wake_check_interval_ms: config.wake_check_interval_ms,
        }
    }
}

/// Double-buffered track controller for one source.
///
/// Reacts to performance time events by resolving which of the source's
/// tracks is active and driving the two slots' media so that exactly the
/// active one is audible, seeked to the cue's elapsed time. Every guard
/// fails toward silence: a slot that cannot prove it is in sync is muted or
/// paused, never left audibly misaligned.
pub struct TrackScheduler {
    clock: Arc<dyn CueClock>,
    source: SourceSpec,
    slots: [TrackSlot; SLOT_COUNT],
    config: SchedulerConfig,
    active_cue: Option<String>,
    last_sync_ms: Option<i64>,
}

impl TrackScheduler {
    pub fn new(
        clock: Arc<dyn CueClock>,
        source: SourceSpec,
        media: [Box<dyn MediaTransport>; SLOT_COUNT],
        config: SchedulerConfig,
    ) -> Self {
        let [a, b] = media;
        Self {
            clock,
            source,
            slots: [TrackSlot::new(a), TrackSlot::new(b)],
            config,
            active_cue: None,
            last_sync_ms: None,
        }
    }

    pub fn source(&self) -> &SourceSpec {
        &self.source
    }

    pub fn slot(&self, ix: usize) -> &TrackSlot {
        &self.slots[ix]
    }

    /// Handle a cue-trigger broadcast (and the first time sync, which seeds
    /// the initial binding).
    ///
    /// Resolves the active track; if neither slot holds its cue, the slot
    /// *not* bound to the previously active cue is rebound, leaving the old
    /// track briefly available for a graceful tail-out. The other slot is
    /// armed with the next track in script order. Both slots then resync
    /// independently; at most one ends up audible.
    pub fn on_cue_change(&mut self) {
        let Some(track) = latest_cued_track(&*self.clock, &self.source).cloned() else {
            log::debug!("source {}: no cued track yet", self.source.name);
            return;
        };

        if self.slot_bound_to(&track.cue).is_none() {
            let victim = self.stale_slot();
            log::info!(
                "source {}: cue change to {}; rebinding slot {}",
                self.source.name,
                track.cue,
                victim
            );
            self.bind_slot(victim, &track);
        }
        self.active_cue = Some(track.cue.clone());

        self.prearm_next(&track);

        for ix in 0..SLOT_COUNT {
            self.slots[ix].media.set_volume(0.0);
            self.apply(ix);
        }
    }

    /// Handle a timing heartbeat.
    ///
    /// A gap larger than the wake-check interval since the previous sync
    /// means the host was suspended; the active track may have changed while
    /// we slept, so run the full cue-change path instead of a plain resync.
    pub fn on_time_sync(&mut self, now_ms: i64) {
        let woke = self
            .last_sync_ms
            .is_some_and(|last| now_ms - last > self.config.wake_check_interval_ms);
        self.last_sync_ms = Some(now_ms);

        if woke {
            log::info!("source {}: resyncing after wake", self.source.name);
            self.on_cue_change();
            return;
        }

        for ix in 0..SLOT_COUNT {
            self.apply(ix);
        }
    }

    /// Handle a notification from one slot's media backend.
    pub fn on_media_event(&mut self, ix: usize, event: MediaEvent) {
        match event {
            MediaEvent::Seeked | MediaEvent::LoadedMetadata => self.apply(ix),
            MediaEvent::Progress => {}
        }
    }

    /// Reconcile one slot against performance time.
    ///
    /// Returns true when the slot is in sync and allowed to be audible. A
    /// false return always leaves the slot silent (paused, muted, or
    /// unloaded); the next triggering event retries.
    pub fn resync(&mut self, ix: usize) -> bool {
        let Some(track) = self.slots[ix].bound().cloned() else {
            return false;
        };

        // Kill cue tears the track down regardless of sync state.
        if let Some(kill) = nonempty(&track.kill_cue) {
            if self.clock.since_cue(kill) >= 0.0 {
                let slot = &mut self.slots[ix];
                if slot.media.is_loaded() {
                    log::info!(
                        "source {}: kill cue {} fired; unloading {}",
                        self.source.name,
                        kill,
                        track.cue
                    );
                    slot.media.unload();
                }
                slot.set_loaded(false);
                return false;
            }
        }

        // Deferred load: the load cue has fired but no load has been
        // triggered yet. Trigger it; a backend that finishes inline keeps
        // reconciling, otherwise wait for its LoadedMetadata notification.
        if !self.slots[ix].loaded() {
            if let Some(load) = nonempty(&track.load_cue) {
                if self.clock.since_cue(load) >= 0.0 {
                    let slot = &mut self.slots[ix];
                    let ready = slot.media.load();
                    slot.set_loaded(true);
                    if !ready {
                        return false;
                    }
                }
            }
        }

        let elapsed = self.clock.since_cue(&track.cue);
        if elapsed < 0.0 {
            // Not yet cued.
            self.slots[ix].media.pause();
            return false;
        }

        let owner = latest_cued_track(&*self.clock, &self.source).map(|t| t.cue.clone());
        if owner.as_deref() != Some(track.cue.as_str()) {
            // Superseded by another track.
            self.slots[ix].media.pause();
            return false;
        }

        let slot = &mut self.slots[ix];

        if let Some(duration) = slot.media.duration() {
            if elapsed > duration {
                // Track has already ended.
                slot.media.pause();
                return false;
            }
        }

        let drift = (elapsed - slot.media.current_time()).abs();
        if drift > self.config.sync_tolerance_secs {
            log::info!(
                "source {}: out of sync by {:.2}s; reseeking",
                self.source.name,
                drift
            );
            slot.media.set_volume(0.0);
            // A backend that seeks inline is at the target position now and
            // may go audible; otherwise stay silent until its Seeked
            // notification re-applies.
            return slot.media.seek(elapsed);
        }

        true
    }

    /// Resync one slot and make it audible if and only if it is in sync.
    fn apply(&mut self, ix: usize) {
        if self.resync(ix) {
            let slot = &mut self.slots[ix];
            slot.media.set_volume(1.0);
            slot.media.play();
        }
    }

    fn slot_bound_to(&self, cue: &str) -> Option<usize> {
        (0..SLOT_COUNT).find(|&ix| self.slots[ix].bound_cue() == Some(cue))
    }

    /// The slot safe to rebind: the one not holding the previously active cue.
    fn stale_slot(&self) -> usize {
        if let Some(active) = self.active_cue.as_deref() {
            if self.slots[0].bound_cue() == Some(active) {
                return 1;
            }
            if self.slots[1].bound_cue() == Some(active) {
                return 0;
            }
        }
        0
    }

    /// Arm the non-active slot with the track following the active one in
    /// script order, so the usual forward transition is already loaded.
    fn prearm_next(&mut self, active: &TrackSpec) {
        let Some(pos) = self.source.tracks.iter().position(|t| t.cue == active.cue) else {
            return;
        };
        let Some(next) = self.source.tracks.get(pos + 1).cloned() else {
            return;
        };
        if self.slot_bound_to(&next.cue).is_some() {
            return;
        }
        let Some(active_ix) = self.slot_bound_to(&active.cue) else {
            return;
        };
        self.bind_slot(1 - active_ix, &next);
    }

    fn bind_slot(&mut self, ix: usize, track: &TrackSpec) {
        // Tracks with an unfired load cue stay unloaded; resync triggers the
        // load once that cue fires.
        let load_now = match nonempty(&track.load_cue) {
            Some(load) => self.clock.since_cue(load) >= 0.0,
            None => true,
        };

        log::debug!(
            "source {}: binding slot {} to cue {} (load_now: {})",
            self.source.name,
            ix,
            track.cue,
            load_now
        );

        let slot = &mut self.slots[ix];
        slot.media.set_volume(0.0);
        slot.media.set_source(&track.audio_files);
        if load_now {
            slot.media.load();
        }
        slot.rebind(track.clone(), load_now);
    }
}

/// The agenda serializes absent cues as empty strings; treat both as unset.
fn nonempty(cue: &Option<String>) -> Option<&str> {
    cue.as_deref().filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::clock::resolver::testing::FakeClock;

    /// Media backend whose state tests can inspect and preset.
    ///
    /// With `synchronous` set, loads and seeks report completion on return,
    /// like the rodio backend; unset, they report pending completion, like a
    /// backend that streams in the background.
    #[derive(Default)]
    struct FakeMediaState {
        sources: Vec<String>,
        loaded: bool,
        playing: bool,
        volume: f32,
        current_time: f64,
        duration: Option<f64>,
        seeks: Vec<f64>,
        loads: usize,
        unloads: usize,
        synchronous: bool,
    }

    #[derive(Clone, Default)]
    struct FakeMedia(Arc<Mutex<FakeMediaState>>);

    impl FakeMedia {
        fn state(&self) -> parking_lot::MutexGuard<'_, FakeMediaState> {
            self.0.lock()
        }
    }

    impl MediaTransport for FakeMedia {
        fn set_source(&mut self, audio_files: &[String]) {
            let mut s = self.0.lock();
            s.sources = audio_files.to_vec();
            s.loaded = false;
            s.playing = false;
        }

        fn load(&mut self) -> bool {
            let mut s = self.0.lock();
            s.loaded = true;
            s.loads += 1;
            s.synchronous
        }

        fn unload(&mut self) {
            let mut s = self.0.lock();
            s.loaded = false;
            s.playing = false;
            s.unloads += 1;
        }

        fn play(&mut self) {
            self.0.lock().playing = true;
        }

        fn pause(&mut self) {
            self.0.lock().playing = false;
        }

        fn seek(&mut self, position_secs: f64) -> bool {
            let mut s = self.0.lock();
            s.seeks.push(position_secs);
            s.current_time = position_secs;
            s.synchronous
        }

        fn set_volume(&mut self, volume: f32) {
            self.0.lock().volume = volume;
        }

        fn current_time(&self) -> f64 {
            self.0.lock().current_time
        }

        fn duration(&self) -> Option<f64> {
            self.0.lock().duration
        }

        fn is_loaded(&self) -> bool {
            self.0.lock().loaded
        }
    }

    fn track(cue: &str) -> TrackSpec {
        TrackSpec {
            cue: cue.to_string(),
            audio_files: vec![format!("{}.webm", cue)],
            ..TrackSpec::default()
        }
    }

    fn source(tracks: Vec<TrackSpec>) -> SourceSpec {
        SourceSpec {
            id: "s1".to_string(),
            name: "strings".to_string(),
            tracks,
            ..SourceSpec::default()
        }
    }

    fn scheduler(
        clock: &Arc<FakeClock>,
        source: SourceSpec,
    ) -> (TrackScheduler, FakeMedia, FakeMedia) {
        let a = FakeMedia::default();
        let b = FakeMedia::default();
        let scheduler = TrackScheduler::new(
            Arc::clone(clock) as Arc<dyn CueClock>,
            source,
            [Box::new(a.clone()), Box::new(b.clone())],
            SchedulerConfig::default(),
        );
        (scheduler, a, b)
    }

    #[test]
    fn test_first_cue_binds_loads_and_plays() {
        let clock = Arc::new(FakeClock::new());
        let (mut sched, a, b) = scheduler(&clock, source(vec![track("A"), track("B")]));

        clock.fire("A", 1.0);
        sched.on_cue_change();

        assert_eq!(sched.slot(0).bound_cue(), Some("A"));
        // The other slot is armed with the next track in script order.
        assert_eq!(sched.slot(1).bound_cue(), Some("B"));

        let sa = a.state();
        assert!(sa.loaded);
        assert!(sa.playing);
        assert_eq!(sa.volume, 1.0);

        // B's cue has not fired, so its slot stays silent.
        let sb = b.state();
        assert!(!sb.playing);
        assert_eq!(sb.volume, 0.0);
    }

    #[test]
    fn test_cue_change_rebinds_the_stale_slot() {
        let clock = Arc::new(FakeClock::new());
        let (mut sched, a, b) =
            scheduler(&clock, source(vec![track("A"), track("B"), track("C")]));

        clock.fire("A", 1.0);
        sched.on_cue_change();
        assert_eq!(sched.slot(0).bound_cue(), Some("A"));
        assert_eq!(sched.slot(1).bound_cue(), Some("B"));

        // B fires: slot 1 already holds it, slot 0 (the stale one) pre-arms C.
        clock.fire("B", 0.0);
        sched.on_cue_change();
        assert_eq!(sched.slot(1).bound_cue(), Some("B"));
        assert_eq!(sched.slot(0).bound_cue(), Some("C"));

        assert!(b.state().playing);
        // The superseded track is paused, never left audible.
        assert!(!a.state().playing);
    }

    #[test]
    fn test_rewind_reactivates_earlier_track() {
        let clock = Arc::new(FakeClock::new());
        let (mut sched, a, b) = scheduler(&clock, source(vec![track("A"), track("B")]));

        // B fired more recently than A, so B's track starts out active.
        clock.fire("A", 10.0);
        clock.fire("B", 2.0);
        sched.on_cue_change();
        assert_eq!(sched.slot(0).bound_cue(), Some("B"));
        assert!(a.state().playing);

        // Operator re-fires A; it becomes authoritative again and lands in
        // the slot not holding the active cue.
        clock.fire("A", 0.0);
        sched.on_cue_change();
        assert_eq!(sched.slot(1).bound_cue(), Some("A"));
        assert!(b.state().playing);
        assert!(!a.state().playing);
    }

    #[test]
    fn test_resync_pauses_when_cue_not_fired() {
        let clock = Arc::new(FakeClock::new());
        let (mut sched, a, _b) = scheduler(&clock, source(vec![track("A")]));

        clock.fire("A", 1.0);
        sched.on_cue_change();
        assert!(a.state().playing);

        // History replaced without A: its elapsed time goes negative.
        clock.clear("A");
        assert!(!sched.resync(0));
        assert!(!a.state().playing);
    }

    #[test]
    fn test_resync_pauses_track_past_its_end() {
        let clock = Arc::new(FakeClock::new());
        let (mut sched, a, _b) = scheduler(&clock, source(vec![track("A")]));

        clock.fire("A", 1.0);
        sched.on_cue_change();
        a.state().duration = Some(90.0);

        clock.fire("A", 120.0);
        assert!(!sched.resync(0));
        assert!(!a.state().playing);
    }

    #[test]
    fn test_drift_above_tolerance_mutes_and_reseeks() {
        let clock = Arc::new(FakeClock::new());
        let (mut sched, a, _b) = scheduler(&clock, source(vec![track("A")]));

        clock.fire("A", 1.0);
        sched.on_cue_change();

        clock.fire("A", 10.0);
        a.state().current_time = 3.0; // drift of 7s

        assert!(!sched.resync(0));
        let s = a.state();
        assert_eq!(s.volume, 0.0);
        assert_eq!(s.seeks.last().copied(), Some(10.0));
    }

    #[test]
    fn test_drift_exactly_at_tolerance_does_not_reseek() {
        let clock = Arc::new(FakeClock::new());
        let (mut sched, a, _b) = scheduler(&clock, source(vec![track("A")]));

        clock.fire("A", 1.0);
        sched.on_cue_change();
        a.state().seeks.clear();

        clock.fire("A", 10.0);
        a.state().current_time = 7.0; // drift of exactly 3.0s

        assert!(sched.resync(0));
        assert!(a.state().seeks.is_empty());
    }

    #[test]
    fn test_seeked_event_resumes_audible_playback() {
        let clock = Arc::new(FakeClock::new());
        let (mut sched, a, _b) = scheduler(&clock, source(vec![track("A")]));

        clock.fire("A", 1.0);
        sched.on_cue_change();

        clock.fire("A", 10.0);
        a.state().current_time = 3.0;
        assert!(!sched.resync(0)); // reseek issued, still muted

        // The backend reports the seek landed; playback resumes audibly.
        sched.on_media_event(0, MediaEvent::Seeked);
        let s = a.state();
        assert!(s.playing);
        assert_eq!(s.volume, 1.0);
    }

    #[test]
    fn test_synchronous_seek_goes_audible_without_a_second_sync() {
        // A backend whose seek completes inline (like the rodio one) must
        // not sit muted waiting for the next heartbeat.
        let clock = Arc::new(FakeClock::new());
        let (mut sched, a, _b) = scheduler(&clock, source(vec![track("A")]));
        a.state().synchronous = true;

        clock.fire("A", 10.0);
        sched.on_cue_change();

        let s = a.state();
        assert_eq!(s.seeks.last().copied(), Some(10.0));
        assert!(s.playing);
        assert_eq!(s.volume, 1.0);
    }

    #[test]
    fn test_synchronous_load_goes_audible_in_the_same_sync() {
        let clock = Arc::new(FakeClock::new());
        let mut deferred = track("B");
        deferred.load_cue = Some("preshow".to_string());
        let (mut sched, _a, b) = scheduler(&clock, source(vec![track("A"), deferred]));
        b.state().synchronous = true;

        clock.fire("A", 1.0);
        sched.on_cue_change();
        assert!(!sched.slot(1).loaded());

        // The load cue and the track's own cue both fired while the slot sat
        // unloaded; one heartbeat loads and plays.
        clock.fire("preshow", 0.5);
        clock.fire("B", 0.0);
        sched.on_time_sync(1_000_000);

        let s = b.state();
        assert!(s.loaded);
        assert!(s.playing);
        assert_eq!(s.volume, 1.0);
    }

    #[test]
    fn test_kill_cue_unloads_immediately() {
        let clock = Arc::new(FakeClock::new());
        let mut killed = track("A");
        killed.kill_cue = Some("blackout".to_string());
        let (mut sched, a, _b) = scheduler(&clock, source(vec![killed]));

        clock.fire("A", 1.0);
        sched.on_cue_change();
        assert!(a.state().playing);

        clock.fire("blackout", 0.0);
        assert!(!sched.resync(0));
        let s = a.state();
        assert!(!s.loaded);
        assert_eq!(s.unloads, 1);
    }

    #[test]
    fn test_load_cue_defers_loading_until_fired() {
        let clock = Arc::new(FakeClock::new());
        let mut deferred = track("B");
        deferred.load_cue = Some("preshow".to_string());
        let (mut sched, a, b) = scheduler(&clock, source(vec![track("A"), deferred]));

        clock.fire("A", 1.0);
        sched.on_cue_change();

        // Slot 1 is armed with B but must not load before the load cue.
        assert_eq!(sched.slot(1).bound_cue(), Some("B"));
        assert!(!sched.slot(1).loaded());
        assert_eq!(b.state().loads, 0);
        assert_eq!(a.state().loads, 1);

        clock.fire("preshow", 0.0);
        assert!(!sched.resync(1)); // load triggered, not yet playable
        assert!(sched.slot(1).loaded());
        assert_eq!(b.state().loads, 1);
    }

    #[test]
    fn test_empty_cue_strings_are_treated_as_unset() {
        let clock = Arc::new(FakeClock::new());
        let mut t = track("A");
        t.load_cue = Some(String::new());
        t.kill_cue = Some(String::new());
        let (mut sched, a, _b) = scheduler(&clock, source(vec![t]));

        clock.fire("A", 1.0);
        sched.on_cue_change();

        assert!(a.state().loaded);
        assert!(a.state().playing);
    }

    #[test]
    fn test_wake_gap_reruns_cue_resolution() {
        let clock = Arc::new(FakeClock::new());
        let (mut sched, _a, b) = scheduler(&clock, source(vec![track("A"), track("B")]));

        clock.fire("A", 1.0);
        sched.on_cue_change();
        sched.on_time_sync(1_000_000);

        // While asleep the operator moved on to B.
        clock.fire("B", 0.5);
        clock.fire("A", 30.5);
        sched.on_time_sync(1_030_000);

        assert!(b.state().playing);
    }

    #[test]
    fn test_small_sync_gap_does_not_rebind() {
        let clock = Arc::new(FakeClock::new());
        let (mut sched, a, _b) = scheduler(&clock, source(vec![track("A")]));

        clock.fire("A", 1.0);
        sched.on_cue_change();
        let loads_before = a.state().loads;

        sched.on_time_sync(1_000_000);
        sched.on_time_sync(1_002_000);

        assert_eq!(a.state().loads, loads_before);
        assert!(a.state().playing);
    }

    #[test]
    fn test_no_cued_track_is_a_no_op() {
        let clock = Arc::new(FakeClock::new());
        let (mut sched, a, b) = scheduler(&clock, source(vec![track("A"), track("B")]));

        sched.on_cue_change();
        sched.on_time_sync(1_000_000);

        assert!(sched.slot(0).bound_cue().is_none());
        assert!(sched.slot(1).bound_cue().is_none());
        assert!(!a.state().playing);
        assert!(!b.state().playing);
    }
}
