pub mod scheduler;
pub mod track_slot;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::epoch_ms_now;
use crate::clock::performance_time::{PerformanceTimeClient, CUE_CHANGE, TIME_SYNC};
use crate::scheduler::scheduler::TrackScheduler;

/// Wire a scheduler into a performance time client's event fan-out.
///
/// The scheduler resolves its initial track on the first time sync, then
/// reacts to every cue change and heartbeat for the rest of the session.
pub fn attach(client: &PerformanceTimeClient, scheduler: Arc<Mutex<TrackScheduler>>) {
    let s = Arc::clone(&scheduler);
    client.on(TIME_SYNC, move || s.lock().on_time_sync(epoch_ms_now()));

    let s = Arc::clone(&scheduler);
    client.on(CUE_CHANGE, move || s.lock().on_cue_change());

    client.once(TIME_SYNC, move || scheduler.lock().on_cue_change());
}
