pub use agenda::{Agenda, AgendaError, CueSpec, Point, RoomSpec, SourceSpec, TrackSpec};
pub use clock::announcement::{Announcement, CuePoint, TimePoint, CUE_NOTIFICATION};
pub use clock::epoch_ms_now;
pub use clock::performance_time::{
    ConnectionState, PerformanceTimeClient, CUE_CHANGE, TIME_SYNC,
};
pub use clock::resolver::{latest_cued_track, since_latest_track_cue, CueClock};
pub use config::{ConfigError, SyncConfig};
pub use events::{EventBus, SubscriptionId};
pub use media::rodio_player::RodioPlayer;
pub use media::{MediaEvent, MediaTransport};
pub use scheduler::scheduler::{SchedulerConfig, TrackScheduler, SLOT_COUNT};
pub use scheduler::track_slot::TrackSlot;
pub use scheduler::attach;
pub use trigger::{find_cue_id, trigger_cue};

mod agenda;
mod clock;
mod config;
mod events;
mod media;
mod scheduler;
mod trigger;
