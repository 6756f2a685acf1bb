use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use rodio::OutputStream;
use showsync_core::{
    attach, find_cue_id, trigger_cue, Agenda, CueClock, MediaTransport, PerformanceTimeClient,
    RodioPlayer, SchedulerConfig, SyncConfig, TrackScheduler, SLOT_COUNT,
};

/// Playback client for live performances, kept aligned to the cue timeline
/// broadcast by a performance server.
#[derive(Parser, Debug)]
#[command(name = "showsync")]
#[command(about = "Cue-synchronized playback client")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a room's sources in sync with the performance timeline
    Play {
        /// Base URL of the performance server
        #[arg(long, default_value = "http://localhost:3000")]
        server: String,

        /// Name of the room to play
        #[arg(long)]
        room: String,

        /// Load the agenda from a local JSON file instead of the server
        #[arg(long)]
        agenda: Option<PathBuf>,

        /// JSON file with sync tunables (tolerance, backoff, wake check)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory holding the performance's media files
        #[arg(long)]
        media_dir: Option<PathBuf>,
    },

    /// Trigger a cue by name on the performance server
    Trigger {
        /// Base URL of the performance server
        #[arg(long, default_value = "http://localhost:3000")]
        server: String,

        /// Name of the cue to trigger
        #[arg(long)]
        cue: String,

        /// Re-trigger every N seconds until interrupted
        #[arg(long)]
        repeat_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Args::parse().command {
        Command::Play {
            server,
            room,
            agenda,
            config,
            media_dir,
        } => run_play(server, room, agenda, config, media_dir).await,
        Command::Trigger {
            server,
            cue,
            repeat_secs,
        } => run_trigger(server, cue, repeat_secs).await,
    }
}

async fn run_play(
    server: String,
    room_name: String,
    agenda_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    media_dir: Option<PathBuf>,
) -> Result<(), anyhow::Error> {
    let mut config = match config_path {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };
    config.server_url = server;
    if let Some(dir) = media_dir {
        config.media_dir = dir;
    }

    let agenda = match agenda_path {
        Some(path) => Agenda::from_file(path)?,
        None => Agenda::fetch(&reqwest::Client::new(), &config.server_url).await?,
    };
    let room = agenda
        .room(&room_name)
        .with_context(|| format!("room {} not found in agenda", room_name))?;
    log::info!(
        "playing room {} ({} sources) against {}",
        room.name,
        room.sources.len(),
        config.server_url
    );

    let (_stream, stream_handle) = OutputStream::try_default()
        .map_err(|e| anyhow::anyhow!("failed to open audio output stream: {}", e))?;

    let client = Arc::new(PerformanceTimeClient::new(
        config.ws_url(),
        Duration::from_millis(config.reconnect_backoff_ms),
    ));

    for source in &room.sources {
        let media: [Box<dyn MediaTransport>; SLOT_COUNT] = [
            Box::new(RodioPlayer::new(
                stream_handle.clone(),
                config.media_dir.clone(),
            )),
            Box::new(RodioPlayer::new(
                stream_handle.clone(),
                config.media_dir.clone(),
            )),
        ];
        let scheduler = Arc::new(Mutex::new(TrackScheduler::new(
            Arc::clone(&client) as Arc<dyn CueClock>,
            source.clone(),
            media,
            SchedulerConfig::from(&config),
        )));
        attach(&client, scheduler);
    }

    client.connect();

    tokio::signal::ctrl_c().await?;
    log::info!("shutting down");
    client.shutdown();

    Ok(())
}

async fn run_trigger(
    server: String,
    cue_name: String,
    repeat_secs: Option<u64>,
) -> Result<(), anyhow::Error> {
    let http = reqwest::Client::new();

    let cue_id = find_cue_id(&http, &server, &cue_name).await?;

    trigger_cue(&http, &server, &cue_id).await?;
    log::info!("triggered cue {} ({})", cue_name, cue_id);

    let Some(secs) = repeat_secs else {
        return Ok(());
    };

    let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
    interval.tick().await; // first tick fires immediately
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = interval.tick() => {
                match trigger_cue(&http, &server, &cue_id).await {
                    Ok(()) => log::info!("triggered cue {} ({})", cue_name, cue_id),
                    Err(err) => log::error!("failed to trigger cue: {}", err),
                }
            }
        }
    }
}
