use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use rodio::{Decoder, OutputStreamHandle, Sink, Source};

use crate::media::MediaTransport;

/// Local audio playback backend built on a rodio sink.
///
/// Each slot owns one player. The agenda lists the same content in several
/// formats; `load` walks the candidates and keeps the first file that opens
/// and decodes.
pub struct RodioPlayer {
    stream_handle: OutputStreamHandle,
    media_dir: PathBuf,
    audio_files: Vec<String>,
    sink: Option<Sink>,
    duration: Option<f64>,
    volume: f32,
}

impl RodioPlayer {
    pub fn new(stream_handle: OutputStreamHandle, media_dir: PathBuf) -> Self {
        Self {
            stream_handle,
            media_dir,
            audio_files: Vec::new(),
            sink: None,
            duration: None,
            volume: 0.0,
        }
    }

    fn try_load_file(&mut self, file: &str) -> Result<(), String> {
        let path = self.media_dir.join(file);

        let handle = File::open(&path)
            .map_err(|e| format!("failed to open {}: {}", path.display(), e))?;
        let source = Decoder::new(BufReader::new(handle))
            .map_err(|e| format!("failed to decode {}: {}", path.display(), e))?;

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| format!("failed to create audio sink: {}", e))?;

        self.duration = source.total_duration().map(|d| d.as_secs_f64());

        sink.pause();
        sink.set_volume(self.volume);
        sink.append(source);
        self.sink = Some(sink);

        Ok(())
    }
}

impl MediaTransport for RodioPlayer {
    fn set_source(&mut self, audio_files: &[String]) {
        self.unload();
        self.audio_files = audio_files.to_vec();
    }

    fn load(&mut self) -> bool {
        self.unload();

        for file in self.audio_files.clone() {
            match self.try_load_file(&file) {
                Ok(()) => {
                    log::debug!("loaded media {}", file);
                    // Decoding happens inline, so the media is ready now.
                    return true;
                }
                Err(err) => log::warn!("{}", err),
            }
        }

        log::error!(
            "no loadable media among {:?} in {}",
            self.audio_files,
            self.media_dir.display()
        );
        false
    }

    fn unload(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.duration = None;
    }

    fn play(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn seek(&mut self, position_secs: f64) -> bool {
        if let Some(sink) = &self.sink {
            let target = std::time::Duration::from_secs_f64(position_secs.max(0.0));
            match sink.try_seek(target) {
                Ok(()) => return true,
                Err(err) => {
                    log::warn!("media seek to {:.2}s failed: {}", position_secs, err);
                }
            }
        }
        false
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    fn current_time(&self) -> f64 {
        self.sink
            .as_ref()
            .map(|s| s.get_pos().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn is_loaded(&self) -> bool {
        self.sink.is_some()
    }
}
