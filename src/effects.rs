//! Side effects requested by the engine. Detectors never perform them; the
//! engine returns `SideEffect`s and the boundary hands them to a
//! `Dispatcher`, which runs them on its own thread.

use crate::alert::{Alert, AlertType};
use crate::error::Error;

use crossbeam_channel::{bounded, Sender, TrySendError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    PlaySound(AlertType),
    Notify(Alert),
}

pub trait AudioPlayer: Send {
    fn play(&mut self, alert_type: AlertType) -> Result<(), Error>;
}

/// Persistence / broadcast channel for emitted alerts.
pub trait AlertSink: Send {
    fn deliver(&mut self, alert: &Alert) -> Result<(), Error>;
}

/// Plays `<sounds_dir>/<type>_alert.mp3` with the platform's command line
/// player. Playback is not awaited.
#[derive(Debug)]
pub struct SoundPlayer {
    sounds_dir: PathBuf,
    children: Vec<Child>,
}

impl SoundPlayer {
    pub fn new<P: AsRef<Path>>(sounds_dir: P) -> Self {
        Self {
            sounds_dir: sounds_dir.as_ref().to_path_buf(),
            children: Vec::new(),
        }
    }

    pub fn sound_path(&self, alert_type: AlertType) -> PathBuf {
        self.sounds_dir
            .join(format!("{}_alert.mp3", alert_type.as_str()))
    }

    fn reap(&mut self) {
        self.children
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));
    }
}

impl AudioPlayer for SoundPlayer {
    fn play(&mut self, alert_type: AlertType) -> Result<(), Error> {
        self.reap();

        let path = self.sound_path(alert_type);
        if !path.exists() {
            warn!(path = %path.display(), "sound file not found");
            return Ok(());
        }

        let program = if cfg!(target_os = "macos") {
            "afplay"
        } else {
            "mpg123"
        };

        info!(alert_type = alert_type.as_str(), "playing alert sound");

        let child = Command::new(program)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        self.children.push(child);

        Ok(())
    }
}

/// Writes every alert as one JSON line.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> AlertSink for JsonLinesSink<W> {
    fn deliver(&mut self, alert: &Alert) -> Result<(), Error> {
        serde_json::to_writer(&mut self.writer, alert)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        Ok(())
    }
}

/// Background executor for side effects. Requests are queued without
/// blocking; a full queue drops the request.
pub struct Dispatcher {
    tx: Option<Sender<SideEffect>>,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn spawn(
        mut audio: Option<Box<dyn AudioPlayer>>,
        mut sink: Option<Box<dyn AlertSink>>,
        capacity: usize,
    ) -> Result<Self, Error> {
        let (tx, rx) = bounded::<SideEffect>(capacity.max(1));

        let handle = std::thread::Builder::new()
            .name("qwatch-effects".to_string())
            .spawn(move || {
                for effect in rx {
                    match effect {
                        SideEffect::PlaySound(alert_type) => {
                            if let Some(audio) = audio.as_mut() {
                                if let Err(err) = audio.play(alert_type) {
                                    warn!(%err, alert_type = alert_type.as_str(), "audio alert failed");
                                }
                            }
                        }
                        SideEffect::Notify(alert) => {
                            if let Some(sink) = sink.as_mut() {
                                if let Err(err) = sink.deliver(&alert) {
                                    warn!(%err, alert_id = %alert.id, "alert delivery failed");
                                }
                            }
                        }
                    }
                }

                debug!("side effect dispatcher stopped");
            })?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn dispatch(&self, effect: SideEffect) {
        let Some(tx) = &self.tx else {
            return;
        };

        match tx.try_send(effect) {
            Ok(()) => {}
            Err(TrySendError::Full(effect)) => {
                warn!(?effect, "side effect queue full, dropping request")
            }
            Err(TrySendError::Disconnected(_)) => warn!("side effect dispatcher is gone"),
        }
    }

    pub fn dispatch_all<I: IntoIterator<Item = SideEffect>>(&self, effects: I) {
        for effect in effects {
            self.dispatch(effect);
        }
    }

    /// Runs the queued requests to completion and stops the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.tx.take();

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("side effect dispatcher panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
