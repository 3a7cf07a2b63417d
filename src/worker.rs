use crate::alert::AlertLog;
use crate::config::ConfigHandle;
use crate::detector::Detector;
use crate::effects::Dispatcher;
use crate::engine::{Engine, FrameOutput};
use crate::error::Error;

use crossbeam_channel::{bounded, never, Receiver, Sender, TrySendError};
use image::RgbImage;
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// The single frame-processing thread. Frames are handled strictly in the
/// order they were submitted and every output is delivered; a full output
/// queue holds the worker back until the consumer catches up. Side effects
/// go to the optional dispatcher so they never hold up the next frame.
pub struct Worker {
    input: Option<Sender<RgbImage>>,
    output: Receiver<FrameOutput>,
    config: ConfigHandle,
    handle: Option<JoinHandle<AlertLog>>,
}

impl Worker {
    pub fn spawn<D>(
        mut engine: Engine<D>,
        capacity: usize,
        dispatcher: Option<Dispatcher>,
    ) -> Result<Self, Error>
    where
        D: Detector + Send + 'static,
    {
        let (input, frames) = bounded::<RgbImage>(capacity.max(1));
        let (results, output) = bounded::<FrameOutput>(capacity.max(1));
        let config = engine.config().clone();

        let handle = std::thread::Builder::new()
            .name("qwatch-frames".to_string())
            .spawn(move || {
                for frame in frames {
                    let out = engine.process_frame(frame);

                    if let Some(dispatcher) = &dispatcher {
                        dispatcher.dispatch_all(out.effects.iter().cloned());
                    }

                    if results.send(out).is_err() {
                        debug!("output receiver gone, stopping frame worker");
                        break;
                    }
                }

                if let Some(dispatcher) = dispatcher {
                    dispatcher.shutdown();
                }

                debug!(frames = engine.frames_processed(), "frame worker stopped");

                engine.alerts().clone()
            })?;

        Ok(Self {
            input: Some(input),
            output,
            config,
            handle: Some(handle),
        })
    }

    /// Live configuration shared with the worker thread.
    #[inline]
    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Blocks while the input queue is full.
    pub fn submit(&self, frame: RgbImage) -> Result<(), Error> {
        let input = self.input.as_ref().ok_or(Error::ChannelClosed)?;

        input.send(frame).map_err(|_| Error::ChannelClosed)
    }

    /// Returns `false` if the queue is full and the frame was dropped.
    pub fn try_submit(&self, frame: RgbImage) -> Result<bool, Error> {
        let input = self.input.as_ref().ok_or(Error::ChannelClosed)?;

        match input.try_send(frame) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(Error::ChannelClosed),
        }
    }

    #[inline]
    pub fn output(&self) -> &Receiver<FrameOutput> {
        &self.output
    }

    pub fn recv(&self) -> Option<FrameOutput> {
        self.output.recv().ok()
    }

    /// Stops accepting frames, processes the queued ones and returns the
    /// outputs not yet received together with the engine's alert log.
    pub fn finish(mut self) -> Result<(Vec<FrameOutput>, AlertLog), Error> {
        self.input.take();

        // the worker ends once input is drained, which disconnects the output
        let pending: Vec<FrameOutput> = self.output.iter().collect();

        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map(|log| (pending, log))
                .map_err(|_| {
                    warn!("frame worker panicked");
                    Error::ChannelClosed
                }),
            None => Err(Error::ChannelClosed),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.input.take();
        // unblocks a worker waiting on a full output queue
        self.output = never();

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("frame worker panicked");
            }
        }
    }
}
