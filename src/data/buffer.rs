use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver};
use log::{debug, error};

use super::error::PipelineError;
use super::generator::{SpectrogramGenerator, Step};
use super::model::Tile;
use super::render::Renderer;

/// A generator running on its own thread, at most `capacity` tiles ahead of
/// the consumer.
///
/// Dropping the consumer side stops the worker after the file it is
/// currently rendering. Once the stream has ended, [`BufferedTiles::fault`]
/// tells a clean end from one caused by a non-file-level error.
pub struct BufferedTiles {
    rx: Option<Receiver<Tile>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<Option<PipelineError>>>,
    fault: Option<PipelineError>,
    file_count: usize,
}

impl<R> SpectrogramGenerator<R>
where
    R: Renderer + Send + 'static,
{
    /// Move production onto a worker thread behind a bounded channel of
    /// `options().max_buffered` tiles.
    pub fn into_buffered(self) -> std::io::Result<BufferedTiles> {
        let capacity = self.options().max_buffered.max(1);
        let file_count = self.file_count();
        let (tx, rx) = bounded(capacity);
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let mut generator = self;

        let worker = std::thread::Builder::new()
            .name("spectrogram-producer".to_string())
            .spawn(move || {
                while !worker_stop.load(Ordering::Relaxed) {
                    match generator.step() {
                        Step::Tile(tile) => {
                            if tx.send(tile).is_err() {
                                break;
                            }
                        }
                        Step::Continue => {}
                        Step::End => break,
                    }
                }
                if let Some(fault) = generator.fault() {
                    error!("tile producer stopped: {fault}");
                }
                debug!("tile producer finished: {:?}", generator.stats());
                generator.take_fault()
            })?;

        Ok(BufferedTiles {
            rx: Some(rx),
            stop,
            worker: Some(worker),
            fault: None,
            file_count,
        })
    }
}

impl BufferedTiles {
    pub fn file_count(&self) -> usize {
        self.file_count
    }

    /// The non-file-level error that ended the stream, if any. Only known
    /// after `next()` has returned `None`.
    pub fn fault(&self) -> Option<&PipelineError> {
        self.fault.as_ref()
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(fault) => self.fault = fault,
                Err(_) => error!("tile producer panicked"),
            }
        }
    }
}

impl Iterator for BufferedTiles {
    type Item = Tile;

    fn next(&mut self) -> Option<Tile> {
        match self.rx.as_ref()?.recv() {
            Ok(tile) => Some(tile),
            Err(_) => {
                // The worker dropped its sender, so it is done or about to be.
                self.rx.take();
                self.join_worker();
                None
            }
        }
    }
}

impl Drop for BufferedTiles {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Disconnect first so a worker blocked on a full channel wakes up.
        self.rx.take();
        self.join_worker();
    }
}
