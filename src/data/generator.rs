use std::path::{Path, PathBuf};

use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::discover::discover;
use super::error::{PipelineError, Result};
use super::model::{Tile, TileShape};
use super::render::Renderer;
use super::slice::{slice, Tiles};

/// Render and slice one file.
pub fn load_tiles<R: Renderer + ?Sized>(
    renderer: &R,
    path: &Path,
    pixels_per_second: u32,
    shape: TileShape,
) -> Result<Tiles> {
    let image = renderer.render(path, pixels_per_second, shape.height)?;
    slice(image, shape)
}

// ---------------------------------------------------------------------------
// Options and counters
// ---------------------------------------------------------------------------

/// Per-instance behaviour switches.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Reshuffle the file order each time the cursor wraps.
    pub shuffle: bool,
    /// Capacity of the channel used by [`SpectrogramGenerator::into_buffered`].
    pub max_buffered: usize,
    /// Stop after one full pass instead of cycling forever.
    pub run_only_once: bool,
    /// Seed for the shuffle; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            shuffle: false,
            max_buffered: 100,
            run_only_once: false,
            seed: None,
        }
    }
}

/// Running totals for one generator instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorStats {
    pub passes_completed: u64,
    pub files_attempted: u64,
    pub files_failed: u64,
    pub tiles_yielded: u64,
    pub tiles_discarded: u64,
}

// ---------------------------------------------------------------------------
// SpectrogramGenerator
// ---------------------------------------------------------------------------

enum State {
    /// Ready to render the file under the cursor.
    Advancing,
    /// Handing out tiles of the current file.
    Slicing(Tiles),
    /// Run-once pass finished, no files, or a fault ended the stream.
    Exhausted,
}

/// Outcome of a single state transition.
pub(crate) enum Step {
    Tile(Tile),
    Continue,
    End,
}

/// Endless (or single-pass) stream of spectrogram tiles over a file set.
///
/// Each call to [`Iterator::next`] does only the work needed to produce the
/// next tile: at most one render per file, one tile at a time. Render
/// failures and height mismatches are logged and cost only that file; the
/// file is retried on the next pass.
pub struct SpectrogramGenerator<R> {
    source: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    shape: TileShape,
    pixels_per_second: u32,
    options: GeneratorOptions,
    renderer: R,
    rng: StdRng,
    state: State,
    stats: GeneratorStats,
    fault: Option<PipelineError>,
}

impl<R: Renderer> SpectrogramGenerator<R> {
    /// Discover the files under `source` and prepare to stream them.
    pub fn new(
        source: impl AsRef<Path>,
        shape: TileShape,
        pixels_per_second: u32,
        options: GeneratorOptions,
        renderer: R,
    ) -> Result<Self> {
        if !shape.is_valid() {
            return Err(PipelineError::InvalidConfig(format!(
                "tile shape {shape} is not a non-empty mono shape"
            )));
        }
        if pixels_per_second == 0 {
            return Err(PipelineError::InvalidConfig(
                "pixels per second must be positive".to_string(),
            ));
        }

        let source = source.as_ref().to_path_buf();
        let files = discover(&source)?;
        if files.is_empty() {
            warn!("no audio files found under {}", source.display());
        } else {
            info!("{} audio files under {}", files.len(), source.display());
        }

        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(SpectrogramGenerator {
            source,
            files,
            cursor: 0,
            shape,
            pixels_per_second,
            options,
            renderer,
            rng,
            state: State::Advancing,
            stats: GeneratorStats::default(),
            fault: None,
        })
    }

    /// Number of files in one pass; used to size an epoch.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Current file order. Changes in place between passes when shuffling.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn input_shape(&self) -> TileShape {
        self.shape
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn stats(&self) -> GeneratorStats {
        self.stats
    }

    /// The non-file-level error that ended the stream, if any.
    pub fn fault(&self) -> Option<&PipelineError> {
        self.fault.as_ref()
    }

    pub(crate) fn take_fault(&mut self) -> Option<PipelineError> {
        self.fault.take()
    }

    pub(crate) fn step(&mut self) -> Step {
        match std::mem::replace(&mut self.state, State::Advancing) {
            State::Exhausted => {
                self.state = State::Exhausted;
                Step::End
            }
            State::Slicing(mut tiles) => match tiles.next() {
                Some(tile) => {
                    self.stats.tiles_yielded += 1;
                    self.state = State::Slicing(tiles);
                    Step::Tile(tile)
                }
                None => {
                    self.stats.tiles_discarded += tiles.discarded() as u64;
                    self.advance_cursor();
                    Step::Continue
                }
            },
            State::Advancing => {
                let Some(path) = self.files.get(self.cursor) else {
                    self.state = State::Exhausted;
                    return Step::End;
                };

                self.stats.files_attempted += 1;
                match load_tiles(&self.renderer, path, self.pixels_per_second, self.shape) {
                    Ok(tiles) => self.state = State::Slicing(tiles),
                    Err(err) if err.is_file_level() => {
                        warn!("skipping {}: {err}", path.display());
                        self.stats.files_failed += 1;
                        self.advance_cursor();
                    }
                    Err(err) => {
                        error!("stopping tile stream at {}: {err}", path.display());
                        self.fault = Some(err);
                        self.state = State::Exhausted;
                        return Step::End;
                    }
                }
                Step::Continue
            }
        }
    }

    fn advance_cursor(&mut self) {
        self.cursor += 1;
        if self.cursor < self.files.len() {
            return;
        }

        self.stats.passes_completed += 1;
        info!(
            "pass {} over {} complete: {} files attempted, {} failed, {} tiles yielded",
            self.stats.passes_completed,
            self.source.display(),
            self.stats.files_attempted,
            self.stats.files_failed,
            self.stats.tiles_yielded,
        );

        if self.options.run_only_once {
            self.state = State::Exhausted;
            return;
        }
        self.cursor = 0;
        if self.options.shuffle {
            self.files.shuffle(&mut self.rng);
        }
    }
}

impl<R: Renderer> Iterator for SpectrogramGenerator<R> {
    type Item = Tile;

    fn next(&mut self) -> Option<Tile> {
        loop {
            match self.step() {
                Step::Tile(tile) => return Some(tile),
                Step::Continue => continue,
                Step::End => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Spectrogram;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn audio_dir(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        dir
    }

    fn file_name(path: &Path) -> String {
        path.file_name().unwrap().to_string_lossy().into_owned()
    }

    /// Two signal tiles per file, one blank tile in between.
    fn two_tiles(_: &Path, _: u32, height: usize) -> Result<Spectrogram> {
        let mut image = Spectrogram::zeros((height, 6));
        image[[0, 0]] = 1;
        image[[0, 4]] = 1;
        Ok(image)
    }

    fn recording(log: Rc<RefCell<Vec<String>>>) -> impl Fn(&Path, u32, usize) -> Result<Spectrogram> {
        move |path, pps, height| {
            log.borrow_mut().push(file_name(path));
            two_tiles(path, pps, height)
        }
    }

    fn once() -> GeneratorOptions {
        GeneratorOptions {
            run_only_once: true,
            ..GeneratorOptions::default()
        }
    }

    #[test]
    fn run_once_visits_every_file_then_stops() {
        let dir = audio_dir(&["a.wav", "b.wav", "c.wav"]);
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut generator =
            SpectrogramGenerator::new(dir.path(), TileShape::new(4, 2), 50, once(), recording(log.clone()))
                .unwrap();

        assert_eq!(generator.file_count(), 3);
        assert!(generator.files().iter().all(|p| p.is_absolute()));
        let tiles: Vec<_> = generator.by_ref().collect();
        assert_eq!(tiles.len(), 6);
        assert!(tiles.iter().all(|t| t.dim() == (4, 2, 1)));
        assert_eq!(log.borrow().len(), 3);
        assert_eq!(generator.next(), None);

        let stats = generator.stats();
        assert_eq!(stats.passes_completed, 1);
        assert_eq!(stats.files_attempted, 3);
        assert_eq!(stats.tiles_yielded, 6);
        assert_eq!(stats.tiles_discarded, 3);
    }

    #[test]
    fn run_once_terminates_even_when_every_file_fails() {
        let dir = audio_dir(&["a.wav", "b.mp3"]);
        let attempts = Rc::new(RefCell::new(0));
        let counter = attempts.clone();
        let failing = move |path: &Path, _: u32, _: usize| -> Result<Spectrogram> {
            *counter.borrow_mut() += 1;
            Err(PipelineError::render(path, "decoder crashed"))
        };

        let mut generator =
            SpectrogramGenerator::new(dir.path(), TileShape::new(4, 2), 50, once(), failing).unwrap();
        assert_eq!(generator.next(), None);
        assert_eq!(*attempts.borrow(), 2);
        assert_eq!(generator.stats().files_failed, 2);
        assert!(generator.fault().is_none());
    }

    #[test]
    fn bad_file_costs_only_its_own_tiles() {
        let dir = audio_dir(&["a.wav", "b.wav", "c.wav"]);
        let renderer = |path: &Path, pps: u32, height: usize| -> Result<Spectrogram> {
            match file_name(path).as_str() {
                "b.wav" => Err(PipelineError::render(path, "unreadable")),
                _ => two_tiles(path, pps, height),
            }
        };

        let generator = SpectrogramGenerator::new(
            dir.path(),
            TileShape::new(4, 2),
            50,
            GeneratorOptions::default(),
            renderer,
        )
        .unwrap();

        // Two good files per pass; the stream keeps going past the bad one.
        let tiles: Vec<_> = generator.take(12).collect();
        assert_eq!(tiles.len(), 12);
    }

    #[test]
    fn height_mismatch_skips_the_file() {
        let dir = audio_dir(&["a.wav", "b.wav"]);
        let renderer = |path: &Path, pps: u32, height: usize| -> Result<Spectrogram> {
            if file_name(path) == "a.wav" {
                two_tiles(path, pps, height - 1)
            } else {
                two_tiles(path, pps, height)
            }
        };

        let mut generator =
            SpectrogramGenerator::new(dir.path(), TileShape::new(4, 2), 50, once(), renderer).unwrap();
        assert_eq!(generator.by_ref().count(), 2);
        assert_eq!(generator.stats().files_failed, 1);
    }

    #[test]
    fn unshuffled_passes_repeat_the_same_order() {
        let dir = audio_dir(&["a.wav", "b.wav", "c.wav", "d.wav"]);
        let log = Rc::new(RefCell::new(Vec::new()));
        let generator = SpectrogramGenerator::new(
            dir.path(),
            TileShape::new(4, 2),
            50,
            GeneratorOptions::default(),
            recording(log.clone()),
        )
        .unwrap();

        // 2 tiles per file, 3 passes.
        assert_eq!(generator.take(24).count(), 24);
        let visits = log.borrow();
        assert_eq!(visits.len(), 12);
        assert_eq!(visits[0..4], visits[4..8]);
        assert_eq!(visits[4..8], visits[8..12]);
    }

    #[test]
    fn shuffled_passes_are_permutations_of_the_file_set() {
        let names: Vec<String> = (0..10).map(|i| format!("clip{i}.wav")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let dir = audio_dir(&refs);
        let log = Rc::new(RefCell::new(Vec::new()));
        let options = GeneratorOptions {
            shuffle: true,
            seed: Some(7),
            ..GeneratorOptions::default()
        };
        let generator =
            SpectrogramGenerator::new(dir.path(), TileShape::new(4, 2), 50, options, recording(log.clone()))
                .unwrap();

        assert_eq!(generator.take(2 * 10 * 4).count(), 80);
        let visits = log.borrow();
        let passes: Vec<Vec<String>> = visits.chunks(10).map(|c| c.to_vec()).collect();
        assert_eq!(passes.len(), 4);

        let mut expected = names.clone();
        expected.sort();
        for pass in &passes {
            let mut sorted = pass.clone();
            sorted.sort();
            assert_eq!(sorted, expected);
        }
        assert!(passes.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn same_file_renders_the_same_tile_count_each_pass() {
        let dir = audio_dir(&["only.wav"]);
        let mut generator = SpectrogramGenerator::new(
            dir.path().join("only.wav"),
            TileShape::new(4, 2),
            50,
            GeneratorOptions::default(),
            two_tiles,
        )
        .unwrap();

        let first: Vec<_> = generator.by_ref().take(2).collect();
        let second: Vec<_> = generator.by_ref().take(2).collect();
        assert_eq!(first, second);
        assert_eq!(generator.stats().passes_completed, 1);
    }

    #[test]
    fn empty_file_set_never_yields() {
        let dir = audio_dir(&[]);
        let mut generator = SpectrogramGenerator::new(
            dir.path(),
            TileShape::new(4, 2),
            50,
            GeneratorOptions::default(),
            two_tiles,
        )
        .unwrap();
        assert_eq!(generator.file_count(), 0);
        assert_eq!(generator.next(), None);
    }

    #[test]
    fn programmer_errors_end_the_stream() {
        let dir = audio_dir(&["a.wav", "b.wav"]);
        let renderer = |_: &Path, _: u32, _: usize| -> Result<Spectrogram> {
            Err(PipelineError::InvalidConfig("renderer misconfigured".to_string()))
        };
        let mut generator = SpectrogramGenerator::new(
            dir.path(),
            TileShape::new(4, 2),
            50,
            GeneratorOptions::default(),
            renderer,
        )
        .unwrap();

        assert_eq!(generator.next(), None);
        assert!(matches!(generator.fault(), Some(PipelineError::InvalidConfig(_))));
        assert_eq!(generator.stats().files_attempted, 1);
    }

    #[test]
    fn invalid_shape_is_rejected_at_construction() {
        let dir = audio_dir(&["a.wav"]);
        let err = SpectrogramGenerator::new(
            dir.path(),
            TileShape::from([4, 2, 3]),
            50,
            GeneratorOptions::default(),
            two_tiles,
        )
        .err()
        .unwrap();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn missing_source_fails_construction() {
        let dir = audio_dir(&[]);
        let err = SpectrogramGenerator::new(
            dir.path().join("nope"),
            TileShape::new(4, 2),
            50,
            GeneratorOptions::default(),
            two_tiles,
        )
        .err()
        .unwrap();
        assert!(matches!(err, PipelineError::Discovery { .. }));
    }
}
