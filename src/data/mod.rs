/// Data layer: audio files in, training tiles out.
///
/// Architecture:
/// ```text
///  source dir / single file
///        │
///        ▼
///   ┌──────────┐
///   │ discover  │  walk → Vec<PathBuf> (.wav, .mp3, .m4a)
///   └──────────┘
///        │   one file per cursor step
///        ▼
///   ┌──────────┐
///   │  render   │  sox → scratch PNG → Spectrogram (H × W)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  slice    │  H × W → tiles H × Tw × 1, blanks dropped
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ generator │  cycle / shuffle / run-once, skip bad files
///   └──────────┘
///        │
///        ▼
///   buffer (optional worker thread) → batch → training loop
/// ```

pub mod batch;
pub mod buffer;
pub mod discover;
pub mod error;
pub mod generator;
pub mod model;
pub mod render;
pub mod slice;
