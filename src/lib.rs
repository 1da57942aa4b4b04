//! Streaming spectrogram tiles for spoken-language identification.
//!
//! Audio files are rendered to spectrogram images by `sox`, cut into
//! fixed-size tiles and handed out one at a time by an endless, restartable
//! [`SpectrogramGenerator`]. A file that cannot be rendered costs only its
//! own tiles.

pub mod config;
pub mod data;

pub use config::Config;
pub use data::batch::batches;
pub use data::buffer::BufferedTiles;
pub use data::discover::discover;
pub use data::error::PipelineError;
pub use data::generator::{load_tiles, GeneratorOptions, GeneratorStats, SpectrogramGenerator};
pub use data::model::{Batch, Spectrogram, Tile, TileShape};
pub use data::render::{Renderer, SoxRenderer};
pub use data::slice::{slice, Tiles};
