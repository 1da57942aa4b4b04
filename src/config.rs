use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::generator::{GeneratorOptions, SpectrogramGenerator};
use crate::data::model::TileShape;
use crate::data::render::SoxRenderer;

/// The only data loader this crate provides.
pub const SPECTROGRAM_GENERATOR: &str = "SpectrogramGenerator";

// ---------------------------------------------------------------------------
// Config – read once, never mutated
// ---------------------------------------------------------------------------

/// Training configuration as found in `config.yaml`.
///
/// Only `input_shape`, `pixel_per_second` and the pipeline fields drive this
/// crate; the training fields are carried for the model and training loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_loader")]
    pub data_loader: String,
    /// `[height, width, channels]` of one tile.
    pub input_shape: [usize; 3],
    pub pixel_per_second: u32,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub num_classes: Option<usize>,
    #[serde(default)]
    pub num_epochs: Option<usize>,
    #[serde(default)]
    pub learning_rate: Option<f64>,
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub train_data_dir: Option<PathBuf>,
    #[serde(default)]
    pub validation_data_dir: Option<PathBuf>,

    /// Tiles the buffering stage may hold ahead of the consumer.
    #[serde(default = "default_max_buffered")]
    pub max_buffered: usize,
    /// Fixed shuffle seed for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub renderer: RendererConfig,
}

/// How spectrograms are produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub command: String,
    /// Passed to sox `rate`; bounds the top frequency at half this value.
    pub sample_rate: String,
    /// Where scratch PNGs go. Defaults to the system temp directory.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        let sox = SoxRenderer::default();
        RendererConfig {
            command: sox.command,
            sample_rate: sox.sample_rate,
            scratch_dir: None,
        }
    }
}

fn default_data_loader() -> String {
    SPECTROGRAM_GENERATOR.to_string()
}

fn default_batch_size() -> usize {
    32
}

fn default_max_buffered() -> usize {
    100
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load and validate a config file. Dispatch by extension.
    ///
    /// Supported formats:
    /// * `.yaml` / `.yml`
    /// * `.json`
    pub fn load(path: &Path) -> Result<Config> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;

        let config = match ext.as_str() {
            "yaml" | "yml" => Config::from_yaml(&text)?,
            "json" => serde_json::from_str(&text).context("parsing JSON config")?,
            other => bail!("Unsupported config extension: .{other}"),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Config> {
        serde_yaml::from_str(text).context("parsing YAML config")
    }

    /// Reject settings the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.data_loader != SPECTROGRAM_GENERATOR {
            bail!(
                "Unsupported data_loader '{}', expected '{SPECTROGRAM_GENERATOR}'",
                self.data_loader
            );
        }
        let [height, width, channels] = self.input_shape;
        if height == 0 || width == 0 {
            bail!("input_shape {:?} has a zero dimension", self.input_shape);
        }
        if channels != 1 {
            bail!("input_shape must have exactly 1 channel, got {channels}");
        }
        if self.pixel_per_second == 0 {
            bail!("pixel_per_second must be positive");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        if self.max_buffered == 0 {
            bail!("max_buffered must be positive");
        }
        Ok(())
    }

    pub fn tile_shape(&self) -> TileShape {
        TileShape::from(self.input_shape)
    }

    pub fn sox_renderer(&self) -> SoxRenderer {
        SoxRenderer {
            command: self.renderer.command.clone(),
            sample_rate: self.renderer.sample_rate.clone(),
            scratch_dir: self
                .renderer
                .scratch_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
        }
    }

    pub fn generator_options(&self, shuffle: bool, run_only_once: bool) -> GeneratorOptions {
        GeneratorOptions {
            shuffle,
            max_buffered: self.max_buffered,
            run_only_once,
            seed: self.seed,
        }
    }

    /// A sox-backed generator over `source`.
    pub fn generator(
        &self,
        source: &Path,
        shuffle: bool,
        run_only_once: bool,
    ) -> Result<SpectrogramGenerator<SoxRenderer>> {
        let generator = SpectrogramGenerator::new(
            source,
            self.tile_shape(),
            self.pixel_per_second,
            self.generator_options(shuffle, run_only_once),
            self.sox_renderer(),
        )?;
        Ok(generator)
    }

    /// Shuffled training stream and fixed-order validation stream, both
    /// endless.
    pub fn training_generators(
        &self,
    ) -> Result<(SpectrogramGenerator<SoxRenderer>, SpectrogramGenerator<SoxRenderer>)> {
        let train_dir = self
            .train_data_dir
            .as_deref()
            .context("config has no train_data_dir")?;
        let validation_dir = self
            .validation_data_dir
            .as_deref()
            .context("config has no validation_data_dir")?;

        let train = self
            .generator(train_dir, true, false)
            .context("building training generator")?;
        let validation = self
            .generator(validation_dir, false, false)
            .context("building validation generator")?;
        Ok((train, validation))
    }
}
