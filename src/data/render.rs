use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context;
use log::{debug, warn};

use super::error::{PipelineError, Result};
use super::model::Spectrogram;

/// Turns one audio file into a spectrogram image with `height` rows and
/// `pixels_per_second` columns per second of audio.
pub trait Renderer {
    fn render(&self, path: &Path, pixels_per_second: u32, height: usize) -> Result<Spectrogram>;
}

impl<F> Renderer for F
where
    F: Fn(&Path, u32, usize) -> Result<Spectrogram>,
{
    fn render(&self, path: &Path, pixels_per_second: u32, height: usize) -> Result<Spectrogram> {
        self(path, pixels_per_second, height)
    }
}

// ---------------------------------------------------------------------------
// SoxRenderer – shells out to `sox ... spectrogram`
// ---------------------------------------------------------------------------

/// Renders through the `sox` command line tool.
///
/// The audio is downmixed to mono and resampled (10 kHz by default, so the
/// image tops out at 5 kHz) before sox rasterises a monochrome spectrogram
/// without axes or legend into a uniquely named scratch PNG. The PNG is
/// removed before `render` returns, on every path.
#[derive(Debug, Clone)]
pub struct SoxRenderer {
    pub command: String,
    pub sample_rate: String,
    pub scratch_dir: PathBuf,
}

impl Default for SoxRenderer {
    fn default() -> Self {
        SoxRenderer {
            command: "sox".to_string(),
            sample_rate: "10k".to_string(),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

impl SoxRenderer {
    fn command_for(&self, path: &Path, pixels_per_second: u32, height: usize, output: &Path) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.arg("-V0")
            .arg(path)
            .arg("-n")
            .args(["remix", "1"])
            .args(["rate", self.sample_rate.as_str()])
            .arg("spectrogram")
            .args(["-y", height.to_string().as_str()])
            .args(["-X", pixels_per_second.to_string().as_str()])
            .args(["-m", "-r"])
            .arg("-o")
            .arg(output)
            .stdin(Stdio::null());
        cmd
    }
}

impl Renderer for SoxRenderer {
    fn render(&self, path: &Path, pixels_per_second: u32, height: usize) -> Result<Spectrogram> {
        // Dropping the handle deletes the file, including on the error paths below.
        let artifact = tempfile::Builder::new()
            .prefix("spectrogram-")
            .suffix(".png")
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| PipelineError::render(path, format!("creating scratch image: {e}")))?;

        let mut cmd = self.command_for(path, pixels_per_second, height, artifact.path());
        debug!("rendering {}: {cmd:?}", path.display());

        let output = cmd
            .output()
            .map_err(|e| PipelineError::render(path, format!("running {}: {e}", self.command)))?;

        let diagnostics = String::from_utf8_lossy(&output.stderr);
        let diagnostics = diagnostics.trim();
        if !diagnostics.is_empty() {
            warn!("{} reported for {}: {diagnostics}", self.command, path.display());
        }

        // Only a missing or unreadable image fails the file; the exit status
        // is reported either way.
        match read_spectrogram(artifact.path()) {
            Ok(image) => {
                if !output.status.success() {
                    warn!(
                        "{} exited with {} for {} but left a readable image",
                        self.command,
                        output.status,
                        path.display()
                    );
                }
                Ok(image)
            }
            Err(e) if !output.status.success() => Err(PipelineError::render(
                path,
                format!("{} exited with {}: reading rendered image: {e:#}", self.command, output.status),
            )),
            Err(e) => Err(PipelineError::render(path, format!("reading rendered image: {e:#}"))),
        }
    }
}

/// Decode an image file into a grayscale intensity array.
pub fn read_spectrogram(path: &Path) -> anyhow::Result<Spectrogram> {
    // Probe the content; the extension is not trusted.
    let gray = image::ImageReader::open(path)
        .context("opening image")?
        .with_guessed_format()
        .context("probing image format")?
        .decode()
        .context("decoding image")?
        .into_luma8();
    let (width, height) = gray.dimensions();
    let pixels = Spectrogram::from_shape_vec((height as usize, width as usize), gray.into_raw())?;
    Ok(pixels)
}
