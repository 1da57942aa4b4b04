use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the spectrogram pipeline.
///
/// Only [`PipelineError::Render`] and [`PipelineError::ShapeMismatch`] are
/// file-level: the generator logs them and moves on to the next file.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source path handed to the generator cannot be read.
    #[error("cannot access source {}: {source}", .path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external tool is missing, failed, or left no readable image.
    #[error("failed to render {}: {reason}", .path.display())]
    Render { path: PathBuf, reason: String },

    /// The rendered image does not have the configured number of rows.
    #[error("spectrogram height mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// Tiles handed to the batcher do not share one shape.
    #[error("cannot stack tiles into a batch: {0}")]
    Batch(#[from] ndarray::ShapeError),
}

impl PipelineError {
    pub(crate) fn render(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::Render {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error costs one file rather than the whole stream.
    pub fn is_file_level(&self) -> bool {
        matches!(
            self,
            PipelineError::Render { .. } | PipelineError::ShapeMismatch { .. }
        )
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_level_classification() {
        assert!(PipelineError::render("a.wav", "boom").is_file_level());
        assert!(PipelineError::ShapeMismatch {
            expected: 129,
            actual: 128
        }
        .is_file_level());
        assert!(!PipelineError::InvalidConfig("width is zero".into()).is_file_level());
        let mismatch = ndarray::stack(
            ndarray::Axis(0),
            &[ndarray::Array1::<u8>::zeros(2).view(), ndarray::Array1::<u8>::zeros(3).view()],
        )
        .unwrap_err();
        assert!(!PipelineError::from(mismatch).is_file_level());
        assert!(!PipelineError::Discovery {
            path: "/nope".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        }
        .is_file_level());
    }

    #[test]
    fn render_error_names_the_file() {
        let err = PipelineError::render("/data/en/clip.mp3", "exit status 2");
        assert_eq!(
            err.to_string(),
            "failed to render /data/en/clip.mp3: exit status 2"
        );
    }
}
