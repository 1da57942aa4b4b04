use ndarray::{s, Axis};

use super::error::{PipelineError, Result};
use super::model::{Spectrogram, Tile, TileShape, SILENCE};

/// Cut `image` into non-overlapping tiles of `shape` along the time axis.
///
/// The image must have exactly `shape.height` rows. Trailing columns that do
/// not fill a whole tile are dropped. Tiles that are entirely [`SILENCE`] are
/// skipped while iterating.
pub fn slice(image: Spectrogram, shape: TileShape) -> Result<Tiles> {
    if !shape.is_valid() {
        return Err(PipelineError::InvalidConfig(format!(
            "tile shape {shape} is not a non-empty mono shape"
        )));
    }
    let (height, width) = image.dim();
    if height != shape.height {
        return Err(PipelineError::ShapeMismatch {
            expected: shape.height,
            actual: height,
        });
    }

    Ok(Tiles {
        count: width / shape.width,
        tile_width: shape.width,
        image,
        next: 0,
        discarded: 0,
    })
}

/// Lazy tile sequence over one rendered spectrogram. Produced by [`slice`].
#[derive(Debug)]
pub struct Tiles {
    image: Spectrogram,
    tile_width: usize,
    count: usize,
    next: usize,
    discarded: usize,
}

impl Tiles {
    /// Whole tiles that fit in the image, blank ones included.
    pub fn candidates(&self) -> usize {
        self.count
    }

    /// Blank tiles skipped so far.
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

impl Iterator for Tiles {
    type Item = Tile;

    fn next(&mut self) -> Option<Tile> {
        while self.next < self.count {
            let start = self.next * self.tile_width;
            self.next += 1;

            let region = self.image.slice(s![.., start..start + self.tile_width]);
            if region.iter().all(|&v| v == SILENCE) {
                self.discarded += 1;
                continue;
            }
            return Some(region.to_owned().insert_axis(Axis(2)));
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.count - self.next))
    }
}
