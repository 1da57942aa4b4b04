use std::fmt;

use ndarray::{Array2, Array3, Array4};

/// Pixel value sox writes where there is no signal.
pub const SILENCE: u8 = 0;

/// A rendered spectrogram: rows are frequency bins, columns are time steps.
pub type Spectrogram = Array2<u8>;

/// One training example, `height × width × 1`.
pub type Tile = Array3<u8>;

/// A stack of tiles, `batch × height × width × 1`.
pub type Batch = Array4<u8>;

// ---------------------------------------------------------------------------
// TileShape – the model's input contract
// ---------------------------------------------------------------------------

/// Fixed tile dimensions shared by the renderer (height) and the slicer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileShape {
    /// Frequency bins; the renderer is asked for exactly this many rows.
    pub height: usize,
    /// Time columns per tile.
    pub width: usize,
    /// Always 1 (monochrome).
    pub channels: usize,
}

impl TileShape {
    /// Mono tile of the given size.
    pub fn new(height: usize, width: usize) -> Self {
        TileShape {
            height,
            width,
            channels: 1,
        }
    }

    /// The `[height, width, channels]` triple consumed by model builders.
    pub fn as_array(&self) -> [usize; 3] {
        [self.height, self.width, self.channels]
    }

    pub fn is_valid(&self) -> bool {
        self.height > 0 && self.width > 0 && self.channels == 1
    }
}

impl From<[usize; 3]> for TileShape {
    fn from([height, width, channels]: [usize; 3]) -> Self {
        TileShape {
            height,
            width,
            channels,
        }
    }
}

impl fmt::Display for TileShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_from_config_triple() {
        let shape = TileShape::from([129, 100, 1]);
        assert_eq!(shape, TileShape::new(129, 100));
        assert_eq!(shape.as_array(), [129, 100, 1]);
        assert_eq!(shape.to_string(), "129x100x1");
        assert!(shape.is_valid());
    }

    #[test]
    fn rejects_multi_channel_and_empty_shapes() {
        assert!(!TileShape::from([129, 100, 3]).is_valid());
        assert!(!TileShape::new(0, 100).is_valid());
        assert!(!TileShape::new(129, 0).is_valid());
    }
}
