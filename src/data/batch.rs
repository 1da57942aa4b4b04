use ndarray::Axis;

use super::error::{PipelineError, Result};
use super::model::{Batch, Tile};

/// Group a tile stream into `(batch, height, width, 1)` arrays.
///
/// A finite stream ends with a short batch when its length is not a
/// multiple of `size`. A zero `size` is rejected, and a group whose tiles
/// differ in shape comes out as [`PipelineError::Batch`].
pub fn batches<I>(tiles: I, size: usize) -> Result<Batches<I::IntoIter>>
where
    I: IntoIterator<Item = Tile>,
{
    if size == 0 {
        return Err(PipelineError::InvalidConfig(
            "batch size must be positive".to_string(),
        ));
    }
    Ok(Batches {
        tiles: tiles.into_iter(),
        size,
    })
}

#[derive(Debug)]
pub struct Batches<I> {
    tiles: I,
    size: usize,
}

impl<I: Iterator<Item = Tile>> Iterator for Batches<I> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Result<Batch>> {
        let group: Vec<Tile> = self.tiles.by_ref().take(self.size).collect();
        if group.is_empty() {
            return None;
        }
        let views: Vec<_> = group.iter().map(|t| t.view()).collect();
        Some(ndarray::stack(Axis(0), &views).map_err(PipelineError::from))
    }
}
