//! Read access to the real and imaginary interferogram bands.

use crate::types::{SarError, SarResult, Window};
use ndarray::{s, Array2};

/// Band that can be read one window at a time from several threads
pub trait RasterSource: Send + Sync {
    /// Raster size as `(lines, pixels)`
    fn dimensions(&self) -> (usize, usize);

    /// Copy of the samples inside `window`, shaped `window.shape()`
    fn read_window(&self, window: &Window) -> SarResult<Array2<f32>>;
}

/// Band held entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    data: Array2<f32>,
}

impl MemoryRaster {
    pub fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }
}

impl RasterSource for MemoryRaster {
    fn dimensions(&self) -> (usize, usize) {
        self.data.dim()
    }

    fn read_window(&self, window: &Window) -> SarResult<Array2<f32>> {
        let (lines, pixels) = self.data.dim();
        if window.line_lo < 0
            || window.pixel_lo < 0
            || window.line_hi as usize >= lines
            || window.pixel_hi as usize >= pixels
        {
            return Err(SarError::InvalidFormat(format!(
                "Window {} outside raster of {} x {}",
                window, lines, pixels
            )));
        }

        let rows = window.line_lo as usize..=window.line_hi as usize;
        let cols = window.pixel_lo as usize..=window.pixel_hi as usize;
        Ok(self.data.slice(s![rows, cols]).to_owned())
    }
}
