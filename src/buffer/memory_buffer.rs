use crate::{
    buffer::sampler,
    foundation::core::{Color, Rect, TRANSPARENT},
    foundation::error::{CompositorError, CompositorResult},
};

/// Rule applied when a read falls outside a buffer's rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtendMode {
    /// Outside pixels are transparent black.
    Clip,
    /// Outside pixels repeat the nearest edge pixel.
    #[default]
    Extend,
    /// The buffer tiles the plane.
    Repeat,
}

impl ExtendMode {
    /// Parse a user-facing name; `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "clip" => Some(Self::Clip),
            "extend" | "clamp" => Some(Self::Extend),
            "repeat" | "wrap" => Some(Self::Repeat),
            _ => None,
        }
    }
}

/// A rectangle of RGBA `f32` pixels positioned in the global pixel space.
///
/// Storage is row-major, four channels per pixel, with the first pixel at `(rect.xmin,
/// rect.ymin)`. Every read goes through an [`ExtendMode`], so no coordinate can index outside
/// the backing store.
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryBuffer {
    rect: Rect,
    data: Vec<f32>,
}

fn checked_len(rect: Rect) -> CompositorResult<usize> {
    rect.area()
        .checked_mul(4)
        .ok_or_else(|| CompositorError::resource("memory buffer size overflow"))
}

/// Wrap `v` into `lo..hi`. Widened so offsets near the `i32` limits cannot overflow.
fn wrap(v: i32, lo: i32, hi: i32) -> i32 {
    let span = i64::from(hi) - i64::from(lo);
    (i64::from(lo) + (i64::from(v) - i64::from(lo)).rem_euclid(span)) as i32
}

impl MemoryBuffer {
    /// Allocate a zeroed buffer covering `rect`.
    ///
    /// Allocation failure is reported as [`CompositorError::Resource`] instead of aborting.
    pub fn new(rect: Rect) -> CompositorResult<Self> {
        let len = checked_len(rect)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            CompositorError::resource(format!(
                "cannot allocate {}x{} memory buffer: {e}",
                rect.width(),
                rect.height()
            ))
        })?;
        data.resize(len, 0.0);
        Ok(Self { rect, data })
    }

    /// Allocate a buffer with every pixel set to `color`.
    pub fn filled(rect: Rect, color: Color) -> CompositorResult<Self> {
        let mut buf = Self::new(rect)?;
        for px in buf.data.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
        Ok(buf)
    }

    /// Wrap existing RGBA data; `data.len()` must equal `rect.area() * 4`.
    pub fn from_pixels(rect: Rect, data: Vec<f32>) -> CompositorResult<Self> {
        let len = checked_len(rect)?;
        if data.len() != len {
            return Err(CompositorError::validation(format!(
                "memory buffer expects {len} floats for {}x{}, got {}",
                rect.width(),
                rect.height(),
                data.len()
            )));
        }
        Ok(Self { rect, data })
    }

    /// Covered rectangle.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.rect.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.rect.height()
    }

    /// Raw row-major RGBA data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    fn offset(&self, x: i32, y: i32) -> usize {
        let lx = (x - self.rect.xmin) as usize;
        let ly = (y - self.rect.ymin) as usize;
        (ly * self.rect.width() as usize + lx) * 4
    }

    /// Exact pixel lookup, `None` outside the rectangle.
    pub fn get(&self, x: i32, y: i32) -> Option<Color> {
        if !self.rect.contains(x, y) {
            return None;
        }
        let i = self.offset(x, y);
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Store a pixel. Writes outside the rectangle are ignored.
    pub fn write_pixel(&mut self, x: i32, y: i32, color: Color) {
        if !self.rect.contains(x, y) {
            return;
        }
        let i = self.offset(x, y);
        self.data[i..i + 4].copy_from_slice(&color);
    }

    /// Integer lookup through an extend rule. Degenerate buffers read as transparent.
    pub fn fetch(&self, x: i32, y: i32, extend: ExtendMode) -> Color {
        let r = self.rect;
        if r.is_empty() {
            return TRANSPARENT;
        }
        let (x, y) = match extend {
            ExtendMode::Clip => {
                if !r.contains(x, y) {
                    return TRANSPARENT;
                }
                (x, y)
            }
            ExtendMode::Extend => (x.clamp(r.xmin, r.xmax - 1), y.clamp(r.ymin, r.ymax - 1)),
            ExtendMode::Repeat => (wrap(x, r.xmin, r.xmax), wrap(y, r.ymin, r.ymax)),
        };
        let i = self.offset(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Nearest-pixel read, clamped to the rectangle.
    pub fn read(&self, x: f32, y: f32) -> Color {
        sampler::sample_nearest(self, x, y, ExtendMode::Extend)
    }

    /// Bilinear read, clamped to the rectangle.
    pub fn read_bilinear(&self, x: f32, y: f32) -> Color {
        sampler::sample_bilinear(self, x, y, ExtendMode::Extend)
    }

    /// 4x4 cubic read, clamped to the rectangle.
    pub fn read_bicubic(&self, x: f32, y: f32) -> Color {
        sampler::sample_bicubic(self, x, y, ExtendMode::Extend)
    }

    /// Elliptical weighted average with footprint extents `dx`, `dy`.
    pub fn read_ewa(&self, x: f32, y: f32, dx: f32, dy: f32) -> Color {
        sampler::sample_ewa(self, x, y, dx, dy, ExtendMode::Extend)
    }

    /// Copy the overlapping part of `src` into `self`.
    pub fn copy_from(&mut self, src: &MemoryBuffer) {
        let Some(overlap) = self.rect.intersect(src.rect) else {
            return;
        };
        let row_len = overlap.width() as usize * 4;
        for y in overlap.ymin..overlap.ymax {
            let s = src.offset(overlap.xmin, y);
            let d = self.offset(overlap.xmin, y);
            self.data[d..d + row_len].copy_from_slice(&src.data[s..s + row_len]);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/buffer/memory_buffer.rs"]
mod tests;
