use crate::foundation::error::{CompositorError, CompositorResult};

/// RGBA pixel, four straight-alpha `f32` channels.
pub type Color = [f32; 4];

/// Fully transparent black.
pub const TRANSPARENT: Color = [0.0, 0.0, 0.0, 0.0];

/// Kind of data carried by a socket.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Single scalar, stored in channel 0.
    Value,
    /// Three-component vector, stored in channels 0..3.
    Vector,
    /// RGBA color.
    #[default]
    Color,
}

impl DataType {
    /// Neutral value substituted for a disconnected input of this kind.
    pub fn neutral(self) -> Color {
        match self {
            Self::Value => [0.0, 0.0, 0.0, 0.0],
            Self::Vector => [0.0, 0.0, 0.0, 0.0],
            Self::Color => [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Width and height of an operation's output, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Create a resolution without validation.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Create a resolution, rejecting zero-area sizes.
    pub fn validated(width: u32, height: u32) -> CompositorResult<Self> {
        if width == 0 || height == 0 {
            return Err(CompositorError::validation(
                "resolution width and height must be > 0",
            ));
        }
        Ok(Self { width, height })
    }

    /// Return `true` when either dimension is zero.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The rectangle `[0, width) x [0, height)`.
    pub fn to_rect(self) -> Rect {
        Rect::new(
            0,
            0,
            i32::try_from(self.width).unwrap_or(i32::MAX),
            i32::try_from(self.height).unwrap_or(i32::MAX),
        )
    }
}

/// Integer pixel rectangle, half-open: `xmin..xmax`, `ymin..ymax`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    /// Inclusive left edge.
    pub xmin: i32,
    /// Inclusive top edge.
    pub ymin: i32,
    /// Exclusive right edge.
    pub xmax: i32,
    /// Exclusive bottom edge.
    pub ymax: i32,
}

impl Rect {
    /// Create a rectangle from its edges.
    pub const fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Create a rectangle from an origin and a size.
    pub fn from_origin_size(x: i32, y: i32, width: u32, height: u32) -> Self {
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);
        Self::new(x, y, x.saturating_add(w), y.saturating_add(h))
    }

    /// Width, zero for degenerate rectangles.
    pub fn width(self) -> u32 {
        u32::try_from(self.xmax.saturating_sub(self.xmin)).unwrap_or(0)
    }

    /// Height, zero for degenerate rectangles.
    pub fn height(self) -> u32 {
        u32::try_from(self.ymax.saturating_sub(self.ymin)).unwrap_or(0)
    }

    /// Return `true` when the rectangle covers no pixel.
    pub fn is_empty(self) -> bool {
        self.xmax <= self.xmin || self.ymax <= self.ymin
    }

    /// Number of pixels covered.
    pub fn area(self) -> usize {
        (self.width() as usize).saturating_mul(self.height() as usize)
    }

    /// Return `true` when pixel `(x, y)` lies inside.
    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= self.xmin && x < self.xmax && y >= self.ymin && y < self.ymax
    }

    /// Grow by `dx` on the left and right and by `dy` on the top and bottom.
    pub fn dilate(self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.xmin.saturating_sub(dx),
            self.ymin.saturating_sub(dy),
            self.xmax.saturating_add(dx),
            self.ymax.saturating_add(dy),
        )
    }

    /// Intersection, `None` when the rectangles do not overlap.
    pub fn intersect(self, other: Self) -> Option<Self> {
        let r = Self::new(
            self.xmin.max(other.xmin),
            self.ymin.max(other.ymin),
            self.xmax.min(other.xmax),
            self.ymax.min(other.ymax),
        );
        if r.is_empty() { None } else { Some(r) }
    }

    /// Smallest rectangle containing both. Empty operands are ignored.
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self::new(
            self.xmin.min(other.xmin),
            self.ymin.min(other.ymin),
            self.xmax.max(other.xmax),
            self.ymax.max(other.ymax),
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
