//! Scan axes and per-axis image extents.

/// One of the two independent scan directions along which tile intervals
/// are negotiated.
///
/// Negotiation runs once per axis; the X and Y windows of a tile are
/// resolved by two separate traversals of the same graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Horizontal (pixel-within-line) direction.
    X,
    /// Vertical (line) direction.
    Y,
}

impl Axis {
    /// Both axes, in negotiation order.
    pub const BOTH: [Axis; 2] = [Axis::X, Axis::Y];
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
        }
    }
}

/// A two-dimensional extent, addressable per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    /// Extent along [`Axis::X`].
    pub width: i32,
    /// Extent along [`Axis::Y`].
    pub height: i32,
}

impl Size {
    /// Create a size from width and height.
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Create a square size (same extent on both axes).
    ///
    /// Handy for per-axis parameters like alignment or filter support
    /// that are usually symmetric.
    pub fn square(extent: i32) -> Self {
        Self {
            width: extent,
            height: extent,
        }
    }

    /// Get the extent along one axis.
    pub fn along(&self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.width,
            Axis::Y => self.height,
        }
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
