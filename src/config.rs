//! Tiling configuration shared by the driver and the terminal stages.

use crate::geometry::Size;

/// Frame-wide tiling limits.
///
/// `max_tile_size` is the hard line-buffer bound that forces tiling in
/// the first place; `min_tile_size` keeps the driver from leaving an
/// infeasibly thin sliver at the image edge (an output end that lands
/// close to, but not on, the edge is pulled back so the next tile stays
/// viable).
#[derive(Debug, Clone)]
pub struct TilingConfig {
    /// Largest input span a single tile may cover, per axis.
    pub max_tile_size: Size,
    /// Smallest span the trailing tile of a row/column may cover, per axis.
    pub min_tile_size: Size,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            max_tile_size: Size::new(640, 640),
            min_tile_size: Size::new(16, 16),
        }
    }
}

impl TilingConfig {
    /// Create a config with the given tile-size bounds.
    pub fn new(max_tile_size: Size, min_tile_size: Size) -> Self {
        Self {
            max_tile_size,
            min_tile_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Axis;

    #[test]
    fn test_default_bounds() {
        let cfg = TilingConfig::default();
        assert!(cfg.max_tile_size.along(Axis::X) > cfg.min_tile_size.along(Axis::X));
        assert!(cfg.max_tile_size.along(Axis::Y) > cfg.min_tile_size.along(Axis::Y));
    }
}
