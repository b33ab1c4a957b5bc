//! Support-window (context) stage.

use super::{check_extends, Stage, StageCore, StageLinks, StageRole};
use crate::driver::TileSpan;
use crate::error::{Error, Result};
use crate::geometry::{Axis, Size};
use crate::graph::TileGraph;
use crate::interval::Interval;
use tracing::trace;

/// Configuration for a [`FilterStage`].
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Extra input pixels needed before each output pixel, per axis.
    pub left: Size,
    /// Extra input pixels needed after each output pixel, per axis.
    pub right: Size,
}

impl FilterConfig {
    /// Symmetric support of `taps` pixels on each side of both axes.
    pub fn symmetric(taps: i32) -> Self {
        Self {
            left: Size::square(taps),
            right: Size::square(taps),
        }
    }
}

/// A fixed-function filter block that needs `left`/`right` pixels of
/// context around every output pixel. Image edges are padded in
/// hardware, so an interval that reaches an edge carries no context
/// requirement on that side.
#[derive(Debug)]
pub struct FilterStage {
    config: FilterConfig,
    core: StageCore,
}

impl FilterStage {
    /// Create a filter stage with the given support window.
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            core: StageCore::default(),
        }
    }
}

impl Stage for FilterStage {
    fn role(&self) -> StageRole {
        StageRole::Transform
    }

    fn configure(&mut self, upstream: Option<Size>) -> Result<Size> {
        let size = upstream
            .ok_or_else(|| Error::InvalidGraph("filter stage requires an upstream size".into()))?;
        self.core.input_size = size;
        self.core.output_size = size;
        Ok(size)
    }

    fn reset(&mut self) {
        self.core.reset();
    }

    fn input_size(&self) -> Size {
        self.core.input_size
    }

    fn output_size(&self) -> Size {
        self.core.output_size
    }

    fn push_start_up(
        &mut self,
        graph: &mut TileGraph,
        links: &StageLinks,
        output_start: i32,
        axis: Axis,
    ) -> Result<()> {
        trace!(stage = %links.name, output_start, %axis, "push_start_up enter");
        let input_start = (output_start - self.config.left.along(axis)).max(0);
        self.core.output = Interval::point(output_start);
        self.core.input = Interval::point(input_start);
        graph.push_start_up(links.upstream()?, input_start, axis)
    }

    fn push_end_down(
        &mut self,
        graph: &mut TileGraph,
        links: &StageLinks,
        input_end: i32,
        axis: Axis,
    ) -> Result<i32> {
        trace!(stage = %links.name, input_end, %axis, "push_end_down enter");
        let image_size = self.core.input_size.along(axis);
        let output_end = if input_end >= image_size {
            image_size
        } else {
            (input_end - self.config.right.along(axis)).max(0)
        };
        self.core.input.set_end(input_end);
        self.core.output.set_end(output_end);

        let accepted = graph.push_end_down(links.downstream_one()?, output_end, axis)?;
        self.push_end_up(accepted, axis)?;
        trace!(stage = %links.name, end = self.core.input.end, "push_end_down exit");
        Ok(self.core.input.end)
    }

    fn push_end_up(&mut self, output_end: i32, axis: Axis) -> Result<()> {
        trace!(output_end, %axis, "push_end_up");
        let image_size = self.core.input_size.along(axis);
        let needed = if output_end >= image_size {
            image_size
        } else {
            output_end + self.config.right.along(axis)
        };
        self.core.output.clamp_end(output_end);
        self.core.input.clamp_end(needed);
        Ok(())
    }

    fn push_crop_down(
        &mut self,
        graph: &mut TileGraph,
        links: &StageLinks,
        interval: Interval,
        axis: Axis,
    ) -> Result<()> {
        trace!(stage = %links.name, %interval, %axis, "push_crop_down");
        check_extends(&links.name, interval, self.core.input)?;
        self.core.input = interval;
        let image_size = self.core.input_size.along(axis);
        let down = Interval::new(
            if interval.start <= 0 {
                0
            } else {
                interval.start + self.config.left.along(axis)
            },
            if interval.end >= image_size {
                image_size
            } else {
                interval.end - self.config.right.along(axis)
            },
        );
        self.core.output = down;
        graph.push_crop_down(links.downstream_one()?, down, axis)
    }

    fn copy_out(&self, span: &mut TileSpan) {
        *span = self.core.span();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> FilterStage {
        let mut s = FilterStage::new(FilterConfig::symmetric(2));
        s.configure(Some(Size::new(100, 100))).unwrap();
        s
    }

    #[test]
    fn test_end_at_image_edge_needs_no_context() {
        let mut s = stage();
        // As set by push_end_down before the accepted end comes back.
        s.core.input = Interval::new(0, 100);
        s.core.output = Interval::new(0, 100);
        s.push_end_up(100, Axis::X).unwrap();
        assert_eq!(s.core.input.end, 100);
    }

    #[test]
    fn test_interior_end_needs_context() {
        let mut s = stage();
        s.core.input = Interval::new(0, 80);
        s.core.output = Interval::new(0, 78);
        s.push_end_up(60, Axis::X).unwrap();
        assert_eq!(s.core.output.end, 60);
        assert_eq!(s.core.input.end, 62);
    }
}
