//! Source terminal stage.

use super::{check_extends, Stage, StageCore, StageLinks, StageRole};
use crate::driver::TileSpan;
use crate::error::{Error, Result};
use crate::geometry::{Axis, Size};
use crate::graph::TileGraph;
use crate::interval::Interval;
use tracing::trace;

/// Configuration for an [`InputStage`].
#[derive(Debug, Clone)]
pub struct InputConfig {
    /// Size of the input image the stage reads.
    pub image_size: Size,
    /// Read alignment per axis (e.g. 2 for Bayer data). Tile starts are
    /// aligned down, ends are aligned down unless they land on the
    /// image edge.
    pub alignment: Size,
}

/// The stage where pixels enter the graph.
///
/// Terminates the start pass by recording the final, aligned input
/// start, and originates the end pass when the driver announces how many
/// input pixels are available.
#[derive(Debug)]
pub struct InputStage {
    config: InputConfig,
    core: StageCore,
}

impl InputStage {
    /// Create an input stage reading an image of the configured size.
    pub fn new(config: InputConfig) -> Self {
        Self {
            config,
            core: StageCore::default(),
        }
    }

    fn align_down(&self, value: i32, axis: Axis) -> i32 {
        let align = self.config.alignment.along(axis).max(1);
        (value / align) * align
    }
}

impl Stage for InputStage {
    fn role(&self) -> StageRole {
        StageRole::Source
    }

    fn configure(&mut self, upstream: Option<Size>) -> Result<Size> {
        if upstream.is_some() {
            return Err(Error::InvalidGraph(
                "input stage cannot have an upstream neighbor".into(),
            ));
        }
        self.core.input_size = self.config.image_size;
        self.core.output_size = self.config.image_size;
        Ok(self.config.image_size)
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
        _graph: &mut TileGraph,
        links: &StageLinks,
        output_start: i32,
        axis: Axis,
    ) -> Result<()> {
        trace!(stage = %links.name, output_start, %axis, "push_start_up enter");
        // End of the line going up: record the aligned start the
        // hardware will actually read from.
        let start = self.align_down(output_start.max(0), axis);
        self.core.input = Interval::point(start);
        self.core.output = self.core.input;
        trace!(stage = %links.name, input_start = start, "push_start_up exit");
        Ok(())
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
        let mut end = input_end.min(image_size);
        // Reads must stay aligned except when the tile runs to the edge,
        // where a short read is fine.
        if end < image_size {
            end = self.align_down(end, axis).max(self.core.input.start);
        }
        self.core.input.set_end(end);
        self.core.output.set_end(end);

        let accepted = graph.push_end_down(links.downstream_one()?, end, axis)?;
        self.push_end_up(accepted, axis)?;
        trace!(stage = %links.name, end = self.core.input.end, "push_end_down exit");
        Ok(self.core.input.end)
    }

    fn push_end_up(&mut self, output_end: i32, axis: Axis) -> Result<()> {
        trace!(output_end, %axis, "push_end_up");
        self.core.output.clamp_end(output_end);
        self.core.input.clamp_end(output_end);
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
        self.core.output = interval;
        graph.push_crop_down(links.downstream_one()?, interval, axis)
    }

    fn copy_out(&self, span: &mut TileSpan) {
        *span = self.core.span();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> InputStage {
        let mut s = InputStage::new(InputConfig {
            image_size: Size::new(100, 80),
            alignment: Size::square(4),
        });
        s.configure(None).unwrap();
        s
    }

    #[test]
    fn test_align_down() {
        let s = stage();
        assert_eq!(s.align_down(10, Axis::X), 8);
        assert_eq!(s.align_down(8, Axis::X), 8);
        assert_eq!(s.align_down(0, Axis::Y), 0);
    }

    #[test]
    fn test_configure_rejects_upstream() {
        let mut s = InputStage::new(InputConfig {
            image_size: Size::new(100, 80),
            alignment: Size::square(1),
        });
        assert!(s.configure(Some(Size::new(10, 10))).is_err());
    }
}
