//! Fixed-window crop stage.

use super::{check_extends, Stage, StageCore, StageLinks, StageRole};
use crate::driver::TileSpan;
use crate::error::{Error, Result};
use crate::geometry::{Axis, Size};
use crate::graph::TileGraph;
use crate::interval::Interval;
use tracing::trace;

/// Configuration for a [`CropStage`].
#[derive(Debug, Clone)]
pub struct CropConfig {
    /// Top-left corner of the crop window in input coordinates.
    pub offset: Size,
    /// Size of the crop window (the stage's output image size).
    pub size: Size,
}

/// A stage that passes through a fixed window of its input: output pixel
/// `o` reads input pixel `o + offset`. Every push is a pure shift.
#[derive(Debug)]
pub struct CropStage {
    config: CropConfig,
    core: StageCore,
}

impl CropStage {
    /// Create a crop stage for the given window.
    pub fn new(config: CropConfig) -> Self {
        Self {
            config,
            core: StageCore::default(),
        }
    }

    fn offset(&self, axis: Axis) -> i32 {
        self.config.offset.along(axis)
    }
}

impl Stage for CropStage {
    fn role(&self) -> StageRole {
        StageRole::Transform
    }

    fn configure(&mut self, upstream: Option<Size>) -> Result<Size> {
        let input = upstream
            .ok_or_else(|| Error::InvalidGraph("crop stage requires an upstream size".into()))?;
        for axis in Axis::BOTH {
            let need = self.config.offset.along(axis) + self.config.size.along(axis);
            if self.config.offset.along(axis) < 0 || need > input.along(axis) {
                return Err(Error::InvalidGraph(format!(
                    "crop window {}+{} exceeds input image {} along {}",
                    self.config.offset, self.config.size, input, axis
                )));
            }
        }
        self.core.input_size = input;
        self.core.output_size = self.config.size;
        Ok(self.config.size)
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
        let input_start = output_start + self.offset(axis);
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
        let output_end = (input_end - self.offset(axis)).min(self.core.output_size.along(axis));
        self.core.input.set_end(input_end);
        self.core.output.set_end(output_end);

        let accepted = graph.push_end_down(links.downstream_one()?, output_end, axis)?;
        self.push_end_up(accepted, axis)?;
        trace!(stage = %links.name, end = self.core.input.end, "push_end_down exit");
        Ok(self.core.input.end)
    }

    fn push_end_up(&mut self, output_end: i32, axis: Axis) -> Result<()> {
        trace!(output_end, %axis, "push_end_up");
        self.core.output.clamp_end(output_end);
        // Once the whole window is delivered, accept whatever else is on
        // offer: the excess lies outside the window and is discarded, and
        // clamping here would needlessly restrict sibling branches of an
        // upstream fan-out.
        if output_end < self.core.output_size.along(axis) {
            self.core.input.clamp_end(output_end + self.offset(axis));
        }
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
        let offset = self.offset(axis);
        let down = Interval::new(
            (interval.start - offset).max(0),
            (interval.end - offset).min(self.core.output_size.along(axis)),
        );
        self.core.output = down;
        graph.push_crop_down(links.downstream_one()?, down, axis)
    }

    fn copy_out(&self, span: &mut TileSpan) {
        *span = self.core.span();
    }
}
