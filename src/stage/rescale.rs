//! Resampling stage.

use super::{check_extends, Stage, StageCore, StageLinks, StageRole};
use crate::driver::TileSpan;
use crate::error::{Error, Result};
use crate::geometry::{Axis, Size};
use crate::graph::TileGraph;
use crate::interval::Interval;
use tracing::trace;

/// Configuration for a [`RescaleStage`].
#[derive(Debug, Clone)]
pub struct RescaleConfig {
    /// Output image size; the scale factor per axis is the ratio of the
    /// upstream image size to this.
    pub output_size: Size,
    /// Resampling filter support (total taps) per axis.
    pub support: Size,
}

/// A resampler with explicit output dimensions.
///
/// Output pixel `o` is computed from input pixels centered on
/// `o * input_size / output_size`, reaching half the filter support to
/// each side. Image edges are padded, so a window touching an edge loses
/// the support requirement on that side.
#[derive(Debug)]
pub struct RescaleStage {
    config: RescaleConfig,
    core: StageCore,
}

impl RescaleStage {
    /// Create a rescale stage producing the configured output size.
    pub fn new(config: RescaleConfig) -> Self {
        Self {
            config,
            core: StageCore::default(),
        }
    }

    fn half_support(&self, axis: Axis) -> i32 {
        self.config.support.along(axis) / 2
    }

    /// Map an output coordinate to the input coordinate of its filter
    /// center, rounding down.
    fn to_input(&self, output: i32, axis: Axis) -> i32 {
        let input_size = i64::from(self.core.input_size.along(axis));
        let output_size = i64::from(self.core.output_size.along(axis));
        (i64::from(output) * input_size / output_size) as i32
    }

    /// Map an input coordinate to an output coordinate, rounding up.
    fn to_output_ceil(&self, input: i32, axis: Axis) -> i32 {
        let input_size = i64::from(self.core.input_size.along(axis));
        let output_size = i64::from(self.core.output_size.along(axis));
        ((i64::from(input) * output_size + input_size - 1) / input_size) as i32
    }
}

impl Stage for RescaleStage {
    fn role(&self) -> StageRole {
        StageRole::Transform
    }

    fn configure(&mut self, upstream: Option<Size>) -> Result<Size> {
        let input = upstream
            .ok_or_else(|| Error::InvalidGraph("rescale stage requires an upstream size".into()))?;
        for axis in Axis::BOTH {
            if input.along(axis) <= 0 || self.config.output_size.along(axis) <= 0 {
                return Err(Error::InvalidGraph(format!(
                    "rescale needs positive sizes, got {} -> {}",
                    input, self.config.output_size
                )));
            }
        }
        self.core.input_size = input;
        self.core.output_size = self.config.output_size;
        Ok(self.config.output_size)
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
        let input_start = (self.to_input(output_start, axis) - self.half_support(axis)).max(0);
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
        let input_size = self.core.input_size.along(axis);
        let output_size = self.core.output_size.along(axis);
        let output_end = if input_end >= input_size {
            output_size
        } else {
            // Centers past input_end - support/2 would read beyond what
            // is on offer.
            let last_center = input_end - self.half_support(axis);
            self.to_output_ceil(last_center.max(0), axis).min(output_size)
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
        let input_size = self.core.input_size.along(axis);
        let needed = if output_end >= self.core.output_size.along(axis) {
            input_size
        } else {
            (self.to_input(output_end, axis) + self.half_support(axis)).min(input_size)
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
        let input_size = self.core.input_size.along(axis);
        let output_size = self.core.output_size.along(axis);
        let down = Interval::new(
            if interval.start <= 0 {
                0
            } else {
                self.to_output_ceil(interval.start + self.half_support(axis), axis)
            },
            if interval.end >= input_size {
                output_size
            } else {
                self.to_output_ceil(interval.end - self.half_support(axis), axis).min(output_size)
            },
        );
        self.core.output = down;
        graph.push_crop_down(links.downstream_one()?, down, axis)
    }

    fn copy_out(&self, span: &mut TileSpan) {
        *span = self.core.span();
    }
}
