//! Sink terminal stage.
//!
//! When an output is horizontally flipped we describe it in a coordinate
//! system starting from the right-hand edge travelling left, so tile
//! coordinates don't change - the coordinate system did. The only place
//! this matters is alignment, which applies to the unflipped offsets
//! (what you get after subtracting from the image width).

use super::{Stage, StageCore, StageLinks, StageRole};
use crate::driver::{Margins, TileSpan};
use crate::error::{Error, Result};
use crate::geometry::{Axis, Size};
use crate::graph::TileGraph;
use crate::interval::Interval;
use tracing::{trace, warn};

/// Configuration for an [`OutputStage`].
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Preferred write alignment per axis (e.g. a burst size).
    pub max_alignment: Size,
    /// Mandatory write alignment per axis; failing this fails the tile.
    pub min_alignment: Size,
    /// Whether the output image is horizontally flipped.
    pub x_mirrored: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_alignment: Size::square(1),
            min_alignment: Size::square(1),
            x_mirrored: false,
        }
    }
}

/// The stage where pixels leave the graph.
///
/// Originates the start pass with the tile's requested output start and
/// terminates the end and crop passes, applying the write-alignment
/// rules and computing the trim between what upstream delivers and what
/// the output window wants.
#[derive(Debug)]
pub struct OutputStage {
    config: OutputConfig,
    core: StageCore,
    crop: Margins,
}

impl OutputStage {
    /// Create an output stage with the given write constraints.
    pub fn new(config: OutputConfig) -> Self {
        Self {
            config,
            core: StageCore::default(),
            crop: Margins::default(),
        }
    }
}

/// Align a candidate tile end, working in the unflipped coordinate space
/// when the output is mirrored. An end on the image edge is left alone.
fn align_end(input_end: i32, image_size: i32, align: i32, mirrored: bool) -> i32 {
    if mirrored {
        // It's the end in the unflipped coordinate space that must align.
        let unflipped = image_size - input_end;
        let unflipped = ((unflipped + align - 1) / align) * align;
        image_size - unflipped
    } else if input_end < image_size {
        input_end - input_end % align
    } else {
        input_end
    }
}

impl Stage for OutputStage {
    fn role(&self) -> StageRole {
        StageRole::Sink
    }

    fn configure(&mut self, upstream: Option<Size>) -> Result<Size> {
        let size = upstream.ok_or_else(|| {
            Error::InvalidGraph("output stage requires an upstream size".into())
        })?;
        self.core.input_size = size;
        self.core.output_size = size;
        Ok(size)
    }

    fn reset(&mut self) {
        self.core.reset();
        self.crop = Margins::default();
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
        self.core.output = Interval::point(output_start);
        self.core.input = Interval::point(output_start);
        graph.push_start_up(links.upstream()?, output_start, axis)
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
        let min_tile = graph.config().min_tile_size.along(axis);
        let mut output_end = input_end;

        // Pull the end back if very close to, but not quite at, the
        // edge - otherwise the next tile becomes infeasibly small.
        if output_end < image_size && image_size - output_end < min_tile {
            output_end = image_size - min_tile;
        }

        let mirrored = axis == Axis::X && self.config.x_mirrored;
        let aligned = align_end(
            output_end,
            image_size,
            self.config.max_alignment.along(axis).max(1),
            mirrored,
        );
        if aligned > self.core.output.start {
            output_end = aligned;
        } else {
            let aligned = align_end(
                output_end,
                image_size,
                self.config.min_alignment.along(axis).max(1),
                mirrored,
            );
            if aligned > self.core.output.start {
                output_end = aligned;
                warn!(stage = %links.name, %axis, "unable to achieve optimal alignment");
            } else if self.core.input.start < image_size {
                // Unless this branch already finished, a tile that makes
                // no aligned progress is unusable.
                return Err(Error::AlignmentUnsatisfiable {
                    stage: links.name.clone(),
                    axis,
                });
            }
        }

        self.core.input.set_end(input_end);
        self.core.output.set_end(output_end);
        self.push_end_up(output_end, axis)?;
        trace!(stage = %links.name, output_end, "push_end_down exit");
        Ok(self.core.input.end)
    }

    fn push_end_up(&mut self, output_end: i32, axis: Axis) -> Result<()> {
        trace!(output_end, %axis, "push_end_up");
        // We should just get given back our own output value.
        debug_assert_eq!(output_end, self.core.output.end);
        self.core.input.set_end(output_end);
        Ok(())
    }

    fn push_crop_down(
        &mut self,
        _graph: &mut TileGraph,
        links: &StageLinks,
        interval: Interval,
        axis: Axis,
    ) -> Result<()> {
        trace!(stage = %links.name, %interval, %axis, "push_crop_down");
        // Crop can't go any further down; whatever upstream delivers
        // beyond the output window gets trimmed here.
        let crop = Margins {
            low: self.core.output.start - interval.start,
            high: interval.end - self.core.output.end,
        };
        if crop.low < 0 || crop.high < 0 {
            return Err(Error::NegativeCrop {
                stage: links.name.clone(),
                resolved: interval,
                output: self.core.output,
            });
        }
        self.core.input = interval;
        self.crop = crop;
        // The output interval is not flipped for mirrored outputs; the
        // caller is expected to do that when programming the write.
        Ok(())
    }

    fn copy_out(&self, span: &mut TileSpan) {
        *span = self.core.span();
        span.crop = self.crop;
    }
}
