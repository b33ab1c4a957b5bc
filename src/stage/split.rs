//! Fan-out stage: one producer feeding several independent consumers.

use super::{check_extends, Stage, StageCore, StageLinks, StageRole};
use crate::driver::TileSpan;
use crate::error::Result;
use crate::geometry::{Axis, Size};
use crate::graph::TileGraph;
use crate::interval::Interval;
use tracing::{debug, trace};

/// A fan-out node with one upstream neighbor and an ordered collection
/// of downstream branches.
///
/// Split stages pass image data through unchanged (input size is output
/// size); their whole job is reconciling divergent per-branch
/// requirements into a single upstream request, and divergent per-branch
/// availability into a single most-restrictive downstream answer.
///
/// Per tile and axis the three passes behave as:
///
/// - **Start**: each branch's upward recursion lands here once. The
///   requests are folded leftward; only when every branch has reported
///   does one combined request go upstream. The barrier is a plain
///   counter against the branch count, reset per phase - all calls are
///   nested within the single driver-initiated traversal, so no
///   synchronization primitive is involved.
/// - **End**: every branch is first probed with the offered end to learn
///   what it could accept, the minimum answer wins, and every branch is
///   then told that minimum so it re-derives its own downstream effects
///   from the authoritative value.
/// - **Crop**: the resolved interval goes down all branches unchanged; a
///   branch that wants less crops it off itself.
#[derive(Debug, Default)]
pub struct SplitStage {
    core: StageCore,
    /// Branches heard from so far in the current start pass.
    reported: usize,
}

impl SplitStage {
    /// Create a new split stage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for SplitStage {
    fn role(&self) -> StageRole {
        StageRole::FanOut
    }

    fn configure(&mut self, upstream: Option<Size>) -> Result<Size> {
        let size = upstream.ok_or_else(|| {
            crate::error::Error::InvalidGraph("split stage requires an upstream size".into())
        })?;
        self.core.input_size = size;
        self.core.output_size = size;
        Ok(size)
    }

    fn reset(&mut self) {
        self.core.reset();
        self.reported = 0;
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
        // Wait until all the downstream branches have given us their
        // number, then send the leftmost one up the pipeline.
        if self.reported == 0 {
            self.core.input = Interval::point(output_start);
        } else {
            self.core.input.union_left(output_start);
        }
        self.reported += 1;
        if self.reported == links.downstream.len() {
            self.reported = 0;
            self.core.output = self.core.input;
            trace!(
                stage = %links.name,
                input_start = self.core.input.start,
                "push_start_up exit - forwarding combined request"
            );
            graph.push_start_up(links.upstream()?, self.core.input.start, axis)?;
        }
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
        // First tell all the branches the maximum number of pixels they
        // can have, and remember the least far-on end position any of
        // them needs. This avoids over-read when one branch can accept
        // way fewer pixels than another.
        self.core.input.set_end(input_end);
        for &branch in &links.downstream {
            let branch_end = graph.push_end_down(branch, input_end, axis)?;
            self.core.input.clamp_end(branch_end);
        }
        // Now tell all the branches what they will really get: the
        // minimum end point. A branch that could take more re-clamps.
        for &branch in &links.downstream {
            graph.push_end_down(branch, self.core.input.end, axis)?;
        }
        self.core.output.set_end(self.core.input.end);
        self.push_end_up(self.core.input.end, axis)?;
        trace!(stage = %links.name, end = self.core.input.end, "push_end_down exit");
        Ok(self.core.input.end)
    }

    fn push_end_up(&mut self, output_end: i32, axis: Axis) -> Result<()> {
        // Genuinely nothing to do: "up" means back to our caller, and
        // the return value of push_end_down already carries the answer.
        trace!(output_end, %axis, "push_end_up");
        Ok(())
    }

    fn push_crop_down(
        &mut self,
        graph: &mut TileGraph,
        links: &StageLinks,
        interval: Interval,
        axis: Axis,
    ) -> Result<()> {
        debug!(stage = %links.name, %interval, %axis, "push_crop_down");
        // Whatever we get goes down all the branches. Any branch that
        // wants less has to start by cropping off what it can't handle.
        check_extends(&links.name, interval, self.core.input)?;
        self.core.input = interval;
        self.core.output = interval;
        for &branch in &links.downstream {
            graph.push_crop_down(branch, interval, axis)?;
        }
        Ok(())
    }

    fn copy_out(&self, span: &mut TileSpan) {
        *span = self.core.span();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_clears_barrier() {
        let mut split = SplitStage::new();
        split.reported = 1;
        split.core.input = Interval::new(4, 80);
        split.reset();
        assert_eq!(split.reported, 0);
        assert_eq!(split.core.input, Interval::default());
    }

    #[test]
    fn test_configure_passthrough() {
        let mut split = SplitStage::new();
        let out = split.configure(Some(Size::new(640, 480))).unwrap();
        assert_eq!(out, Size::new(640, 480));
        assert_eq!(split.input_size(), split.output_size());
    }

    #[test]
    fn test_configure_without_upstream_fails() {
        let mut split = SplitStage::new();
        assert!(split.configure(None).is_err());
    }
}
