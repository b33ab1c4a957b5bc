//! Core stage trait and dispatch support types.

use crate::driver::TileSpan;
use crate::error::{Error, Result};
use crate::geometry::{Axis, Size};
use crate::graph::{StageId, TileGraph};
use crate::interval::Interval;
use smallvec::SmallVec;

// ============================================================================
// Roles
// ============================================================================

/// Structural role of a stage, used by graph validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageRole {
    /// Originates pixels; no upstream, exactly one downstream.
    Source,
    /// One upstream, exactly one downstream.
    Transform,
    /// One upstream, one or more downstream branches.
    FanOut,
    /// Consumes pixels; one upstream, no downstream.
    Sink,
}

// ============================================================================
// Links
// ============================================================================

/// A stage's position in the graph, snapshotted before dispatch.
///
/// The graph takes a stage out of its arena slot while one of its push
/// methods runs, so the stage cannot look its neighbors up itself; the
/// graph hands it this copy of its wiring instead. Downstream order is
/// registration order and defines branch index for the lifetime of the
/// graph.
#[derive(Debug, Clone)]
pub struct StageLinks {
    /// This stage's own id.
    pub id: StageId,
    /// Diagnostic name, as registered with [`TileGraph::add_stage`].
    pub name: String,
    /// The single upstream neighbor, `None` for sources.
    pub upstream: Option<StageId>,
    /// Ordered downstream branches, empty for sinks.
    pub downstream: SmallVec<[StageId; 2]>,
}

impl StageLinks {
    /// The upstream neighbor, or an error for a stage that must have one.
    pub fn upstream(&self) -> Result<StageId> {
        self.upstream.ok_or_else(|| {
            Error::InvalidGraph(format!("stage '{}' has no upstream neighbor", self.name))
        })
    }

    /// The single downstream neighbor, or an error for a stage that must
    /// have exactly one.
    pub fn downstream_one(&self) -> Result<StageId> {
        match self.downstream.as_slice() {
            [d] => Ok(*d),
            _ => Err(Error::InvalidGraph(format!(
                "stage '{}' expects exactly one downstream neighbor, has {}",
                self.name,
                self.downstream.len()
            ))),
        }
    }
}

// ============================================================================
// Shared per-stage state
// ============================================================================

/// Image sizes and the per-tile negotiation windows every stage carries.
///
/// Sizes are fixed at [`TileGraph::prepare`] time; the intervals are
/// reset to `(0, 0)` at the start of each tile/axis negotiation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageCore {
    /// Input image size, cached during size propagation.
    pub input_size: Size,
    /// Output image size, cached during size propagation.
    pub output_size: Size,
    /// Input window being negotiated for the current tile/axis.
    pub input: Interval,
    /// Output window being negotiated for the current tile/axis.
    pub output: Interval,
}

impl StageCore {
    /// Clear the per-tile windows back to `(0, 0)`.
    pub fn reset(&mut self) {
        self.input = Interval::default();
        self.output = Interval::default();
    }

    /// Snapshot the windows into a tile-descriptor span.
    pub fn span(&self) -> TileSpan {
        TileSpan {
            input: self.input,
            output: self.output,
            crop: Default::default(),
        }
    }
}

// ============================================================================
// Stage trait
// ============================================================================

/// A node in the tile-negotiation graph.
///
/// Implementors relay the three negotiation passes, adjusting intervals
/// by their own fixed pixel transform before or after delegating to their
/// neighbors through the graph. Transforms must be monotonic (a larger
/// output range never yields a smaller input range) and deterministic for
/// a fixed configuration.
///
/// All methods run on the single driver-initiated call chain; there is no
/// concurrency and no suspension point anywhere in a pass.
pub trait Stage {
    /// Structural role, checked by graph validation.
    fn role(&self) -> StageRole;

    /// Size-propagation hook, run once per [`TileGraph::prepare`] in
    /// topological order.
    ///
    /// `upstream` is the upstream neighbor's output image size (`None`
    /// for sources). Returns this stage's output image size.
    fn configure(&mut self, upstream: Option<Size>) -> Result<Size>;

    /// Reset per-tile state ahead of a new tile/axis negotiation.
    fn reset(&mut self);

    /// Input image size, valid after `configure`.
    fn input_size(&self) -> Size;

    /// Output image size, valid after `configure`.
    fn output_size(&self) -> Size;

    /// Start pass: given the output start this stage must produce,
    /// compute the input start it needs and delegate upstream.
    ///
    /// Sinks originate the call with the tile's requested output start;
    /// sources terminate it by recording the final input start.
    fn push_start_up(
        &mut self,
        graph: &mut TileGraph,
        links: &StageLinks,
        output_start: i32,
        axis: Axis,
    ) -> Result<()>;

    /// End pass: given the input pixels available, compute the output
    /// end achievable, delegate downstream, and report back the end this
    /// stage accepts in its own input coordinates.
    fn push_end_down(
        &mut self,
        graph: &mut TileGraph,
        links: &StageLinks,
        input_end: i32,
        axis: Axis,
    ) -> Result<i32>;

    /// Bookkeeping hook run when the downstream-accepted output end is
    /// known. "Up" means "back to caller": this never recurses.
    fn push_end_up(&mut self, output_end: i32, axis: Axis) -> Result<()>;

    /// Crop pass: record the final resolved interval (which must extend
    /// whatever was previously recorded), transform it by this stage's
    /// crop semantics, and delegate downstream.
    fn push_crop_down(
        &mut self,
        graph: &mut TileGraph,
        links: &StageLinks,
        interval: Interval,
        axis: Axis,
    ) -> Result<()>;

    /// Write the resolved windows into a per-tile descriptor span.
    ///
    /// Stages that do not participate in pixel movement may leave the
    /// span untouched.
    fn copy_out(&self, span: &mut TileSpan) {
        let _ = span;
    }
}

/// Shared guard for the crop pass: the new interval must extend what the
/// stage already recorded, otherwise a producer is reneging on pixels it
/// promised earlier in the same tile negotiation.
pub(crate) fn check_extends(name: &str, new: Interval, recorded: Interval) -> Result<()> {
    if new.extends(&recorded) {
        Ok(())
    } else {
        Err(Error::CropRegression {
            stage: name.to_string(),
            previous: recorded,
            requested: new,
        })
    }
}
