//! Error types for Tileflow.

use crate::geometry::Axis;
use crate::interval::Interval;
use thiserror::Error;

/// Result type alias using Tileflow's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Tileflow operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A crop interval shrank between negotiation rounds.
    ///
    /// A producer promised a window and later asked the stage to accept a
    /// strictly smaller one within the same tile negotiation. This is a
    /// contract violation in the caller, never a recoverable condition:
    /// silently truncating would produce incorrect image output.
    #[error(
        "crop regression at stage '{stage}': new interval {requested} does not extend {previous}"
    )]
    CropRegression {
        /// Name of the offending stage.
        stage: String,
        /// Interval recorded in the previous round.
        previous: Interval,
        /// Narrower interval just pushed down.
        requested: Interval,
    },

    /// An output stage could not meet its mandatory alignment.
    #[error("output stage '{stage}' unable to achieve mandatory alignment along {axis}")]
    AlignmentUnsatisfiable {
        /// Name of the output stage.
        stage: String,
        /// Axis being negotiated.
        axis: Axis,
    },

    /// The resolved crop window does not cover a sink's output interval.
    #[error("negative crop at stage '{stage}': resolved {resolved} does not cover {output}")]
    NegativeCrop {
        /// Name of the output stage.
        stage: String,
        /// Interval resolved by the crop pass.
        resolved: Interval,
        /// Output interval the sink committed to.
        output: Interval,
    },

    /// Stage not found in the graph.
    #[error("stage not found: {name}")]
    StageNotFound {
        /// Stage name or id description.
        name: String,
    },

    /// A push re-entered a stage that is already on the call chain.
    #[error("stage '{name}' is already being traversed (re-entrant push)")]
    StageBusy {
        /// Name of the busy stage.
        name: String,
    },

    /// Linking two stages would create a cycle.
    #[error("linking '{upstream}' -> '{downstream}' would create a cycle")]
    WouldCycle {
        /// Upstream stage name.
        upstream: String,
        /// Downstream stage name.
        downstream: String,
    },

    /// A stage was given a second upstream neighbor.
    #[error("stage '{name}' already has an upstream neighbor")]
    DuplicateUpstream {
        /// Name of the stage.
        name: String,
    },

    /// Graph validation failed.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// A push entry point was called before `TileGraph::prepare`.
    #[error("graph has not been prepared")]
    Unprepared,

    /// No sink advanced during a driver round.
    ///
    /// The frame cannot be covered: some branch keeps answering with a
    /// non-advancing interval. Surfaced by the driver loop rather than
    /// detected inside the negotiation passes.
    #[error("tiling stalled along {axis}: no output advanced")]
    TileStall {
        /// Axis being tiled.
        axis: Axis,
    },
}
