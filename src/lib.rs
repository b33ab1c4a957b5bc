//! # Tileflow
//!
//! A tile-region negotiation engine for tiled image-processing pipelines.
//!
//! Hardware image-signal-processor blocks have bounded on-chip line buffers,
//! so frames are processed in small pixel tiles. Before a tile can be
//! programmed, every stage in the processing graph must know exactly which
//! input pixels it has to read and which output pixels it will produce, so
//! that downstream consumers get precisely what they need and nothing
//! over-reads past buffer or image bounds.
//!
//! Tileflow resolves those per-stage read/write windows. For each tile and
//! each scan axis it runs three passes over a stage graph:
//!
//! 1. **Start pass** (`push_start_up`): each sink asks upstream for the
//!    input start it needs; a fan-out node waits for all of its branches
//!    before issuing one combined request.
//! 2. **End pass** (`push_end_down`): the source announces how many input
//!    pixels are available; a fan-out node probes every branch, takes the
//!    most restrictive answer, and re-broadcasts it.
//! 3. **Crop pass** (`push_crop_down`): the final resolved interval fans
//!    out to every stage, asserting it never shrinks what was already
//!    promised.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use tileflow::prelude::*;
//!
//! let mut graph = TileGraph::with_config(TilingConfig::default());
//! let src = graph.add_stage("input", Box::new(InputStage::new(input_cfg)));
//! let split = graph.add_stage("split", Box::new(SplitStage::new()));
//! let out_hd = graph.add_stage("hd", Box::new(OutputStage::new(out_cfg.clone())));
//! let out_lo = graph.add_stage("lores", Box::new(OutputStage::new(out_cfg)));
//! graph.link(src, split)?;
//! graph.link(split, out_hd)?;
//! graph.link(split, out_lo)?;
//! graph.prepare()?;
//!
//! let tiles = tileflow::driver::tile_image(&mut graph)?;
//! ```
//!
//! The engine is single-threaded and synchronous: every push is a direct
//! call chain through the graph. It never touches pixels and never
//! allocates image memory; translating resolved windows into buffer
//! offsets and register programming is the caller's job.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod interval;
pub mod stage;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::TilingConfig;
    pub use crate::error::{Error, Result};
    pub use crate::geometry::{Axis, Size};
    pub use crate::graph::{StageId, TileGraph};
    pub use crate::interval::Interval;
    pub use crate::stage::{
        CropStage, FilterStage, InputStage, OutputStage, RescaleStage, SplitStage, Stage,
    };
}

pub use error::{Error, Result};
