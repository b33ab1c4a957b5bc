//! Stage implementations.
//!
//! Non-branching stages are one-to-one forwarders: they adjust the
//! interval by their own fixed transform (crop offset, filter support,
//! scale) before or after delegating to their single neighbor.
//! [`SplitStage`] is the fan-out node that reconciles divergent branch
//! requirements; see its docs for the barrier and reconciliation rules.

mod crop;
mod filter;
mod input;
mod output;
mod rescale;
mod split;
mod traits;

pub use crop::{CropConfig, CropStage};
pub use filter::{FilterConfig, FilterStage};
pub use input::{InputConfig, InputStage};
pub use output::{OutputConfig, OutputStage};
pub use rescale::{RescaleConfig, RescaleStage};
pub use split::SplitStage;
pub use traits::{Stage, StageCore, StageLinks, StageRole};

pub(crate) use traits::check_extends;
