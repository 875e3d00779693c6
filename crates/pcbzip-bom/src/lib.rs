//! BOM handling for board assembly orders.

pub mod assembly;
pub mod error;
mod line;
pub mod normalize;

pub use assembly::{
    Action, ActionSpec, AssemblyCommand, AssemblyConfig, AssemblySession, AssemblyState,
    ResumePolicy, ACTIONS,
};
pub use error::{BomError, Result};
pub use line::BomLine;
pub use normalize::{parse_bom, read_bom, render_bom, write_bom, BomShape, NormalizedBom};
