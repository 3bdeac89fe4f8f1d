//! Report output.
//!
//! Rendering of cycle updates into files, the live agent board and the
//! rolling ticker.

pub mod generator;
pub mod progress;
pub mod ticker;

pub use generator::{
    generate_json_report, generate_markdown_report, write_report, CycleReport, VerifiedItem,
};
pub use progress::AgentBoard;
pub use ticker::Ticker;
