//! Analysis modules.
//!
//! Everything that happens to intel after collection: duplicate
//! suppression, ranking, the situation assessment and cross-verification.

pub mod aggregator;
pub mod dedupe;
pub mod synthesizer;
pub mod verification;

pub use aggregator::*;
pub use dedupe::{dedupe, fingerprint, FingerprintSet};
pub use synthesizer::{fetch_breaking, synthesize};
pub use verification::verify;
