//! Pure functions for value-stream map layout.
//!
//! Level arithmetic, filler counts and the checks that decide when a node has
//! to move. The graph code calls into these so the rules can be tested
//! without building a graph.
//!
//! # Tiger Style
//!
//! - Pure functions with no side effects
//! - Deterministic: same inputs always produce same outputs
//! - Saturating arithmetic for overflow safety

mod fan_in;
mod levels;

pub use fan_in::*;
pub use levels::*;
