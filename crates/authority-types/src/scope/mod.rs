//! Resource/action scope matching and the subset algebra that governs delegation.

pub mod glob;
pub mod subset;

pub use glob::matches;
pub use subset::{is_action_subset, is_resource_subset, pattern_contains};
