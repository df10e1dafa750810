//! Integration tests for Layer 2: the join network
//!
//! Tests join completeness, negation and existence, grouped conditions,
//! sharing, retraction, incremental reset, and object modification.

mod fixtures;

mod incremental;
mod joins;
mod negation;
mod retraction;
mod sharing;
