//! Cross-layer integration tests for Reticle
//!
//! Tests that drive the engine the way a rule interpreter would: firing
//! activations, delaying pattern matching, resetting, and inspecting.


mod delay;
mod inspection;
mod reset;
