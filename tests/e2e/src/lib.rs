//! End-to-end test support for the MedAtlas query engine
//!
//! - `mocks`: deterministic stub collaborators (embedder, LLM)
//! - `harness`: the shared fixture corpus and engine builders

pub mod harness;
pub mod mocks;
