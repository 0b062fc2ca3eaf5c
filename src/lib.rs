//! WebScout CLI library: process configuration and LLM providers.
//!
//! The orchestration core lives in the workspace crates; this crate wires
//! a concrete LLM vendor and the CDP browser backend to the CLI surface.

pub mod config;
pub mod llm;
