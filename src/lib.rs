//! Chat with historical figures through a hosted LLM.
//!
//! [`sys`] holds the persona table, the conversation session and the
//! completion client; [`component`] and [`console`] are the two front ends.

pub mod component;
pub mod config;
pub mod console;
pub mod sys;
