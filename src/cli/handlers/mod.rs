//! CLI command handlers module
//!
//! This module is organized by functional domains:
//! - index: Index build, rebuild confirmation and clearing
//! - answer: Single questions, query cards, question sheets and export
//! - info: Index statistics and raw search

pub mod answer;
pub mod index;
pub mod info;

pub use answer::*;
pub use index::*;
pub use info::*;
