//! Storage module for run inputs and durable progress
//!
//! This module handles:
//! - Reading seed rows from the input CSV
//! - Loading and saving the visited-URL checkpoint

mod checkpoint;
mod input;

pub use checkpoint::Checkpoint;
pub use input::{read_input, InputRecord, InputRow};
