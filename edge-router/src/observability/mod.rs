//! Structured event names and field helpers shared by every layer.

pub mod events;
pub mod fields;
