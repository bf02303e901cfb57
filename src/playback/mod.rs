// Playback module
// The engine that owns every running device stream

pub mod active;
pub mod engine;

pub use active::StreamState;
pub use engine::{DeviceFailure, PlayReport, PlaybackEngine};
