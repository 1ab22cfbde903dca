pub mod quality;
pub mod sample;
pub mod window;

pub use quality::{SignalQuality, SignalQualityMonitor};
