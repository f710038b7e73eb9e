pub mod decoder;
pub mod engine;
pub mod taps;
pub mod types;
