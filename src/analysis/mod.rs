pub mod loudness;
pub mod spectrum;
