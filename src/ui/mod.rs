pub mod controls;
pub mod meter;
pub mod spectrum;
