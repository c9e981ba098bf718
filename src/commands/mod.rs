pub mod refine;
pub mod sample;
