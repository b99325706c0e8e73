pub mod generators;
pub mod levels;
