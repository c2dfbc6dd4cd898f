pub mod compatibility;
pub mod normalizer;
pub mod selector;
