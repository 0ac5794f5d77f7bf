//! Internal utilities.

pub mod id_source;

pub use id_source::{EntropyIds, IdSource, SequentialIds};
