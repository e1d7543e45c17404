//! Raw class-file model: the exact on-disk structure, before linking.

pub mod parser;
mod structs;

pub use structs::*;
