//! Linked class model, heap, interpreter, monitors/threads and the native
//! bridge. Everything past parsing lives here.

pub mod class_loader;
pub mod fmt;
pub mod global;
pub mod heap;
pub mod inheritance;
pub mod interpreter;
pub mod monitor;
pub mod native;
pub mod stdio;
mod structs;
pub mod thread;

pub use structs::*;
