//! Chat sessions and their message history
//!
//! History lives in memory for the lifetime of the process.

mod history;
mod session;

pub use history::*;
pub use session::*;
