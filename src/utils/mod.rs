//! Small text and filesystem helpers

pub mod fs;
pub mod text;
