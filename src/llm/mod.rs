//! Text generation through Amazon Bedrock
//!
//! The [`TextGenerator`] trait is the seam the request chain talks to; the
//! Bedrock implementation turns a filled prompt plus sampling parameters into
//! an `InvokeModel` call.

pub mod bedrock;
pub mod errors;
pub mod provider;
pub mod types;

pub use bedrock::*;
pub use errors::*;
pub use provider::*;
pub use types::*;
