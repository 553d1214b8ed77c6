mod ask;
mod chat;
mod personas;
mod root;
mod schema;
mod transcribe;

pub use root::Cli;
