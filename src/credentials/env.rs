//! Environment variable access behind a trait so resolution can be tested
//! without touching the process environment.

use std::collections::HashMap;

pub trait EnvLookup: Send + Sync {
    /// Value of `key`, or `None` when the variable is not set
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}
