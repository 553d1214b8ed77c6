//! Error types for credential resolution

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Secret store request for '{secret_id}' failed: {message}")]
    SecretFetch { secret_id: String, message: String },

    #[error("Secret '{secret_id}' is not a JSON object: {message}")]
    SecretFormat { secret_id: String, message: String },

    #[error("Secret '{secret_id}' has no string field '{field}'")]
    MissingSecretField { secret_id: String, field: String },

    #[error("AWS credentials not found: environment variable {0} is not set")]
    MissingEnvVar(&'static str),
}

pub type CredentialResult<T> = Result<T, CredentialError>;
