//! AWS credential resolution
//!
//! Where credentials come from depends on where the process runs:
//!
//! 1. inside a managed container (`AWS_EXECUTION_ENV` is set) they are read
//!    from a JSON secret in Secrets Manager, fetched with the container role;
//! 2. in a local container they are passed in as `aws_access_key_id` /
//!    `aws_secret_access_key` environment variables;
//! 3. otherwise the SDK default chain (the local CLI profile) is used.
//!
//! Branch selection and field extraction are pure functions; only the secret
//! fetch goes through the [`SecretStore`] seam.

mod env;
mod errors;
mod sdk;
mod secrets;

pub use env::*;
pub use errors::*;
pub use sdk::*;
pub use secrets::*;

use std::fmt;
use tracing::debug;

/// Set by the container runtime when running on managed infrastructure
pub const EXECUTION_ENV_VAR: &str = "AWS_EXECUTION_ENV";

/// Access key id passed into a local container
pub const ACCESS_KEY_ID_VAR: &str = "aws_access_key_id";

/// Secret access key passed into a local container
pub const SECRET_ACCESS_KEY_VAR: &str = "aws_secret_access_key";

/// Secret holding the container credentials
pub const DEFAULT_CREDENTIALS_SECRET: &str = "prod/ai-me/ecs_image";

/// Which branch produced the credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    SecretStore,
    Environment,
    LocalProfile,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CredentialSource::SecretStore => "secret store",
            CredentialSource::Environment => "environment",
            CredentialSource::LocalProfile => "local profile",
        };
        f.write_str(name)
    }
}

/// Static AWS credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// Outcome of resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCredentials {
    /// Explicit keys to hand to the SDK
    Explicit(Credentials),
    /// Defer to the SDK default provider chain
    Implicit { region: String },
}

impl ResolvedCredentials {
    pub fn region(&self) -> &str {
        match self {
            ResolvedCredentials::Explicit(credentials) => &credentials.region,
            ResolvedCredentials::Implicit { region } => region,
        }
    }
}

/// Inputs that do not come from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSettings {
    pub secret_id: String,
    pub region: String,
}

impl CredentialSettings {
    pub fn new(secret_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            region: region.into(),
        }
    }
}

/// Pick the credential branch; first match wins
pub fn select_source(env: &dyn EnvLookup) -> CredentialSource {
    if env.var(EXECUTION_ENV_VAR).is_some() {
        CredentialSource::SecretStore
    } else if env.var(ACCESS_KEY_ID_VAR).is_some() {
        CredentialSource::Environment
    } else {
        CredentialSource::LocalProfile
    }
}

/// Read both key fields from the environment
pub fn from_environment(env: &dyn EnvLookup, region: &str) -> CredentialResult<Credentials> {
    let access_key_id = non_empty_var(env, ACCESS_KEY_ID_VAR)?;
    let secret_access_key = non_empty_var(env, SECRET_ACCESS_KEY_VAR)?;

    Ok(Credentials {
        access_key_id,
        secret_access_key,
        region: region.to_string(),
    })
}

/// Read both key fields from a fetched secret
pub fn from_secret_document(
    document: &SecretDocument,
    region: &str,
) -> CredentialResult<Credentials> {
    Ok(Credentials {
        access_key_id: document.require_str(ACCESS_KEY_ID_VAR)?.to_string(),
        secret_access_key: document.require_str(SECRET_ACCESS_KEY_VAR)?.to_string(),
        region: region.to_string(),
    })
}

fn non_empty_var(env: &dyn EnvLookup, key: &'static str) -> CredentialResult<String> {
    env.var(key)
        .filter(|value| !value.is_empty())
        .ok_or(CredentialError::MissingEnvVar(key))
}

/// Run the three-way resolution. The store is only consulted on the
/// secret-store branch and a fetch failure is returned as-is.
pub async fn resolve(
    env: &dyn EnvLookup,
    store: &dyn SecretStore,
    settings: &CredentialSettings,
) -> CredentialResult<(CredentialSource, ResolvedCredentials)> {
    let source = select_source(env);
    debug!("Credential source selected: {}", source);

    let resolved = match source {
        CredentialSource::SecretStore => {
            let document = store.fetch(&settings.secret_id).await?;
            ResolvedCredentials::Explicit(from_secret_document(&document, &settings.region)?)
        }
        CredentialSource::Environment => {
            ResolvedCredentials::Explicit(from_environment(env, &settings.region)?)
        }
        CredentialSource::LocalProfile => ResolvedCredentials::Implicit {
            region: settings.region.clone(),
        },
    };

    Ok((source, resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn settings() -> CredentialSettings {
        CredentialSettings::new(DEFAULT_CREDENTIALS_SECRET, "us-east-1")
    }

    /// Serves one raw secret and counts fetches
    struct StubStore {
        raw: Option<&'static str>,
        fetches: AtomicUsize,
    }

    impl StubStore {
        fn with(raw: &'static str) -> Self {
            Self { raw: Some(raw), fetches: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Self { raw: None, fetches: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl SecretStore for StubStore {
        async fn fetch(&self, secret_id: &str) -> CredentialResult<SecretDocument> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match self.raw {
                Some(raw) => SecretDocument::parse(secret_id, raw),
                None => Err(CredentialError::SecretFetch {
                    secret_id: secret_id.to_string(),
                    message: "AccessDeniedException".to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_select_source_precedence() {
        assert_eq!(select_source(&env(&[])), CredentialSource::LocalProfile);
        assert_eq!(
            select_source(&env(&[(ACCESS_KEY_ID_VAR, "AKIA")])),
            CredentialSource::Environment
        );
        // The container flag wins even when keys are also present
        assert_eq!(
            select_source(&env(&[
                (EXECUTION_ENV_VAR, "AWS_ECS_FARGATE"),
                (ACCESS_KEY_ID_VAR, "AKIA"),
                (SECRET_ACCESS_KEY_VAR, "shh"),
            ])),
            CredentialSource::SecretStore
        );
    }

    #[tokio::test]
    async fn test_secret_store_branch() {
        let store = StubStore::with(
            r#"{"aws_access_key_id": "AKIASECRET", "aws_secret_access_key": "from-secret"}"#,
        );
        let vars = env(&[(EXECUTION_ENV_VAR, "AWS_ECS_FARGATE")]);

        let (source, resolved) = resolve(&vars, &store, &settings()).await.unwrap();

        assert_eq!(source, CredentialSource::SecretStore);
        assert_eq!(
            resolved,
            ResolvedCredentials::Explicit(Credentials {
                access_key_id: "AKIASECRET".to_string(),
                secret_access_key: "from-secret".to_string(),
                region: "us-east-1".to_string(),
            })
        );
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_secret_store_fetch_failure_propagates() {
        let store = StubStore::failing();
        let vars = env(&[(EXECUTION_ENV_VAR, "AWS_ECS_FARGATE")]);

        let err = resolve(&vars, &store, &settings()).await.unwrap_err();
        assert!(matches!(err, CredentialError::SecretFetch { .. }));
        assert!(err.to_string().contains(DEFAULT_CREDENTIALS_SECRET));
    }

    #[tokio::test]
    async fn test_secret_store_missing_field() {
        let store = StubStore::with(r#"{"aws_access_key_id": "AKIASECRET"}"#);
        let vars = env(&[(EXECUTION_ENV_VAR, "AWS_ECS_FARGATE")]);

        let err = resolve(&vars, &store, &settings()).await.unwrap_err();
        match err {
            CredentialError::MissingSecretField { field, .. } => {
                assert_eq!(field, SECRET_ACCESS_KEY_VAR)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_environment_branch() {
        let store = StubStore::failing();
        let vars = env(&[(ACCESS_KEY_ID_VAR, "AKIAENV"), (SECRET_ACCESS_KEY_VAR, "from-env")]);

        let (source, resolved) = resolve(&vars, &store, &settings()).await.unwrap();

        assert_eq!(source, CredentialSource::Environment);
        match resolved {
            ResolvedCredentials::Explicit(credentials) => {
                assert_eq!(credentials.access_key_id, "AKIAENV");
                assert_eq!(credentials.secret_access_key, "from-env");
                assert_eq!(credentials.region, "us-east-1");
            }
            other => panic!("unexpected resolution: {other:?}"),
        }
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_environment_branch_requires_secret_key() {
        let store = StubStore::failing();

        let vars = env(&[(ACCESS_KEY_ID_VAR, "AKIAENV")]);
        let err = resolve(&vars, &store, &settings()).await.unwrap_err();
        assert!(matches!(err, CredentialError::MissingEnvVar(SECRET_ACCESS_KEY_VAR)));

        let vars = env(&[(ACCESS_KEY_ID_VAR, "AKIAENV"), (SECRET_ACCESS_KEY_VAR, "")]);
        let err = resolve(&vars, &store, &settings()).await.unwrap_err();
        assert!(matches!(err, CredentialError::MissingEnvVar(SECRET_ACCESS_KEY_VAR)));
    }

    #[tokio::test]
    async fn test_local_profile_branch() {
        let store = StubStore::failing();

        let (source, resolved) = resolve(&env(&[]), &store, &settings()).await.unwrap();

        assert_eq!(source, CredentialSource::LocalProfile);
        assert_eq!(
            resolved,
            ResolvedCredentials::Implicit { region: "us-east-1".to_string() }
        );
        assert_eq!(resolved.region(), "us-east-1");
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_debug_redacts_secret_key() {
        let credentials = Credentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "super-secret".to_string(),
            region: "eu-west-1".to_string(),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("AKIA"));
        assert!(!rendered.contains("super-secret"));
    }
}
