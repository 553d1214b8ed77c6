//! Lazily built AWS SDK configuration shared by every service client

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_secretsmanager::config::Credentials as SdkCredentials;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::credentials::{
    errors::{CredentialError, CredentialResult},
    resolve, CredentialSettings, CredentialSource, EnvLookup,
    ProcessEnv, ResolvedCredentials, SecretStore, SecretsManagerStore,
};

const STATIC_PROVIDER_NAME: &str = "aime-resolved";

/// Resolves credentials once, on first use, and hands out the resulting
/// `SdkConfig`
pub struct AwsSession {
    settings: CredentialSettings,
    env: Arc<dyn EnvLookup>,
    store: Arc<dyn SecretStore>,
    resolved: OnceCell<(CredentialSource, SdkConfig)>,
}

impl AwsSession {
    pub fn new(
        settings: CredentialSettings,
        env: Arc<dyn EnvLookup>,
        store: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            settings,
            env,
            store,
            resolved: OnceCell::new(),
        }
    }

    /// Session backed by the process environment and Secrets Manager
    pub fn from_process(settings: CredentialSettings) -> Self {
        let store = SecretsManagerStore::with_default_chain(settings.region.clone());
        Self::new(settings, Arc::new(ProcessEnv), Arc::new(store))
    }

    pub fn region(&self) -> &str {
        &self.settings.region
    }

    /// Branch that produced the credentials, once resolved
    pub fn source(&self) -> Option<CredentialSource> {
        self.resolved.get().map(|(source, _)| *source)
    }

    pub async fn sdk_config(&self) -> CredentialResult<&SdkConfig> {
        let (_, config) = self
            .resolved
            .get_or_try_init(|| async {
                let (source, resolved) =
                    resolve(self.env.as_ref(), self.store.as_ref(), &self.settings).await?;
                info!(
                    "Resolved AWS credentials from {} for region {}",
                    source,
                    resolved.region()
                );
                Ok::<_, CredentialError>((source, build_sdk_config(&resolved).await))
            })
            .await?;

        Ok(config)
    }
}

/// Build an SDK configuration, injecting explicit keys when resolution
/// produced them
pub async fn build_sdk_config(resolved: &ResolvedCredentials) -> SdkConfig {
    let loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(resolved.region().to_string()));

    let loader = match resolved {
        ResolvedCredentials::Explicit(credentials) => loader.credentials_provider(
            SdkCredentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                None,
                None,
                STATIC_PROVIDER_NAME,
            ),
        ),
        ResolvedCredentials::Implicit { .. } => loader,
    };

    loader.load().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{SecretDocument, ACCESS_KEY_ID_VAR, SECRET_ACCESS_KEY_VAR};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct UnreachableStore;

    #[async_trait]
    impl SecretStore for UnreachableStore {
        async fn fetch(&self, secret_id: &str) -> CredentialResult<SecretDocument> {
            Err(CredentialError::SecretFetch {
                secret_id: secret_id.to_string(),
                message: "not reachable in tests".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_session_resolves_once_from_environment() {
        let env: HashMap<String, String> = HashMap::from([
            (ACCESS_KEY_ID_VAR.to_string(), "AKIAENV".to_string()),
            (SECRET_ACCESS_KEY_VAR.to_string(), "from-env".to_string()),
        ]);
        let session = AwsSession::new(
            CredentialSettings::new("unused", "eu-west-1"),
            Arc::new(env),
            Arc::new(UnreachableStore),
        );

        assert_eq!(session.source(), None);
        let config = session.sdk_config().await.unwrap();
        assert_eq!(
            config.region().map(|r| r.to_string()),
            Some("eu-west-1".to_string())
        );
        assert_eq!(session.source(), Some(CredentialSource::Environment));
        assert_eq!(session.region(), "eu-west-1");
    }

    #[tokio::test]
    async fn test_session_surfaces_resolution_failure() {
        let env: HashMap<String, String> =
            HashMap::from([(ACCESS_KEY_ID_VAR.to_string(), "AKIAENV".to_string())]);
        let session = AwsSession::new(
            CredentialSettings::new("unused", "us-east-1"),
            Arc::new(env),
            Arc::new(UnreachableStore),
        );

        assert!(session.sdk_config().await.is_err());
        assert_eq!(session.source(), None);
    }
}
