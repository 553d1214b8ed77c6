//! JSON secrets fetched from AWS Secrets Manager

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_secretsmanager::{error::DisplayErrorContext, Client};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::credentials::errors::{CredentialError, CredentialResult};

/// A secret whose string value is a flat JSON object
#[derive(Debug, Clone)]
pub struct SecretDocument {
    secret_id: String,
    fields: Map<String, Value>,
}

impl SecretDocument {
    /// Parse the raw secret string
    pub fn parse(secret_id: &str, raw: &str) -> CredentialResult<Self> {
        let value: Value = serde_json::from_str(raw).map_err(|e| CredentialError::SecretFormat {
            secret_id: secret_id.to_string(),
            message: e.to_string(),
        })?;

        match value {
            Value::Object(fields) => Ok(Self {
                secret_id: secret_id.to_string(),
                fields,
            }),
            other => Err(CredentialError::SecretFormat {
                secret_id: secret_id.to_string(),
                message: format!("expected an object, found {}", json_kind(&other)),
            }),
        }
    }

    /// String field by name, if present and a string
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// String field by name; absent, non-string and empty values are errors
    pub fn require_str(&self, field: &str) -> CredentialResult<&str> {
        match self.get_str(field) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(CredentialError::MissingSecretField {
                secret_id: self.secret_id.clone(),
                field: field.to_string(),
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Source of JSON secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch and parse the secret named `secret_id`
    async fn fetch(&self, secret_id: &str) -> CredentialResult<SecretDocument>;
}

/// Fetch a single string field from a JSON secret
pub async fn get_secret_string(
    store: &dyn SecretStore,
    secret_id: &str,
    key: &str,
) -> CredentialResult<String> {
    let document = store.fetch(secret_id).await?;
    document.require_str(key).map(str::to_string)
}

enum StoreConfig {
    DefaultChain { region: String },
    Shared(SdkConfig),
}

/// Secrets Manager backed store. The client is created on first fetch.
pub struct SecretsManagerStore {
    config: StoreConfig,
    client: OnceCell<Client>,
}

impl SecretsManagerStore {
    /// Store that authenticates with the SDK default chain (container role,
    /// profile, ...) in `region`
    pub fn with_default_chain(region: impl Into<String>) -> Self {
        Self {
            config: StoreConfig::DefaultChain {
                region: region.into(),
            },
            client: OnceCell::new(),
        }
    }

    /// Store that reuses an already resolved SDK configuration
    pub fn with_config(config: &SdkConfig) -> Self {
        Self {
            config: StoreConfig::Shared(config.clone()),
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                match &self.config {
                    StoreConfig::DefaultChain { region } => {
                        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                            .region(Region::new(region.clone()))
                            .load()
                            .await;
                        Client::new(&sdk_config)
                    }
                    StoreConfig::Shared(sdk_config) => Client::new(sdk_config),
                }
            })
            .await
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn fetch(&self, secret_id: &str) -> CredentialResult<SecretDocument> {
        debug!("Fetching secret {}", secret_id);

        let output = self
            .client()
            .await
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| CredentialError::SecretFetch {
                secret_id: secret_id.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let raw = output
            .secret_string()
            .ok_or_else(|| CredentialError::SecretFormat {
                secret_id: secret_id.to_string(),
                message: "secret has no string value".to_string(),
            })?;

        SecretDocument::parse(secret_id, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedStore(HashMap<String, String>);

    #[async_trait]
    impl SecretStore for FixedStore {
        async fn fetch(&self, secret_id: &str) -> CredentialResult<SecretDocument> {
            match self.0.get(secret_id) {
                Some(raw) => SecretDocument::parse(secret_id, raw),
                None => Err(CredentialError::SecretFetch {
                    secret_id: secret_id.to_string(),
                    message: "ResourceNotFoundException".to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_parse_object() {
        let doc = SecretDocument::parse("s", r#"{"api_key": "abc", "n": 3}"#).unwrap();
        assert_eq!(doc.get_str("api_key"), Some("abc"));
        assert_eq!(doc.get_str("n"), None);
        assert_eq!(doc.get_str("missing"), None);
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = SecretDocument::parse("s", r#"["a"]"#).unwrap_err();
        assert!(matches!(err, CredentialError::SecretFormat { .. }));
        assert!(err.to_string().contains("an array"));

        let err = SecretDocument::parse("s", "not json").unwrap_err();
        assert!(matches!(err, CredentialError::SecretFormat { .. }));
    }

    #[test]
    fn test_require_str_rejects_empty_and_non_string() {
        let doc = SecretDocument::parse("s", r#"{"empty": "", "n": 1}"#).unwrap();
        assert!(matches!(
            doc.require_str("empty"),
            Err(CredentialError::MissingSecretField { .. })
        ));
        let err = doc.require_str("n").unwrap_err();
        assert_eq!(err.to_string(), "Secret 's' has no string field 'n'");
    }

    #[tokio::test]
    async fn test_get_secret_string() {
        let store = FixedStore(HashMap::from([(
            "prod/aime/elevenlabs".to_string(),
            r#"{"api_key": "xi-123"}"#.to_string(),
        )]));

        let key = get_secret_string(&store, "prod/aime/elevenlabs", "api_key")
            .await
            .unwrap();
        assert_eq!(key, "xi-123");

        let err = get_secret_string(&store, "prod/aime/elevenlabs", "other")
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::MissingSecretField { .. }));

        let err = get_secret_string(&store, "unknown", "api_key")
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::SecretFetch { .. }));
    }
}
