//! Persona records and prompt template lookup

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{
    chain::PromptTemplate,
    config::{ConfigError, ConfigResult},
};

/// A named bot: prompt, voice, knowledge base and display name
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Persona {
    /// Name shown in the chat header and next to replies
    pub display_name: String,

    /// Prompt file name (without `.txt`) inside the prompts directory
    #[serde(default)]
    pub prompt_id: Option<String>,

    /// Inline prompt template; takes precedence over `prompt_id`
    #[serde(default)]
    pub prompt: Option<String>,

    /// System message sent with every generation request
    #[serde(default)]
    pub system_message: Option<String>,

    /// Speech provider voice
    #[serde(default)]
    pub voice_id: Option<String>,

    /// Bedrock knowledge base; retrieval is skipped when unset
    #[serde(default)]
    pub knowledge_base_id: Option<String>,

    /// First message shown when a chat starts
    #[serde(default)]
    pub greeting: Option<String>,
}

impl Persona {
    /// Path of the prompt file named by `prompt_id`
    pub fn prompt_path(&self, prompts_dir: &Path) -> Option<PathBuf> {
        self.prompt_id
            .as_ref()
            .map(|id| prompts_dir.join(format!("{}.txt", id)))
    }

    /// Load the persona's prompt template: inline prompt, then the prompt
    /// file, then the built-in template.
    pub async fn load_template(&self, name: &str, prompts_dir: &Path) -> ConfigResult<PromptTemplate> {
        if let Some(prompt) = &self.prompt {
            return PromptTemplate::parse(prompt).map_err(|source| ConfigError::Prompt {
                persona: name.to_string(),
                source,
            });
        }

        if let Some(path) = self.prompt_path(prompts_dir) {
            debug!("Loading prompt for persona {} from {}", name, path.display());
            let source = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| ConfigError::PromptFile {
                    persona: name.to_string(),
                    path: path.clone(),
                    source,
                })?;
            return PromptTemplate::parse(&source).map_err(|source| ConfigError::Prompt {
                persona: name.to_string(),
                source,
            });
        }

        Ok(PromptTemplate::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{PromptError, PromptVars, Slot};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_inline_prompt_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("airon.txt"), "file {question}").unwrap();

        let persona = Persona {
            display_name: "AIron".to_string(),
            prompt: Some("inline {question}".to_string()),
            prompt_id: Some("airon".to_string()),
            ..Persona::default()
        };
        let template = persona.load_template("airon", dir.path()).await.unwrap();
        let vars = PromptVars {
            question: "q",
            ..PromptVars::default()
        };
        assert_eq!(template.render(&vars), "inline q");
    }

    #[tokio::test]
    async fn test_prompt_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("airon.txt"), "{history}\nQ: {question}").unwrap();

        let persona = Persona {
            display_name: "AIron".to_string(),
            prompt_id: Some("airon".to_string()),
            ..Persona::default()
        };
        let template = persona.load_template("airon", dir.path()).await.unwrap();
        assert!(template.uses(Slot::History));
    }

    #[tokio::test]
    async fn test_missing_prompt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let persona = Persona {
            display_name: "AIron".to_string(),
            prompt_id: Some("missing".to_string()),
            ..Persona::default()
        };
        let err = persona.load_template("airon", dir.path()).await.unwrap_err();
        match err {
            ConfigError::PromptFile { path, .. } => assert!(path.ends_with("missing.txt")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_prompt_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.txt"), "{input}").unwrap();
        let persona = Persona {
            display_name: "Bad".to_string(),
            prompt_id: Some("bad".to_string()),
            ..Persona::default()
        };
        let err = persona.load_template("bad", dir.path()).await.unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Prompt {
                source: PromptError::UnknownPlaceholder(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_builtin_fallback() {
        let persona = Persona {
            display_name: "Plain".to_string(),
            ..Persona::default()
        };
        let template = persona
            .load_template("plain", Path::new("/nonexistent"))
            .await
            .unwrap();
        assert_eq!(template, PromptTemplate::builtin());
    }
}
