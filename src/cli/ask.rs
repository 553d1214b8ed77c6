use anyhow::{anyhow, Result};
use clap::Args;
use std::{
    io::{self, Read},
    path::PathBuf,
};
use tracing::{debug, info};

use crate::{
    app::{App, AppOptions, Renderer},
    config::Config,
};

/// Ask a single question non-interactively
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question. If not provided, it is read from stdin
    pub prompt: Vec<String>,

    /// Reply with text only
    #[arg(long = "no-speech")]
    pub no_speech: bool,

    /// Write the spoken reply to this file instead of the audio directory
    #[arg(long = "audio-out")]
    pub audio_out: Option<PathBuf>,

    /// Print the retrieved passages after the reply
    #[arg(long = "show-context")]
    pub show_context: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: Config, persona: Option<String>) -> Result<()> {
        debug!("Executing ask command");

        let prompt = self.get_prompt()?;
        if prompt.trim().is_empty() {
            return Err(anyhow!(
                "No question provided. Use arguments or pipe input via stdin."
            ));
        }

        info!("Asking: {}", prompt.chars().take(50).collect::<String>());

        let options = AppOptions {
            persona,
            speech: !self.no_speech,
        };
        let mut app = App::new(config, options).await?;
        let outcome = app.ask(&prompt, self.audio_out.as_deref()).await?;

        println!("{}", outcome.reply.text);

        if self.show_context || outcome.audio_path.is_some() {
            let mut renderer = Renderer::new(io::stderr(), false);
            if self.show_context {
                renderer.context(&outcome.context)?;
            }
            if let Some(path) = &outcome.audio_path {
                renderer.info(&format!("Audio written to {}", path.display()))?;
            }
        }

        Ok(())
    }

    fn get_prompt(&self) -> Result<String> {
        if !self.prompt.is_empty() {
            Ok(self.prompt.join(" "))
        } else {
            debug!("Reading question from stdin");
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| anyhow!("Failed to read from stdin: {}", e))?;
            Ok(buffer)
        }
    }
}
