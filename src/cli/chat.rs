use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::{
    app::{App, AppOptions},
    config::Config,
};

/// Start an interactive chat
#[derive(Args, Debug, Default)]
pub struct ChatCommand {
    /// Reply with text only, even when a speech provider is configured
    #[arg(long = "no-speech")]
    pub no_speech: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: Config, persona: Option<String>) -> Result<()> {
        let options = AppOptions {
            persona,
            speech: !self.no_speech,
        };
        let mut app = App::new(config, options).await?;
        app.run_interactive().await?;

        info!("Application finished");
        Ok(())
    }
}
