use anyhow::Result;
use clap::Args;
use std::io::{self, Write};

use crate::config::Config;

/// List configured personas
#[derive(Args, Debug, Default)]
pub struct PersonasCommand {}

impl PersonasCommand {
    pub fn execute(&self, config: &Config, persona: Option<&str>) -> Result<()> {
        if persona.is_some() {
            config.persona(persona)?;
        }
        let mut stdout = io::stdout().lock();
        write_personas(&mut stdout, config, persona)?;
        Ok(())
    }
}

/// One line per persona: key, display name and what it is wired to.
/// The persona a chat would use with `selected` is starred.
pub fn write_personas<W: Write>(
    out: &mut W,
    config: &Config,
    selected: Option<&str>,
) -> io::Result<()> {
    if config.personas.is_empty() {
        return writeln!(out, "No personas configured.");
    }

    let default = config.persona(selected).ok().map(|(name, _)| name);
    for (name, persona) in &config.personas {
        let marker = if Some(name.as_str()) == default { "*" } else { " " };
        let mut details = Vec::new();
        if let Some(kb) = &persona.knowledge_base_id {
            details.push(format!("kb {}", kb));
        }
        if let Some(voice) = &persona.voice_id {
            details.push(format!("voice {}", voice));
        }
        match (&persona.prompt, &persona.prompt_id) {
            (Some(_), _) => details.push("inline prompt".to_string()),
            (None, Some(id)) => details.push(format!("prompt {}", id)),
            (None, None) => details.push("default prompt".to_string()),
        }
        writeln!(
            out,
            "{} {:<16} {:<20} {}",
            marker,
            name,
            persona.display_name,
            details.join(", ")
        )?;
    }
    Ok(())
}
