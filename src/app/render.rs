//! Terminal output for the chat REPL

use crossterm::style::{Color, Stylize};
use std::{
    io::{self, Write},
    path::Path,
};

use crate::{
    retrieval::Passage,
    session::{ChatMessage, MessageRole, SessionStats},
    utils::text::{format::format_file_size, string::truncate, string::word_wrap},
};

const WRAP_WIDTH: usize = 100;
const PASSAGE_PREVIEW: usize = 160;

fn paint(enabled: bool, text: &str, color: Color, bold: bool) -> String {
    if !enabled {
        return text.to_string();
    }
    let styled = text.with(color);
    if bold {
        styled.bold().to_string()
    } else {
        styled.to_string()
    }
}

/// Writes chat output, styled when `color` is set
pub struct Renderer<W: Write> {
    out: W,
    color: bool,
}

impl Renderer<io::Stdout> {
    pub fn stdout() -> Self {
        use std::io::IsTerminal;
        let color = io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn header(&mut self, display_name: &str, model: &str, speaks: bool) -> io::Result<()> {
        let title = paint(self.color, display_name, Color::Cyan, true);
        let details = paint(
            self.color,
            &format!("model {} · speech {}", model, if speaks { "on" } else { "off" }),
            Color::DarkGrey,
            false,
        );
        writeln!(self.out, "{}  {}", title, details)?;
        let hint = paint(self.color, "Type /help for commands.", Color::DarkGrey, false);
        writeln!(self.out, "{}", hint)
    }

    /// Prompt shown before reading a line
    pub fn prompt(&mut self) -> io::Result<()> {
        write!(self.out, "{} ", paint(self.color, "You>", Color::Green, true))?;
        self.out.flush()
    }

    pub fn reply(&mut self, speaker: &str, text: &str, audio: Option<&Path>) -> io::Result<()> {
        let speaker = paint(self.color, &format!("{}>", speaker), Color::Cyan, true);
        writeln!(self.out, "{}", speaker)?;
        for line in word_wrap(text, WRAP_WIDTH) {
            writeln!(self.out, "{}", line)?;
        }
        if let Some(path) = audio {
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or_default();
            let note = format!("♪ {} ({})", path.display(), format_file_size(size));
            writeln!(self.out, "{}", paint(self.color, &note, Color::DarkGrey, false))?;
        }
        writeln!(self.out)
    }

    pub fn context(&mut self, passages: &[Passage]) -> io::Result<()> {
        if passages.is_empty() {
            return self.info("(no passages retrieved)");
        }
        for (i, passage) in passages.iter().enumerate() {
            let mut label = format!("[{}]", i + 1);
            if let Some(score) = passage.score {
                label.push_str(&format!(" {:.3}", score));
            }
            if let Some(source) = &passage.source {
                label.push(' ');
                label.push_str(source);
            }
            writeln!(self.out, "{}", paint(self.color, &label, Color::Yellow, false))?;
            let preview = truncate(&passage.text.replace('\n', " "), PASSAGE_PREVIEW);
            writeln!(self.out, "    {}", preview)?;
        }
        Ok(())
    }

    pub fn history(&mut self, speaker: &str, messages: &[ChatMessage]) -> io::Result<()> {
        if messages.is_empty() {
            return self.info("History is empty.");
        }
        for message in messages {
            let who = match message.role {
                MessageRole::User => paint(self.color, "You", Color::Green, true),
                MessageRole::Assistant => paint(self.color, speaker, Color::Cyan, true),
            };
            let time = message.timestamp.format("%H:%M:%S").to_string();
            writeln!(
                self.out,
                "{} {}: {}",
                paint(self.color, &time, Color::DarkGrey, false),
                who,
                truncate(&message.text.replace('\n', " "), WRAP_WIDTH)
            )?;
        }
        Ok(())
    }

    pub fn stats(&mut self, stats: &SessionStats) -> io::Result<()> {
        let mut line = format!(
            "{} messages ({} from you, {} replies, {} failed turns)",
            stats.message_count, stats.user_messages, stats.assistant_messages, stats.failed_turns
        );
        if let Some(at) = stats.last_message_at {
            line.push_str(&format!(", last at {}", at.format("%H:%M:%S")));
        }
        self.info(&line)
    }

    pub fn help(&mut self) -> io::Result<()> {
        for (command, description) in [
            ("/history", "show this conversation"),
            ("/reset", "clear the conversation"),
            ("/speech", "turn spoken replies on or off"),
            ("/help", "show this help"),
            ("/quit", "leave the chat"),
        ] {
            let command = paint(self.color, &format!("{:<9}", command), Color::Yellow, false);
            writeln!(self.out, "  {}  {}", command, description)?;
        }
        Ok(())
    }

    pub fn info(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{}", paint(self.color, message, Color::DarkGrey, false))
    }

    pub fn error(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{} {}", paint(self.color, "error:", Color::Red, true), message)
    }
}
