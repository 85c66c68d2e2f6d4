//! Prompt line for `hdy chat`.
//!
//! The prompt shows the connection state and is redrawn below incoming
//! messages, which are printed through the paired `SharedWriter`. Submitted
//! lines are trimmed and kept in history, so Up recalls a message that
//! failed to send.

use rustyline_async::{Readline, ReadlineError, ReadlineEvent, SharedWriter};

/// What the chat loop does next with the keyboard.
#[derive(Debug)]
pub enum InputEvent {
    /// A trimmed line: a chat message or a slash command. May be empty.
    Message(String),
    /// Ctrl+D or a closed terminal; leave the chat.
    Eof,
    /// Ctrl+C; the line is discarded and the chat stays open.
    Interrupted,
}

pub struct ChatInput {
    rl: Readline,
}

impl ChatInput {
    /// Start the prompt. Chat output goes through the returned writer so it
    /// never splits the line being typed.
    pub fn new(prompt: String) -> Result<(Self, SharedWriter), ReadlineError> {
        let (rl, stdout) = Readline::new(prompt)?;
        Ok((Self { rl }, stdout))
    }

    /// Called when the connection status in the prompt changes.
    pub fn update_prompt(&mut self, prompt: &str) {
        let _ = self.rl.update_prompt(prompt);
    }

    /// Next line from the user. Cancel-safe, so the loop can race it
    /// against session snapshots in `select!`.
    pub async fn read_line(&mut self) -> InputEvent {
        match self.rl.readline().await {
            Ok(ReadlineEvent::Line(line)) => {
                let trimmed = line.trim().to_string();
                if !trimmed.is_empty() {
                    self.rl.add_history_entry(trimmed.clone());
                }
                InputEvent::Message(trimmed)
            }
            Ok(ReadlineEvent::Eof) => InputEvent::Eof,
            Ok(ReadlineEvent::Interrupted) => InputEvent::Interrupted,
            Err(_) => InputEvent::Eof,
        }
    }

    pub fn clear(&mut self) {
        let _ = self.rl.clear();
    }

    /// Put the terminal back in normal mode before `hdy` prints anything else.
    pub fn flush(&mut self) {
        let _ = self.rl.flush();
    }
}
