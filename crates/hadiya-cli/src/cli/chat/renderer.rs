//! Turns session snapshots into terminal lines.
//!
//! The session publishes whole snapshots; [`ThreadRenderer`] remembers what
//! it already printed and emits only what changed: new delivered messages,
//! connection transitions, and notices.

use std::collections::HashSet;

use console::style;

use hadiya_core::chat::{SessionNotice, SessionSnapshot};
use hadiya_types::ids::{MessageId, UserId};
use hadiya_types::session::ConnectionStatus;

use crate::cli::output;

pub struct ThreadRenderer {
    me: UserId,
    shown: HashSet<MessageId>,
    status: Option<ConnectionStatus>,
    attempt: u32,
    live: bool,
    notice: Option<SessionNotice>,
}

impl ThreadRenderer {
    pub fn new(me: UserId) -> Self {
        Self {
            me,
            shown: HashSet::new(),
            status: None,
            attempt: 0,
            live: true,
            notice: None,
        }
    }

    /// Lines to print for everything new in `snapshot`.
    pub fn render(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        let mut lines = Vec::new();

        for message in snapshot.messages() {
            if self.shown.insert(message.id) {
                lines.push(output::format_message(message, self.me));
            }
        }

        if self.live && !snapshot.live_updates_available {
            lines.push(format!(
                "{} live updates unavailable, messages may be out of date. /reconnect to try again",
                style("✗ offline:").red().bold()
            ));
        } else if snapshot.status != ConnectionStatus::Connected
            && snapshot.reconnect_attempt > self.attempt
        {
            lines.push(format!(
                "{}",
                style(format!(
                    "connection lost, reconnecting (attempt {})",
                    snapshot.reconnect_attempt
                ))
                .yellow()
            ));
        } else if snapshot.status == ConnectionStatus::Connected
            && self.status != Some(ConnectionStatus::Connected)
        {
            lines.push(format!("{}", style("● live").green()));
        }

        if snapshot.notice != self.notice {
            if let Some(notice) = &snapshot.notice {
                lines.push(format_notice(notice));
            }
        }

        self.status = Some(snapshot.status);
        self.attempt = snapshot.reconnect_attempt;
        self.live = snapshot.live_updates_available;
        self.notice = snapshot.notice.clone();
        lines
    }
}

fn format_notice(notice: &SessionNotice) -> String {
    match notice {
        SessionNotice::AuthRequired(message) => {
            format!("{} {message}", style("✗ signed out:").red().bold())
        }
        SessionNotice::Network(message) => format!("{} {message}", style("!").yellow().bold()),
    }
}

/// Input prompt reflecting the connection state.
pub fn prompt_for(snapshot: &SessionSnapshot) -> String {
    if !snapshot.live_updates_available {
        format!("{} > ", style("offline").red())
    } else if snapshot.status == ConnectionStatus::Connected {
        "> ".to_string()
    } else {
        format!("{} > ", style(snapshot.status).yellow())
    }
}

/// `/status` output.
pub fn status_text(snapshot: &SessionSnapshot) -> String {
    let live = if snapshot.live_updates_available {
        style("available").green()
    } else {
        style("unavailable").red()
    };
    let mut text = format!(
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        style("Conversation:").bold(),
        snapshot.conversation_id,
        style("Connection:").bold(),
        snapshot.status,
        style("Live updates:").bold(),
        live,
        style("Messages:").bold(),
        snapshot.messages().count(),
    );
    if snapshot.reconnect_attempt > 0 {
        text.push_str(&format!(
            "  {} {}\n",
            style("Retry attempt:").bold(),
            snapshot.reconnect_attempt
        ));
    }
    if let Some(notice) = &snapshot.notice {
        text.push_str(&format!("  {}\n", format_notice(notice)));
    }
    text
}
