//! Conversation commands: list and open.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use hadiya_core::chat::MessageApi;
use hadiya_types::chat::{Conversation, ConversationStatus};
use hadiya_types::ids::UserId;

use super::output;
use crate::state::AppState;

/// List the signed-in user's conversations.
pub async fn list_conversations(state: &AppState, json: bool, quiet: bool) -> Result<()> {
    let spinner = output::spinner("Loading conversations...", quiet || json);
    let conversations = state
        .api
        .list_conversations(&state.auth)
        .await
        .context("Failed to list conversations");
    spinner.finish_and_clear();
    let conversations = conversations?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conversations)?);
        return Ok(());
    }

    if conversations.is_empty() {
        println!();
        println!(
            "  {} No conversations yet. Start one with: {}",
            style("i").blue().bold(),
            style("hdy open <user-id>").yellow()
        );
        println!();
        return Ok(());
    }

    let table = conversation_table(&conversations, state.user_id());

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} conversation{}",
        style(conversations.len()).bold(),
        if conversations.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Create or fetch the conversation with `other_user_id`.
pub async fn open_conversation(
    state: &AppState,
    other_user_id: UserId,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let spinner = output::spinner("Opening conversation...", quiet || json);
    let conversation = state
        .api
        .open_conversation(&state.auth, other_user_id)
        .await
        .with_context(|| format!("Failed to open conversation with user {other_user_id}"));
    spinner.finish_and_clear();
    let conversation = conversation?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conversation)?);
        return Ok(());
    }

    if !quiet {
        println!();
        println!(
            "  {} Conversation {} with user {}",
            style("✓").green().bold(),
            style(conversation.id).cyan().bold(),
            other_user_id
        );
        println!(
            "  {} {}",
            style("Chat now:").dim(),
            style(format!("hdy chat {}", conversation.id)).yellow()
        );
        println!();
    }

    Ok(())
}

fn conversation_table(conversations: &[Conversation], me: UserId) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("With").fg(Color::White),
        Cell::new("Role").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Started").fg(Color::White),
    ]);

    for conversation in conversations {
        let (with, role) = match conversation.counterpart(me) {
            Some(other) if other == conversation.courier_id => (format!("#{other}"), "courier"),
            Some(other) => (format!("#{other}"), "customer"),
            None => ("-".to_string(), "-"),
        };

        let status_cell = match conversation.status {
            ConversationStatus::Active => Cell::new("● active").fg(Color::Green),
            ConversationStatus::Closed => Cell::new("○ closed").fg(Color::DarkGrey),
            ConversationStatus::Unknown => Cell::new("? unknown").fg(Color::Yellow),
        };

        table.add_row(vec![
            Cell::new(conversation.id).fg(Color::Cyan),
            Cell::new(with),
            Cell::new(role),
            status_cell,
            Cell::new(
                conversation
                    .created_at
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
            )
            .fg(Color::DarkGrey),
        ]);
    }

    table
}
