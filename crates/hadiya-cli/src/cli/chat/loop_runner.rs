//! Main chat loop orchestration.
//!
//! Opens a session, waits briefly for history and the live feed, then
//! alternates between rendering snapshot changes and handling input until
//! the user leaves or the credentials are rejected.

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use console::style;
use rustyline_async::SharedWriter;
use tracing::{debug, info};

use hadiya_core::chat::{ChatSessionHandle, SessionNotice, SessionSnapshot};
use hadiya_types::chat::SendMessageRequest;
use hadiya_types::error::{ApiError, ChatError};
use hadiya_types::ids::ConversationId;
use hadiya_types::session::ConnectionStatus;

use crate::cli::output;
use crate::state::AppState;

use super::banner::welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer::{ThreadRenderer, prompt_for, status_text};

/// Longest wait for the first connection before showing the prompt anyway.
const CONNECT_WAIT: Duration = Duration::from_secs(5);

enum Step {
    /// The session published a new snapshot; false when it stopped.
    Snapshot(bool),
    Input(InputEvent),
}

enum Exit {
    Quit,
    AuthRequired(String),
}

/// Run the interactive chat for `conversation_id`.
pub async fn run_chat_loop(
    state: &AppState,
    conversation_id: ConversationId,
    quiet: bool,
) -> anyhow::Result<()> {
    let me = state.user_id();
    let mut handle = open_session(state, conversation_id, quiet).await;
    let mut snapshots = handle.subscribe();

    let snapshot = snapshots.borrow_and_update().clone();
    let mut prompt = prompt_for(&snapshot);
    let (mut input, mut writer) =
        ChatInput::new(prompt.clone()).context("Failed to start the input prompt")?;
    let mut renderer = ThreadRenderer::new(me);
    let mut unsent: Option<SendMessageRequest> = None;

    write!(
        writer,
        "{}",
        welcome_banner(conversation_id, me, &state.config.api_url)
    )?;
    print_lines(&mut writer, renderer.render(&snapshot))?;

    let exit = loop {
        let step = tokio::select! {
            changed = snapshots.changed() => Step::Snapshot(changed.is_ok()),
            event = input.read_line() => Step::Input(event),
        };

        match step {
            Step::Snapshot(false) => {
                anyhow::bail!("chat session for conversation {} stopped unexpectedly", handle.conversation_id());
            }
            Step::Snapshot(true) => {
                let snapshot = snapshots.borrow_and_update().clone();
                print_lines(&mut writer, renderer.render(&snapshot))?;
                refresh_prompt(&mut input, &mut prompt, &snapshot);
                if let Some(SessionNotice::AuthRequired(message)) = &snapshot.notice {
                    break Exit::AuthRequired(message.clone());
                }
            }
            Step::Input(InputEvent::Eof) => break Exit::Quit,
            Step::Input(InputEvent::Interrupted) => {
                writeln!(writer, "{}", style("(Ctrl+D or /quit to leave)").dim())?;
            }
            Step::Input(InputEvent::Message(line)) if line.is_empty() => {}
            Step::Input(InputEvent::Message(line)) => {
                let Some(command) = commands::parse(&line) else {
                    match send(&handle, &mut writer, &mut unsent, SendMessageRequest::text(line)).await? {
                        Some(exit) => break exit,
                        None => continue,
                    }
                };

                match command {
                    ChatCommand::Help => write!(writer, "{}", commands::help_text())?,
                    ChatCommand::Clear => input.clear(),
                    ChatCommand::Exit => break Exit::Quit,
                    ChatCommand::Status => write!(writer, "{}", status_text(&handle.snapshot()))?,
                    ChatCommand::Older => {
                        let added = handle.load_older().await;
                        match added {
                            Ok(0) => writeln!(
                                writer,
                                "{}",
                                style("-- beginning of conversation --").dim()
                            )?,
                            Ok(n) => {
                                writeln!(
                                    writer,
                                    "{}",
                                    style(format!("-- {n} older messages --")).dim()
                                )?;
                                print_lines(&mut writer, renderer.render(&handle.snapshot()))?;
                            }
                            Err(err) if err.is_auth() => {
                                break Exit::AuthRequired(err.to_string());
                            }
                            Err(err) => writeln!(
                                writer,
                                "{} {err}",
                                style("✗ could not load older messages:").red()
                            )?,
                        }
                    }
                    ChatCommand::Reconnect => {
                        handle.reconnect().await?;
                        writeln!(writer, "{}", style("reconnecting...").dim())?;
                    }
                    ChatCommand::Invoice(details) => {
                        if let Some(exit) = send(
                            &handle,
                            &mut writer,
                            &mut unsent,
                            SendMessageRequest::invoice(details),
                        )
                        .await?
                        {
                            break exit;
                        }
                    }
                    ChatCommand::Retry => match unsent.take() {
                        Some(draft) => {
                            if let Some(exit) = send(&handle, &mut writer, &mut unsent, draft).await? {
                                break exit;
                            }
                        }
                        None => writeln!(writer, "{}", style("nothing to resend").dim())?,
                    },
                    ChatCommand::Switch(next) => {
                        if next == handle.conversation_id() {
                            writeln!(writer, "{}", style("already in this conversation").dim())?;
                            continue;
                        }
                        info!(from = %handle.conversation_id(), to = %next, "switching conversation");
                        handle.close().await;
                        handle = state.sessions.open(next);
                        snapshots = handle.subscribe();
                        renderer = ThreadRenderer::new(me);

                        let snapshot = snapshots.borrow_and_update().clone();
                        write!(writer, "{}", welcome_banner(next, me, &state.config.api_url))?;
                        print_lines(&mut writer, renderer.render(&snapshot))?;
                        refresh_prompt(&mut input, &mut prompt, &snapshot);
                    }
                    ChatCommand::Unknown(message) => writeln!(
                        writer,
                        "{} {}",
                        style(message).yellow(),
                        style("(type /help)").dim()
                    )?,
                }
            }
        }
    };

    input.flush();
    debug!(conversation_id = %handle.conversation_id(), "leaving chat");
    handle.close().await;

    match exit {
        Exit::Quit => Ok(()),
        Exit::AuthRequired(message) => Err(ApiError::Unauthorized(message).into()),
    }
}

/// Open the session and wait until it is live, gives up, or raises a notice.
async fn open_session(
    state: &AppState,
    conversation_id: ConversationId,
    quiet: bool,
) -> ChatSessionHandle {
    let handle = state.sessions.open(conversation_id);
    let mut snapshots = handle.subscribe();

    let spinner = output::spinner("Connecting...", quiet);
    let settled = tokio::time::timeout(
        CONNECT_WAIT,
        snapshots.wait_for(|s| {
            s.status == ConnectionStatus::Connected
                || s.notice.is_some()
                || !s.live_updates_available
        }),
    )
    .await
    .is_ok();
    spinner.finish_and_clear();

    if !settled {
        debug!(conversation_id = %conversation_id, "feed not connected yet, continuing");
    }
    handle
}

/// Send `request`. Returns an exit when the credentials were rejected.
///
/// A draft that failed to send is kept in `unsent` for `/retry`.
async fn send(
    handle: &ChatSessionHandle,
    writer: &mut SharedWriter,
    unsent: &mut Option<SendMessageRequest>,
    request: SendMessageRequest,
) -> anyhow::Result<Option<Exit>> {
    match handle.send(request).await {
        Ok(_) => Ok(None),
        Err(err) if err.is_auth() => Ok(Some(Exit::AuthRequired(err.to_string()))),
        Err(ChatError::SendInFlight) => {
            writeln!(writer, "{}", style("still sending the previous message").yellow())?;
            Ok(None)
        }
        Err(err) => {
            writeln!(writer, "{} {err}", style("✗ not sent:").red().bold())?;
            if let Some(draft) = err.restored_draft() {
                writeln!(writer, "{}", unsent_hint(draft))?;
                *unsent = Some(draft.clone());
            }
            Ok(None)
        }
    }
}

/// Shown under a failed send. The prompt cannot be pre-filled, so point at
/// the two ways to get the text back: `/retry` or the Up arrow.
fn unsent_hint(draft: &SendMessageRequest) -> String {
    format!(
        "  {} {}\n  {}",
        style("draft:").dim(),
        draft.content,
        style("type /retry to send it again, or press Up to edit it").dim()
    )
}

fn refresh_prompt(input: &mut ChatInput, prompt: &mut String, snapshot: &SessionSnapshot) {
    let next = prompt_for(snapshot);
    if *prompt != next {
        input.update_prompt(&next);
        *prompt = next;
    }
}

fn print_lines(writer: &mut SharedWriter, lines: Vec<String>) -> std::io::Result<()> {
    for line in lines {
        writeln!(writer, "{line}")?;
    }
    Ok(())
}
