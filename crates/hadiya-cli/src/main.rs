//! Hadiya chat CLI entry point.
//!
//! Binary name: `hdy`
//!
//! Parses CLI arguments, sets up tracing, loads configuration and
//! credentials, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use hadiya_observe::tracing_setup::{filter_for_verbosity, init_tracing, shutdown_tracing};
use hadiya_types::error::{ApiError, ChatError, FeedError};

use cli::message::InvoiceFields;
use cli::{Cli, Commands};
use state::AppState;

/// Exit status when the backend rejected the credentials.
const EXIT_AUTH: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(filter_for_verbosity(cli.verbose, cli.quiet), cli.otel)
        .map_err(|e| anyhow::anyhow!(e))?;

    // Shell completions don't need credentials
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "hdy", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(cli).await;
    shutdown_tracing();

    if let Err(err) = &result {
        if let Some(detail) = auth_failure(err) {
            cli::output::print_auth_hint(&detail);
            std::process::exit(EXIT_AUTH);
        }
    }
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init(&cli.auth).await?;
    let (json, quiet) = (cli.json, cli.quiet);

    match cli.command {
        Commands::Conversations => {
            cli::conversation::list_conversations(&state, json, quiet).await?;
        }

        Commands::Open { other_user_id } => {
            cli::conversation::open_conversation(&state, other_user_id, json, quiet).await?;
        }

        Commands::History {
            conversation_id,
            skip,
            limit,
        } => {
            cli::message::show_history(&state, conversation_id, skip, limit, json, quiet).await?;
        }

        Commands::Send {
            conversation_id,
            text,
        } => {
            cli::message::send_text(&state, conversation_id, text.join(" "), json, quiet).await?;
        }

        Commands::Invoice {
            conversation_id,
            description,
            gift_price,
            service_fee,
            delivery_fee,
        } => {
            let fields = InvoiceFields {
                description,
                gift_price,
                service_fee,
                delivery_fee,
            };
            cli::message::send_invoice(&state, conversation_id, fields, json, quiet).await?;
        }

        Commands::Chat { conversation_id } => {
            cli::chat::loop_runner::run_chat_loop(&state, conversation_id, quiet).await?;
        }

        // Generated in main before credentials are resolved
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// The rejection detail if any error in the chain is an auth failure.
fn auth_failure(err: &anyhow::Error) -> Option<String> {
    err.chain().find_map(|cause| {
        if let Some(api) = cause.downcast_ref::<ApiError>() {
            return api.is_auth().then(|| api.user_message().to_string());
        }
        if let Some(chat) = cause.downcast_ref::<ChatError>() {
            return chat.is_auth().then(|| chat.to_string());
        }
        match cause.downcast_ref::<FeedError>() {
            Some(FeedError::Unauthorized(detail)) => Some(detail.clone()),
            _ => None,
        }
    })
}
