//! CLI command definitions and dispatch for the `hdy` binary.
//!
//! Uses clap derive macros for argument parsing. Commands name the thing
//! they act on (e.g., `hdy conversations`, `hdy history 42`).

pub mod chat;
pub mod conversation;
pub mod message;
pub mod output;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use hadiya_types::ids::{ConversationId, UserId};

/// Chat with the courier or customer on your gift orders.
#[derive(Parser)]
#[command(name = "hdy", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(flatten)]
    pub auth: AuthArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Credentials and endpoint selection shared by every command.
#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    /// Bearer token issued at login.
    #[arg(long, env = "HADIYA_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Your user id (customer or courier).
    #[arg(long, env = "HADIYA_USER_ID", global = true)]
    pub user_id: Option<UserId>,

    /// REST API base URL, overriding config.toml and HADIYA_API_URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List your conversations.
    #[command(alias = "ls")]
    Conversations,

    /// Create the conversation with another user, or fetch the existing one.
    Open {
        /// The other participant's user id.
        other_user_id: UserId,
    },

    /// Print one page of a conversation's history.
    History {
        conversation_id: ConversationId,

        /// Messages to skip, counting back from the newest.
        #[arg(long, default_value_t = 0)]
        skip: u32,

        /// Page size (1-100). Defaults to the configured page size.
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Send a text message.
    Send {
        conversation_id: ConversationId,

        /// Message text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Send an invoice offer. Missing fields are prompted for.
    Invoice {
        conversation_id: ConversationId,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        gift_price: Option<f64>,

        #[arg(long)]
        service_fee: Option<f64>,

        #[arg(long)]
        delivery_fee: Option<f64>,
    },

    /// Open an interactive live chat.
    Chat {
        conversation_id: ConversationId,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_history_flags() {
        let cli = Cli::try_parse_from([
            "hdy", "--token", "t", "--user-id", "7", "history", "42", "--skip", "50", "--limit", "20",
        ])
        .unwrap();
        assert_eq!(cli.auth.user_id, Some(UserId(7)));
        match cli.command {
            Commands::History {
                conversation_id,
                skip,
                limit,
            } => {
                assert_eq!(conversation_id, ConversationId(42));
                assert_eq!(skip, 50);
                assert_eq!(limit, Some(20));
            }
            _ => panic!("expected history"),
        }
    }

    #[test]
    fn test_parse_send_joins_words() {
        let cli = Cli::try_parse_from(["hdy", "send", "42", "hello", "there", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Send { text, .. } => assert_eq!(text.join(" "), "hello there"),
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_conversation_id() {
        assert!(Cli::try_parse_from(["hdy", "chat", "forty-two"]).is_err());
    }

    #[test]
    fn test_parse_invoice_fields() {
        let cli = Cli::try_parse_from([
            "hdy",
            "invoice",
            "42",
            "--description",
            "Roses",
            "--gift-price",
            "150",
            "--service-fee",
            "20",
            "--delivery-fee",
            "20",
        ])
        .unwrap();
        match cli.command {
            Commands::Invoice {
                description,
                gift_price,
                delivery_fee,
                ..
            } => {
                assert_eq!(description.as_deref(), Some("Roses"));
                assert_eq!(gift_price, Some(150.0));
                assert_eq!(delivery_fee, Some(20.0));
            }
            _ => panic!("expected invoice"),
        }
    }
}
