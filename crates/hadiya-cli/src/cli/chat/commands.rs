//! Slash command parsing for the chat loop.
//!
//! Commands start with `/` and control the session: paging, reconnecting,
//! invoices, and switching conversations.

use console::style;

use hadiya_types::chat::InvoiceDetails;
use hadiya_types::ids::ConversationId;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Clear the terminal screen.
    Clear,
    /// Leave the chat.
    Exit,
    /// Load the previous page of history.
    Older,
    /// Reconnect the live feed now.
    Reconnect,
    /// Show connection and thread status.
    Status,
    /// Close this conversation and open another.
    Switch(ConversationId),
    /// Send an invoice offer.
    Invoice(InvoiceDetails),
    /// Send the last message that failed to send.
    Retry,
    /// Unknown command or bad arguments; carries the message to show.
    Unknown(String),
}

const INVOICE_USAGE: &str = "usage: /invoice <gift> <service> <delivery> <description>";

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    let command = match cmd.as_str() {
        "/help" | "/h" | "/?" => ChatCommand::Help,
        "/clear" | "/cls" => ChatCommand::Clear,
        "/exit" | "/quit" | "/q" => ChatCommand::Exit,
        "/older" | "/more" => ChatCommand::Older,
        "/reconnect" => ChatCommand::Reconnect,
        "/retry" => ChatCommand::Retry,
        "/status" => ChatCommand::Status,
        "/switch" => match arg.parse::<ConversationId>() {
            Ok(id) => ChatCommand::Switch(id),
            Err(_) => ChatCommand::Unknown("usage: /switch <conversation-id>".to_string()),
        },
        "/invoice" => parse_invoice(arg)
            .map(ChatCommand::Invoice)
            .unwrap_or_else(|| ChatCommand::Unknown(INVOICE_USAGE.to_string())),
        other => ChatCommand::Unknown(format!("unknown command {other}")),
    };
    Some(command)
}

/// `<gift> <service> <delivery> <description...>`
fn parse_invoice(arg: &str) -> Option<InvoiceDetails> {
    let mut parts = arg.splitn(4, char::is_whitespace);
    let gift_price: f64 = parts.next()?.parse().ok()?;
    let service_fee: f64 = parts.next()?.trim().parse().ok()?;
    let delivery_fee: f64 = parts.next()?.trim().parse().ok()?;
    let description = parts.next()?.trim();
    if description.is_empty() {
        return None;
    }
    Some(InvoiceDetails::itemized(
        description,
        gift_price,
        service_fee,
        delivery_fee,
    ))
}

/// Help text listing all available commands.
pub fn help_text() -> String {
    let rows = [
        ("/help", "Show this help message"),
        ("/older", "Load older messages"),
        ("/invoice", "Send an invoice: /invoice <gift> <service> <delivery> <description>"),
        ("/retry", "Resend the last message that failed"),
        ("/reconnect", "Reconnect live updates now"),
        ("/switch", "Open another conversation: /switch <id>"),
        ("/status", "Show connection status"),
        ("/clear", "Clear the screen"),
        ("/quit", "Leave the chat"),
    ];

    let mut text = format!("\n  {}\n\n", style("Available commands:").bold());
    for (name, description) in rows {
        text.push_str(&format!("  {:<12} {}\n", style(name).cyan(), description));
    }
    text.push_str(&format!(
        "\n  {}\n",
        style("Ctrl+D to leave, a failed message is kept for /retry").dim()
    ));
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_help() {
        assert_eq!(parse("/help"), Some(ChatCommand::Help));
        assert_eq!(parse("/h"), Some(ChatCommand::Help));
        assert_eq!(parse("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn test_parse_exit() {
        assert_eq!(parse("/exit"), Some(ChatCommand::Exit));
        assert_eq!(parse("/quit"), Some(ChatCommand::Exit));
        assert_eq!(parse("/Q"), Some(ChatCommand::Exit));
    }

    #[test]
    fn test_parse_session_controls() {
        assert_eq!(parse("/older"), Some(ChatCommand::Older));
        assert_eq!(parse("/reconnect"), Some(ChatCommand::Reconnect));
        assert_eq!(parse("/retry"), Some(ChatCommand::Retry));
        assert_eq!(parse("/status"), Some(ChatCommand::Status));
        assert_eq!(parse("  /clear "), Some(ChatCommand::Clear));
    }

    #[test]
    fn test_parse_switch() {
        assert_eq!(
            parse("/switch 77"),
            Some(ChatCommand::Switch(ConversationId(77)))
        );
        assert!(matches!(parse("/switch"), Some(ChatCommand::Unknown(_))));
        assert!(matches!(parse("/switch abc"), Some(ChatCommand::Unknown(_))));
    }

    #[test]
    fn test_parse_invoice() {
        let Some(ChatCommand::Invoice(details)) = parse("/invoice 150 20 20 Red roses, large") else {
            panic!("expected invoice");
        };
        assert_eq!(details.description, "Red roses, large");
        assert_eq!(details.gift_price, 150.0);
        assert_eq!(details.total, 190.0);
    }

    #[test]
    fn test_parse_invoice_requires_all_fields() {
        assert_eq!(
            parse("/invoice 150 20 Roses"),
            Some(ChatCommand::Unknown(INVOICE_USAGE.to_string()))
        );
        assert_eq!(
            parse("/invoice 150 20 20"),
            Some(ChatCommand::Unknown(INVOICE_USAGE.to_string()))
        );
    }

    #[test]
    fn test_parse_not_command() {
        assert_eq!(parse("hello world"), None);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            parse("/foo"),
            Some(ChatCommand::Unknown("unknown command /foo".to_string()))
        );
    }

    #[test]
    fn test_help_lists_commands() {
        let help = help_text();
        for name in ["/older", "/invoice", "/retry", "/reconnect", "/switch", "/status", "/quit"] {
            assert!(help.contains(name), "missing {name}");
        }
    }
}
