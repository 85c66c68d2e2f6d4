//! Shared terminal formatting: message lines, spinners, auth hints.

use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use hadiya_types::chat::ChatMessage;
use hadiya_types::ids::UserId;

/// Start a cyan spinner with `message`. Hidden when `quiet`.
pub fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Local wall-clock time for message lines.
pub fn format_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}

/// Money amounts always show two decimals.
pub fn format_amount(value: f64) -> String {
    format!("{value:.2}")
}

/// Who sent a message, from `me`'s point of view.
pub fn sender_label(message: &ChatMessage, me: UserId) -> String {
    if message.is_from(me) {
        "you".to_string()
    } else {
        format!("#{}", message.sender_id)
    }
}

/// One display line for a delivered message.
///
/// Invoices append their itemized amounts after the content.
pub fn format_message(message: &ChatMessage, me: UserId) -> String {
    let label = sender_label(message, me);
    let label = if message.is_from(me) {
        style(label).green().bold()
    } else {
        style(label).cyan().bold()
    };

    let mut line = format!(
        "{} {}: {}",
        style(format!("[{}]", format_time(&message.sent_at))).dim(),
        label,
        message.content
    );

    if let Some(invoice) = message.invoice() {
        line.push_str(&format!(
            "\n        {} gift {} + service {} + delivery {} = {}",
            style("$").yellow(),
            format_amount(invoice.gift_price),
            format_amount(invoice.service_fee),
            format_amount(invoice.delivery_fee),
            style(format_amount(invoice.total)).bold()
        ));
    }
    line
}

/// Printed before exiting on rejected credentials.
pub fn print_auth_hint(detail: &str) {
    eprintln!();
    eprintln!(
        "  {} Your session is no longer valid: {detail}",
        style("✗").red().bold()
    );
    eprintln!(
        "  {} Log in again and pass the new token with {} or {}.",
        style("i").blue().bold(),
        style("--token").yellow(),
        style("HADIYA_TOKEN").yellow()
    );
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use hadiya_types::chat::{InvoiceDetails, MessageType, SendMessageRequest};
    use hadiya_types::ids::{ConversationId, MessageId};

    fn message(sender: i64, request: SendMessageRequest) -> ChatMessage {
        ChatMessage {
            id: MessageId(501),
            conversation_id: ConversationId(42),
            sender_id: UserId(sender),
            content: request.content,
            sent_at: Utc::now(),
            message_type: request.message_type,
            invoice_description: request.invoice_description,
            invoice_gift_price: request.invoice_gift_price,
            invoice_service_fee: request.invoice_service_fee,
            invoice_delivery_fee: request.invoice_delivery_fee,
            invoice_total: request.invoice_total,
        }
    }

    #[test]
    fn test_sender_label() {
        let msg = message(7, SendMessageRequest::text("hello"));
        assert_eq!(sender_label(&msg, UserId(7)), "you");
        assert_eq!(sender_label(&msg, UserId(8)), "#7");
    }

    #[test]
    fn test_format_text_message() {
        let msg = message(7, SendMessageRequest::text("hello"));
        let line = format_message(&msg, UserId(8));
        assert!(line.contains("hello"));
        assert!(line.contains("#7"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_format_invoice_message() {
        let msg = message(
            9,
            SendMessageRequest::invoice(InvoiceDetails::itemized("Roses", 150.0, 20.0, 20.0)),
        );
        assert_eq!(msg.message_type, MessageType::Invoice);
        let line = format_message(&msg, UserId(7));
        assert!(line.contains("Invoice: Roses"));
        assert!(line.contains("150.00"));
        assert!(line.contains("190.00"));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(20.0), "20.00");
        assert_eq!(format_amount(2.5), "2.50");
    }
}
