//! One-shot message commands: history, send, invoice.

use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;

use hadiya_core::chat::MessageApi;
use hadiya_types::chat::{ChatMessage, InvoiceDetails, PageRequest, SendMessageRequest};
use hadiya_types::ids::ConversationId;

use super::output;
use crate::state::AppState;

/// Print one page of history, oldest first.
pub async fn show_history(
    state: &AppState,
    conversation_id: ConversationId,
    skip: u32,
    limit: Option<u32>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let page = PageRequest::new(skip, limit.unwrap_or(state.config.history.page_size));

    let spinner = output::spinner("Loading history...", quiet || json);
    let messages = state
        .api
        .fetch_history(&state.auth, conversation_id, page)
        .await
        .with_context(|| format!("Failed to load history of conversation {conversation_id}"));
    spinner.finish_and_clear();
    let messages = messages?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!();
        println!(
            "  {} No messages in this range (skip {}, limit {}).",
            style("i").blue().bold(),
            page.skip,
            page.limit
        );
        println!();
        return Ok(());
    }

    println!();
    for message in &messages {
        println!("  {}", output::format_message(message, state.user_id()));
    }
    println!();
    if !quiet && messages.len() as u32 == page.limit {
        let older = page.older();
        println!(
            "  {} {}",
            style("Older:").dim(),
            style(format!(
                "hdy history {conversation_id} --skip {} --limit {}",
                older.skip, older.limit
            ))
            .yellow()
        );
        println!();
    }

    Ok(())
}

/// Send a text message.
pub async fn send_text(
    state: &AppState,
    conversation_id: ConversationId,
    text: String,
    json: bool,
    quiet: bool,
) -> Result<()> {
    send(state, conversation_id, SendMessageRequest::text(text), json, quiet).await
}

/// Send an invoice, prompting for any field not given on the command line.
pub async fn send_invoice(
    state: &AppState,
    conversation_id: ConversationId,
    fields: InvoiceFields,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let details = fields.resolve()?;
    send(state, conversation_id, SendMessageRequest::invoice(details), json, quiet).await
}

/// Invoice fields as given on the command line.
#[derive(Debug, Default)]
pub struct InvoiceFields {
    pub description: Option<String>,
    pub gift_price: Option<f64>,
    pub service_fee: Option<f64>,
    pub delivery_fee: Option<f64>,
}

impl InvoiceFields {
    fn resolve(self) -> Result<InvoiceDetails> {
        let description = match self.description {
            Some(d) => d,
            None => Input::<String>::new()
                .with_prompt("Gift description")
                .interact_text()?,
        };
        let gift_price = prompt_amount(self.gift_price, "Gift price")?;
        let service_fee = prompt_amount(self.service_fee, "Service fee")?;
        let delivery_fee = prompt_amount(self.delivery_fee, "Delivery fee")?;

        Ok(InvoiceDetails::itemized(
            description,
            gift_price,
            service_fee,
            delivery_fee,
        ))
    }
}

fn prompt_amount(value: Option<f64>, prompt: &str) -> Result<f64> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Input::<f64>::new().with_prompt(prompt).interact_text()?),
    }
}

async fn send(
    state: &AppState,
    conversation_id: ConversationId,
    request: SendMessageRequest,
    json: bool,
    quiet: bool,
) -> Result<()> {
    request
        .validate()
        .context("Message rejected before sending")?;

    let spinner = output::spinner("Sending...", quiet || json);
    let sent = state
        .api
        .send_message(&state.auth, conversation_id, &request)
        .await
        .with_context(|| format!("Failed to send message to conversation {conversation_id}"));
    spinner.finish_and_clear();
    let sent = sent?;

    print_sent(&sent, json, quiet)
}

fn print_sent(message: &ChatMessage, json: bool, quiet: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(message)?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    println!();
    println!(
        "  {} Sent {} #{} to conversation {}",
        style("✓").green().bold(),
        message.message_type,
        style(message.id).cyan(),
        message.conversation_id
    );
    if let Some(invoice) = message.invoice() {
        println!(
            "    {} {}",
            style("Total:").bold(),
            output::format_amount(invoice.total)
        );
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_uses_given_fields_without_prompting() {
        let details = InvoiceFields {
            description: Some("Roses".to_string()),
            gift_price: Some(150.0),
            service_fee: Some(20.0),
            delivery_fee: Some(20.0),
        }
        .resolve()
        .unwrap();
        assert_eq!(details.description, "Roses");
        assert_eq!(details.total, 190.0);
    }
}
