//! Conversation and message types for customer/courier chat.
//!
//! These mirror the JSON objects exchanged with the backend's `/chat`
//! endpoints and pushed over the realtime feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;
use crate::ids::{ConversationId, MessageId, UserId};

/// Largest page the history endpoint accepts.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Page size used when none is configured.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Lifecycle status of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Closed,
    /// Any status this client does not know about yet.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationStatus::Active => write!(f, "active"),
            ConversationStatus::Closed => write!(f, "closed"),
            ConversationStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// A persistent pairing between a customer and the courier assigned to
/// their order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub customer_id: UserId,
    pub courier_id: UserId,
    pub status: ConversationStatus,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// The participant on the other side from `me`, if `me` takes part.
    pub fn counterpart(&self, me: UserId) -> Option<UserId> {
        if me == self.customer_id {
            Some(self.courier_id)
        } else if me == self.courier_id {
            Some(self.customer_id)
        } else {
            None
        }
    }
}

/// Kind of chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    /// A structured offer issued by the courier.
    Invoice,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Text => write!(f, "text"),
            MessageType::Invoice => write!(f, "invoice"),
        }
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(MessageType::Text),
            "invoice" => Ok(MessageType::Invoice),
            other => Err(format!("invalid message type: '{other}'")),
        }
    }
}

/// Line items of an invoice offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDetails {
    pub description: String,
    pub gift_price: f64,
    pub service_fee: f64,
    pub delivery_fee: f64,
    pub total: f64,
}

impl InvoiceDetails {
    /// Build an invoice whose total is the sum of its three amounts.
    pub fn itemized(
        description: impl Into<String>,
        gift_price: f64,
        service_fee: f64,
        delivery_fee: f64,
    ) -> Self {
        Self {
            description: description.into(),
            gift_price,
            service_fee,
            delivery_fee,
            total: gift_price + service_fee + delivery_fee,
        }
    }
}

/// A single message in a conversation, as persisted by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    #[serde(with = "crate::timestamp")]
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_gift_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_service_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_delivery_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_total: Option<f64>,
}

impl ChatMessage {
    /// The invoice line items, when this is a complete invoice message.
    pub fn invoice(&self) -> Option<InvoiceDetails> {
        if self.message_type != MessageType::Invoice {
            return None;
        }
        Some(InvoiceDetails {
            description: self.invoice_description.clone()?,
            gift_price: self.invoice_gift_price?,
            service_fee: self.invoice_service_fee?,
            delivery_fee: self.invoice_delivery_fee?,
            total: self.invoice_total?,
        })
    }

    pub fn is_from(&self, user: UserId) -> bool {
        self.sender_id == user
    }
}

/// Body of `POST /chat/conversations/{id}/messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_gift_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_service_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_delivery_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_total: Option<f64>,
}

impl SendMessageRequest {
    /// A plain text message.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            message_type: MessageType::Text,
            invoice_description: None,
            invoice_gift_price: None,
            invoice_service_fee: None,
            invoice_delivery_fee: None,
            invoice_total: None,
        }
    }

    /// An invoice offer. The visible content is derived from the description.
    pub fn invoice(details: InvoiceDetails) -> Self {
        Self {
            content: format!("Invoice: {}", details.description),
            message_type: MessageType::Invoice,
            invoice_description: Some(details.description),
            invoice_gift_price: Some(details.gift_price),
            invoice_service_fee: Some(details.service_fee),
            invoice_delivery_fee: Some(details.delivery_fee),
            invoice_total: Some(details.total),
        }
    }

    /// Reject requests the server would refuse, before they are sent.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.content.trim().is_empty() {
            return Err(ApiError::InvalidRequest("message content is empty".to_string()));
        }
        if self.message_type != MessageType::Invoice {
            return Ok(());
        }

        let description = self.invoice_description.as_deref().ok_or_else(|| {
            ApiError::InvalidRequest("invoice_description is required for invoice messages".to_string())
        })?;
        if description.trim().is_empty() {
            return Err(ApiError::InvalidRequest("invoice description is empty".to_string()));
        }

        let amounts = [
            ("invoice_gift_price", self.invoice_gift_price),
            ("invoice_service_fee", self.invoice_service_fee),
            ("invoice_delivery_fee", self.invoice_delivery_fee),
            ("invoice_total", self.invoice_total),
        ];
        for (field, value) in amounts {
            let value = value.ok_or_else(|| {
                ApiError::InvalidRequest(format!("{field} is required for invoice messages"))
            })?;
            if !value.is_finite() || value < 0.0 {
                return Err(ApiError::InvalidRequest(format!(
                    "{field} must be a non-negative amount, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Body of `POST /chat/conversations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateConversationRequest {
    pub other_user_id: UserId,
}

/// Offset/limit window into a conversation's history.
///
/// `skip` counts back from the newest message: `skip = 0` is the latest
/// page, `skip = 50` the page before it. Each page is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub skip: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(skip: u32, limit: u32) -> Self {
        Self { skip, limit }
    }

    /// The newest page.
    pub fn latest(limit: u32) -> Self {
        Self { skip: 0, limit }
    }

    /// The page just before this one, same size.
    pub fn older(&self) -> Self {
        Self {
            skip: self.skip.saturating_add(self.limit),
            limit: self.limit,
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.limit == 0 || self.limit > MAX_PAGE_LIMIT {
            return Err(ApiError::InvalidRequest(format!(
                "page limit must be between 1 and {MAX_PAGE_LIMIT}, got {}",
                self.limit
            )));
        }
        Ok(())
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::latest(DEFAULT_PAGE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "id": 501,
            "conversation_id": 42,
            "sender_id": 7,
            "content": "hello",
            "message_type": "text",
            "sent_at": "2025-03-01T10:15:00.123456",
            "invoice_description": null,
            "invoice_total": null
        }"#
    }

    #[test]
    fn test_message_deserializes_backend_payload() {
        let msg: ChatMessage = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(msg.id, MessageId(501));
        assert_eq!(msg.conversation_id, ConversationId(42));
        assert_eq!(msg.message_type, MessageType::Text);
        assert!(msg.invoice().is_none());
        assert!(msg.is_from(UserId(7)));
    }

    #[test]
    fn test_invoice_message_exposes_details() {
        let json = r#"{
            "id": 9, "conversation_id": 42, "sender_id": 3,
            "content": "Invoice: roses", "message_type": "invoice",
            "sent_at": "2025-03-01T10:15:00Z",
            "invoice_description": "roses", "invoice_gift_price": 100.0,
            "invoice_service_fee": 10.0, "invoice_delivery_fee": 15.0,
            "invoice_total": 125.0
        }"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        let invoice = msg.invoice().unwrap();
        assert_eq!(invoice.description, "roses");
        assert_eq!(invoice.total, 125.0);
    }

    #[test]
    fn test_conversation_status_tolerates_unknown_values() {
        let json = r#"{"id": 1, "customer_id": 2, "courier_id": 3,
            "status": "escalated", "created_at": "2025-03-01T10:15:00"}"#;
        let conversation: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conversation.status, ConversationStatus::Unknown);
        assert_eq!(conversation.counterpart(UserId(2)), Some(UserId(3)));
        assert_eq!(conversation.counterpart(UserId(3)), Some(UserId(2)));
        assert_eq!(conversation.counterpart(UserId(4)), None);
    }

    #[test]
    fn test_message_type_from_str() {
        assert_eq!("TEXT".parse::<MessageType>().unwrap(), MessageType::Text);
        assert_eq!("invoice".parse::<MessageType>().unwrap(), MessageType::Invoice);
        assert!("image".parse::<MessageType>().is_err());
    }

    #[test]
    fn test_text_request_omits_invoice_fields() {
        let json = serde_json::to_value(SendMessageRequest::text("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"content": "hello", "message_type": "text"}));
    }

    #[test]
    fn test_itemized_invoice_sums_total() {
        let details = InvoiceDetails::itemized("tulips", 80.0, 12.5, 7.5);
        assert_eq!(details.total, 100.0);
        let request = SendMessageRequest::invoice(details);
        assert_eq!(request.content, "Invoice: tulips");
        assert_eq!(request.invoice_total, Some(100.0));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_content() {
        let err = SendMessageRequest::text("   ").validate().unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn test_validate_rejects_incomplete_invoice() {
        let mut request = SendMessageRequest::invoice(InvoiceDetails::itemized("box", 1.0, 1.0, 1.0));
        request.invoice_delivery_fee = None;
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("invoice_delivery_fee"));
    }

    #[test]
    fn test_validate_rejects_negative_amount() {
        let request = SendMessageRequest::invoice(InvoiceDetails::itemized("box", -5.0, 1.0, 1.0));
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_page_request_bounds() {
        assert!(PageRequest::default().validate().is_ok());
        assert!(PageRequest::new(50, 100).validate().is_ok());
        assert!(PageRequest::new(0, 0).validate().is_err());
        assert!(PageRequest::new(0, 101).validate().is_err());
    }

    #[test]
    fn test_older_page_follows_on_and_saturates() {
        assert_eq!(PageRequest::new(50, 50).older(), PageRequest::new(100, 50));
        assert_eq!(
            PageRequest::new(u32::MAX - 10, 50).older(),
            PageRequest::new(u32::MAX, 50)
        );
    }
}
