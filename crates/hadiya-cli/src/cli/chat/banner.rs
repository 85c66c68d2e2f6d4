//! Welcome banner shown when a conversation is opened in the chat loop.

use console::style;

use hadiya_types::ids::{ConversationId, UserId};

/// Banner text for `conversation_id`, seen by `me`, served from `api_url`.
pub fn welcome_banner(conversation_id: ConversationId, me: UserId, api_url: &str) -> String {
    let mut banner = String::new();
    banner.push('\n');
    banner.push_str(&format!(
        "  {} {}\n",
        style("✉").cyan(),
        style(format!("Conversation {conversation_id}")).cyan().bold()
    ));
    banner.push_str(&format!(
        "  {}  {}\n",
        style("You:").bold(),
        style(format!("#{me}")).dim()
    ));
    banner.push_str(&format!(
        "  {}  {}\n",
        style("Server:").bold(),
        style(api_url).dim()
    ));
    banner.push('\n');
    banner.push_str(&format!(
        "  {}\n",
        style("Type /help for commands, Ctrl+D to exit").dim()
    ));
    banner.push_str(&format!("  {}\n", style("---").dim()));
    banner
}
