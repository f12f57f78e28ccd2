//! Message payload conventions
//!
//! Frames carry plain text. The application-level convention on top of it:
//! - `"<username>: <text>"` for user messages
//! - `"Server: <text>"` for server-authored announcements
//! - `"<anything>: exit"` as the voluntary disconnect signal
//!
//! Nothing here is enforced by the transport; a payload that matches none of
//! the shapes is still delivered, as an untagged system message.

/// Sender shown for server announcements
pub const SERVER_SENDER: &str = "Server";

/// Sender shown for local notices and untagged payloads
pub const SYSTEM_SENDER: &str = "System";

/// Separator between sender and content
pub const SEPARATOR: &str = ": ";

/// Suffix marking the exit signal
pub const EXIT_SUFFIX: &str = ": exit";

const SERVER_PREFIX: &str = "Server:";

/// One decoded chat payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    /// Server-authored text (`"Server: ..."`)
    Announcement { content: String },
    /// User text (`"<sender>: <content>"`)
    User { sender: String, content: String },
    /// Anything without a separator, kept verbatim
    Untagged { text: String },
}

impl ChatMessage {
    /// Classify a frame payload
    ///
    /// The `"Server:"` prefix wins over the generic separator, and only the
    /// first `": "` splits sender from content.
    pub fn parse(payload: &str) -> Self {
        if let Some(rest) = payload.strip_prefix(SERVER_PREFIX) {
            return ChatMessage::Announcement {
                content: rest.trim().to_string(),
            };
        }

        match payload.split_once(SEPARATOR) {
            Some((sender, content)) => ChatMessage::User {
                sender: sender.to_string(),
                content: content.to_string(),
            },
            None => ChatMessage::Untagged {
                text: payload.to_string(),
            },
        }
    }

    /// Display name of the sender
    pub fn sender(&self) -> &str {
        match self {
            ChatMessage::Announcement { .. } => SERVER_SENDER,
            ChatMessage::User { sender, .. } => sender,
            ChatMessage::Untagged { .. } => SYSTEM_SENDER,
        }
    }

    /// Displayable content
    pub fn content(&self) -> &str {
        match self {
            ChatMessage::Announcement { content } | ChatMessage::User { content, .. } => content,
            ChatMessage::Untagged { text } => text,
        }
    }

    /// Split into `(sender, content)` for a display sink
    pub fn into_parts(self) -> (String, String) {
        match self {
            ChatMessage::Announcement { content } => (SERVER_SENDER.to_string(), content),
            ChatMessage::User { sender, content } => (sender, content),
            ChatMessage::Untagged { text } => (SYSTEM_SENDER.to_string(), text),
        }
    }
}

/// Build the payload for a user message
pub fn user_payload(username: &str, text: &str) -> String {
    format!("{username}{SEPARATOR}{text}")
}

/// Build the payload for a server announcement
pub fn announcement_payload(text: &str) -> String {
    format!("{SERVER_SENDER}{SEPARATOR}{text}")
}

/// Build the exit signal for `username`
pub fn exit_payload(username: &str) -> String {
    format!("{username}{EXIT_SUFFIX}")
}

/// Whether a payload is the voluntary disconnect signal
pub fn is_exit_signal(payload: &str) -> bool {
    payload.ends_with(EXIT_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_announcement() {
        let msg = ChatMessage::parse("Server: hi");
        assert_eq!(msg.sender(), "Server");
        assert_eq!(msg.content(), "hi");
    }

    #[test]
    fn test_parse_announcement_without_space() {
        let msg = ChatMessage::parse("Server:  padded  ");
        assert_eq!(
            msg,
            ChatMessage::Announcement {
                content: "padded".to_string()
            }
        );
    }

    #[test]
    fn test_parse_user_message() {
        let msg = ChatMessage::parse("Alice: hello there");
        assert_eq!(msg.sender(), "Alice");
        assert_eq!(msg.content(), "hello there");
    }

    #[test]
    fn test_parse_splits_on_first_separator() {
        let (sender, content) = ChatMessage::parse("User 1: note: see above").into_parts();
        assert_eq!(sender, "User 1");
        assert_eq!(content, "note: see above");
    }

    #[test]
    fn test_parse_untagged() {
        let msg = ChatMessage::parse("no-colon-text");
        assert_eq!(msg.sender(), "System");
        assert_eq!(msg.content(), "no-colon-text");
    }

    #[test]
    fn test_colon_without_space_is_untagged() {
        assert!(matches!(
            ChatMessage::parse("time:12:00"),
            ChatMessage::Untagged { .. }
        ));
    }

    #[test]
    fn test_payload_builders() {
        assert_eq!(user_payload("User 2", "yo"), "User 2: yo");
        assert_eq!(announcement_payload("maintenance"), "Server: maintenance");
        assert_eq!(exit_payload("User 1"), "User 1: exit");
    }

    #[test]
    fn test_exit_signal() {
        assert!(is_exit_signal("User 1: exit"));
        assert!(is_exit_signal(&exit_payload("anyone")));
        assert!(!is_exit_signal("User 1: exit now"));
        assert!(!is_exit_signal("exit"));
    }
}
