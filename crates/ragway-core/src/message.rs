//! Wire message model for the chat-completions surface.
//!
//! Content is either a plain string or an ordered list of typed parts.
//! Serialization is round-trip preserving: whichever shape a client sends is
//! the shape the upstream LLM receives.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: serde_json::Value },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Flatten the content to plain text. Text parts are joined with a
    /// newline; image parts contribute nothing.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Append a text part, converting plain-string content into a two-part
    /// list when needed.
    pub fn append_text_part(&mut self, text: impl Into<String>) {
        let text = text.into();
        match &mut self.content {
            MessageContent::Text(existing) => {
                let original = std::mem::take(existing);
                self.content = MessageContent::Parts(vec![
                    ContentPart::Text { text: original },
                    ContentPart::Text { text },
                ]);
            }
            MessageContent::Parts(parts) => parts.push(ContentPart::Text { text }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_string_round_trips() {
        let json = r#"{"role":"user","content":"find main entry"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.text(), "find main entry");
        let back = serde_json::to_string(&msg).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn part_list_round_trips() {
        let json = r#"{"role":"user","content":[{"type":"text","text":"look"},{"type":"image_url","image_url":{"url":"data:x"}}]}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(matches!(&msg.content, MessageContent::Parts(p) if p.len() == 2));
        let back = serde_json::to_string(&msg).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn append_converts_string_to_two_part_list() {
        let mut msg = Message::user("original");
        msg.append_text_part("appended");
        match &msg.content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(
                    parts[0],
                    ContentPart::Text {
                        text: "original".into()
                    }
                );
                assert_eq!(
                    parts[1],
                    ContentPart::Text {
                        text: "appended".into()
                    }
                );
            }
            MessageContent::Text(_) => panic!("expected part list"),
        }
    }

    #[test]
    fn append_extends_existing_part_list() {
        let mut msg = Message {
            role: Role::User,
            content: MessageContent::Parts(vec![ContentPart::Text { text: "one".into() }]),
        };
        msg.append_text_part("two");
        match &msg.content {
            MessageContent::Parts(parts) => assert_eq!(parts.len(), 2),
            MessageContent::Text(_) => panic!("expected part list"),
        }
    }

    #[test]
    fn text_flattens_parts_and_skips_images() {
        let msg = Message {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: "a".into() },
                ContentPart::ImageUrl {
                    image_url: serde_json::json!({"url": "data:y"}),
                },
                ContentPart::Text { text: "b".into() },
            ]),
        };
        assert_eq!(msg.text(), "a\nb");
    }

    #[test]
    fn tool_role_round_trips() {
        let json = r#"{"role":"tool","content":"output"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(serde_json::to_string(&msg).unwrap(), json);
    }
}
