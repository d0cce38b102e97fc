//! The chain's working set: a request's messages, split once at entry and
//! reassembled once before dispatch.

use std::sync::Arc;

use ragway_core::identity::Identity;
use ragway_core::message::Message;

/// Mutable prompt state threaded through the chain.
///
/// `older_user_msgs` holds everything eligible for summarisation: the
/// messages between the system prompt and the N-th-from-last user message
/// (N = `recent_user_msgs_used`). `recent_msgs` holds the slice from there
/// up to the last user message and always survives verbatim, so the number
/// of user messages contributed to the reassembled list never changes.
#[derive(Debug, Clone)]
pub struct PromptMsg {
    /// First system message of the input, if any.
    pub system_msg: Option<Message>,
    pub older_user_msgs: Vec<Message>,
    pub recent_msgs: Vec<Message>,
    /// Last user message; retrieval context is appended here.
    pub last_user_msg: Option<Message>,
    /// Anything after the last user message (rare, preserved verbatim).
    pub tail_msgs: Vec<Message>,
    /// Formatted semantic block produced by the search node, consumed by
    /// the summary node.
    pub semantic_context: String,
    pub identity: Arc<Identity>,
}

impl PromptMsg {
    /// Split an incoming message list.
    pub fn split(messages: Vec<Message>, recent_user_msgs_used: usize, identity: Arc<Identity>) -> Self {
        let recent_used = recent_user_msgs_used.max(1);

        let system_idx = messages.iter().position(|m| m.is_system());

        let user_indices: Vec<usize> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_user())
            .map(|(i, _)| i)
            .collect();

        let last_user_idx = user_indices.last().copied();
        let nth_from_last_idx = if user_indices.len() >= recent_used {
            Some(user_indices[user_indices.len() - recent_used])
        } else {
            user_indices.first().copied()
        };

        let mut system_msg = None;
        let mut older_user_msgs = Vec::new();
        let mut recent_msgs = Vec::new();
        let mut last_user_msg = None;
        let mut tail_msgs = Vec::new();

        for (i, m) in messages.into_iter().enumerate() {
            if Some(i) == system_idx {
                system_msg = Some(m);
            } else if Some(i) == last_user_idx {
                last_user_msg = Some(m);
            } else if last_user_idx.is_some_and(|last| i > last) {
                tail_msgs.push(m);
            } else if nth_from_last_idx.is_some_and(|nth| i >= nth) {
                recent_msgs.push(m);
            } else {
                older_user_msgs.push(m);
            }
        }

        Self {
            system_msg,
            older_user_msgs,
            recent_msgs,
            last_user_msg,
            tail_msgs,
            semantic_context: String::new(),
            identity,
        }
    }

    /// Rebuild the outbound message list.
    pub fn reassemble(&self) -> Vec<Message> {
        let mut out = Vec::new();
        if let Some(sys) = &self.system_msg {
            out.push(sys.clone());
        }
        out.extend(self.older_user_msgs.iter().cloned());
        out.extend(self.recent_msgs.iter().cloned());
        if let Some(last) = &self.last_user_msg {
            out.push(last.clone());
        }
        out.extend(self.tail_msgs.iter().cloned());
        out
    }

    /// Every user-role message currently in the working set.
    pub fn user_messages(&self) -> Vec<Message> {
        let mut out: Vec<Message> = self
            .older_user_msgs
            .iter()
            .chain(self.recent_msgs.iter())
            .filter(|m| m.is_user())
            .cloned()
            .collect();
        if let Some(last) = &self.last_user_msg {
            out.push(last.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragway_core::message::Role;

    fn identity() -> Arc<Identity> {
        Arc::new(Identity::default())
    }

    fn roles(msgs: &[Message]) -> Vec<Role> {
        msgs.iter().map(|m| m.role).collect()
    }

    #[test]
    fn split_reassemble_is_identity_for_simple_input() {
        let input = vec![
            Message::system("sys"),
            Message::user("q1"),
            Message::assistant("a1"),
            Message::user("q2"),
        ];
        let msg = PromptMsg::split(input.clone(), 1, identity());
        assert_eq!(msg.reassemble(), input);
        assert_eq!(msg.last_user_msg.as_ref().unwrap().text(), "q2");
        assert_eq!(roles(&msg.older_user_msgs), vec![Role::User, Role::Assistant]);
        assert!(msg.recent_msgs.is_empty());
    }

    #[test]
    fn recent_window_larger_than_one_preserves_order() {
        let input = vec![
            Message::system("sys"),
            Message::user("q1"),
            Message::assistant("a1"),
            Message::user("q2"),
            Message::assistant("a2"),
            Message::user("q3"),
        ];
        let msg = PromptMsg::split(input.clone(), 2, identity());
        // q2/a2 fall inside the recent window, q1/a1 are summarisable.
        assert_eq!(roles(&msg.older_user_msgs), vec![Role::User, Role::Assistant]);
        assert_eq!(roles(&msg.recent_msgs), vec![Role::User, Role::Assistant]);
        assert_eq!(msg.reassemble(), input);
    }

    #[test]
    fn input_without_system_message() {
        let input = vec![Message::user("q1"), Message::user("q2")];
        let msg = PromptMsg::split(input.clone(), 1, identity());
        assert!(msg.system_msg.is_none());
        assert_eq!(msg.reassemble(), input);
    }

    #[test]
    fn trailing_assistant_message_is_preserved() {
        let input = vec![
            Message::system("sys"),
            Message::user("q1"),
            Message::assistant("a1"),
        ];
        let msg = PromptMsg::split(input.clone(), 1, identity());
        assert_eq!(msg.tail_msgs.len(), 1);
        assert_eq!(msg.reassemble(), input);
    }

    #[test]
    fn input_without_user_messages() {
        let input = vec![Message::system("sys"), Message::assistant("a1")];
        let msg = PromptMsg::split(input.clone(), 1, identity());
        assert!(msg.last_user_msg.is_none());
        assert_eq!(msg.reassemble(), input);
    }

    #[test]
    fn user_messages_collects_across_slices() {
        let input = vec![
            Message::system("sys"),
            Message::user("q1"),
            Message::assistant("a1"),
            Message::user("q2"),
            Message::user("q3"),
        ];
        let msg = PromptMsg::split(input, 2, identity());
        let users = msg.user_messages();
        assert_eq!(users.len(), 3);
        assert_eq!(users[2].text(), "q3");
    }
}
