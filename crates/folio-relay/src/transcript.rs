//! Folding streamed deltas into the message list.
//!
//! The last assistant message is the one being written. A delta extends it;
//! when the last message belongs to the user, the delta opens a new assistant
//! message instead. Text is only ever appended.

use crate::message::Message;

/// Apply one delta to the transcript.
pub fn apply_delta(mut messages: Vec<Message>, delta: &str) -> Vec<Message> {
    if delta.is_empty() {
        return messages;
    }

    match messages.last_mut() {
        Some(last) if last.is_assistant() => last.content.push_str(delta),
        _ => messages.push(Message::assistant(delta)),
    }
    messages
}

/// Left fold of [`apply_delta`] over a delta sequence.
pub fn fold_deltas<I, S>(messages: Vec<Message>, deltas: I) -> Vec<Message>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    deltas
        .into_iter()
        .fold(messages, |messages, delta| apply_delta(messages, delta.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_common::Role;

    #[test]
    fn test_first_delta_opens_assistant_message() {
        let messages = apply_delta(vec![Message::user("hi")], "Hel");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hel");
    }

    #[test]
    fn test_following_deltas_extend_in_place() {
        let messages = apply_delta(vec![Message::user("hi")], "Hel");
        let id = messages[1].id.clone();

        let messages = fold_deltas(messages, ["lo", ", ", "world"]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Hello, world");
        assert_eq!(messages[1].id, id);
    }

    #[test]
    fn test_empty_delta_is_a_no_op() {
        let messages = apply_delta(vec![Message::user("hi")], "");
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_new_user_turn_freezes_previous_reply() {
        let messages = fold_deltas(vec![Message::user("one")], ["first reply"]);
        let mut messages = messages;
        messages.push(Message::user("two"));

        let messages = apply_delta(messages, "second");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "first reply");
        assert_eq!(messages[3].content, "second");
    }
}
