// libs/messaging-cell/src/services/conversation.rs

/// Joins the two sides of a conversation key. User ids never contain it.
pub const KEY_SEPARATOR: char = '_';

/// Canonical key of the conversation between `a` and `b`; the same whichever
/// side asks.
pub fn conversation_key(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{}{}{}", first, KEY_SEPARATOR, second)
}

/// Both participants in key order.
pub fn participants(a: &str, b: &str) -> Vec<String> {
    let mut pair = vec![a.to_string(), b.to_string()];
    pair.sort();
    pair
}

/// Whether `id` can take part in a key without ambiguity.
pub fn is_valid_participant(id: &str) -> bool {
    !id.is_empty() && !id.contains(KEY_SEPARATOR)
}
