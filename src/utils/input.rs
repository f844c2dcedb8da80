//! Text cleanup for anything that reaches the terminal from outside.

/// Sanitize text input to prevent terminal corruption
///
/// This function:
/// - Converts tabs to 4 spaces
/// - Converts carriage returns to newlines
/// - Filters out control characters except newlines
///
/// Pasted prompt input and message bodies both go through here.
pub fn sanitize_text_input(text: &str) -> String {
    let mut sanitized = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '\t' => sanitized.push_str("    "),
            '\r' => sanitized.push('\n'),
            '\n' => sanitized.push(c),
            _ if !c.is_control() => sanitized.push(c),
            _ => {}
        }
    }

    sanitized
}

/// Prepare a message body for display after an `author: ` prefix.
///
/// Escape sequences lose their ESC byte and become inert text. `\r\n` counts as one
/// break, and continuation lines are indented so they read as part of the same message.
pub fn escape_message_content(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n");
    let sanitized = sanitize_text_input(&normalized);
    let trimmed = sanitized.trim_end_matches('\n');
    trimmed.replace('\n', "\n  ")
}
