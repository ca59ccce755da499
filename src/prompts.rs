/// Instruction used by `/translate` when the caller does not supply one
pub const DEFAULT_TRANSLATION_PROMPT: &str = "把这段文本翻译为现代中文并标注典故";

/// System prompt for the connectivity check
pub const CHECK_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

pub const CHECK_USER_MESSAGE: &str = "Hello";

/// Build the single user message sent for a translation request.
/// A missing or blank custom prompt falls back to the default.
pub fn translation_message(text: &str, custom_prompt: Option<&str>) -> String {
    let prompt = custom_prompt
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_TRANSLATION_PROMPT);
    format!("{prompt}：\n\n{text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_default_prompt() {
        assert_eq!(
            translation_message("学而时习之", None),
            "把这段文本翻译为现代中文并标注典故：\n\n学而时习之"
        );
        assert_eq!(
            translation_message("学而时习之", Some("")),
            translation_message("学而时习之", None)
        );
    }

    #[test]
    fn custom_prompt_replaces_default() {
        assert_eq!(
            translation_message("hello", Some("Translate to French")),
            "Translate to French：\n\nhello"
        );
    }
}
