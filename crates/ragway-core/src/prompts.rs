//! Fixed instruction texts for the summary and classification models.
//!
//! These literals are part of the gateway's external behaviour: identical
//! inputs must produce identical upstream requests, so they are constants
//! and never assembled at runtime.

/// System prompt for summarising the older turns of a user conversation.
pub const USER_SUMMARY_PROMPT: &str = concat!(
    "You are a conversation summarizer for a coding assistant. ",
    "You will receive the earlier turns of a conversation between a developer ",
    "and an AI coding assistant, possibly followed by a semanticContext note ",
    "containing code retrieved from the developer's repository. ",
    "Produce a structured summary with these sections: ",
    "1. Task: what the developer is trying to accomplish. ",
    "2. Decisions: choices already made and constraints already agreed. ",
    "3. Code context: files, symbols and snippets that were discussed, with paths. ",
    "4. Open items: questions or work still pending. ",
    "Be precise and keep every file path and identifier exactly as written. ",
    "Do not invent content that is not present in the turns. ",
    "Respond with the summary only, no preamble."
);

/// Trailing user instruction appended to every summary request.
pub const USER_SUMMARY_INSTRUCTION: &str =
    "Summarize the conversation so far, as described in the prompt instructions.";

/// System prompt for compressing the guidelines tail of a system prompt.
pub const SYSTEM_SUMMARY_PROMPT: &str = concat!(
    "You are a prompt compressor. The user message contains the tool-guidelines ",
    "section of a coding assistant's system prompt. Rewrite it so that every ",
    "rule, tool name, parameter name and output format is preserved exactly, ",
    "while removing repetition, examples that restate a rule, and filler prose. ",
    "Keep the original section ordering and markdown headings. ",
    "Respond with the compressed text only."
);

/// System prompt for classifying a finished conversation.
pub const CLASSIFY_PROMPT: &str = concat!(
    "You are a request classifier for a coding assistant gateway. ",
    "Read the user's messages and answer with exactly one category name from ",
    "the list given in the final instruction. ",
    "Answer with the bare category name only, without punctuation or explanation."
);

/// Closed category set. The classifier output must match one of these
/// exactly; anything else is recorded as `extra`.
pub const CATEGORIES: &[&str] = &[
    "CodeWriting",
    "BugFixing",
    "CodeUnderstanding",
    "CodeRefactoring",
    "DesignDiscussion",
    "DocumentationHelp",
    "EnvironmentHelp",
    "ToolUsage",
    "GeneralQuestion",
];

/// Fallback for classifier output outside the closed set.
pub const CATEGORY_EXTRA: &str = "extra";
/// Category of records that were never classified.
pub const CATEGORY_UNKNOWN: &str = "unknown";

/// True when `candidate` is an exact member of the closed category set.
pub fn is_known_category(candidate: &str) -> bool {
    CATEGORIES.contains(&candidate)
}

/// Short instruction enumerating the closed set, sent as the final user
/// message of a classification call.
pub fn classify_instruction() -> String {
    format!(
        "Classify the conversation above into exactly one of: {}. Answer with the category name only.",
        CATEGORIES.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_categories_match_exactly() {
        assert!(is_known_category("BugFixing"));
        assert!(is_known_category("GeneralQuestion"));
        assert!(!is_known_category("bugfixing"));
        assert!(!is_known_category("extra"));
        assert!(!is_known_category(""));
    }

    #[test]
    fn instruction_lists_every_category() {
        let instruction = classify_instruction();
        for cat in CATEGORIES {
            assert!(instruction.contains(cat));
        }
    }
}
