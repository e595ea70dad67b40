//! CSS selector strategies for the chat surface.
//!
//! The external DOM is not under our control and changes without notice, so
//! every lookup goes through an ordered priority list of selectors, most to
//! least structurally reliable, stopping at the first that matches. These
//! lists are a compatibility contract, not an implementation detail.

/// Primary search control (conversation search box).
pub const SEARCH_BOX: &str = r#"div[contenteditable="true"][data-tab="3"]"#;

/// Fallback when the primary search selector is absent: any editable element.
pub const ANY_EDITABLE: &str = r#"div[contenteditable="true"]"#;

/// Message input strategies, first match wins.
pub const MESSAGE_INPUT: &[&str] = &[
    r#"div[contenteditable="true"][data-tab="10"]"#,
    r#"footer div[contenteditable="true"]"#,
    r#"footer div[contenteditable="true"][data-tab="10"]"#,
    r#"div[title="Type a message"]"#,
];

/// Strategy 1: structured preceding-text attribute (sender + timestamp).
pub const PRE_PLAIN_TEXT: &str = "div[data-pre-plain-text]";

/// Strategy 2: boolean-prefixed identity attribute rows.
pub const INCOMING_ROW: &str = r#"div[data-id^="true_"]"#;
pub const OUTGOING_ROW: &str = r#"div[data-id^="false_"]"#;

/// Strategy 3: conversation pane plus generic message containers.
pub const CHAT_PANE: &str = r#"div[data-tab="8"]"#;
pub const PANE_MESSAGE: &str = r#"div[tabindex="-1"][class*="message"]"#;

/// Class marker distinguishing incoming bubbles in strategy 3.
pub const INCOMING_CLASS_MARKER: &str = "message-in";

/// Nested text extraction, innermost-first; element text is the last resort.
pub const MESSAGE_TEXT: &[&str] = &[
    "span.selectable-text.copyable-text > span",
    "span.selectable-text.copyable-text",
    "span.selectable-text > span",
    "span.selectable-text",
    r#"span[dir="ltr"]"#,
    "span.copyable-text",
];

/// Substrings in the page source that signal the account has been flagged.
/// Matching any of these is fatal for the whole campaign, not one customer.
pub const BLOCK_INDICATORS: &[&str] = &[
    "temporarily banned",
    "account is temporarily",
    "verify your phone",
    "unusual activity",
];
