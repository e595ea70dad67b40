//! Message templates — plain placeholder substitution, no template engine.

/// Initial review request sent to customers without an existing review.
pub const REVIEW_REQUEST: &str = "Hi {name}, we noticed you recently purchased {product}. \
We hope you're satisfied! Would you mind sharing a quick review about your experience?";

/// Thank-you with the public review link, sent after a positive reply.
pub const REVIEW_LINK_MSG: &str = "Thank you so much for your kind words, {name}! \
We really appreciate it. If you have a moment, we would be grateful if you could \
share your experience on Google: {link}";

/// Plain thank-you, sent after a neutral or negative reply.
pub const THANK_YOU_MSG: &str = "Thank you for your feedback, {name}. \
We appreciate you taking the time to share your thoughts with us.";

/// Render a template by substituting `{name}`, `{product}` and `{link}`.
///
/// Unknown placeholders are left as-is; missing values substitute as empty.
pub fn render(template: &str, name: &str, product: &str, link: &str) -> String {
    template
        .replace("{name}", name)
        .replace("{product}", product)
        .replace("{link}", link)
}
