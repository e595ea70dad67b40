//! Phone number normalization.
//!
//! The chat surface matches conversations by bare digits, so every phone
//! number is normalized before storage or navigation: strip everything that
//! is not a digit, drop a leading `+`, and collapse a leading international
//! `00` prefix.

/// Normalize a phone number to bare international digits.
///
/// Returns an empty string for input with no digits.
pub fn normalize_phone(raw: &str) -> String {
    // The digit filter also drops a leading '+' and any separators.
    let digits: String = raw.trim().chars().filter(char::is_ascii_digit).collect();

    // "00" is the international dial prefix.
    if let Some(rest) = digits.strip_prefix("00") {
        rest.to_string()
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_plus_and_separators() {
        assert_eq!(normalize_phone("+92 300-1234567"), "923001234567");
    }

    #[test]
    fn collapses_international_prefix() {
        assert_eq!(normalize_phone("0092-300"), "92300");
    }

    #[test]
    fn plain_digits_pass_through() {
        assert_eq!(normalize_phone("923001234567"), "923001234567");
    }

    #[test]
    fn parentheses_and_spaces() {
        assert_eq!(normalize_phone("(92) 300 123 4567"), "923001234567");
    }

    #[test]
    fn empty_and_garbage() {
        assert_eq!(normalize_phone(""), "");
        assert_eq!(normalize_phone("n/a"), "");
    }

    #[test]
    fn single_leading_zero_kept() {
        // Only the "00" international prefix collapses, not a single zero.
        assert_eq!(normalize_phone("0300 1234567"), "03001234567");
    }
}
