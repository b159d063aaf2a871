// Lookup normalization for case-folded retries.
//
// Dictionaries store their entries in lowercase unless the word is
// inherently capitalized. A lookup that misses on the surface form is
// retried on the lowercase form.

use std::borrow::Cow;

/// `true` when the word contains no uppercase or titlecase letters.
pub fn is_all_lower(word: &str) -> bool {
    !word.chars().any(char::is_uppercase)
}

/// The form used to retry a dictionary lookup that missed.
///
/// Borrows the input when it is already all lowercase.
pub fn lookup_form(word: &str) -> Cow<'_, str> {
    if is_all_lower(word) {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(word.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_form_borrows_lowercase() {
        assert!(matches!(lookup_form("hund"), Cow::Borrowed("hund")));
        assert_eq!(lookup_form("Hund"), "hund");
        assert_eq!(lookup_form("STRA\u{1E9E}E"), "stra\u{00DF}e"); // STRAẞE
    }

    #[test]
    fn is_all_lower_ignores_uncased() {
        assert!(is_all_lower("d'accord-2"));
        assert!(!is_all_lower("d'Accord"));
    }
}
