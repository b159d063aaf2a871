// Language subtag extraction for dictionary resolution.
//
// Dictionaries are built per language, not per region or script, so every
// locale identifier is reduced to its lowercase language subtag before it is
// used as a cache key or file name component.

/// Languages that share the dictionary of another language.
const LANGUAGE_FALLBACKS: &[(&str, &str)] = &[("yue", "zh"), ("wuu", "zh")];

/// Extract the lowercase language subtag of a BCP 47 or POSIX locale.
///
/// `en_US`, `pt-BR`, `zh-Hant-TW` and `de_DE.UTF-8@euro` yield `en`, `pt`,
/// `zh` and `de`.
pub fn language_of(locale: &str) -> String {
    locale
        .split(['-', '_', '.', '@'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// The language whose dictionary serves `language` when it has none itself.
pub fn fallback_language(language: &str) -> Option<&'static str> {
    LANGUAGE_FALLBACKS
        .iter()
        .find(|(from, _)| from.eq_ignore_ascii_case(language))
        .map(|&(_, to)| to)
}
