// Word property capability shared by language modules.

use crate::grammeme;

/// Read-only access to the grammeme/part-of-speech bitmask of dictionary
/// words.
///
/// Language modules resolve the masks they need once, through
/// [`binary_properties`](Self::binary_properties), when they are
/// constructed, and then test words against the cached masks.
pub trait WordPropertyLookup {
    /// The combined grammeme mask of `word`, or `None` if the word is unknown.
    fn combined_binary_type(&self, word: &str) -> Option<u64>;

    /// The OR of the bits of the named grammemes.
    ///
    /// Unknown names are skipped. Returns `None` when no name resolves.
    fn binary_properties(&self, names: &[&str]) -> Option<u64>;

    /// `true` when the word is known and carries every bit of `mask`.
    fn has_all_properties(&self, word: &str, mask: u64) -> bool {
        self.combined_binary_type(word)
            .is_some_and(|types| grammeme::contains_all(types, mask))
    }

    /// `true` when the word is known and carries at least one bit of `mask`.
    fn has_any_property(&self, word: &str, mask: u64) -> bool {
        self.combined_binary_type(word)
            .is_some_and(|types| grammeme::contains_any(types, mask))
    }

    /// `true` when the word is present in the dictionary.
    fn is_known_word(&self, word: &str) -> bool {
        self.combined_binary_type(word).is_some()
    }
}
