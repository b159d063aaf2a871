// Memory-mapped dictionary: word -> grammeme mask, per-word properties and
// the optional inflection pattern section.
//
// Layout after the header, in file order:
//
//   options u16, language [u8; 4]
//   grammemes         string table (identifier = bit position)
//   type_masks        [u64] distinct combined masks
//   type_bits u8, map_bits u8
//   words             string table
//   word_records      packed: type index | property map offset << type_bits
//   property_keys     string table
//   property_values   string table
//   key_bits u8
//   property_maps     packed: n, n x (key | count << key_bits), values...
//   inflections       optional, see `inflection`

use std::path::{Path, PathBuf};

use morphdict_core::{WordPropertyLookup, case, grammeme};

use crate::array::ArrayLayout;
use crate::format::{self, HEADER_SIZE, OPTION_HAS_INFLECTIONS};
use crate::inflection::{InflectionLayout, InflectionPatternEngine};
use crate::iter::DictionaryKeyIterator;
use crate::packed::PackedLayout;
use crate::region::{MappedRegion, SectionReader};
use crate::string_table::{StringTable, StringTableLayout};
use crate::{Result, StoreError, corrupted};

/// Reserved property key whose values are inflection pattern identifiers.
pub const INFLECTION_PROPERTY: &str = "inflection";

/// Size of the language field.
pub const LANGUAGE_LEN: usize = 4;

#[derive(Debug, Clone, Copy)]
struct DictionaryLayout {
    options: u16,
    language: [u8; LANGUAGE_LEN],
    grammemes: StringTableLayout,
    type_masks: ArrayLayout<u64>,
    type_bits: u8,
    words: StringTableLayout,
    word_records: PackedLayout,
    property_keys: StringTableLayout,
    property_values: StringTableLayout,
    key_bits: u8,
    property_maps: PackedLayout,
    inflections: Option<InflectionLayout>,
}

impl DictionaryLayout {
    fn read(data: &[u8]) -> Result<Self> {
        let mut reader = SectionReader::new(data);
        format::parse_header(&mut reader)?;

        let options: u16 = reader.read()?;
        let language: [u8; LANGUAGE_LEN] = reader.read()?;
        let grammemes = StringTableLayout::read(&mut reader, data)?;
        let type_masks = reader.read_array()?;
        let type_bits = reader.read_u8()?;
        let map_bits = reader.read_u8()?;
        let words = StringTableLayout::read(&mut reader, data)?;
        let word_records = PackedLayout::read(&mut reader)?;
        let property_keys = StringTableLayout::read(&mut reader, data)?;
        let property_values = StringTableLayout::read(&mut reader, data)?;
        let key_bits = reader.read_u8()?;
        let property_maps = PackedLayout::read(&mut reader)?;
        let inflections = if options & OPTION_HAS_INFLECTIONS != 0 {
            Some(InflectionLayout::read(&mut reader, data)?)
        } else {
            None
        };

        if grammemes.len() > grammeme::MAX_GRAMMEMES {
            return Err(StoreError::illegal_state(format!(
                "{} grammemes do not fit in a 64-bit mask",
                grammemes.len()
            )));
        }
        if !(1..64).contains(&type_bits)
            || map_bits == 0
            || u32::from(type_bits) + u32::from(map_bits) > 64
        {
            return Err(StoreError::illegal_state(format!(
                "invalid word record split {type_bits}+{map_bits}"
            )));
        }
        if word_records.len() != words.len() {
            return Err(StoreError::illegal_state(format!(
                "{} word records for {} words",
                word_records.len(),
                words.len()
            )));
        }
        if !(1..64).contains(&key_bits) {
            return Err(StoreError::illegal_state(format!(
                "invalid property key width {key_bits}"
            )));
        }
        if reader.remaining() != 0 {
            return Err(StoreError::illegal_state(format!(
                "{} trailing bytes after the last section",
                reader.remaining()
            )));
        }

        Ok(Self {
            options,
            language,
            grammemes,
            type_masks,
            type_bits,
            words,
            word_records,
            property_keys,
            property_values,
            key_bits,
            property_maps,
            inflections,
        })
    }
}

/// A read-only dictionary backed by a mapped file or an owned buffer.
///
/// Loading validates the header and every section boundary; a store that
/// exists is complete. All lookups are lock-free reads of the mapped bytes,
/// so one store can be shared across threads (usually behind an `Arc`).
pub struct DictionaryStore {
    region: MappedRegion,
    source: Option<PathBuf>,
    language: String,
    layout: DictionaryLayout,
    inflection_key: Option<u32>,
}

impl DictionaryStore {
    /// Map and validate the dictionary file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let region = MappedRegion::open(path, HEADER_SIZE)?;
        let store = Self::from_region(region, Some(path.to_path_buf()))?;
        tracing::debug!(
            path = %path.display(),
            language = %store.language,
            words = store.known_words_len(),
            patterns = store.layout.inflections.map_or(0, |i| i.pattern_count()),
            bytes = store.region.len(),
            "loaded dictionary"
        );
        Ok(store)
    }

    /// Validate a dictionary held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_region(MappedRegion::Owned(bytes), None)
    }

    fn from_region(region: MappedRegion, source: Option<PathBuf>) -> Result<Self> {
        let data = region.as_bytes();
        let layout = DictionaryLayout::read(data)?;

        let end = layout
            .language
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(LANGUAGE_LEN);
        let language = std::str::from_utf8(&layout.language[..end])
            .map_err(|_| StoreError::illegal_state("language tag is not UTF-8"))?
            .to_owned();
        let inflection_key = layout
            .property_keys
            .view(data)
            .identifier_if_available(INFLECTION_PROPERTY);

        Ok(Self {
            region,
            source,
            language,
            layout,
            inflection_key,
        })
    }

    fn data(&self) -> &[u8] {
        self.region.as_bytes()
    }

    /// Language subtag the dictionary was built for.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// The file this store was loaded from, if any.
    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn is_mapped(&self) -> bool {
        self.region.is_mapped()
    }

    pub fn options(&self) -> u16 {
        self.layout.options
    }

    /// Grammeme names; a name's identifier is its bit position.
    pub fn grammemes(&self) -> StringTable<'_> {
        self.layout.grammemes.view(self.data())
    }

    pub fn words(&self) -> StringTable<'_> {
        self.layout.words.view(self.data())
    }

    fn property_keys(&self) -> StringTable<'_> {
        self.layout.property_keys.view(self.data())
    }

    /// Identifier of `word`, retrying with its lowercase form.
    fn resolve_word(&self, word: &str) -> Option<u32> {
        let words = self.words();
        words.identifier_if_available(word).or_else(|| {
            if case::is_all_lower(word) {
                None
            } else {
                words.identifier_if_available(&case::lookup_form(word))
            }
        })
    }

    /// `(type index, property map offset)` of a word identifier.
    fn record(&self, word_id: u32) -> (usize, usize) {
        let raw = self
            .layout
            .word_records
            .view(self.data())
            .get(word_id as usize)
            .unwrap_or_else(|| corrupted("word record out of range"));
        let type_bits = self.layout.type_bits;
        let type_index = raw & ((1u64 << type_bits) - 1);
        (type_index as usize, (raw >> type_bits) as usize)
    }

    fn type_mask(&self, word_id: u32) -> u64 {
        let (type_index, _) = self.record(word_id);
        self.layout
            .type_masks
            .view(self.data())
            .get(type_index)
            .unwrap_or_else(|| corrupted("word type index out of range"))
    }

    /// Grammeme mask of `word` exactly as spelled.
    pub fn word_type(&self, word: &str) -> Option<u64> {
        let id = self.words().identifier_if_available(word)?;
        Some(self.type_mask(id))
    }

    /// Grammeme mask of `word`, retrying with its lowercase form.
    pub fn combined_binary_type(&self, word: &str) -> Option<u64> {
        self.resolve_word(word).map(|id| self.type_mask(id))
    }

    pub fn is_known_word(&self, word: &str) -> bool {
        self.resolve_word(word).is_some()
    }

    pub fn has_all_properties(&self, word: &str, mask: u64) -> bool {
        self.combined_binary_type(word)
            .is_some_and(|types| grammeme::contains_all(types, mask))
    }

    pub fn has_any_property(&self, word: &str, mask: u64) -> bool {
        self.combined_binary_type(word)
            .is_some_and(|types| grammeme::contains_any(types, mask))
    }

    /// `true` when the word is known and carries the named grammeme.
    pub fn has_property(&self, word: &str, name: &str) -> bool {
        self.value_of_type(name)
            .is_some_and(|bit| self.has_all_properties(word, bit))
    }

    /// Bit assigned to the named grammeme.
    pub fn value_of_type(&self, name: &str) -> Option<u64> {
        let id = self.grammemes().identifier_if_available(name)?;
        grammeme::bit_for_identifier(id)
    }

    /// OR of the bits of the named grammemes. Unknown names are skipped;
    /// `None` when no name resolves.
    pub fn binary_properties(&self, names: &[&str]) -> Option<u64> {
        names
            .iter()
            .filter_map(|name| self.value_of_type(name))
            .reduce(|mask, bit| mask | bit)
    }

    /// Name of the grammeme with the given single-bit mask.
    pub fn type_of_value(&self, bit: u64) -> Option<String> {
        let id = grammeme::identifier_for_bit(bit)?;
        self.grammemes().try_get_string(id)
    }

    /// Names of the grammemes in `mask`, lowest bit first.
    pub fn property_names(&self, mask: u64) -> Vec<String> {
        grammeme::single_bits(mask)
            .filter_map(|bit| self.type_of_value(bit))
            .collect()
    }

    /// Grammeme names of `word`, or `None` for unknown words.
    pub fn properties(&self, word: &str) -> Option<Vec<String>> {
        self.combined_binary_type(word)
            .map(|mask| self.property_names(mask))
    }

    /// Value identifiers stored under `key` in a word's property map.
    fn property_value_ids(&self, word_id: u32, key: u32) -> Result<Option<Vec<u32>>> {
        let (_, offset) = self.record(word_id);
        if offset == 0 {
            return Ok(None);
        }
        let maps = self.layout.property_maps.view(self.data());
        let truncated =
            || StoreError::illegal_state(format!("property map of word {word_id} is truncated"));
        let key_bits = self.layout.key_bits;
        let key_mask = (1u64 << key_bits) - 1;
        let key = u64::from(key);

        let count = maps.get(offset).ok_or_else(truncated)? as usize;
        let mut value_pos = offset + 1 + count;
        for i in 0..count {
            let entry = maps.get(offset + 1 + i).ok_or_else(truncated)?;
            let entry_key = entry & key_mask;
            let len = (entry >> key_bits) as usize;
            // Keys are stored in ascending order.
            if entry_key > key {
                break;
            }
            if entry_key == key {
                return (value_pos..value_pos + len)
                    .map(|pos| {
                        maps.get(pos)
                            .and_then(|v| u32::try_from(v).ok())
                            .ok_or_else(truncated)
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(Some);
            }
            value_pos += len;
        }
        Ok(None)
    }

    /// Values of a named property of `word`.
    ///
    /// `Ok(None)` when the word is unknown, the property is not defined in
    /// this dictionary, or the word has no value for it. Values of the
    /// `inflection` property are pattern names.
    pub fn property_values(&self, word: &str, property: &str) -> Result<Option<Vec<String>>> {
        let Some(key) = self.property_keys().identifier_if_available(property) else {
            return Ok(None);
        };
        let Some(word_id) = self.resolve_word(word) else {
            return Ok(None);
        };
        let Some(ids) = self.property_value_ids(word_id, key)? else {
            return Ok(None);
        };

        if Some(key) == self.inflection_key {
            let engine = self.inflector().ok_or_else(|| {
                StoreError::illegal_state("inflection property without an inflection section")
            })?;
            return ids
                .into_iter()
                .map(|id| engine.pattern(id).map(|p| engine.pattern_name(&p)))
                .collect::<Result<Vec<_>>>()
                .map(Some);
        }

        let values = self.layout.property_values.view(self.data());
        ids.into_iter()
            .map(|id| {
                values.try_get_string(id).ok_or_else(|| {
                    StoreError::illegal_state(format!("unknown property value {id}"))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Names of the properties defined in this dictionary, excluding the
    /// reserved `inflection` key.
    pub fn property_keys_defined(&self) -> Vec<String> {
        self.property_keys()
            .cursor()
            .filter(|(_, id)| Some(*id) != self.inflection_key)
            .map(|(key, _)| key)
            .collect()
    }

    /// Pattern identifiers registered for `word`.
    pub(crate) fn inflection_pattern_ids(&self, word: &str) -> Result<Option<Vec<u32>>> {
        let Some(key) = self.inflection_key else {
            return Ok(None);
        };
        let Some(word_id) = self.resolve_word(word) else {
            return Ok(None);
        };
        self.property_value_ids(word_id, key)
    }

    /// Iterator over every word, in table order.
    pub fn known_words(&self) -> DictionaryKeyIterator<'_> {
        DictionaryKeyIterator::new(self.words())
    }

    /// Iterator over the words starting with `prefix`.
    pub fn known_words_with_prefix(&self, prefix: &str) -> DictionaryKeyIterator<'_> {
        DictionaryKeyIterator::with_prefix(self.words(), prefix)
    }

    /// Number of words [`known_words`](Self::known_words) yields.
    pub fn known_words_len(&self) -> usize {
        let words = self.words();
        words.len() - usize::from(words.contains(""))
    }

    /// Inflection pattern operations, if the dictionary has patterns.
    pub fn inflector(&self) -> Option<InflectionPatternEngine<'_>> {
        self.layout
            .inflections
            .as_ref()
            .map(|layout| InflectionPatternEngine::new(self, layout, self.data()))
    }
}

impl WordPropertyLookup for DictionaryStore {
    fn combined_binary_type(&self, word: &str) -> Option<u64> {
        DictionaryStore::combined_binary_type(self, word)
    }

    fn binary_properties(&self, names: &[&str]) -> Option<u64> {
        DictionaryStore::binary_properties(self, names)
    }
}

impl std::fmt::Debug for DictionaryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryStore")
            .field("language", &self.language)
            .field("source", &self.source)
            .field("words", &self.layout.words.len())
            .field("grammemes", &self.layout.grammemes.len())
            .field("has_inflections", &self.layout.inflections.is_some())
            .field("region", &self.region)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::builder::{DictionaryBuilder, WordSource};

    fn fixture() -> Vec<u8> {
        DictionaryBuilder::new("fr")
            .grammeme("masculine")
            .word(WordSource::new("chat").grammemes(["noun", "masculine", "singular"]))
            .word(WordSource::new("chats").grammemes(["noun", "masculine", "plural"]))
            .word(
                WordSource::new("maison")
                    .grammemes(["noun", "feminine", "singular"])
                    .property("gloss", ["house", "home"])
                    .property("register", ["common"]),
            )
            .word(WordSource::new("Paris").grammemes(["proper-noun"]))
            .word(WordSource::new("le").grammemes(["determiner", "masculine"]))
            .build()
            .unwrap()
    }

    fn store() -> DictionaryStore {
        DictionaryStore::from_bytes(fixture()).unwrap()
    }

    #[test]
    fn header_fields() {
        let store = store();
        assert_eq!(store.language(), "fr");
        assert!(store.source_path().is_none());
        assert!(!store.is_mapped());
        assert!(store.inflector().is_none());
    }

    #[test]
    fn word_masks() {
        let store = store();
        let noun = store.value_of_type("noun").unwrap();
        let plural = store.value_of_type("plural").unwrap();
        let chats = store.word_type("chats").unwrap();
        assert!(grammeme::contains_all(chats, noun | plural));
        assert_eq!(store.word_type("chien"), None);
        assert_eq!(store.property_names(chats), {
            let mut names = vec!["masculine", "noun", "plural"];
            names.sort_by_key(|n| store.value_of_type(n));
            names
        });
    }

    #[test]
    fn case_folded_retry() {
        let store = store();
        assert_eq!(store.word_type("Chat"), None);
        assert_eq!(store.combined_binary_type("Chat"), store.word_type("chat"));
        assert_eq!(store.combined_binary_type("CHATS"), store.word_type("chats"));
        // Capitalized entries are found as spelled.
        assert!(store.word_type("Paris").is_some());
        assert!(store.is_known_word("Paris"));
        assert!(!store.is_known_word("paris"));
    }

    #[test]
    fn bitmask_containment() {
        let store = store();
        let fem_sg = store.binary_properties(&["feminine", "singular"]).unwrap();
        assert!(store.has_all_properties("maison", fem_sg));
        assert!(!store.has_all_properties("chat", fem_sg));
        assert!(store.has_any_property("chat", fem_sg));
        assert!(!store.has_all_properties("chien", 0));
        assert!(store.has_property("le", "determiner"));
        assert!(!store.has_property("le", "no-such-grammeme"));
    }

    #[test]
    fn grammeme_table() {
        let store = store();
        assert_eq!(store.binary_properties(&["nope"]), None);
        assert_eq!(
            store.binary_properties(&["noun", "nope"]),
            store.value_of_type("noun")
        );
        for (name, id) in store.grammemes().cursor() {
            let bit = store.value_of_type(&name).unwrap();
            assert_eq!(bit, 1 << id);
            assert_eq!(store.type_of_value(bit).as_deref(), Some(name.as_str()));
        }
        assert_eq!(store.type_of_value(0b11), None);
        assert_eq!(store.type_of_value(1 << 40), None);
    }

    #[test]
    fn property_values() {
        let store = store();
        assert_eq!(
            store.property_values("maison", "gloss").unwrap(),
            Some(vec!["house".to_string(), "home".to_string()])
        );
        assert_eq!(
            store.property_values("Maison", "register").unwrap(),
            Some(vec!["common".to_string()])
        );
        assert_eq!(store.property_values("chat", "gloss").unwrap(), None);
        assert_eq!(store.property_values("maison", "etymology").unwrap(), None);
        assert_eq!(store.property_values("chien", "gloss").unwrap(), None);
        assert_eq!(store.property_keys_defined(), vec!["gloss", "register"]);
        assert_eq!(
            store.properties("maison").unwrap().len(),
            3
        );
        assert_eq!(store.properties("chien"), None);
    }

    #[test]
    fn known_words() {
        let store = store();
        let words: Vec<String> = store.known_words().collect();
        assert_eq!(words, vec!["Paris", "chat", "chats", "le", "maison"]);
        assert_eq!(store.known_words_len(), 5);
        let prefixed: Vec<String> = store.known_words_with_prefix("cha").collect();
        assert_eq!(prefixed, vec!["chat", "chats"]);
    }

    #[test]
    fn reject_truncated_and_trailing() {
        let bytes = fixture();
        let err = DictionaryStore::from_bytes(bytes[..bytes.len() - 3].to_vec()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        let mut padded = bytes;
        padded.push(0);
        let err = DictionaryStore::from_bytes(padded).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
    }

    #[test]
    fn store_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DictionaryStore>();
    }
}
