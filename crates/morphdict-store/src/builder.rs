// Offline dictionary compiler.
//
// Collects words, grammemes, properties and inflection patterns (from code
// or a JSON lexicon) and serializes them into the mappable dictionary
// format read by `DictionaryStore`.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use std::path::Path;

use hashbrown::HashMap;
use morphdict_core::grammeme::MAX_GRAMMEMES;
use serde::Deserialize;

use crate::array::write_array;
use crate::dictionary::{INFLECTION_PROPERTY, LANGUAGE_LEN};
use crate::format::{self, OPTION_HAS_INFLECTIONS};
use crate::inflection::{InflectionRecord, InflectionSection, PatternRecord, SuffixRun};
use crate::packed::{PackedBuf, bit_width};
use crate::region::write_pod;
use crate::string_table::{BuiltStringTable, DEFAULT_FLAT_TABLE_LIMIT, StringTable, TableKind};
use crate::{Result, StoreError};

/// A complete lexicon, as read from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DictionarySource {
    pub language: String,
    /// Grammemes to register even if no word uses them.
    pub grammemes: Vec<String>,
    pub words: Vec<WordSource>,
    pub patterns: Vec<PatternSource>,
}

impl DictionarySource {
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader)
            .map_err(|e| StoreError::invalid_input(format!("malformed lexicon: {e}")))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| StoreError::invalid_input(format!("malformed lexicon: {e}")))
    }
}

/// One dictionary word.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WordSource {
    pub word: String,
    pub grammemes: Vec<String>,
    /// Named properties with their values, in declared order.
    pub properties: BTreeMap<String, Vec<String>>,
    /// Names of the inflection patterns this word follows.
    pub patterns: Vec<String>,
}

impl WordSource {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            ..Self::default()
        }
    }

    pub fn grammemes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grammemes.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn patterns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn property<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties
            .entry(key.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    fn merge(&mut self, other: WordSource) {
        self.grammemes.extend(other.grammemes);
        for (key, values) in other.properties {
            self.properties.entry(key).or_default().extend(values);
        }
        for pattern in other.patterns {
            if !self.patterns.contains(&pattern) {
                self.patterns.push(pattern);
            }
        }
    }
}

/// A named inflection pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatternSource {
    pub name: String,
    pub frequency: u32,
    pub parts_of_speech: Vec<String>,
    /// Candidate lemma endings, in matching order.
    pub lemma_suffixes: Vec<String>,
    pub inflections: Vec<InflectionSource>,
}

impl PatternSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn part_of_speech(mut self, name: impl Into<String>) -> Self {
        self.parts_of_speech.push(name.into());
        self
    }

    pub fn lemma_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lemma_suffixes.extend(suffixes.into_iter().map(Into::into));
        self
    }

    pub fn inflection<I, S>(mut self, suffix: impl Into<String>, grammemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inflections.push(InflectionSource {
            suffix: suffix.into(),
            grammemes: grammemes.into_iter().map(Into::into).collect(),
        });
        self
    }
}

/// One inflected form of a pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InflectionSource {
    pub suffix: String,
    pub grammemes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderOptions {
    /// Reject patterns whose lemma suffixes shadow each other instead of
    /// logging a warning.
    pub strict_lemma_suffixes: bool,
    /// String tables with at most this many entries are stored flat.
    pub flat_table_limit: usize,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            strict_lemma_suffixes: false,
            flat_table_limit: DEFAULT_FLAT_TABLE_LIMIT,
        }
    }
}

/// Deduplicating table of grammeme masks.
#[derive(Default)]
struct MaskTable {
    masks: Vec<u64>,
    index: HashMap<u64, u32>,
}

impl MaskTable {
    fn intern(&mut self, mask: u64) -> u32 {
        *self.index.entry(mask).or_insert_with(|| {
            self.masks.push(mask);
            (self.masks.len() - 1) as u32
        })
    }
}

/// OR of the bits of the named grammemes.
fn grammeme_mask(grammemes: &BuiltStringTable, names: &[String]) -> u64 {
    names
        .iter()
        .filter_map(|name| grammemes.id_of(name))
        .fold(0, |mask, id| mask | (1u64 << id))
}

/// Builds a dictionary file.
///
/// ```no_run
/// use morphdict_store::builder::{DictionaryBuilder, PatternSource, WordSource};
///
/// let bytes = DictionaryBuilder::new("en")
///     .pattern(
///         PatternSource::new("noun-s")
///             .lemma_suffixes([""])
///             .inflection("", ["singular"])
///             .inflection("s", ["plural"]),
///     )
///     .word(WordSource::new("cat").grammemes(["noun"]).patterns(["noun-s"]))
///     .build()?;
/// # Ok::<(), morphdict_store::StoreError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct DictionaryBuilder {
    language: String,
    grammemes: BTreeSet<String>,
    words: BTreeMap<String, WordSource>,
    patterns: Vec<PatternSource>,
    options: BuilderOptions,
}

impl DictionaryBuilder {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Self::default()
        }
    }

    pub fn from_source(source: DictionarySource) -> Self {
        let mut builder = Self::new(source.language);
        builder.grammemes.extend(source.grammemes);
        for word in source.words {
            builder = builder.word(word);
        }
        builder.patterns = source.patterns;
        builder
    }

    pub fn options(mut self, options: BuilderOptions) -> Self {
        self.options = options;
        self
    }

    /// Register a grammeme even if no word or pattern uses it.
    pub fn grammeme(mut self, name: impl Into<String>) -> Self {
        self.grammemes.insert(name.into());
        self
    }

    /// Add a word. Repeated words are merged.
    pub fn word(mut self, word: WordSource) -> Self {
        match self.words.get_mut(&word.word) {
            Some(existing) => existing.merge(word),
            None => {
                self.words.insert(word.word.clone(), word);
            }
        }
        self
    }

    pub fn pattern(mut self, pattern: PatternSource) -> Self {
        self.patterns.push(pattern);
        self
    }

    fn table<I, S>(&self, strings: I) -> Result<BuiltStringTable>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        StringTable::build_with(strings, TableKind::Auto(self.options.flat_table_limit))
    }

    fn language_tag(&self) -> Result<[u8; LANGUAGE_LEN]> {
        let lang = self.language.as_bytes();
        if lang.is_empty() || lang.len() > LANGUAGE_LEN || !self.language.is_ascii() {
            return Err(StoreError::invalid_input(format!(
                "language {:?} must be 1 to {LANGUAGE_LEN} ASCII bytes",
                self.language
            )));
        }
        let mut tag = [0u8; LANGUAGE_LEN];
        tag[..lang.len()].copy_from_slice(lang);
        Ok(tag)
    }

    fn grammeme_table(&self) -> Result<BuiltStringTable> {
        let mut names: BTreeSet<&str> = self.grammemes.iter().map(String::as_str).collect();
        for word in self.words.values() {
            names.extend(word.grammemes.iter().map(String::as_str));
        }
        for pattern in &self.patterns {
            names.extend(pattern.parts_of_speech.iter().map(String::as_str));
            for inflection in &pattern.inflections {
                names.extend(inflection.grammemes.iter().map(String::as_str));
            }
        }
        if names.len() > MAX_GRAMMEMES {
            return Err(StoreError::invalid_input(format!(
                "{} grammemes exceed the limit of {MAX_GRAMMEMES}",
                names.len()
            )));
        }
        StringTable::build_with(names, TableKind::Flat)
    }

    /// Warn about (or reject) lemma suffixes that can never match because
    /// an earlier one is a suffix of them.
    fn check_lemma_suffixes(&self, pattern: &PatternSource) -> Result<()> {
        let suffixes = &pattern.lemma_suffixes;
        for (i, earlier) in suffixes.iter().enumerate() {
            for later in &suffixes[i + 1..] {
                if !later.ends_with(earlier.as_str()) {
                    continue;
                }
                if self.options.strict_lemma_suffixes {
                    return Err(StoreError::invalid_input(format!(
                        "pattern {:?}: lemma suffix {later:?} is shadowed by {earlier:?}",
                        pattern.name
                    )));
                }
                tracing::warn!(
                    pattern = %pattern.name,
                    earlier = %earlier,
                    later = %later,
                    "lemma suffix is shadowed by an earlier one"
                );
            }
        }
        Ok(())
    }

    fn inflection_section(
        &self,
        grammemes: &BuiltStringTable,
        pattern_names: BuiltStringTable,
    ) -> Result<InflectionSection> {
        let mask_of = |names: &[String]| grammeme_mask(grammemes, names);

        let mut ordered: Vec<(u32, &PatternSource)> = Vec::with_capacity(self.patterns.len());
        for pattern in &self.patterns {
            self.check_lemma_suffixes(pattern)?;
            if pattern.lemma_suffixes.len() > usize::from(u16::MAX)
                || pattern.inflections.len() > usize::from(u16::MAX)
            {
                return Err(StoreError::invalid_input(format!(
                    "pattern {:?} is too large",
                    pattern.name
                )));
            }
            let id = pattern_names.id_of(&pattern.name).ok_or_else(|| {
                StoreError::illegal_state(format!("pattern {:?} missing from its table", pattern.name))
            })?;
            ordered.push((id, pattern));
        }
        ordered.sort_unstable_by_key(|&(id, _)| id);

        let suffixes = self.table(self.patterns.iter().flat_map(|p| {
            p.lemma_suffixes
                .iter()
                .chain(p.inflections.iter().map(|i| &i.suffix))
        }))?;
        let suffix_id = |s: &str| {
            suffixes
                .id_of(s)
                .ok_or_else(|| StoreError::illegal_state(format!("suffix {s:?} missing from its table")))
        };

        let mut sets = MaskTable::default();
        let mut patterns = Vec::with_capacity(ordered.len());
        let mut lemma_suffixes = Vec::new();
        let mut inflections = Vec::new();
        let mut by_suffix: BTreeMap<&str, Vec<(u32, u32)>> = BTreeMap::new();

        for &(id, pattern) in &ordered {
            patterns.push(PatternRecord {
                first_lemma_suffix: lemma_suffixes.len() as u32,
                first_inflection: inflections.len() as u32,
                frequency: pattern.frequency,
                parts_of_speech: sets.intern(mask_of(&pattern.parts_of_speech)),
                lemma_suffix_count: pattern.lemma_suffixes.len() as u16,
                inflection_count: pattern.inflections.len() as u16,
            });
            for suffix in &pattern.lemma_suffixes {
                lemma_suffixes.push(suffix_id(suffix)?);
                let candidates = by_suffix.entry(suffix.as_str()).or_default();
                if !candidates.iter().any(|&(_, p)| p == id) {
                    candidates.push((pattern.frequency, id));
                }
            }
            for inflection in &pattern.inflections {
                inflections.push(InflectionRecord {
                    suffix: suffix_id(&inflection.suffix)?,
                    grammemes: sets.intern(mask_of(&inflection.grammemes)),
                });
            }
        }

        let suffix_index = self.table(by_suffix.keys())?;
        let mut suffix_runs = vec![SuffixRun { first: 0, count: 0 }; suffix_index.len()];
        let mut suffix_patterns = Vec::new();
        for (suffix, mut candidates) in by_suffix {
            candidates.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
            let index = suffix_index.id_of(suffix).ok_or_else(|| {
                StoreError::illegal_state(format!("suffix {suffix:?} missing from the index"))
            })?;
            suffix_runs[index as usize] = SuffixRun {
                first: suffix_patterns.len() as u32,
                count: candidates.len() as u32,
            };
            suffix_patterns.extend(candidates.into_iter().map(|(_, id)| id));
        }

        Ok(InflectionSection {
            grammeme_sets: sets.masks,
            suffixes,
            pattern_names,
            patterns,
            lemma_suffixes,
            inflections,
            suffix_index,
            suffix_runs,
            suffix_patterns,
        })
    }

    /// Compile the dictionary.
    pub fn build(&self) -> Result<Vec<u8>> {
        let language = self.language_tag()?;
        let grammemes = self.grammeme_table()?;
        let mask_of = |names: &[String]| grammeme_mask(&grammemes, names);

        // Patterns
        let pattern_names = self.table(self.patterns.iter().map(|p| p.name.as_str()))?;
        if pattern_names.len() != self.patterns.len() {
            return Err(StoreError::invalid_input("duplicate inflection pattern name"));
        }
        let pattern_ids: HashMap<String, u32> = pattern_names.identifiers().clone();
        let inflections = if self.patterns.is_empty() {
            None
        } else {
            Some(self.inflection_section(&grammemes, pattern_names)?)
        };

        // Property keys and values
        let mut keys: BTreeSet<&str> = BTreeSet::new();
        let mut values: BTreeSet<&str> = BTreeSet::new();
        let mut has_patterns = false;
        for word in self.words.values() {
            for (key, vals) in &word.properties {
                if key == INFLECTION_PROPERTY {
                    return Err(StoreError::invalid_input(format!(
                        "word {:?} uses the reserved property {INFLECTION_PROPERTY:?}",
                        word.word
                    )));
                }
                keys.insert(key);
                values.extend(vals.iter().map(String::as_str));
            }
            has_patterns |= !word.patterns.is_empty();
        }
        if has_patterns {
            keys.insert(INFLECTION_PROPERTY);
        }
        let key_table = StringTable::build_with(&keys, TableKind::Flat)?;
        let value_table = self.table(&values)?;
        let key_bits = bit_width(keys.len().saturating_sub(1) as u64);
        let inflection_key = key_table.id_of(INFLECTION_PROPERTY);

        // Words
        let words = self.table(self.words.keys())?;
        let mut ordered: Vec<(u32, &WordSource)> = self
            .words
            .values()
            .map(|w| {
                words
                    .id_of(&w.word)
                    .map(|id| (id, w))
                    .ok_or_else(|| StoreError::illegal_state(format!("word {:?} missing from its table", w.word)))
            })
            .collect::<Result<_>>()?;
        ordered.sort_unstable_by_key(|&(id, _)| id);

        let mut types = MaskTable::default();
        let mut maps: Vec<u64> = vec![0];
        let mut records: Vec<(u32, u64)> = Vec::with_capacity(ordered.len());
        for (_, word) in ordered {
            let type_index = types.intern(mask_of(&word.grammemes));

            let mut entries: Vec<(u32, Vec<u64>)> = Vec::new();
            for (key, vals) in &word.properties {
                let Some(key_id) = key_table.id_of(key) else {
                    continue;
                };
                let ids = vals
                    .iter()
                    .filter_map(|v| value_table.id_of(v))
                    .map(u64::from)
                    .collect();
                entries.push((key_id, ids));
            }
            if let (Some(key_id), false) = (inflection_key, word.patterns.is_empty()) {
                let ids = word
                    .patterns
                    .iter()
                    .map(|name| {
                        pattern_ids.get(name).map(|&id| u64::from(id)).ok_or_else(|| {
                            StoreError::invalid_input(format!(
                                "word {:?} references unknown pattern {name:?}",
                                word.word
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                entries.push((key_id, ids));
            }
            entries.sort_unstable_by_key(|(key, _)| *key);

            let offset = if entries.is_empty() {
                0
            } else {
                let offset = maps.len() as u64;
                maps.push(entries.len() as u64);
                maps.extend(
                    entries
                        .iter()
                        .map(|(key, ids)| u64::from(*key) | ((ids.len() as u64) << key_bits)),
                );
                for (_, ids) in &entries {
                    maps.extend_from_slice(ids);
                }
                offset
            };
            records.push((type_index, offset));
        }

        let type_bits = bit_width(types.masks.len().saturating_sub(1) as u64);
        let map_bits = bit_width(records.iter().map(|&(_, o)| o).max().unwrap_or(0));
        if u32::from(type_bits) + u32::from(map_bits) > 64 {
            return Err(StoreError::invalid_input("word records do not fit in 64 bits"));
        }
        let packed_records: Vec<u64> = records
            .iter()
            .map(|&(type_index, offset)| u64::from(type_index) | (offset << type_bits))
            .collect();

        let options = if inflections.is_some() {
            OPTION_HAS_INFLECTIONS
        } else {
            0
        };

        let mut out = Vec::new();
        format::write_header(&mut out)?;
        write_pod(&mut out, &options)?;
        out.extend_from_slice(&language);
        grammemes.write(&mut out)?;
        write_array(&mut out, &types.masks)?;
        out.extend_from_slice(&[type_bits, map_bits]);
        words.write(&mut out)?;
        PackedBuf::pack(&packed_records).write(&mut out)?;
        key_table.write(&mut out)?;
        value_table.write(&mut out)?;
        out.push(key_bits);
        PackedBuf::pack(&maps).write(&mut out)?;
        if let Some(section) = &inflections {
            section.write(&mut out)?;
        }

        tracing::debug!(
            language = %self.language,
            words = words.len(),
            grammemes = grammemes.len(),
            patterns = self.patterns.len(),
            bytes = out.len(),
            "built dictionary"
        );
        Ok(out)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let bytes = self.build()?;
        w.write_all(&bytes)?;
        Ok(())
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.build()?;
        std::fs::write(path, bytes).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
