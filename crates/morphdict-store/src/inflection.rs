// Inflection patterns: suffix families that inflect and lemmatize words.
//
// The engine borrows the pattern tables of a loaded dictionary. Patterns and
// inflections are plain value handles; every operation on them is an engine
// method, so handles never point back into the store.

use std::io::Write;

use bytemuck::{Pod, Zeroable};
use morphdict_core::grammeme::contains_all;

use crate::array::{ArrayLayout, PodArray, write_array};
use crate::dictionary::DictionaryStore;
use crate::format::{self, INFLECTION_SECTION_VERSION};
use crate::region::SectionReader;
use crate::string_table::{BuiltStringTable, StringTable, StringTableLayout};
use crate::{Result, StoreError, corrupted};

/// Fixed-size pattern record (20 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct PatternRecord {
    /// Index of the first lemma suffix in the lemma suffix array.
    pub first_lemma_suffix: u32,
    /// Index of the first inflection in the inflection array.
    pub first_inflection: u32,
    pub frequency: u32,
    /// Index into the grammeme set array.
    pub parts_of_speech: u32,
    pub lemma_suffix_count: u16,
    pub inflection_count: u16,
}

const _: () = assert!(size_of::<PatternRecord>() == 20);

/// Fixed-size inflection record: suffix identifier and grammeme set index.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct InflectionRecord {
    pub suffix: u32,
    pub grammemes: u32,
}

const _: () = assert!(size_of::<InflectionRecord>() == 8);

/// Range of pattern identifiers sharing a lemma suffix.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct SuffixRun {
    pub first: u32,
    pub count: u32,
}

/// Location of the inflection section inside a region.
#[derive(Debug, Clone, Copy)]
pub struct InflectionLayout {
    grammeme_sets: ArrayLayout<u64>,
    suffixes: StringTableLayout,
    pattern_names: StringTableLayout,
    patterns: ArrayLayout<PatternRecord>,
    lemma_suffixes: ArrayLayout<u32>,
    inflections: ArrayLayout<InflectionRecord>,
    suffix_index: StringTableLayout,
    suffix_runs: ArrayLayout<SuffixRun>,
    suffix_patterns: ArrayLayout<u32>,
}

impl InflectionLayout {
    /// Read the section and check every cross-reference in it.
    pub fn read(reader: &mut SectionReader<'_>, data: &[u8]) -> Result<Self> {
        format::check_version(reader, "inflection", INFLECTION_SECTION_VERSION)?;
        let layout = Self {
            grammeme_sets: reader.read_array()?,
            suffixes: StringTableLayout::read(reader, data)?,
            pattern_names: StringTableLayout::read(reader, data)?,
            patterns: reader.read_array()?,
            lemma_suffixes: reader.read_array()?,
            inflections: reader.read_array()?,
            suffix_index: StringTableLayout::read(reader, data)?,
            suffix_runs: reader.read_array()?,
            suffix_patterns: reader.read_array()?,
        };
        layout.validate(data)?;
        Ok(layout)
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    fn validate(&self, data: &[u8]) -> Result<()> {
        let bad = |what: String| Err(StoreError::IllegalState(what));
        if self.patterns.len() != self.pattern_names.len() {
            return bad(format!(
                "{} pattern records for {} pattern names",
                self.patterns.len(),
                self.pattern_names.len()
            ));
        }
        if self.suffix_runs.len() != self.suffix_index.len() {
            return bad(format!(
                "{} suffix runs for {} indexed suffixes",
                self.suffix_runs.len(),
                self.suffix_index.len()
            ));
        }

        let in_range = |first: u32, count: usize, len: usize| (first as usize) + count <= len;
        let grammeme_sets = self.grammeme_sets.len();
        let suffixes = self.suffixes.len();

        for (id, record) in self.patterns.view(data).iter().enumerate() {
            if !in_range(
                record.first_lemma_suffix,
                record.lemma_suffix_count.into(),
                self.lemma_suffixes.len(),
            ) || !in_range(
                record.first_inflection,
                record.inflection_count.into(),
                self.inflections.len(),
            ) || record.parts_of_speech as usize >= grammeme_sets
            {
                return bad(format!("pattern {id} references data out of range"));
            }
        }
        if self.lemma_suffixes.view(data).iter().any(|s| s as usize >= suffixes) {
            return bad("lemma suffix identifier out of range".into());
        }
        for (index, record) in self.inflections.view(data).iter().enumerate() {
            if record.suffix as usize >= suffixes || record.grammemes as usize >= grammeme_sets {
                return bad(format!("inflection {index} references data out of range"));
            }
        }
        for run in self.suffix_runs.view(data).iter() {
            if !in_range(run.first, run.count as usize, self.suffix_patterns.len()) {
                return bad("suffix run out of range".into());
            }
        }
        let patterns = self.patterns.len();
        if self.suffix_patterns.view(data).iter().any(|p| p as usize >= patterns) {
            return bad("suffix index references an unknown pattern".into());
        }
        Ok(())
    }
}

/// A named inflection pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InflectionPattern {
    id: u32,
    record: PatternRecord,
}

impl InflectionPattern {
    /// Dense identifier; equal to the identifier of the pattern name.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn frequency(&self) -> u32 {
        self.record.frequency
    }

    pub fn inflection_count(&self) -> usize {
        self.record.inflection_count.into()
    }

    pub fn lemma_suffix_count(&self) -> usize {
        self.record.lemma_suffix_count.into()
    }
}

/// One inflected form of a pattern: a surface suffix and its grammemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Inflection {
    pattern: u32,
    suffix: u32,
    grammemes: u64,
}

impl Inflection {
    pub fn pattern_id(&self) -> u32 {
        self.pattern
    }

    pub fn suffix_id(&self) -> u32 {
        self.suffix
    }

    pub fn grammemes(&self) -> u64 {
        self.grammemes
    }
}

/// Lexicographic score of a reinflection candidate; larger is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ReinflectScore {
    optional_constraints: i64,
    grammemes_matched: i64,
    grammemes_unmatched_negative: i64,
}

impl ReinflectScore {
    const NONE: Self = Self {
        optional_constraints: -1,
        grammemes_matched: -1,
        grammemes_unmatched_negative: i32::MIN as i64,
    };
}

/// Bit-by-bit score of `grammemes` against an ordered attribute list: the
/// first attribute is the most significant bit. Saturates at `i64::MAX`
/// past 62 attributes.
fn attribute_score(grammemes: u64, attributes: &[u64]) -> i64 {
    attributes.iter().fold(0i64, |score, &attribute| {
        score
            .saturating_mul(2)
            .saturating_add(i64::from(grammemes & attribute != 0))
    })
}

/// Pattern operations over the inflection section of a [`DictionaryStore`].
#[derive(Clone, Copy)]
pub struct InflectionPatternEngine<'a> {
    store: &'a DictionaryStore,
    layout: &'a InflectionLayout,
    data: &'a [u8],
}

impl<'a> InflectionPatternEngine<'a> {
    pub(crate) fn new(store: &'a DictionaryStore, layout: &'a InflectionLayout, data: &'a [u8]) -> Self {
        Self {
            store,
            layout,
            data,
        }
    }

    pub fn store(&self) -> &'a DictionaryStore {
        self.store
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.layout.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn records(&self) -> PodArray<'a, PatternRecord> {
        self.layout.patterns.view(self.data)
    }

    fn suffix_table(&self) -> StringTable<'a> {
        self.layout.suffixes.view(self.data)
    }

    fn pattern_names(&self) -> StringTable<'a> {
        self.layout.pattern_names.view(self.data)
    }

    fn grammeme_set(&self, index: u32) -> u64 {
        self.layout
            .grammeme_sets
            .view(self.data)
            .get(index as usize)
            .unwrap_or_else(|| corrupted("grammeme set index out of range"))
    }

    fn lemma_suffix_ids(&self, pattern: &InflectionPattern) -> impl Iterator<Item = u32> + use<'a> {
        let ids = self.layout.lemma_suffixes.view(self.data);
        let first = pattern.record.first_lemma_suffix as usize;
        (first..first + pattern.lemma_suffix_count()).map(move |i| {
            ids.get(i)
                .unwrap_or_else(|| corrupted("lemma suffix index out of range"))
        })
    }

    /// The pattern with identifier `id`.
    ///
    /// Fails with [`StoreError::IllegalState`] when `id` does not name a
    /// pattern, which only happens for identifiers read from a corrupted
    /// word record.
    pub fn pattern(&self, id: u32) -> Result<InflectionPattern> {
        let record = self
            .records()
            .get(id as usize)
            .ok_or_else(|| StoreError::illegal_state(format!("unknown inflection pattern {id}")))?;
        Ok(InflectionPattern { id, record })
    }

    pub fn pattern_by_name(&self, name: &str) -> Option<InflectionPattern> {
        let id = self.pattern_names().identifier_if_available(name)?;
        let record = self.records().get(id as usize)?;
        Some(InflectionPattern { id, record })
    }

    /// All patterns in identifier (name) order.
    pub fn patterns(&self) -> impl Iterator<Item = InflectionPattern> + use<'a> {
        self.records()
            .iter()
            .zip(0u32..)
            .map(|(record, id)| InflectionPattern { id, record })
    }

    /// The patterns registered for a dictionary word.
    ///
    /// Falls back to the lowercase form when the word is not found as
    /// given. Unknown words yield an empty list.
    pub fn patterns_for_word(&self, word: &str) -> Result<Vec<InflectionPattern>> {
        let Some(ids) = self.store.inflection_pattern_ids(word)? else {
            return Ok(Vec::new());
        };
        ids.into_iter().map(|id| self.pattern(id)).collect()
    }

    /// Candidate patterns for a word ending in `suffix`, most frequent first.
    ///
    /// The index is keyed by lemma suffixes: the result holds every pattern
    /// that declares `suffix` as one of its lemma suffixes.
    pub fn patterns_by_suffix(&self, suffix: &str) -> Vec<InflectionPattern> {
        let Some(index) = self
            .layout
            .suffix_index
            .view(self.data)
            .identifier_if_available(suffix)
        else {
            return Vec::new();
        };
        let run = self
            .layout
            .suffix_runs
            .view(self.data)
            .get(index as usize)
            .unwrap_or_else(|| corrupted("suffix run index out of range"));
        let ids = self.layout.suffix_patterns.view(self.data);
        (run.first as usize..(run.first + run.count) as usize)
            .map(|i| {
                let id = ids
                    .get(i)
                    .unwrap_or_else(|| corrupted("suffix pattern index out of range"));
                InflectionPattern {
                    id,
                    record: self
                        .records()
                        .get(id as usize)
                        .unwrap_or_else(|| corrupted("suffix index references an unknown pattern")),
                }
            })
            .collect()
    }

    pub fn pattern_name(&self, pattern: &InflectionPattern) -> String {
        self.pattern_names().get_string(pattern.id)
    }

    pub fn frequency(&self, pattern: &InflectionPattern) -> u32 {
        pattern.frequency()
    }

    /// Combined mask of the parts of speech the pattern applies to.
    pub fn parts_of_speech(&self, pattern: &InflectionPattern) -> u64 {
        self.grammeme_set(pattern.record.parts_of_speech)
    }

    /// `true` when the pattern applies to the named part of speech.
    pub fn contains_part_of_speech(&self, pattern: &InflectionPattern, name: &str) -> bool {
        self.store
            .value_of_type(name)
            .is_some_and(|bit| self.parts_of_speech(pattern) & bit != 0)
    }

    /// Position of the first mask in `candidates` that shares a part of
    /// speech with the pattern.
    pub fn first_containing_part_of_speech(
        &self,
        pattern: &InflectionPattern,
        candidates: &[u64],
    ) -> Option<usize> {
        let pos = self.parts_of_speech(pattern);
        candidates.iter().position(|&mask| pos & mask != 0)
    }

    /// Lemma suffixes in declared order.
    pub fn lemma_suffixes(&self, pattern: &InflectionPattern) -> Vec<String> {
        let table = self.suffix_table();
        self.lemma_suffix_ids(pattern)
            .map(|id| table.get_string(id))
            .collect()
    }

    pub fn inflection_at(&self, pattern: &InflectionPattern, index: usize) -> Option<Inflection> {
        if index >= pattern.inflection_count() {
            return None;
        }
        let record = self
            .layout
            .inflections
            .view(self.data)
            .get(pattern.record.first_inflection as usize + index)
            .unwrap_or_else(|| corrupted("inflection index out of range"));
        Some(Inflection {
            pattern: pattern.id,
            suffix: record.suffix,
            grammemes: self.grammeme_set(record.grammemes),
        })
    }

    /// Inflections in declared order.
    pub fn inflections(&self, pattern: &InflectionPattern) -> Vec<Inflection> {
        (0..pattern.inflection_count())
            .filter_map(|i| self.inflection_at(pattern, i))
            .collect()
    }

    /// The surface suffix of an inflection.
    pub fn suffix(&self, inflection: &Inflection) -> String {
        self.suffix_table().get_string(inflection.suffix)
    }

    fn record_of(&self, inflection: &Inflection) -> InflectionPattern {
        self.records()
            .get(inflection.pattern as usize)
            .map(|record| InflectionPattern {
                id: inflection.pattern,
                record,
            })
            .unwrap_or_else(|| corrupted("inflection of an unknown pattern"))
    }

    /// Generate the inflected form of `lemma`.
    ///
    /// The first lemma suffix, in declared order, that `lemma` ends with is
    /// replaced by the inflection's suffix. When none matches, the suffix is
    /// appended to the whole lemma.
    pub fn inflect(&self, inflection: &Inflection, lemma: &str) -> String {
        let pattern = self.record_of(inflection);
        let table = self.suffix_table();
        let stem = self
            .lemma_suffix_ids(&pattern)
            .find_map(|id| lemma.strip_suffix(table.get_string(id).as_str()))
            .unwrap_or(lemma);
        let mut form = String::with_capacity(stem.len() + 8);
        form.push_str(stem);
        form.push_str(&table.get_string(inflection.suffix));
        form
    }

    /// Recover the lemma of `form`.
    ///
    /// When the pattern declares a lemma suffix and `form` ends with the
    /// inflection's suffix, that suffix is replaced by the first declared
    /// lemma suffix. Otherwise `form` is returned unchanged.
    pub fn lemmatize(&self, inflection: &Inflection, form: &str) -> String {
        let pattern = self.record_of(inflection);
        let Some(first) = self.lemma_suffix_ids(&pattern).next() else {
            return form.to_owned();
        };
        let table = self.suffix_table();
        match form.strip_suffix(table.get_string(inflection.suffix).as_str()) {
            Some(stem) => stem.to_owned() + &table.get_string(first),
            None => form.to_owned(),
        }
    }

    /// `true` when some inflection of the pattern has exactly this suffix.
    pub fn contains_suffix(&self, pattern: &InflectionPattern, suffix: &str) -> bool {
        let Some(id) = self.suffix_table().identifier_if_available(suffix) else {
            return false;
        };
        self.inflections(pattern).iter().any(|i| i.suffix == id)
    }

    /// Inflections whose grammemes relate to `constraints`.
    ///
    /// With `superset`, keeps inflections whose grammemes all appear in
    /// `constraints`; otherwise keeps inflections carrying every constraint.
    pub fn constrain(
        &self,
        pattern: &InflectionPattern,
        constraints: u64,
        superset: bool,
    ) -> Vec<Inflection> {
        self.inflections(pattern)
            .into_iter()
            .filter(|i| {
                if superset {
                    contains_all(constraints, i.grammemes)
                } else {
                    contains_all(i.grammemes, constraints)
                }
            })
            .collect()
    }

    /// Inflections whose suffix equals one of the pattern's lemma suffixes.
    pub fn lemma_suffix_matches(&self, pattern: &InflectionPattern) -> Vec<Inflection> {
        let lemma_ids: Vec<u32> = self.lemma_suffix_ids(pattern).collect();
        self.inflections(pattern)
            .into_iter()
            .filter(|i| lemma_ids.contains(&i.suffix))
            .collect()
    }

    /// The inflections that could have produced `surface_form`.
    ///
    /// Only inflections whose grammemes all appear in `from` are considered.
    /// Of those ending the form, the ones with the longest suffix win.
    pub fn inflections_for_surface_form(
        &self,
        pattern: &InflectionPattern,
        surface_form: &str,
        from: u64,
    ) -> Vec<Inflection> {
        let mut results = Vec::new();
        let mut longest = None;
        for inflection in self.inflections(pattern) {
            if !contains_all(from, inflection.grammemes) {
                continue;
            }
            let suffix = self.suffix(&inflection);
            let len = suffix.len();
            if longest.is_some_and(|max| len < max) || !surface_form.ends_with(suffix.as_str()) {
                continue;
            }
            if longest.is_none_or(|max| len > max) {
                results.clear();
                longest = Some(len);
            }
            results.push(inflection);
        }
        results
    }

    /// Choose the inflection that represents the lemma of a word carrying
    /// `from`.
    ///
    /// Candidates are ranked by their score against `lemma_attributes`, then
    /// by the number of grammemes shared with `from`, then by fewest
    /// grammemes. Ties go to an inflection whose suffix is a lemma suffix,
    /// then to the shortest suffix.
    pub fn select_lemma_inflection(
        &self,
        pattern: &InflectionPattern,
        from: u64,
        lemma_attributes: &[u64],
    ) -> Option<Inflection> {
        let mut best = (-1i64, 0u32, -(u8::MAX as i32));
        let mut selected = Vec::new();
        for inflection in self.inflections(pattern) {
            let grammemes = inflection.grammemes;
            let candidate = (
                attribute_score(grammemes, lemma_attributes),
                (grammemes & from).count_ones(),
                -(grammemes.count_ones() as i32),
            );
            if candidate < best {
                continue;
            }
            if candidate > best {
                best = candidate;
                selected.clear();
            }
            selected.push(inflection);
        }
        self.matching_lemma_inflection(pattern, &selected)
    }

    /// Break a tie between equally-scored inflections: prefer one whose
    /// suffix is a lemma suffix, else the first with the shortest suffix.
    /// Suffix length is counted in UTF-16 code units.
    pub fn matching_lemma_inflection(
        &self,
        pattern: &InflectionPattern,
        candidates: &[Inflection],
    ) -> Option<Inflection> {
        if candidates.len() <= 1 {
            return candidates.first().copied();
        }
        let mut lemma_suffixes = self.lemma_suffixes(pattern);
        if lemma_suffixes.is_empty() {
            lemma_suffixes.push(String::new());
        }
        let mut shortest: Option<(usize, Inflection)> = None;
        for candidate in candidates {
            let suffix = self.suffix(candidate);
            if lemma_suffixes.contains(&suffix) {
                return Some(*candidate);
            }
            let len = suffix.encode_utf16().count();
            if shortest.is_none_or(|(min, _)| len < min) {
                shortest = Some((len, *candidate));
            }
        }
        shortest.map(|(_, inflection)| inflection)
    }

    /// Reinflect `surface_form`, which carries the grammemes `from`, to a
    /// form carrying every grammeme of `to`.
    ///
    /// Returns `None` when no inflection of the pattern satisfies `to`.
    pub fn reinflect(
        &self,
        pattern: &InflectionPattern,
        from: u64,
        to: u64,
        surface_form: &str,
    ) -> Option<String> {
        self.reinflect_with_optional_constraints(pattern, from, to, &[], surface_form)
    }

    /// Like [`reinflect`](Self::reinflect), preferring inflections that
    /// match the optional constraints, most significant first.
    pub fn reinflect_with_optional_constraints(
        &self,
        pattern: &InflectionPattern,
        from: u64,
        to: u64,
        optional: &[u64],
        surface_form: &str,
    ) -> Option<String> {
        // An unconstrained request, or one the form already satisfies.
        if to == 0 || contains_all(from, to) {
            return Some(surface_form.to_owned());
        }

        let mut stripped_len = 0usize;
        let mut best_score = ReinflectScore::NONE;
        let mut best_suffix: Option<String> = None;

        for inflection in self.inflections(pattern) {
            let grammemes = inflection.grammemes;
            let suffix = self.suffix(&inflection);

            if (from == 0 || contains_all(from, grammemes))
                && suffix.len() > stripped_len
                && surface_form.ends_with(suffix.as_str())
            {
                stripped_len = suffix.len();
            }

            if contains_all(grammemes, to) {
                let score = ReinflectScore {
                    optional_constraints: attribute_score(grammemes, optional),
                    grammemes_matched: (grammemes & from).count_ones().into(),
                    grammemes_unmatched_negative: i64::from(to.count_ones())
                        - i64::from(grammemes.count_ones()),
                };
                tracing::trace!(
                    suffix = %suffix,
                    grammemes = ?self.store.property_names(grammemes),
                    matched = score.grammemes_matched,
                    optional = score.optional_constraints,
                    "reinflect candidate"
                );
                if score > best_score {
                    best_score = score;
                    best_suffix = Some(suffix);
                }
            }
        }

        let suffix = best_suffix?;
        let stem = &surface_form[..surface_form.len() - stripped_len];
        Some(stem.to_owned() + &suffix)
    }
}

impl std::fmt::Debug for InflectionPatternEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InflectionPatternEngine")
            .field("patterns", &self.len())
            .field("suffixes", &self.layout.suffixes.len())
            .finish()
    }
}

/// Inflection section assembled by the builder.
pub(crate) struct InflectionSection {
    pub grammeme_sets: Vec<u64>,
    pub suffixes: BuiltStringTable,
    pub pattern_names: BuiltStringTable,
    pub patterns: Vec<PatternRecord>,
    pub lemma_suffixes: Vec<u32>,
    pub inflections: Vec<InflectionRecord>,
    pub suffix_index: BuiltStringTable,
    pub suffix_runs: Vec<SuffixRun>,
    pub suffix_patterns: Vec<u32>,
}

impl InflectionSection {
    pub(crate) fn write<W: Write + ?Sized>(&self, w: &mut W) -> std::io::Result<()> {
        format::write_version(w, INFLECTION_SECTION_VERSION)?;
        write_array(w, &self.grammeme_sets)?;
        self.suffixes.write(w)?;
        self.pattern_names.write(w)?;
        write_array(w, &self.patterns)?;
        write_array(w, &self.lemma_suffixes)?;
        write_array(w, &self.inflections)?;
        self.suffix_index.write(w)?;
        write_array(w, &self.suffix_runs)?;
        write_array(w, &self.suffix_patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{DictionaryBuilder, PatternSource, WordSource};

    fn english() -> DictionaryStore {
        DictionaryBuilder::new("en")
            .pattern(
                PatternSource::new("regular-noun")
                    .frequency(100)
                    .part_of_speech("noun")
                    .lemma_suffixes([""])
                    .inflection("", ["singular"])
                    .inflection("s", ["plural"]),
            )
            .pattern(
                PatternSource::new("f-to-ves")
                    .frequency(5)
                    .part_of_speech("noun")
                    .lemma_suffixes(["ves", "f"])
                    .inflection("f", ["singular"])
                    .inflection("ves", ["plural"])
                    .inflection("fe", ["singular", "archaic"]),
            )
            .pattern(
                PatternSource::new("adjective")
                    .frequency(40)
                    .part_of_speech("adjective")
                    .lemma_suffixes(["e"])
                    .inflection("e", ["masculine", "singular"])
                    .inflection("e", ["feminine", "singular"])
                    .inflection("es", ["masculine", "plural"])
                    .inflection("es", ["feminine", "plural"]),
            )
            .word(
                WordSource::new("cat")
                    .grammemes(["noun", "singular"])
                    .patterns(["regular-noun"]),
            )
            .word(
                WordSource::new("wolf")
                    .grammemes(["noun", "singular"])
                    .patterns(["f-to-ves", "regular-noun"]),
            )
            .build()
            .and_then(DictionaryStore::from_bytes)
            .unwrap()
    }

    fn inflection_with_suffix(
        engine: &InflectionPatternEngine<'_>,
        pattern: &InflectionPattern,
        suffix: &str,
    ) -> Inflection {
        engine
            .inflections(pattern)
            .into_iter()
            .find(|i| engine.suffix(i) == suffix)
            .unwrap()
    }

    #[test]
    fn inflect_and_lemmatize_are_inverse() {
        let store = english();
        let engine = store.inflector().unwrap();
        let pattern = engine.pattern_by_name("regular-noun").unwrap();
        let plural = inflection_with_suffix(&engine, &pattern, "s");
        assert_eq!(engine.inflect(&plural, "cat"), "cats");
        assert_eq!(engine.lemmatize(&plural, "cats"), "cat");
        // Not ending in the inflection's suffix: unchanged.
        assert_eq!(engine.lemmatize(&plural, "sheep"), "sheep");
    }

    #[test]
    fn pattern_without_lemma_suffixes() {
        let store = DictionaryBuilder::new("en")
            .pattern(PatternSource::new("plain-s").inflection("s", ["plural"]))
            .word(WordSource::new("cat").patterns(["plain-s"]))
            .build()
            .and_then(DictionaryStore::from_bytes)
            .unwrap();
        let engine = store.inflector().unwrap();
        let pattern = engine.pattern_by_name("plain-s").unwrap();
        assert_eq!(pattern.lemma_suffix_count(), 0);
        let plural = inflection_with_suffix(&engine, &pattern, "s");
        assert_eq!(engine.inflect(&plural, "cat"), "cats");
        assert_eq!(engine.lemmatize(&plural, "cats"), "cats");
        assert!(engine.patterns_by_suffix("").is_empty());
    }

    #[test]
    fn attribute_score_saturates() {
        assert_eq!(attribute_score(0b10, &[0b01, 0b10]), 0b01);
        assert_eq!(attribute_score(0b11, &[0b01, 0b10]), 0b11);
        let many = vec![1u64; 70];
        assert_eq!(attribute_score(1, &many), i64::MAX);
        assert_eq!(attribute_score(0, &many), 0);
    }

    #[test]
    fn reinflect_with_many_optional_constraints() {
        let store = english();
        let engine = store.inflector().unwrap();
        let pattern = engine.pattern_by_name("regular-noun").unwrap();
        let singular = store.value_of_type("singular").unwrap();
        let plural = store.value_of_type("plural").unwrap();
        let optional = vec![plural; 100];
        assert_eq!(
            engine
                .reinflect_with_optional_constraints(&pattern, singular, plural, &optional, "cat")
                .as_deref(),
            Some("cats")
        );
    }

    #[test]
    fn shortest_suffix_counts_utf16_units() {
        let store = DictionaryBuilder::new("xx")
            .pattern(
                PatternSource::new("astral")
                    .lemma_suffixes(["x"])
                    .inflection("ab", ["plural"])
                    .inflection("\u{1D51E}", ["plural"]),
            )
            .word(WordSource::new("x").patterns(["astral"]))
            .build()
            .and_then(DictionaryStore::from_bytes)
            .unwrap();
        let engine = store.inflector().unwrap();
        let pattern = engine.pattern_by_name("astral").unwrap();
        let candidates = engine.inflections(&pattern);
        // Both suffixes are two UTF-16 units long, so the first one wins.
        let chosen = engine.matching_lemma_inflection(&pattern, &candidates).unwrap();
        assert_eq!(engine.suffix(&chosen), "ab");
        let reversed: Vec<Inflection> = candidates.iter().rev().copied().collect();
        let chosen = engine.matching_lemma_inflection(&pattern, &reversed).unwrap();
        assert_eq!(engine.suffix(&chosen), "\u{1D51E}");
    }

    #[test]
    fn first_declared_lemma_suffix_wins() {
        let store = english();
        let engine = store.inflector().unwrap();
        let pattern = engine.pattern_by_name("f-to-ves").unwrap();
        assert_eq!(engine.lemma_suffixes(&pattern), vec!["ves", "f"]);
        let archaic = inflection_with_suffix(&engine, &pattern, "fe");
        assert_eq!(engine.inflect(&archaic, "wolves"), "wolfe");
        assert_eq!(engine.inflect(&archaic, "wolf"), "wolfe");
        // No lemma suffix matches: append to the whole lemma.
        assert_eq!(engine.inflect(&archaic, "ox"), "oxfe");
        let plural = inflection_with_suffix(&engine, &pattern, "ves");
        assert_eq!(engine.lemmatize(&plural, "wolves"), "wolves");
    }

    #[test]
    fn pattern_lookup() {
        let store = english();
        let engine = store.inflector().unwrap();
        assert_eq!(engine.len(), 3);
        assert!(engine.pattern_by_name("strong-verb").is_none());
        let pattern = engine.pattern_by_name("f-to-ves").unwrap();
        assert_eq!(engine.pattern_name(&pattern), "f-to-ves");
        assert_eq!(engine.frequency(&pattern), 5);
        assert_eq!(engine.pattern(pattern.id()).unwrap(), pattern);
        assert!(matches!(
            engine.pattern(99),
            Err(StoreError::IllegalState(_))
        ));
        assert!(engine.contains_part_of_speech(&pattern, "noun"));
        assert!(!engine.contains_part_of_speech(&pattern, "adjective"));
        assert!(!engine.contains_part_of_speech(&pattern, "no-such-grammeme"));
        let noun = store.value_of_type("noun").unwrap();
        let adjective = store.value_of_type("adjective").unwrap();
        assert_eq!(
            engine.first_containing_part_of_speech(&pattern, &[adjective, noun]),
            Some(1)
        );
        assert_eq!(engine.patterns().count(), 3);
        // The iterator borrows the store, not the engine value.
        let all = {
            let engine = store.inflector().unwrap();
            engine.patterns()
        };
        assert_eq!(all.map(|p| p.id()).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn patterns_for_word() {
        let store = english();
        let engine = store.inflector().unwrap();
        let names: Vec<String> = engine
            .patterns_for_word("wolf")
            .unwrap()
            .iter()
            .map(|p| engine.pattern_name(p))
            .collect();
        assert_eq!(names, vec!["f-to-ves", "regular-noun"]);
        assert_eq!(engine.patterns_for_word("Cat").unwrap().len(), 1);
        assert!(engine.patterns_for_word("unicorn").unwrap().is_empty());
    }

    #[test]
    fn patterns_by_lemma_suffix() {
        let store = english();
        let engine = store.inflector().unwrap();
        let names: Vec<String> = engine
            .patterns_by_suffix("f")
            .iter()
            .map(|p| engine.pattern_name(p))
            .collect();
        assert_eq!(names, vec!["f-to-ves"]);
        assert_eq!(engine.patterns_by_suffix("e").len(), 1);
        assert!(engine.patterns_by_suffix("xyz").is_empty());
    }

    #[test]
    fn constrain_and_contains_suffix() {
        let store = english();
        let engine = store.inflector().unwrap();
        let pattern = engine.pattern_by_name("adjective").unwrap();
        let plural = store.value_of_type("plural").unwrap();
        let feminine = store.value_of_type("feminine").unwrap();

        let carrying_plural = engine.constrain(&pattern, plural, false);
        assert_eq!(carrying_plural.len(), 2);
        let within = engine.constrain(&pattern, plural | feminine, true);
        assert_eq!(within.len(), 1);
        assert_eq!(engine.suffix(&within[0]), "es");

        assert!(engine.contains_suffix(&pattern, "es"));
        assert!(!engine.contains_suffix(&pattern, "s"));
        assert!(!engine.contains_suffix(&pattern, "unknown-suffix"));
        assert_eq!(engine.lemma_suffix_matches(&pattern).len(), 2);
    }

    #[test]
    fn surface_form_prefers_longest_suffix() {
        let store = english();
        let engine = store.inflector().unwrap();
        let pattern = engine.pattern_by_name("adjective").unwrap();
        let matches = engine.inflections_for_surface_form(&pattern, "grandes", u64::MAX);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|i| engine.suffix(i) == "es"));

        let fem_sg = store.binary_properties(&["feminine", "singular"]).unwrap();
        let matches = engine.inflections_for_surface_form(&pattern, "grande", fem_sg);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].grammemes(), fem_sg);
        assert!(engine.inflections_for_surface_form(&pattern, "grandes", fem_sg).is_empty());
    }

    #[test]
    fn select_lemma_inflection_by_score() {
        let store = english();
        let engine = store.inflector().unwrap();
        let pattern = engine.pattern_by_name("adjective").unwrap();
        let singular = store.value_of_type("singular").unwrap();
        let masculine = store.value_of_type("masculine").unwrap();
        let feminine = store.value_of_type("feminine").unwrap();

        let lemma = engine
            .select_lemma_inflection(&pattern, feminine, &[singular, masculine])
            .unwrap();
        assert_eq!(lemma.grammemes(), masculine | singular);

        // Attribute scores tie: grammemes shared with `from` decide.
        let lemma = engine
            .select_lemma_inflection(&pattern, feminine, &[singular])
            .unwrap();
        assert_eq!(lemma.grammemes(), feminine | singular);
    }

    #[test]
    fn reinflect() {
        let store = english();
        let engine = store.inflector().unwrap();
        let pattern = engine.pattern_by_name("adjective").unwrap();
        let fem_sg = store.binary_properties(&["feminine", "singular"]).unwrap();
        let plural = store.value_of_type("plural").unwrap();
        let masculine = store.value_of_type("masculine").unwrap();

        assert_eq!(
            engine.reinflect(&pattern, fem_sg, plural, "grande").as_deref(),
            Some("grandes")
        );
        // Already satisfied or unconstrained: unchanged.
        assert_eq!(engine.reinflect(&pattern, fem_sg, 0, "grande").as_deref(), Some("grande"));
        let singular = store.value_of_type("singular").unwrap();
        assert_eq!(
            engine.reinflect(&pattern, fem_sg, singular, "grande").as_deref(),
            Some("grande")
        );
        // Optional constraints steer between equally good candidates.
        let feminine = store.value_of_type("feminine").unwrap();
        let to_masc = engine.reinflect_with_optional_constraints(
            &pattern,
            feminine | plural,
            masculine,
            &[singular],
            "grandes",
        );
        assert_eq!(to_masc.as_deref(), Some("grande"));

        // No inflection carries "archaic".
        let archaic = store.value_of_type("archaic").unwrap();
        assert_eq!(engine.reinflect(&pattern, fem_sg, archaic, "grande"), None);
    }
}
