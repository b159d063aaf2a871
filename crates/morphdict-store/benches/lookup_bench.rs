// Criterion benchmarks for morphdict-store.
//
// Builds a synthetic dictionary of 10 000 words in a temporary directory,
// maps it, and measures the hot lookup paths.
//
// Run:
//   cargo bench -p morphdict-store

use criterion::{Criterion, criterion_group, criterion_main};
use morphdict_store::builder::{PatternSource, WordSource};
use morphdict_store::{DictionaryBuilder, DictionaryStore};

const WORD_COUNT: usize = 10_000;

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

fn words() -> Vec<String> {
    const STEMS: [&str; 8] = ["kat", "hund", "huis", "boom", "vogel", "stad", "weg", "tuin"];
    (0..WORD_COUNT)
        .map(|i| format!("{}{i}", STEMS[i % STEMS.len()]))
        .collect()
}

fn fixture(dir: &tempfile::TempDir) -> DictionaryStore {
    let builder = DictionaryBuilder::new("nl").pattern(
        PatternSource::new("en-plural")
            .part_of_speech("noun")
            .lemma_suffixes([""])
            .inflection("", ["singular"])
            .inflection("en", ["plural"]),
    );
    let builder = words().iter().enumerate().fold(builder, |b, (i, w)| {
        let number = if i % 2 == 0 { "singular" } else { "plural" };
        b.word(
            WordSource::new(w.as_str())
                .grammemes(["noun", number])
                .patterns(["en-plural"]),
        )
    });
    let path = dir.path().join("mmappable_nl.sdict");
    builder.write_file(&path).expect("write dictionary");
    DictionaryStore::load(&path).expect("load dictionary")
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Grammeme mask of 1000 known words, exact and case-folded.
fn bench_combined_binary_type(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let store = fixture(&dir);
    let sample: Vec<String> = words().into_iter().step_by(10).collect();
    let capitalized: Vec<String> = sample
        .iter()
        .map(|w| w[..1].to_uppercase() + &w[1..])
        .collect();

    c.bench_function("combined_binary_type_1000", |b| {
        b.iter(|| {
            for word in &sample {
                std::hint::black_box(store.combined_binary_type(word));
            }
        });
    });

    c.bench_function("combined_binary_type_lowercase_retry_1000", |b| {
        b.iter(|| {
            for word in &capitalized {
                std::hint::black_box(store.combined_binary_type(word));
            }
        });
    });
}

/// String to identifier and back through the word table.
fn bench_identifiers(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let store = fixture(&dir);
    let table = store.words();
    let sample: Vec<String> = words().into_iter().step_by(10).collect();

    c.bench_function("identifier_1000", |b| {
        b.iter(|| {
            for word in &sample {
                std::hint::black_box(table.identifier_if_available(word));
            }
        });
    });

    c.bench_function("get_string_1000", |b| {
        b.iter(|| {
            for id in (0..table.len() as u32).step_by(10) {
                std::hint::black_box(table.get_string(id));
            }
        });
    });
}

/// Pattern lookup plus reinflection to the plural.
fn bench_reinflect(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let store = fixture(&dir);
    let singular = store.value_of_type("singular").expect("singular");
    let plural = store.value_of_type("plural").expect("plural");
    let sample: Vec<String> = words().into_iter().step_by(20).collect();

    c.bench_function("reinflect_500", |b| {
        b.iter(|| {
            let engine = store.inflector().expect("inflector");
            for word in &sample {
                let patterns = engine.patterns_for_word(word).expect("patterns");
                if let Some(pattern) = patterns.first() {
                    std::hint::black_box(engine.reinflect(pattern, singular, plural, word));
                }
            }
        });
    });
}

/// Full iteration over the word table.
fn bench_known_words(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let store = fixture(&dir);

    c.bench_function("known_words_10000", |b| {
        b.iter(|| std::hint::black_box(store.known_words().count()));
    });
}

criterion_group!(
    benches,
    bench_combined_binary_type,
    bench_identifiers,
    bench_reinflect,
    bench_known_words
);
criterion_main!(benches);
