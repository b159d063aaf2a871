// Per-language dictionary cache.
//
// Dictionaries are resolved under a list of resource roots as
// `<root>/dictionary/<prefix>_<language>.<extension>`, loaded on first use,
// and shared as `Arc<DictionaryStore>` until evicted.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, OnceLock};

use hashbrown::HashMap;
use morphdict_core::locale;
use parking_lot::{Mutex, RwLock};

use crate::dictionary::DictionaryStore;
use crate::{Result, StoreError};

/// Environment variable holding resource roots, separated like `PATH`.
pub const RESOURCE_PATH_ENV: &str = "MORPHDICT_RESOURCE_PATH";

/// Directory under each root that holds dictionary files.
pub const DICTIONARY_SUBDIR: &str = "dictionary";

/// Where and how dictionary files are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Resource roots, searched in order.
    pub roots: Vec<PathBuf>,
    pub file_prefix: String,
    pub extension: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            file_prefix: "mmappable".to_string(),
            extension: "sdict".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Search order:
    /// 1. Each entry of `MORPHDICT_RESOURCE_PATH`
    /// 2. `~/.morphdict`
    /// 3. `/usr/local/share/morphdict`, `/usr/share/morphdict`
    pub fn from_env() -> Self {
        let mut roots = Vec::new();
        if let Some(paths) = std::env::var_os(RESOURCE_PATH_ENV) {
            roots.extend(std::env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
        }
        if let Some(home) = std::env::var_os("HOME") {
            roots.push(PathBuf::from(home).join(".morphdict"));
        }
        roots.push(PathBuf::from("/usr/local/share/morphdict"));
        roots.push(PathBuf::from("/usr/share/morphdict"));
        Self {
            roots,
            ..Self::default()
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// File name of the dictionary for `language`.
    pub fn file_name(&self, language: &str) -> String {
        format!("{}_{language}.{}", self.file_prefix, self.extension)
    }

    fn candidates(&self, language: &str) -> impl Iterator<Item = PathBuf> + '_ {
        let file_name = self.file_name(language);
        self.roots
            .iter()
            .map(move |root| root.join(DICTIONARY_SUBDIR).join(&file_name))
    }
}

/// Cache entry of one language. `loading` serializes loads of that language
/// only; a loaded store is read without locking.
#[derive(Default)]
struct Slot {
    store: OnceLock<Arc<DictionaryStore>>,
    loading: Mutex<()>,
}

/// Map from language to loaded dictionary.
///
/// Each language is loaded at most once: concurrent callers for the same
/// language wait for the first load and then share its store. Loading one
/// language never blocks callers asking for another. Failed loads are not
/// cached and are retried on the next request.
pub struct DictionaryRegistry {
    config: RwLock<RegistryConfig>,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

static GLOBAL: LazyLock<DictionaryRegistry> =
    LazyLock::new(|| DictionaryRegistry::new(RegistryConfig::from_env()));

impl DictionaryRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config: RwLock::new(config),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide registry, configured from the environment.
    pub fn global() -> &'static DictionaryRegistry {
        &GLOBAL
    }

    /// Append a resource root. Already cached dictionaries are kept.
    pub fn add_root(&self, root: impl Into<PathBuf>) {
        self.config.write().roots.push(root.into());
    }

    pub fn config(&self) -> RegistryConfig {
        self.config.read().clone()
    }

    /// Path of the dictionary serving `locale`, trying the locale's
    /// language and then its fallback language.
    pub fn resolve_path(&self, locale: &str) -> Result<PathBuf> {
        let language = locale::language_of(locale);
        let config = self.config.read();
        let mut searched = Vec::new();
        let languages =
            std::iter::once(language.as_str()).chain(locale::fallback_language(&language));
        for lang in languages {
            for candidate in config.candidates(lang) {
                if candidate.is_file() {
                    return Ok(candidate);
                }
                searched.push(candidate);
            }
        }
        Err(StoreError::MissingResource { language, searched })
    }

    fn slot(&self, language: &str) -> Arc<Slot> {
        let mut slots = self.slots.lock();
        match slots.get(language) {
            Some(slot) => Arc::clone(slot),
            None => {
                let slot = Arc::new(Slot::default());
                slots.insert(language.to_owned(), Arc::clone(&slot));
                slot
            }
        }
    }

    /// The dictionary serving `locale`, loading it on first use.
    pub fn dictionary(&self, locale: &str) -> Result<Arc<DictionaryStore>> {
        let language = locale::language_of(locale);
        let slot = self.slot(&language);
        if let Some(store) = slot.store.get() {
            tracing::trace!(language = %language, "dictionary cache hit");
            return Ok(Arc::clone(store));
        }

        let _loading = slot.loading.lock();
        if let Some(store) = slot.store.get() {
            tracing::trace!(language = %language, "dictionary loaded by another caller");
            return Ok(Arc::clone(store));
        }
        match self.resolve_path(&language).and_then(|path| {
            DictionaryStore::load(&path).map(|store| (path, store))
        }) {
            Ok((path, store)) => {
                let store = Arc::clone(slot.store.get_or_init(|| Arc::new(store)));
                tracing::debug!(language = %language, path = %path.display(), "dictionary cached");
                Ok(store)
            }
            Err(e) => {
                // The slot stays empty, so the next caller retries.
                tracing::warn!(language = %language, error = %e, "failed to load dictionary");
                Err(e)
            }
        }
    }

    /// Drop the cached dictionary of `locale`'s language. Stores still held
    /// by callers stay valid.
    pub fn evict(&self, locale: &str) -> Option<Arc<DictionaryStore>> {
        let language = locale::language_of(locale);
        let evicted = self
            .slots
            .lock()
            .remove(&language)
            .and_then(|slot| slot.store.get().cloned());
        if evicted.is_some() {
            tracing::debug!(language = %language, "dictionary evicted");
        }
        evicted
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    /// Languages currently cached, sorted. Languages still loading are
    /// not included.
    pub fn cached_languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self
            .slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.store.get().is_some())
            .map(|(language, _)| language.clone())
            .collect();
        languages.sort_unstable();
        languages
    }

    /// `true` when a dictionary file for `locale` can be found.
    pub fn is_available(&self, locale: &str) -> bool {
        self.resolve_path(locale).is_ok()
    }
}

impl std::fmt::Debug for DictionaryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryRegistry")
            .field("roots", &self.config.read().roots)
            .field("cached", &self.cached_languages())
            .finish()
    }
}

/// Path of the dictionary for `language` under a single `root`.
pub fn dictionary_path(root: &Path, config: &RegistryConfig, language: &str) -> PathBuf {
    root.join(DICTIONARY_SUBDIR).join(config.file_name(language))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::builder::{DictionaryBuilder, WordSource};
    use tempfile::TempDir;

    fn install(root: &Path, language: &str, word: &str) {
        let path = dictionary_path(root, &RegistryConfig::default(), language);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        DictionaryBuilder::new(language)
            .word(WordSource::new(word).grammemes(["noun"]))
            .write_file(&path)
            .unwrap();
    }

    #[test]
    fn file_naming() {
        let config = RegistryConfig::default();
        assert_eq!(config.file_name("en"), "mmappable_en.sdict");
        assert_eq!(
            dictionary_path(Path::new("/res"), &config, "sv"),
            PathBuf::from("/res/dictionary/mmappable_sv.sdict")
        );
    }

    #[test]
    fn loads_once_and_shares() {
        let dir = TempDir::new().unwrap();
        install(dir.path(), "en", "cat");
        let registry = DictionaryRegistry::new(RegistryConfig::default().with_root(dir.path()));

        let a = registry.dictionary("en_US").unwrap();
        let b = registry.dictionary("en-GB").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_mapped());
        assert!(a.is_known_word("cat"));
        assert_eq!(registry.cached_languages(), vec!["en"]);

        assert!(registry.evict("en").is_some());
        assert!(registry.cached_languages().is_empty());
        let c = registry.dictionary("en").unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        // The evicted store is still usable.
        assert!(a.is_known_word("cat"));
    }

    #[test]
    fn fallback_language() {
        let dir = TempDir::new().unwrap();
        install(dir.path(), "zh", "\u{732B}");
        let registry = DictionaryRegistry::new(RegistryConfig::default().with_root(dir.path()));
        let store = registry.dictionary("yue-HK").unwrap();
        assert_eq!(store.language(), "zh");
        assert_eq!(registry.cached_languages(), vec!["yue"]);
    }

    #[test]
    fn missing_dictionary() {
        let dir = TempDir::new().unwrap();
        let registry = DictionaryRegistry::new(RegistryConfig::default().with_root(dir.path()));
        let err = registry.dictionary("fi").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        match err {
            StoreError::MissingResource { language, searched } => {
                assert_eq!(language, "fi");
                assert_eq!(searched.len(), 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!registry.is_available("fi"));
        assert!(registry.cached_languages().is_empty());
    }

    #[test]
    fn roots_searched_in_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        install(second.path(), "de", "hund");
        let registry = DictionaryRegistry::new(RegistryConfig::default().with_root(first.path()));
        assert!(registry.dictionary("de").is_err());

        registry.add_root(second.path());
        let path = registry.resolve_path("de").unwrap();
        assert!(path.starts_with(second.path()));
        assert!(registry.dictionary("de").unwrap().is_known_word("hund"));

        install(first.path(), "de", "katze");
        registry.clear();
        assert!(registry.dictionary("de").unwrap().is_known_word("katze"));
    }

    #[test]
    fn loading_one_language_does_not_block_others() {
        let dir = TempDir::new().unwrap();
        install(dir.path(), "en", "cat");
        install(dir.path(), "de", "hund");
        let registry = DictionaryRegistry::new(RegistryConfig::default().with_root(dir.path()));
        registry.dictionary("en").unwrap();

        // Hold the load lock of "de" as a slow load would.
        let slot = registry.slot("de");
        let loading = slot.loading.lock();
        std::thread::scope(|s| {
            let waiter = s.spawn(|| registry.dictionary("de").unwrap());
            assert!(registry.dictionary("en").unwrap().is_known_word("cat"));
            assert_eq!(registry.cached_languages(), vec!["en"]);
            drop(loading);
            assert!(waiter.join().unwrap().is_known_word("hund"));
        });
        assert_eq!(registry.cached_languages(), vec!["de", "en"]);
        assert!(Arc::ptr_eq(
            &registry.dictionary("de").unwrap(),
            &registry.evict("de").unwrap()
        ));
    }

    #[test]
    fn failed_load_not_cached() {
        let dir = TempDir::new().unwrap();
        let path = dictionary_path(dir.path(), &RegistryConfig::default(), "nl");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not a dictionary at all").unwrap();
        let registry = DictionaryRegistry::new(RegistryConfig::default().with_root(dir.path()));
        let err = registry.dictionary("nl").unwrap_err();
        assert!(matches!(err, StoreError::InvalidMagic));

        install(dir.path(), "nl", "kat");
        assert!(registry.dictionary("nl").unwrap().is_known_word("kat"));
    }
}
