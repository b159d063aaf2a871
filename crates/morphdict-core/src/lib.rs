//! Shared types for the morphdict dictionary engine.
//!
//! These modules carry no storage logic. Language modules depend on this
//! crate alone and receive a [`lookup::WordPropertyLookup`] implementation
//! (usually a `morphdict_store::DictionaryStore`) at construction time.
//!
//! - [`grammeme`] -- grammeme bitmask helpers
//! - [`case`] -- lookup normalization for case-folded retries
//! - [`locale`] -- language subtag extraction and fallbacks
//! - [`lookup`] -- the word property capability trait

pub mod case;
pub mod grammeme;
pub mod locale;
pub mod lookup;

pub use lookup::WordPropertyLookup;
