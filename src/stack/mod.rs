//! Strongly-typed stack identifiers.
//!
//! Identifiers serialize to their canonical lowercase name. Names this crate does
//! not recognise deserialize into a `Custom(String)` variant rather than failing,
//! so caller-supplied pipeline contexts always decode.

#[macro_use]
pub mod id_enum_macro;

pub mod language_id;

pub use language_id::LanguageId;
