//! Label vocabulary and sign metadata.
//!
//! The vocabulary file orders the classifier's output classes; the catalog
//! maps each class name to the text shown to the user. Both are loaded once
//! at startup and are read-only afterwards.

mod catalog;
mod vocabulary;

pub use catalog::{SignCatalog, SignRecord, BUILTIN_SIGN_COUNT};
pub use vocabulary::LabelVocabulary;

/// Load the vocabulary and check it against the catalog.
///
/// A vocabulary entry without metadata is a configuration error.
pub fn load_checked<P: AsRef<std::path::Path>>(
    path: P,
    catalog: &SignCatalog,
) -> anyhow::Result<LabelVocabulary> {
    let vocabulary = LabelVocabulary::load(path)?;
    catalog.validate_vocabulary(&vocabulary)?;
    Ok(vocabulary)
}
