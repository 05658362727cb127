use async_trait::async_trait;

use crate::suggest::FieldKey;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Source of the raw corpus values recorded for a field.
///
/// The suggester treats every failure identically: the failed key gets an
/// empty index installed so queries degrade to "no suggestions" instead of
/// re-fetching on every keystroke.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    /// Fetch the current raw values recorded for a key. Multiplicity
    /// matters: repeated values drive the frequency ranking.
    async fn fetch_raw_values(&self, key: &FieldKey) -> Result<Vec<String>, SourceError>;
}
