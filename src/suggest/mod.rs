mod index;

pub use index::{FieldIndex, FieldKey, IndexEntry, Suggestion};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;

use crate::normalize::Normalizer;
use crate::source::CorpusSource;

/// Suggester limits, fixed at construction. Out-of-range values are
/// clamped rather than rejected so construction never fails.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestConfig {
    /// Trimmed prefixes shorter than this never return results.
    pub min_prefix_length: usize,

    /// Hard ceiling on distinct entries retained per field index and on
    /// any returned result size.
    pub max_unique_candidates: usize,

    /// Result cap applied when a query does not request its own limit.
    pub default_suggestion_limit: usize,
}

impl SuggestConfig {
    pub fn new(
        min_prefix_length: usize,
        max_unique_candidates: usize,
        default_suggestion_limit: usize,
    ) -> Self {
        Self {
            min_prefix_length,
            max_unique_candidates: max_unique_candidates.max(1),
            default_suggestion_limit: default_suggestion_limit.max(1),
        }
    }
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            min_prefix_length: 2,
            max_unique_candidates: 600,
            default_suggestion_limit: 8,
        }
    }
}

/// State of one field's slot in the store.
enum Slot {
    /// An installed index, possibly empty. Shared read-only.
    Ready(Arc<FieldIndex>),

    /// A build is in flight. `done` flips when the build task finishes,
    /// whether or not it installed anything. The id lets invalidation
    /// discard the pending installation.
    Building { id: u64, done: watch::Receiver<bool> },
}

/// Loaded-state counters served by the stats API.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestStats {
    pub loaded_indexes: usize,
    pub indexed_entries: usize,
}

/// Per-field autosuggest service: a key → index map with load-once
/// semantics, explicit invalidation and synchronous prefix queries.
///
/// Index installation for a key is serialized (at most one build per key
/// per load cycle) while queries and loads of unrelated keys proceed
/// without blocking one another. Builds run on detached tasks, so a
/// caller abandoning `ensure_loaded` never cancels a build that other
/// callers are waiting on.
pub struct Suggester {
    cfg: SuggestConfig,
    source: Arc<dyn CorpusSource>,
    normalizer: Arc<dyn Normalizer>,
    slots: Arc<Mutex<HashMap<FieldKey, Slot>>>,
    build_seq: AtomicU64,
}

impl Suggester {
    pub fn new(
        cfg: SuggestConfig,
        source: Arc<dyn CorpusSource>,
        normalizer: Arc<dyn Normalizer>,
    ) -> Self {
        Self {
            cfg,
            source,
            normalizer,
            slots: Arc::new(Mutex::new(HashMap::new())),
            build_seq: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SuggestConfig {
        &self.cfg
    }

    /// Whether an index (possibly empty) is currently installed for key.
    pub fn is_loaded(&self, key: &FieldKey) -> bool {
        matches!(self.slots.lock().get(key), Some(Slot::Ready(_)))
    }

    /// Ensure the index for a key is loaded, fetching and building it if
    /// needed. Idempotent: an installed index is left untouched, and
    /// concurrent callers for the same key share a single build.
    ///
    /// A corpus fetch failure installs an empty index instead of leaving
    /// the key unloaded, so queries degrade to "no suggestions" rather
    /// than re-fetching on every keystroke.
    pub async fn ensure_loaded(&self, key: &FieldKey) {
        loop {
            let (build_id, mut done) = {
                let mut slots = self.slots.lock();
                match slots.get(key) {
                    Some(Slot::Ready(_)) => return,
                    Some(Slot::Building { id, done }) => (*id, done.clone()),
                    None => {
                        let id = self.build_seq.fetch_add(1, Ordering::Relaxed);
                        let (tx, done) = watch::channel(false);
                        slots.insert(
                            key.clone(),
                            Slot::Building {
                                id,
                                done: done.clone(),
                            },
                        );

                        tokio::spawn(build_task(
                            Arc::clone(&self.slots),
                            Arc::clone(&self.source),
                            Arc::clone(&self.normalizer),
                            self.cfg.max_unique_candidates,
                            id,
                            key.clone(),
                            tx,
                        ));
                        (id, done)
                    }
                }
            };

            if done.changed().await.is_err() {
                // The build task went away without finishing (sender
                // dropped). Clear the stale slot so the next pass can
                // start a fresh build.
                let mut slots = self.slots.lock();
                if matches!(slots.get(key), Some(Slot::Building { id, .. }) if *id == build_id) {
                    slots.remove(key);
                }
            }
        }
    }

    /// Ranked suggestions for a prefix, from the already-loaded index.
    ///
    /// Synchronous and side-effect free: an unloaded key, an empty index
    /// or a too-short prefix all yield an empty list, never an error.
    /// Matching is folded-prefix containment; results keep the index's
    /// rank order, capped at min(limit or the default, the entry ceiling).
    pub fn suggestions(
        &self,
        key: &FieldKey,
        prefix: &str,
        limit: Option<usize>,
    ) -> Vec<Suggestion> {
        let prefix = prefix.trim();
        if prefix.chars().count() < self.cfg.min_prefix_length {
            return Vec::new();
        }

        let index = match self.slots.lock().get(key) {
            Some(Slot::Ready(ix)) => Arc::clone(ix),
            _ => return Vec::new(),
        };

        let folded = self.normalizer.fold(prefix);
        let limit = limit
            .unwrap_or(self.cfg.default_suggestion_limit)
            .min(self.cfg.max_unique_candidates);

        index
            .entries()
            .iter()
            .filter(|e| e.folded.starts_with(&folded))
            .take(limit)
            .map(|e| Suggestion {
                text: e.text.clone(),
                count: e.count,
            })
            .collect()
    }

    /// The single best suggestion for a prefix, used by completion
    /// overlays.
    pub fn top_suggestion(&self, key: &FieldKey, prefix: &str) -> Option<Suggestion> {
        self.suggestions(key, prefix, Some(1)).into_iter().next()
    }

    /// Drop the installed index for one key. The next `ensure_loaded`
    /// rebuilds it from the corpus. An in-flight build for the key is
    /// discarded at install time.
    pub fn invalidate(&self, key: &FieldKey) {
        self.slots.lock().remove(key);
    }

    /// Drop every installed index. Used on bulk corpus changes.
    pub fn invalidate_all(&self) {
        self.slots.lock().clear();
    }

    pub fn stats(&self) -> SuggestStats {
        let slots = self.slots.lock();
        let mut stats = SuggestStats {
            loaded_indexes: 0,
            indexed_entries: 0,
        };
        for slot in slots.values() {
            if let Slot::Ready(ix) = slot {
                stats.loaded_indexes += 1;
                stats.indexed_entries += ix.len();
            }
        }
        stats
    }
}

/// Fetch and build one field's index on a detached task, then install it
/// if the slot still belongs to this build. Runs to completion even when
/// every caller has gone away.
async fn build_task(
    slots: Arc<Mutex<HashMap<FieldKey, Slot>>>,
    source: Arc<dyn CorpusSource>,
    normalizer: Arc<dyn Normalizer>,
    max_entries: usize,
    build_id: u64,
    key: FieldKey,
    tx: watch::Sender<bool>,
) {
    let values = match source.fetch_raw_values(&key).await {
        Ok(v) => v,
        Err(e) => {
            log::warn!("corpus fetch failed for {}: {}", key, e);
            Vec::new()
        }
    };

    let index = Arc::new(FieldIndex::build(values, max_entries, normalizer.as_ref()));

    {
        let mut slots = slots.lock();
        match slots.get(&key) {
            // Still ours: install.
            Some(Slot::Building { id, .. }) if *id == build_id => {
                log::debug!("installed index for {} ({} entries)", key, index.len());
                slots.insert(key, Slot::Ready(index));
            }
            // Invalidated or superseded while building: discard.
            _ => {}
        }
    }

    let _ = tx.send(true);
}

/// Compute the hidden remainder an inline completion overlay should show
/// for the currently typed text against a suggestion.
///
/// Returns None when no overlay applies: empty typed text, typed text
/// ending in whitespace, or typed text whose folded form is not a proper
/// prefix of the suggestion's folded form. Otherwise the suffix of the
/// raw suggestion after the typed text's character length.
pub fn completion_suffix(
    typed: &str,
    suggestion: &str,
    normalizer: &dyn Normalizer,
) -> Option<String> {
    if typed.is_empty() || typed.ends_with(char::is_whitespace) {
        return None;
    }

    let typed_folded = normalizer.fold(typed);
    let full_folded = normalizer.fold(suggestion);
    if typed_folded.is_empty()
        || typed_folded == full_folded
        || !full_folded.starts_with(&typed_folded)
    {
        return None;
    }

    let shared = typed.chars().count();
    if suggestion.chars().count() <= shared {
        return None;
    }
    Some(suggestion.chars().skip(shared).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::normalize::DefaultNormalizer;
    use crate::source::{CorpusSource, SourceError};

    /// Scripted corpus source that counts fetches.
    struct MockSource {
        values: Vec<String>,
        calls: AtomicUsize,
        delay: Option<Duration>,
        fail: bool,
    }

    impl MockSource {
        fn new(values: &[&str]) -> Self {
            Self {
                values: values.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
                delay: None,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(&[])
            }
        }

        fn slow(values: &[&str], delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new(values)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CorpusSource for MockSource {
        async fn fetch_raw_values(&self, _key: &FieldKey) -> Result<Vec<String>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.fail {
                return Err(SourceError::Unavailable("storage offline".to_string()));
            }
            Ok(self.values.clone())
        }
    }

    fn suggester(source: Arc<MockSource>) -> Suggester {
        Suggester::new(
            SuggestConfig::default(),
            source,
            Arc::new(DefaultNormalizer),
        )
    }

    fn key() -> FieldKey {
        FieldKey::new("places", "city")
    }

    #[tokio::test]
    async fn test_load_once() {
        let source = Arc::new(MockSource::new(&["Berlin", "Hamburg"]));
        let s = suggester(Arc::clone(&source));
        let k = key();

        assert!(!s.is_loaded(&k));
        s.ensure_loaded(&k).await;
        assert!(s.is_loaded(&k));
        s.ensure_loaded(&k).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_ranked_prefix_query() {
        let source = Arc::new(MockSource::new(&["Berlin", "berlin", "Hamburg", "Berlin"]));
        let s = suggester(source);
        let k = key();
        s.ensure_loaded(&k).await;

        let out = s.suggestions(&k, "ber", None);
        assert_eq!(
            out,
            vec![
                Suggestion {
                    text: "Berlin".to_string(),
                    count: 2
                },
                Suggestion {
                    text: "berlin".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_short_prefix_returns_empty() {
        let source = Arc::new(MockSource::new(&["Hamburg"]));
        let s = suggester(source);
        let k = key();
        s.ensure_loaded(&k).await;

        assert!(s.suggestions(&k, "h", None).is_empty());
        assert!(s.suggestions(&k, "  h  ", None).is_empty());
        assert!(s.suggestions(&k, "", None).is_empty());
        // Length guard applies to the trimmed prefix.
        assert_eq!(s.suggestions(&k, "  ha ", None).len(), 1);
    }

    #[tokio::test]
    async fn test_unloaded_key_returns_empty() {
        let source = Arc::new(MockSource::new(&["Berlin"]));
        let s = suggester(source);
        assert!(s.suggestions(&key(), "ber", None).is_empty());
        assert!(s.top_suggestion(&key(), "ber").is_none());
    }

    #[tokio::test]
    async fn test_failed_fetch_installs_empty_index() {
        let source = Arc::new(MockSource::failing());
        let s = suggester(Arc::clone(&source));
        let k = key();

        s.ensure_loaded(&k).await;
        assert!(s.is_loaded(&k));
        assert!(s.suggestions(&k, "anything", None).is_empty());

        // The failure is cached as an empty index, not retried per call.
        s.ensure_loaded(&k).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_rebuild() {
        let source = Arc::new(MockSource::new(&["Berlin"]));
        let s = suggester(Arc::clone(&source));
        let k = key();

        s.ensure_loaded(&k).await;
        s.invalidate(&k);
        assert!(!s.is_loaded(&k));

        s.ensure_loaded(&k).await;
        assert!(s.is_loaded(&k));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let source = Arc::new(MockSource::new(&["Berlin"]));
        let s = suggester(source);
        let k1 = FieldKey::new("places", "city");
        let k2 = FieldKey::new("places", "country");

        s.ensure_loaded(&k1).await;
        s.ensure_loaded(&k2).await;
        s.invalidate_all();
        assert!(!s.is_loaded(&k1));
        assert!(!s.is_loaded(&k2));
    }

    #[tokio::test]
    async fn test_concurrent_loads_build_once() {
        let source = Arc::new(MockSource::slow(
            &["Berlin", "Hamburg"],
            Duration::from_millis(30),
        ));
        let s = Arc::new(suggester(Arc::clone(&source)));
        let k = key();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let s = Arc::clone(&s);
            let k = k.clone();
            tasks.push(tokio::spawn(async move {
                s.ensure_loaded(&k).await;
            }));
        }
        for t in tasks {
            t.await.expect("task panicked");
        }

        assert_eq!(source.calls(), 1);
        assert!(s.is_loaded(&k));
    }

    #[tokio::test]
    async fn test_invalidate_during_build_discards_result() {
        let source = Arc::new(MockSource::slow(&["Berlin"], Duration::from_millis(50)));
        let s = Arc::new(suggester(Arc::clone(&source)));
        let k = key();

        let loader = {
            let s = Arc::clone(&s);
            let k = k.clone();
            tokio::spawn(async move {
                s.ensure_loaded(&k).await;
            })
        };

        // Invalidate while the first build is still fetching: its result
        // must be discarded and the waiting caller rebuilds fresh.
        tokio::time::sleep(Duration::from_millis(10)).await;
        s.invalidate(&k);

        loader.await.expect("task panicked");
        assert!(s.is_loaded(&k));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_limits() {
        let values: Vec<String> = (0..20).map(|i| format!("item {:02}", i)).collect();
        let refs: Vec<&str> = values.iter().map(|s| s.as_str()).collect();
        let source = Arc::new(MockSource::new(&refs));
        let s = suggester(source);
        let k = key();
        s.ensure_loaded(&k).await;

        // Default limit.
        assert_eq!(s.suggestions(&k, "item", None).len(), 8);
        // Caller-requested limit.
        assert_eq!(s.suggestions(&k, "item", Some(3)).len(), 3);
        assert_eq!(s.suggestions(&k, "item", Some(0)).len(), 0);
        // Requests beyond the ceiling are capped by the entry count.
        assert_eq!(s.suggestions(&k, "item", Some(10_000)).len(), 20);
    }

    #[tokio::test]
    async fn test_diacritic_insensitive_match() {
        let source = Arc::new(MockSource::new(&["Café Royale", "Cafeteria", "Castle"]));
        let s = suggester(source);
        let k = key();
        s.ensure_loaded(&k).await;

        // Both entries have count 1; "cafeteria" sorts before "café
        // royale" in the case-insensitive tie-break ('e' < 'é').
        let out = s.suggestions(&k, "cafe", None);
        let texts: Vec<&str> = out.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Cafeteria", "Café Royale"]);

        // The folded query matches the folded entries either way around.
        assert_eq!(s.suggestions(&k, "café", None).len(), 2);
    }

    #[tokio::test]
    async fn test_top_suggestion() {
        let source = Arc::new(MockSource::new(&["Berlin", "Berlin", "Bergen"]));
        let s = suggester(source);
        let k = key();
        s.ensure_loaded(&k).await;

        let top = s.top_suggestion(&k, "ber").expect("no top suggestion");
        assert_eq!(top.text, "Berlin");
        assert_eq!(top.count, 2);
        assert!(s.top_suggestion(&k, "xy").is_none());
    }

    #[test]
    fn test_config_clamps() {
        let cfg = SuggestConfig::new(0, 0, 0);
        assert_eq!(cfg.min_prefix_length, 0);
        assert_eq!(cfg.max_unique_candidates, 1);
        assert_eq!(cfg.default_suggestion_limit, 1);
    }

    #[test]
    fn test_completion_suffix() {
        let n = DefaultNormalizer;

        assert_eq!(
            completion_suffix("Ber", "Berlin", &n),
            Some("lin".to_string())
        );
        // Folding bridges case and diacritics; the suffix is split on the
        // raw strings.
        assert_eq!(
            completion_suffix("cafe", "Café Royale", &n),
            Some(" Royale".to_string())
        );

        // Refusal cases: empty, trailing whitespace, exact match,
        // non-prefix.
        assert_eq!(completion_suffix("", "Berlin", &n), None);
        assert_eq!(completion_suffix("Ber ", "Berlin", &n), None);
        assert_eq!(completion_suffix("berlin", "Berlin", &n), None);
        assert_eq!(completion_suffix("Ham", "Berlin", &n), None);
    }
}
