use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use localrag_core::traits::Embedder;
use localrag_core::types::{BuildPolicy, Chunk, IndexEntry, Metadata};
use localrag_core::Error;
use localrag_embed::HashEmbedder;
use localrag_index::{BuildOutcome, IndexBuilder, IndexPaths, KnowledgeBase, MetadataStore, Retriever};
use tempfile::TempDir;

/// Maps a handful of words onto shared concept axes so related words embed
/// close together.
struct ConceptEmbedder;

impl ConceptEmbedder {
    fn axis(word: &str) -> Option<usize> {
        match word {
            "cat" | "cats" | "feline" => Some(0),
            "dog" | "dogs" | "canine" => Some(1),
            "mammal" | "mammals" => Some(2),
            "pet" | "pets" => Some(3),
            "rocket" | "rockets" | "fly" | "space" => Some(4),
            _ => None,
        }
    }
}

impl Embedder for ConceptEmbedder {
    fn dim(&self) -> usize { 5 }
    fn max_len(&self) -> usize { 512 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0; 5];
                for w in t.to_lowercase().split_whitespace() {
                    if let Some(i) = Self::axis(w) { v[i] += 1.0; }
                }
                v
            })
            .collect())
    }
}

struct CountingEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

impl Embedder for CountingEmbedder {
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn dim(&self) -> usize { 8 }
    fn max_len(&self) -> usize { 8 }
    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("model unavailable")
    }
}

fn chunk(text: &str, source: &str) -> Chunk {
    Chunk { text: text.to_string(), metadata: Metadata::new(source) }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk("alpha bravo charlie", "a.txt"),
        chunk("delta echo foxtrot", "a.txt"),
        chunk("golf hotel india", "b.txt"),
        chunk("juliet kilo lima", "b.txt"),
        chunk("mike november oscar", "c.txt"),
    ]
}

fn paths(tmp: &TempDir) -> IndexPaths {
    IndexPaths::new(tmp.path().join("text_search_index.bin"), tmp.path().join("index_metadata.json"))
}

fn hash_embedder() -> Arc<dyn Embedder> {
    Arc::new(HashEmbedder::new(64))
}

#[test]
fn build_then_open_covers_every_ordinal() {
    let tmp = TempDir::new().unwrap();
    let p = paths(&tmp);
    let outcome = IndexBuilder::new(hash_embedder(), p.clone()).build(corpus()).unwrap();
    assert_eq!(outcome, BuildOutcome::Built { chunks: 5 });

    let kb = KnowledgeBase::open(&p, true).unwrap();
    assert_eq!(kb.ntotal(), 5);
    assert_eq!(kb.metadata().ordinals().collect::<Vec<_>>(), (0..5).collect::<Vec<_>>());
    assert!(kb.consistency().is_consistent());
    assert_eq!(kb.metadata().get(2).unwrap().text, "golf hotel india");
}

#[test]
fn every_chunk_retrieves_itself_first() {
    let tmp = TempDir::new().unwrap();
    let p = paths(&tmp);
    let embedder = hash_embedder();
    IndexBuilder::new(embedder.clone(), p.clone()).build(corpus()).unwrap();
    let retriever = Retriever::new(embedder, Arc::new(KnowledgeBase::open(&p, true).unwrap()));

    for c in corpus() {
        let got = retriever.search_similar(&c.text, 1).unwrap();
        assert_eq!(got.dropped, 0);
        assert_eq!(got.results.len(), 1);
        assert_eq!(got.results[0].text, c.text);
        assert_eq!(got.results[0].source_file, c.metadata.source_file);
        assert!(got.results[0].distance < 1e-5);
    }
}

#[test]
fn related_concepts_rank_above_unrelated_ones() {
    let embedder: Arc<dyn Embedder> = Arc::new(ConceptEmbedder);
    let builder = IndexBuilder::new(embedder.clone(), IndexPaths::new("unused.bin", "unused.json"));
    let kb = builder
        .build_in_memory(vec![
            chunk("cats are mammals", "animals.txt"),
            chunk("dogs are mammals", "animals.txt"),
            chunk("rockets fly to space", "space.txt"),
        ])
        .unwrap();
    let retriever = Retriever::new(embedder, Arc::new(kb));

    let feline = retriever.search_similar("feline pets", 1).unwrap();
    assert_eq!(feline.results[0].text, "cats are mammals");

    let rockets = retriever.search_similar("rockets fly to space", 3).unwrap();
    assert_eq!(rockets.results[0].text, "rockets fly to space");
    for mammal in rockets.results.iter().filter(|r| r.text.contains("mammals")) {
        assert!(feline.results[0].distance < mammal.distance);
    }
}

#[test]
fn k_beyond_corpus_returns_everything_once() {
    let tmp = TempDir::new().unwrap();
    let p = paths(&tmp);
    let embedder = hash_embedder();
    IndexBuilder::new(embedder.clone(), p.clone()).build(corpus()).unwrap();
    let retriever = Retriever::new(embedder, Arc::new(KnowledgeBase::open(&p, false).unwrap()));

    let got = retriever.search_similar("alpha", 50).unwrap();
    assert_eq!(got.results.len(), 5);
    assert!(got.results.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn empty_corpus_builds_an_empty_index() {
    let tmp = TempDir::new().unwrap();
    let p = paths(&tmp);
    let embedder = Arc::new(CountingEmbedder { inner: HashEmbedder::new(16), calls: AtomicUsize::new(0) });
    let outcome = IndexBuilder::new(embedder.clone(), p.clone()).build(Vec::new()).unwrap();
    assert_eq!(outcome, BuildOutcome::Built { chunks: 0 });
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);

    let kb = KnowledgeBase::open(&p, true).unwrap();
    assert_eq!(kb.ntotal(), 0);
    let retriever = Retriever::new(embedder, Arc::new(kb));
    assert!(retriever.search_similar("anything", 3).unwrap().results.is_empty());
    assert_eq!(std::fs::read_to_string(&p.metadata).unwrap(), "{}");
}

#[test]
fn build_embeds_the_corpus_in_one_batch() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(CountingEmbedder { inner: HashEmbedder::new(16), calls: AtomicUsize::new(0) });
    IndexBuilder::new(embedder.clone(), paths(&tmp)).build(corpus()).unwrap();
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn metadata_file_uses_string_ordinals_and_four_space_indent() {
    let tmp = TempDir::new().unwrap();
    let p = paths(&tmp);
    IndexBuilder::new(hash_embedder(), p.clone())
        .build(vec![chunk("猫は哺乳類", "ねこ.txt"), chunk("second", "b.txt")])
        .unwrap();

    let json = std::fs::read_to_string(&p.metadata).unwrap();
    assert!(json.starts_with("{\n    \"0\": {\n        \"text\": \"猫は哺乳類\""));
    assert!(json.contains("\"source_file\": \"ねこ.txt\""));
    assert!(json.contains("\n    \"1\": {"));

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["1"]["metadata"]["source_file"], "b.txt");
}

#[test]
fn if_absent_keeps_an_existing_index() {
    let tmp = TempDir::new().unwrap();
    let p = paths(&tmp);
    IndexBuilder::new(hash_embedder(), p.clone()).build(corpus()).unwrap();
    let before = std::fs::read(&p.metadata).unwrap();

    let outcome = IndexBuilder::new(hash_embedder(), p.clone())
        .with_policy(BuildPolicy::IfAbsent)
        .build(vec![chunk("replacement", "new.txt")])
        .unwrap();
    assert_eq!(outcome, BuildOutcome::Skipped);
    assert_eq!(std::fs::read(&p.metadata).unwrap(), before);
}

#[test]
fn always_overwrites_both_artifacts() {
    let tmp = TempDir::new().unwrap();
    let p = paths(&tmp);
    IndexBuilder::new(hash_embedder(), p.clone()).build(corpus()).unwrap();

    let outcome = IndexBuilder::new(hash_embedder(), p.clone())
        .with_policy(BuildPolicy::Always)
        .build(vec![chunk("replacement", "new.txt")])
        .unwrap();
    assert_eq!(outcome, BuildOutcome::Built { chunks: 1 });
    let kb = KnowledgeBase::open(&p, true).unwrap();
    assert_eq!(kb.ntotal(), 1);
    assert_eq!(kb.metadata().get(0).unwrap().text, "replacement");
}

#[test]
fn force_removes_artifacts_before_rebuilding() {
    let tmp = TempDir::new().unwrap();
    let p = paths(&tmp);
    IndexBuilder::new(hash_embedder(), p.clone()).build(corpus()).unwrap();

    let err = IndexBuilder::new(Arc::new(FailingEmbedder), p.clone())
        .with_policy(BuildPolicy::Force)
        .build(corpus())
        .unwrap_err();
    assert!(matches!(err, Error::Embedding(_)));
    assert!(!p.index.exists());
    assert!(!p.metadata.exists());
}

#[test]
fn always_leaves_artifacts_when_the_build_fails() {
    let tmp = TempDir::new().unwrap();
    let p = paths(&tmp);
    IndexBuilder::new(hash_embedder(), p.clone()).build(corpus()).unwrap();

    let err = IndexBuilder::new(Arc::new(FailingEmbedder), p.clone())
        .with_policy(BuildPolicy::Always)
        .build(corpus())
        .unwrap_err();
    assert!(matches!(err, Error::Embedding(_)));
    assert_eq!(KnowledgeBase::open(&p, true).unwrap().ntotal(), 5);
}

#[test]
fn opening_without_an_index_reports_it_missing() {
    let tmp = TempDir::new().unwrap();
    let err = KnowledgeBase::open(&paths(&tmp), false).unwrap_err();
    assert!(matches!(err, Error::IndexMissing { .. }));
}

#[test]
fn missing_metadata_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let p = paths(&tmp);
    IndexBuilder::new(hash_embedder(), p.clone()).build(corpus()).unwrap();
    std::fs::remove_file(&p.metadata).unwrap();
    assert!(matches!(KnowledgeBase::open(&p, false), Err(Error::NotFound(_))));
}

#[test]
fn gaps_in_metadata_drop_results_or_fail_strict_open() {
    let tmp = TempDir::new().unwrap();
    let p = paths(&tmp);
    let embedder = hash_embedder();
    IndexBuilder::new(embedder.clone(), p.clone()).build(corpus()).unwrap();

    let mut store = MetadataStore::restore(&p.metadata).unwrap();
    store.remove(1);
    store.persist(&p.metadata).unwrap();

    assert!(matches!(KnowledgeBase::open(&p, true), Err(Error::MetadataInconsistent(_))));

    let kb = KnowledgeBase::open(&p, false).unwrap();
    assert_eq!(kb.consistency().missing, vec![1]);
    let retriever = Retriever::new(embedder, Arc::new(kb));
    let got = retriever.search_similar("delta echo foxtrot", 5).unwrap();
    assert_eq!(got.dropped, 1);
    assert_eq!(got.results.len(), 4);
    assert!(got.results.iter().all(|r| r.text != "delta echo foxtrot"));
}

#[test]
fn edited_metadata_is_detected_by_digest() {
    let tmp = TempDir::new().unwrap();
    let p = paths(&tmp);
    IndexBuilder::new(hash_embedder(), p.clone()).build(corpus()).unwrap();

    let mut store = MetadataStore::restore(&p.metadata).unwrap();
    store.insert(0, IndexEntry { text: "edited".into(), metadata: Metadata::new("a.txt") });
    store.persist(&p.metadata).unwrap();

    assert!(matches!(KnowledgeBase::open(&p, true), Err(Error::MetadataInconsistent(_))));
    let kb = KnowledgeBase::open(&p, false).unwrap();
    assert!(kb.consistency().missing.is_empty());
    assert_eq!(kb.metadata().get(0).unwrap().text, "edited");
}

#[test]
fn zero_k_skips_the_embedder() {
    let embedder = Arc::new(CountingEmbedder { inner: HashEmbedder::new(16), calls: AtomicUsize::new(0) });
    let kb = IndexBuilder::new(embedder.clone(), IndexPaths::new("x.bin", "x.json"))
        .build_in_memory(corpus())
        .unwrap();
    let retriever = Retriever::new(embedder.clone(), Arc::new(kb));
    assert!(retriever.search_similar("alpha", 0).unwrap().results.is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
}
