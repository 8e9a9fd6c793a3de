use std::sync::Arc;

use rustie_spans::engine::{SpanConfig, SpanDocument, SpanEngine};
use rustie_spans::index::memory::{MemoryDocument, MemoryIndex};
use rustie_spans::{
    collect_hits, FilterOperation, GroupConstraint, MultiTermKind, QueryNode, RewriteOptions, Span,
};
use tempfile::TempDir;

const FIELD: &str = "contents";

const TEXTS: [&str; 6] = [
    "the quick brown fox jumps over the lazy dog",
    "a quick fox and a quick dog",
    "the dog the dog the dog",
    "brown brown brown fox",
    "over and over and over",
    "fox",
];

fn word(w: &str) -> QueryNode {
    QueryNode::term(FIELD, "word", w)
}

fn seq(clauses: Vec<QueryNode>) -> QueryNode {
    QueryNode::sequence(clauses).unwrap()
}

fn any(min: u32, max: Option<u32>) -> QueryNode {
    QueryNode::any_token(FIELD, min, max).unwrap()
}

fn documents() -> Vec<SpanDocument> {
    TEXTS
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let doc = SpanDocument::from_words(&format!("d{}", i), text);
            match i {
                0 => doc
                    .with_tag_attributes("np", 0, 4, &[("head", "fox")])
                    .with_tag_attributes("np", 6, 9, &[("head", "dog")]),
                1 => doc.with_tag("np", 0, 3).with_tag("np", 4, 7),
                _ => doc,
            }
        })
        .collect()
}

fn memory_index() -> Arc<MemoryIndex> {
    let mut builder = MemoryIndex::builder();
    for doc in documents() {
        let mut memory = MemoryDocument::from_words(&doc.annotations["word"].join(" "));
        for tag in &doc.tags {
            let attributes: Vec<(&str, &str)> = tag
                .attributes
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            memory = memory.tag_with_attributes(&tag.name, tag.start as i32, tag.end as i32, &attributes);
        }
        builder = builder.add_document(memory);
    }
    Arc::new(builder.build())
}

fn engine_in(dir: &TempDir) -> SpanEngine {
    let mut engine = SpanEngine::open(dir.path(), SpanConfig::default()).unwrap();
    engine.add_documents(&documents()).unwrap();
    engine.commit().unwrap();
    engine
}

fn engine_hits(engine: &SpanEngine, query: &QueryNode) -> Vec<(String, i32, i32)> {
    let mut hits: Vec<_> = engine
        .search(query, None)
        .unwrap()
        .hits
        .into_iter()
        .map(|h| (h.document_id, h.span.start, h.span.end))
        .collect();
    hits.sort();
    hits
}

fn memory_hits(index: &Arc<MemoryIndex>, query: &QueryNode) -> Vec<(String, i32, i32)> {
    let rewritten = query.rewrite(index.as_ref(), &RewriteOptions::default()).unwrap();
    let mut hits: Vec<_> = collect_hits(&rewritten, &index.segment_context(), None)
        .unwrap()
        .hits
        .into_iter()
        .map(|(doc, h)| (format!("d{}", doc), h.span.start, h.span.end))
        .collect();
    hits.sort();
    hits
}

#[test]
fn test_quick_any_fox() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let query = seq(vec![word("quick"), any(1, Some(1)), word("fox")]);
    let results = engine.search(&query, None).unwrap();
    assert_eq!(results.total_hits, 1);
    assert!(!results.truncated);
    let hit = &results.hits[0];
    assert_eq!(hit.document_id, "d0");
    assert_eq!(hit.span, Span::new(1, 4));
    assert_eq!(hit.text(), "quick brown fox");
}

#[test]
fn test_engine_agrees_with_memory_index() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let memory = memory_index();

    let queries = vec![
        word("fox"),
        seq(vec![word("the"), word("dog")]),
        seq(vec![word("brown"), QueryNode::repetition(word("brown"), 1, None).unwrap()]),
        QueryNode::repetition(word("brown"), 1, Some(2)).unwrap(),
        seq(vec![word("quick"), any(0, Some(2)), word("fox")]),
        seq(vec![word("over"), any(1, Some(3)), word("over")]),
        QueryNode::or(vec![word("fox"), seq(vec![word("lazy"), word("dog")])]).unwrap(),
        QueryNode::and_not(vec![seq(vec![word("a"), any(1, Some(1))])], vec![word("dog")]).unwrap(),
        seq(vec![QueryNode::not(FIELD, Some(word("the"))).unwrap(), word("dog")]),
        QueryNode::multi_term(FIELD, "word", MultiTermKind::Prefix, "do"),
        seq(vec![QueryNode::multi_term(FIELD, "word", MultiTermKind::Wildcard, "?"), word("quick")]),
        QueryNode::tags(FIELD, "np"),
        QueryNode::tags_with_attributes(FIELD, "np", &[("head", "dog")]),
        QueryNode::position_filter(QueryNode::tags(FIELD, "np"), word("fox"), FilterOperation::Containing, false).unwrap(),
        QueryNode::edge(QueryNode::tags(FIELD, "np"), true),
        QueryNode::expansion(word("fox"), rustie_spans::Direction::Right, 1, Some(2)).unwrap(),
    ];
    for query in &queries {
        let expected = memory_hits(&memory, query);
        assert_eq!(engine_hits(&engine, query), expected, "engine differs for {:?}", query);
    }
}

#[test]
fn test_captures_and_constraints() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let pair = seq(vec![
        QueryNode::capture_group(any(1, Some(1)), "left"),
        QueryNode::capture_group(any(1, Some(1)), "right"),
    ]);
    let query = QueryNode::constrained(pair, GroupConstraint::same_tokens("left", "right", "word")).unwrap();
    let results = engine.search(&query, None).unwrap();
    assert_eq!(results.group_names, vec!["left".to_string(), "right".to_string()]);
    let mut hits: Vec<_> = results
        .hits
        .iter()
        .map(|h| (h.document_id.clone(), h.span.start, h.span.end))
        .collect();
    hits.sort();
    assert_eq!(
        hits,
        vec![("d3".to_string(), 0, 2), ("d3".to_string(), 1, 3)]
    );
    for hit in &results.hits {
        assert_eq!(hit.capture("left"), Some(&Span::new(hit.span.start, hit.span.start + 1)));
        assert_eq!(hit.capture("right"), Some(&Span::new(hit.span.start + 1, hit.span.end)));
    }
}

#[test]
fn test_deleted_documents_are_skipped() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in(&dir);
    let before = engine.search(&word("fox"), None).unwrap();
    assert!(before.document_ids().contains(&"d5"));

    engine.delete_document("d5").unwrap();
    engine.commit().unwrap();
    let mut ids: Vec<String> = engine
        .search(&word("fox"), None)
        .unwrap()
        .hits
        .into_iter()
        .map(|h| h.document_id)
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids, vec!["d0", "d1", "d3"]);

    // not and any-token cursors enumerate documents without postings
    let every_token = engine.search(&any(1, Some(1)), None).unwrap();
    assert!(every_token.hits.iter().all(|h| h.document_id != "d5"));
}

#[test]
fn test_hit_limit_truncates() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let results = engine.search(&word("the"), Some(2)).unwrap();
    assert_eq!(results.hits.len(), 2);
    assert_eq!(results.total_hits, 5);
    assert!(results.truncated);
    let all = engine.search(&word("the"), None).unwrap();
    assert_eq!(all.total_hits, 5);
    assert!(!all.truncated);
}

#[test]
fn test_reopen_existing_index() {
    let dir = TempDir::new().unwrap();
    {
        let engine = engine_in(&dir);
        assert_eq!(engine.num_docs(), TEXTS.len() as u64);
    }
    let engine = SpanEngine::open(dir.path(), SpanConfig::default()).unwrap();
    assert_eq!(engine.num_docs(), TEXTS.len() as u64);
    assert_eq!(engine.search(&word("lazy"), None).unwrap().total_hits, 1);
}

#[test]
fn test_config_from_yaml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        "matching:\n  forward_index_enabled: false\n  nfa_fixed_char_threshold: 2\nschema:\n  annotations: [word, lemma]\n",
    )
    .unwrap();
    let config = SpanConfig::from_yaml_file(&path).unwrap();
    assert!(!config.matching.forward_index_enabled);
    assert_eq!(config.matching.nfa_fixed_char_threshold, 2);
    assert_eq!(config.matching.nfa_cost_factor, 10);
    assert_eq!(config.expansion.max_term_expansions, 1024);
    assert_eq!(config.schema.annotations, vec!["word", "lemma"]);
    assert_eq!(config.schema.base_field, "contents");

    let options = config.rewrite_options();
    assert!(!options.forward_index_enabled);
    assert_eq!(options.default_annotation, "word");

    assert!(SpanConfig::from_yaml_file(dir.path().join("missing.yaml")).is_err());
    assert!(SpanConfig::from_yaml_str("schema:\n  annotations: []\n").is_err());
}

#[test]
fn test_rejects_mismatched_queries_and_documents() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in(&dir);
    assert!(engine.search(&QueryNode::term("title", "word", "fox"), None).is_err());

    let ragged = SpanDocument::new("bad")
        .with_annotation("word", ["a", "b"])
        .with_annotation("pos", ["DT"]);
    assert!(engine.add_document(&ragged).is_err());
    let outside = SpanDocument::from_words("bad", "a b").with_tag("np", 1, 3);
    assert!(engine.add_document(&outside).is_err());
    let unknown = SpanDocument::new("bad").with_annotation("entity", ["PER"]);
    assert!(engine.add_document(&unknown).is_err());
}
