//! Tests for automaton construction and matching.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::error::SpanError;
    use crate::index::memory::MemoryIndex;
    use crate::nfa::{DocumentTokens, MatchDirection, NfaBuilder};
    use crate::query::{MultiTermKind, QueryNode};

    const FIELD: &str = "contents";

    fn word(w: &str) -> QueryNode {
        QueryNode::term(FIELD, "word", w)
    }

    fn matches(index: &Arc<MemoryIndex>, fragment: &QueryNode, direction: MatchDirection, doc: u32, anchor: i32) -> Vec<i32> {
        let nfa = NfaBuilder::build(fragment, direction, 1000).unwrap();
        let resolved = nfa.resolve(index.as_ref()).unwrap();
        let mut tokens = DocumentTokens::new();
        tokens.load(index.as_ref(), doc, resolved.annotations()).unwrap();
        let mut out = Vec::new();
        resolved.find_matches(&tokens, anchor, &mut out);
        out
    }

    #[test]
    fn test_forward_sequence() {
        let idx = Arc::new(MemoryIndex::from_texts(&["a b c d"]));
        let fragment = QueryNode::sequence(vec![word("b"), word("c")]).unwrap();
        assert_eq!(matches(&idx, &fragment, MatchDirection::Forward, 0, 1), vec![3]);
        assert!(matches(&idx, &fragment, MatchDirection::Forward, 0, 2).is_empty());
    }

    #[test]
    fn test_backward_sequence() {
        let idx = Arc::new(MemoryIndex::from_texts(&["a b c d"]));
        let fragment = QueryNode::sequence(vec![word("a"), word("b")]).unwrap();
        assert_eq!(matches(&idx, &fragment, MatchDirection::Backward, 0, 2), vec![0]);
        assert!(matches(&idx, &fragment, MatchDirection::Backward, 0, 1).is_empty());
    }

    #[test]
    fn test_unbounded_repetition() {
        let idx = Arc::new(MemoryIndex::from_texts(&["a b b b a"]));
        let fragment = QueryNode::repetition(word("b"), 1, None).unwrap();
        assert_eq!(matches(&idx, &fragment, MatchDirection::Forward, 0, 1), vec![2, 3, 4]);
        assert_eq!(matches(&idx, &fragment, MatchDirection::Backward, 0, 4), vec![1, 2, 3]);
    }

    #[test]
    fn test_bounded_any_token() {
        let idx = Arc::new(MemoryIndex::from_texts(&["a b c"]));
        let fragment = QueryNode::any_token(FIELD, 1, Some(2)).unwrap();
        assert_eq!(matches(&idx, &fragment, MatchDirection::Forward, 0, 0), vec![1, 2]);
        assert_eq!(matches(&idx, &fragment, MatchDirection::Forward, 0, 2), vec![3]);
        assert!(matches(&idx, &fragment, MatchDirection::Forward, 0, 3).is_empty());
    }

    #[test]
    fn test_negated_token() {
        let idx = Arc::new(MemoryIndex::from_texts(&["b a"]));
        let fragment = QueryNode::not(FIELD, Some(word("a"))).unwrap();
        assert_eq!(matches(&idx, &fragment, MatchDirection::Forward, 0, 0), vec![1]);
        assert!(matches(&idx, &fragment, MatchDirection::Forward, 0, 1).is_empty());
    }

    #[test]
    fn test_or_and_intersection() {
        let idx = Arc::new(MemoryIndex::from_texts(&["a b c"]));
        let either = QueryNode::or(vec![word("a"), QueryNode::sequence(vec![word("a"), word("b")]).unwrap()]).unwrap();
        assert_eq!(matches(&idx, &either, MatchDirection::Forward, 0, 0), vec![1, 2]);

        let both = QueryNode::and(vec![word("a"), QueryNode::any_token(FIELD, 1, Some(1)).unwrap()]).unwrap();
        assert_eq!(matches(&idx, &both, MatchDirection::Forward, 0, 0), vec![1]);
    }

    #[test]
    fn test_expanded_multi_term() {
        let idx = Arc::new(MemoryIndex::from_texts(&["cat car dog"]));
        let fragment = QueryNode::MultiTerm {
            field: FIELD.to_string(),
            annotation: "word".to_string(),
            kind: MultiTermKind::Prefix,
            pattern: "ca".to_string(),
            expansion: Some(vec!["car".to_string(), "cat".to_string()]),
        };
        let twice = QueryNode::repetition(fragment, 1, None).unwrap();
        assert_eq!(matches(&idx, &twice, MatchDirection::Forward, 0, 0), vec![1, 2]);
    }

    #[test]
    fn test_terms_missing_from_segment_never_match() {
        let idx = Arc::new(MemoryIndex::from_texts(&["a b"]));
        assert!(matches(&idx, &word("zebra"), MatchDirection::Forward, 0, 0).is_empty());
    }

    #[test]
    fn test_build_errors() {
        let too_large = QueryNode::repetition(word("a"), 1, Some(100)).unwrap();
        assert!(matches!(
            NfaBuilder::build(&too_large, MatchDirection::Forward, 10),
            Err(SpanError::PatternTooLarge { limit: 10 })
        ));

        let optional = QueryNode::any_token(FIELD, 0, Some(1)).unwrap();
        assert!(matches!(
            NfaBuilder::build(&optional, MatchDirection::Forward, 100),
            Err(SpanError::EmptyMatchingAutomaton)
        ));

        let tags = QueryNode::tags(FIELD, "s");
        assert!(matches!(
            NfaBuilder::build(&tags, MatchDirection::Forward, 100),
            Err(SpanError::NotAutomatonCapable(_))
        ));
    }

    #[test]
    fn test_built_automaton_properties() {
        let not_be = QueryNode::not(FIELD, Some(QueryNode::term(FIELD, "lemma", "be"))).unwrap();
        let fragment = QueryNode::sequence(vec![word("a"), not_be]).unwrap();
        let nfa = NfaBuilder::build(&fragment, MatchDirection::Backward, 100).unwrap();
        assert!(!nfa.matches_empty());
        assert_eq!(nfa.annotations(), vec!["word".to_string(), "lemma".to_string()]);
        assert_eq!(nfa.direction(), MatchDirection::Backward);
    }
}
