//! Tests for query construction, rewriting and execution.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use crate::error::{ErrorKind, SpanError};
    use crate::index::memory::{MemoryDocument, MemoryIndex};
    use crate::nfa::MatchDirection;
    use crate::query::*;
    use crate::spans::{Direction, FilterOperation};
    use crate::types::{DocId, SortBy, Span};

    const FIELD: &str = "contents";

    fn word(w: &str) -> QueryNode {
        QueryNode::term(FIELD, "word", w)
    }

    fn seq(clauses: Vec<QueryNode>) -> QueryNode {
        QueryNode::sequence(clauses).unwrap()
    }

    fn any(min: u32, max: Option<u32>) -> QueryNode {
        QueryNode::any_token(FIELD, min, max).unwrap()
    }

    fn without_automata() -> RewriteOptions {
        RewriteOptions {
            forward_index_enabled: false,
            ..RewriteOptions::default()
        }
    }

    /// Options under which every capable clause is matched by automaton
    fn always_automata() -> RewriteOptions {
        RewriteOptions {
            nfa_cost_factor: 0,
            ..RewriteOptions::default()
        }
    }

    fn search(index: &Arc<MemoryIndex>, query: &QueryNode, options: &RewriteOptions) -> Vec<(DocId, i32, i32)> {
        let rewritten = query.rewrite(index.as_ref(), options).unwrap();
        collect_hits(&rewritten, &index.segment_context(), None)
            .unwrap()
            .hits
            .into_iter()
            .map(|(doc, hit)| (doc, hit.span.start, hit.span.end))
            .collect()
    }

    fn contains_automaton(node: &QueryNode) -> bool {
        matches!(node, QueryNode::ForwardIndexMatch { .. })
            || node.children().into_iter().any(contains_automaton)
    }

    const TEXTS: [&str; 4] = ["a b b c a b", "c b a b c", "b b b", "a c a b b c"];

    fn corpus() -> Arc<MemoryIndex> {
        Arc::new(MemoryIndex::from_texts(&TEXTS))
    }

    type SpanSet = BTreeSet<(i32, i32)>;

    /// Every `(s, e)` of `left` followed by an `(e, _)` of `right`
    fn concat(left: &SpanSet, right: &SpanSet) -> SpanSet {
        let mut out = SpanSet::new();
        for &(start, middle) in left {
            for &(_, end) in right.range((middle, i32::MIN)..=(middle, i32::MAX)) {
                out.insert((start, end));
            }
        }
        out
    }

    /// Hits of an unrewritten node in one document by exhaustive enumeration, empty hits included
    fn brute_force(node: &QueryNode, tokens: &[&str]) -> SpanSet {
        let length = tokens.len() as i32;
        let grams = |min: u32, max: Option<u32>| -> SpanSet {
            let max = max.map_or(length, |m| (m as i32).min(length));
            let mut out = SpanSet::new();
            for k in min as i32..=max {
                for start in 0..=length - k {
                    out.insert((start, start + k));
                }
            }
            out
        };
        match node {
            QueryNode::Term { term, .. } => tokens
                .iter()
                .enumerate()
                .filter(|(_, t)| **t == term.as_str())
                .map(|(i, _)| (i as i32, i as i32 + 1))
                .collect(),
            QueryNode::AnyToken { min, max, .. } => grams(*min, *max),
            QueryNode::Sequence(clauses) => clauses[1..]
                .iter()
                .fold(brute_force(&clauses[0], tokens), |acc, c| concat(&acc, &brute_force(c, tokens))),
            QueryNode::Repetition { clause, min, max } => {
                let single = brute_force(clause, tokens);
                let mut out = if *min == 0 { grams(0, Some(0)) } else { SpanSet::new() };
                let upper = max.unwrap_or((*min).max(1) + length as u32 + 1);
                let mut run = single.clone();
                for k in 1..=upper {
                    if k >= *min {
                        out.extend(run.iter().copied());
                    }
                    run = concat(&run, &single);
                    if run.is_empty() {
                        break;
                    }
                }
                out
            }
            QueryNode::Or(clauses) => clauses.iter().flat_map(|c| brute_force(c, tokens)).collect(),
            QueryNode::AndNot { include, exclude } => {
                let mut hits = match include.split_first() {
                    None => grams(1, Some(1)),
                    Some((first, rest)) => rest.iter().fold(brute_force(first, tokens), |acc, c| {
                        acc.intersection(&brute_force(c, tokens)).copied().collect()
                    }),
                };
                for clause in exclude {
                    let single = clause.hits_all_same_length() && clause.hits_length_min() == 1;
                    let excluded: Vec<(i32, i32)> =
                        brute_force(clause, tokens).into_iter().filter(|(s, e)| s < e).collect();
                    hits.retain(|&(s, e)| {
                        !excluded
                            .iter()
                            .any(|&(xs, xe)| if single { s <= xs && xe <= e } else { (s, e) == (xs, xe) })
                    });
                }
                hits
            }
            QueryNode::Not { clause, .. } => {
                let covered = clause.as_ref().map(|c| brute_force(c, tokens)).unwrap_or_default();
                (0..length)
                    .filter(|&i| !covered.iter().any(|&(s, e)| s <= i && i < e))
                    .map(|i| (i, i + 1))
                    .collect()
            }
            QueryNode::Expansion { clause, direction, min, max } => {
                let mut out = SpanSet::new();
                for (start, end) in brute_force(clause, tokens) {
                    let room = match direction {
                        Direction::Left => start,
                        Direction::Right => length - end,
                    };
                    let top = max.map_or(room, |m| (m as i32).min(room));
                    for k in *min as i32..=top {
                        out.insert(match direction {
                            Direction::Left => (start - k, end),
                            Direction::Right => (start, end + k),
                        });
                    }
                }
                out
            }
            QueryNode::CaptureGroup { clause, .. } => brute_force(clause, tokens),
            other => panic!("no exhaustive evaluation for {:?}", other),
        }
    }

    fn all_options() -> [RewriteOptions; 3] {
        [RewriteOptions::default(), without_automata(), always_automata()]
    }

    #[test]
    fn test_end_to_end_gap_becomes_expansion() {
        let index = Arc::new(MemoryIndex::from_texts(&["the quick brown fox"]));
        let query = seq(vec![word("quick"), any(1, Some(1)), word("fox")]);
        let rewritten = query.rewrite(index.as_ref(), &RewriteOptions::default()).unwrap();
        let expected = seq(vec![
            word("quick"),
            QueryNode::expansion(word("fox"), Direction::Left, 1, Some(1)).unwrap(),
        ]);
        assert_eq!(rewritten, expected);

        let hits = collect_hits(&rewritten, &index.segment_context(), None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits.hits[0].0, 0);
        assert_eq!(hits.hits[0].1.span, Span::new(1, 4));
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let index = Arc::new(
            MemoryIndex::builder()
                .add_document(
                    MemoryDocument::from_words("a b b c cat cot")
                        .tag_with_attributes("np", 0, 2, &[("type", "full")]),
                )
                .add_document(MemoryDocument::from_words("c a b a"))
                .build(),
        );
        let queries = vec![
            seq(vec![word("a"), any(1, Some(2)), word("b")]),
            seq(vec![word("a"), word("b"), word("b"), word("c")]),
            seq(vec![word("a"), QueryNode::repetition(word("b"), 0, Some(2)).unwrap()]),
            seq(vec![any(0, Some(1)), word("a"), any(1, None)]),
            QueryNode::or(vec![word("a"), word("a"), word("zebra"), QueryNode::or(vec![word("b")]).unwrap()]).unwrap(),
            QueryNode::or(vec![
                QueryNode::not(FIELD, Some(word("a"))).unwrap(),
                QueryNode::not(FIELD, Some(word("b"))).unwrap(),
            ])
            .unwrap(),
            QueryNode::and_not(vec![word("a")], vec![word("b")]).unwrap(),
            QueryNode::and_not(vec![word("a"), QueryNode::not(FIELD, Some(word("b"))).unwrap()], vec![]).unwrap(),
            QueryNode::repetition(QueryNode::repetition(word("b"), 1, Some(2)).unwrap(), 2, Some(3)).unwrap(),
            QueryNode::tags_with_attributes(FIELD, "np", &[("type", "full")]),
            QueryNode::multi_term(FIELD, "word", MultiTermKind::Regex, "c.t"),
            seq(vec![word("a"), QueryNode::multi_term(FIELD, "word", MultiTermKind::Wildcard, "?")]),
            QueryNode::unique(QueryNode::or(vec![word("a"), word("b")]).unwrap()),
            QueryNode::sorted(seq(vec![word("b"), word("b")]), SortBy::End, false),
        ];
        for options in [RewriteOptions::default(), without_automata(), always_automata()] {
            for query in &queries {
                let once = query.rewrite(index.as_ref(), &options).unwrap();
                let twice = once.rewrite(index.as_ref(), &options).unwrap();
                assert_eq!(once, twice, "rewrite not idempotent for {:?}", query);
            }
        }
    }

    #[test]
    fn test_unknown_terms_rewrite_to_no_hits() {
        let index = corpus();
        let query = seq(vec![word("a"), word("zebra")]);
        let rewritten = query.rewrite(index.as_ref(), &RewriteOptions::default()).unwrap();
        assert_eq!(rewritten, QueryNode::no_hits(FIELD));
        let hits = collect_hits(&rewritten, &index.segment_context(), None).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_or_flattening_and_dedup() {
        let index = corpus();
        let query = QueryNode::or(vec![
            word("a"),
            QueryNode::or(vec![word("b"), word("zebra")]).unwrap(),
            word("a"),
        ])
        .unwrap();
        let rewritten = query.rewrite(index.as_ref(), &RewriteOptions::default()).unwrap();
        let expected = QueryNode::sorted(QueryNode::Or(vec![word("a"), word("b")]), SortBy::Start, true);
        assert_eq!(rewritten, expected);
    }

    #[test]
    fn test_adjacent_clauses_fold_into_repetition() {
        let index = corpus();
        let query = seq(vec![word("a"), word("b"), word("b"), word("c")]);
        let rewritten = query.rewrite(index.as_ref(), &without_automata()).unwrap();
        let expected = seq(vec![
            word("a"),
            QueryNode::repetition(word("b"), 2, Some(2)).unwrap(),
            word("c"),
        ]);
        assert_eq!(rewritten, expected);
        assert_eq!(search(&index, &query, &without_automata()), vec![(0, 0, 4), (3, 2, 6)]);
    }

    #[test]
    fn test_nested_repetition_collapses() {
        let index = corpus();
        let query = QueryNode::repetition(QueryNode::repetition(word("b"), 1, Some(2)).unwrap(), 2, Some(3)).unwrap();
        let rewritten = query.rewrite(index.as_ref(), &RewriteOptions::default()).unwrap();
        assert_eq!(rewritten, QueryNode::repetition(word("b"), 2, Some(6)).unwrap());
    }

    #[test]
    fn test_optional_clause_splits_into_alternatives() {
        let index = Arc::new(MemoryIndex::from_texts(&["a b x a"]));
        let query = seq(vec![word("a"), QueryNode::repetition(word("b"), 0, Some(1)).unwrap()]);
        let rewritten = query.rewrite(index.as_ref(), &without_automata()).unwrap();
        let expected = QueryNode::sorted(
            QueryNode::Or(vec![seq(vec![word("a"), word("b")]), word("a")]),
            SortBy::Start,
            true,
        );
        assert_eq!(rewritten, expected);
        assert!(!rewritten.matches_empty_sequence());
        assert_eq!(
            search(&index, &query, &without_automata()),
            vec![(0, 0, 1), (0, 0, 2), (0, 3, 4)]
        );
    }

    #[test]
    fn test_and_not_becomes_inverted_containing_filter() {
        let index = Arc::new(MemoryIndex::from_texts(&["a b", "b a c", "a c b"]));
        let query = QueryNode::and_not(vec![word("a")], vec![word("b")]).unwrap();
        let rewritten = query.rewrite(index.as_ref(), &RewriteOptions::default()).unwrap();
        let expected = QueryNode::position_filter(word("a"), word("b"), FilterOperation::Containing, true).unwrap();
        assert_eq!(rewritten, expected);

        // hits of "a" plus one token that overlap no "b"
        let wide = QueryNode::and_not(vec![seq(vec![word("a"), any(1, Some(1))])], vec![word("b")]).unwrap();
        assert_eq!(search(&index, &wide, &RewriteOptions::default()), vec![(1, 1, 3), (2, 0, 2)]);
    }

    #[test]
    fn test_negated_include_is_hoisted() {
        let index = Arc::new(MemoryIndex::from_texts(&["a b"]));
        let query = QueryNode::and_not(vec![word("a"), QueryNode::not(FIELD, Some(word("b"))).unwrap()], vec![]).unwrap();
        let rewritten = query.rewrite(index.as_ref(), &RewriteOptions::default()).unwrap();
        let expected = QueryNode::position_filter(word("a"), word("b"), FilterOperation::Containing, true).unwrap();
        assert_eq!(rewritten, expected);
    }

    #[test]
    fn test_or_of_negations_becomes_nand() {
        let index = Arc::new(MemoryIndex::from_texts(&["a b c"]));
        let query = QueryNode::or(vec![
            QueryNode::not(FIELD, Some(word("a"))).unwrap(),
            QueryNode::not(FIELD, Some(word("b"))).unwrap(),
        ])
        .unwrap();
        let rewritten = query.rewrite(index.as_ref(), &RewriteOptions::default()).unwrap();
        let expected = QueryNode::not(FIELD, Some(QueryNode::and(vec![word("a"), word("b")]).unwrap())).unwrap();
        assert_eq!(rewritten, expected);
        assert_eq!(
            search(&index, &query, &RewriteOptions::default()),
            vec![(0, 0, 1), (0, 1, 2), (0, 2, 3)]
        );
    }

    #[test]
    fn test_multi_term_expansion() {
        let index = Arc::new(MemoryIndex::from_texts(&["cat car dog"]));
        let options = RewriteOptions::default();
        let prefix = QueryNode::multi_term(FIELD, "word", MultiTermKind::Prefix, "ca");
        match prefix.rewrite(index.as_ref(), &options).unwrap() {
            QueryNode::MultiTerm { expansion, .. } => {
                assert_eq!(expansion, Some(vec!["car".to_string(), "cat".to_string()]))
            }
            other => panic!("unexpected rewrite {:?}", other),
        }
        let single = QueryNode::multi_term(FIELD, "word", MultiTermKind::Wildcard, "d?g");
        assert_eq!(single.rewrite(index.as_ref(), &options).unwrap(), word("dog"));
        let none = QueryNode::multi_term(FIELD, "word", MultiTermKind::Regex, "z+");
        assert_eq!(none.rewrite(index.as_ref(), &options).unwrap(), QueryNode::no_hits(FIELD));
        assert_eq!(search(&index, &prefix, &options), vec![(0, 0, 1), (0, 1, 2)]);
    }

    #[test]
    fn test_invalid_regex_is_a_rewrite_error() {
        let index = Arc::new(MemoryIndex::from_texts(&["a"]));
        let broken = QueryNode::multi_term(FIELD, "word", MultiTermKind::Regex, "(unclosed");
        let err = broken.rewrite(index.as_ref(), &RewriteOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rewrite);
    }

    #[test]
    fn test_automaton_and_reverse_matching_agree() {
        let index = corpus();
        let queries = vec![
            seq(vec![word("a"), QueryNode::repetition(word("b"), 1, None).unwrap()]),
            seq(vec![QueryNode::repetition(word("b"), 1, Some(2)).unwrap(), word("c")]),
            seq(vec![word("a"), word("b"), any(1, Some(2)), word("c")]),
            seq(vec![QueryNode::not(FIELD, Some(word("a"))).unwrap(), word("b")]),
            seq(vec![word("a"), QueryNode::multi_term(FIELD, "word", MultiTermKind::Wildcard, "?")]),
        ];
        for query in &queries {
            let automaton = query.rewrite(index.as_ref(), &always_automata()).unwrap();
            assert!(contains_automaton(&automaton), "no automaton in {:?}", automaton);
            let reverse = query.rewrite(index.as_ref(), &without_automata()).unwrap();
            assert!(!contains_automaton(&reverse));
            let via_automaton = search(&index, query, &always_automata());
            let via_postings = search(&index, query, &without_automata());
            assert!(!via_postings.is_empty(), "no hits for {:?}", query);
            assert_eq!(via_automaton, via_postings, "strategies disagree for {:?}", query);
        }
    }

    #[test]
    fn test_short_patterns_prefer_automaton() {
        let index = corpus();
        let query = seq(vec![word("a"), QueryNode::multi_term(FIELD, "word", MultiTermKind::Wildcard, "?")]);
        let rewritten = query.rewrite(index.as_ref(), &RewriteOptions::default()).unwrap();
        assert!(contains_automaton(&rewritten));
    }

    #[test]
    fn test_oversized_automaton_falls_back_to_postings() {
        let index = corpus();
        let options = RewriteOptions {
            max_nfa_states: 2,
            ..always_automata()
        };
        let query = seq(vec![word("a"), QueryNode::repetition(word("b"), 1, Some(5)).unwrap()]);
        let rewritten = query.rewrite(index.as_ref(), &options).unwrap();
        assert!(!contains_automaton(&rewritten));
        assert_eq!(search(&index, &query, &options), search(&index, &query, &without_automata()));
    }

    #[test]
    fn test_capture_group_roundtrip() {
        let index = Arc::new(MemoryIndex::from_texts(&["the cat sat on the cat", "a dog"]));
        let query = seq(vec![word("the"), QueryNode::capture_group(word("cat"), "g1")]);
        for options in [RewriteOptions::default(), always_automata(), without_automata()] {
            let rewritten = query.rewrite(index.as_ref(), &options).unwrap();
            let hits = collect_hits(&rewritten, &index.segment_context(), None).unwrap();
            assert_eq!(hits.group_names, vec!["g1".to_string()]);
            assert_eq!(hits.len(), 2);
            for (_, hit) in &hits.hits {
                let group = hit.capture("g1").copied();
                assert_eq!(group, Some(Span::new(hit.span.start + 1, hit.span.end)));
            }
        }
    }

    #[test]
    fn test_constrained_groups() {
        let index = Arc::new(MemoryIndex::from_texts(&["a a b b c"]));
        let pair = seq(vec![
            QueryNode::capture_group(any(1, Some(1)), "x"),
            QueryNode::capture_group(any(1, Some(1)), "y"),
        ]);
        let query = QueryNode::constrained(pair, GroupConstraint::same_tokens("x", "y", "word")).unwrap();
        assert_eq!(
            search(&index, &query, &RewriteOptions::default()),
            vec![(0, 0, 2), (0, 2, 4)]
        );
    }

    #[test]
    fn test_tag_attributes_filter_on_element_start() {
        let index = Arc::new(
            MemoryIndex::builder()
                .add_document(
                    MemoryDocument::from_words("the big dog")
                        .tag_with_attributes("np", 0, 3, &[("type", "full")])
                        .tag("np", 1, 3),
                )
                .build(),
        );
        let query = QueryNode::tags_with_attributes(FIELD, "np", &[("type", "full")]);
        assert_eq!(search(&index, &query, &RewriteOptions::default()), vec![(0, 0, 3)]);
        let bare = QueryNode::tags(FIELD, "np");
        assert_eq!(search(&index, &bare, &RewriteOptions::default()), vec![(0, 0, 3), (0, 1, 3)]);
    }

    #[test]
    fn test_hit_limit() {
        let index = corpus();
        let rewritten = word("b").rewrite(index.as_ref(), &RewriteOptions::default()).unwrap();
        let hits = collect_hits(&rewritten, &index.segment_context(), Some(4)).unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits.total_hits, 10);
        assert_eq!(hits.docs(), vec![0, 1]);
    }

    #[test]
    fn test_shapes() {
        assert!(word("a").hits_all_same_length());
        assert!(any(0, Some(2)).matches_empty_sequence());
        assert!(!any(1, None).hits_all_same_length());
        let rep = QueryNode::repetition(word("a"), 1, None).unwrap();
        assert!(rep.hits_start_sorted() && rep.hits_all_unique());
        assert_eq!(rep.hits_length_max(), None);
        let right = QueryNode::expansion(word("a"), Direction::Right, 0, Some(2)).unwrap();
        assert!(right.hits_start_sorted());
        let left = QueryNode::expansion(word("a"), Direction::Left, 0, Some(2)).unwrap();
        assert!(!left.hits_start_sorted());
        assert!(QueryNode::tags(FIELD, "s").hits_start_sorted());
        assert!(!QueryNode::tags(FIELD, "s").hits_all_unique());
    }

    #[test]
    fn test_construction_errors() {
        assert!(matches!(QueryNode::sequence(vec![]), Err(SpanError::NoClauses(_))));
        assert!(matches!(
            QueryNode::sequence(vec![word("a"), QueryNode::term("title", "word", "b")]),
            Err(SpanError::FieldMismatch { .. })
        ));
        assert!(matches!(
            QueryNode::repetition(word("a"), 2, Some(1)),
            Err(SpanError::InvalidRepetition { .. })
        ));
        assert!(matches!(
            QueryNode::and_not(vec![], vec![]),
            Err(SpanError::EmptyAndNot)
        ));
        assert!(matches!(
            QueryNode::constrained(word("a"), GroupConstraint::same_tokens("x", "y", "word")),
            Err(SpanError::UnknownCaptureGroup(_))
        ));
        let err = QueryNode::any_token(FIELD, 3, Some(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Construction);
    }

    #[test]
    fn test_unrewritten_multi_term_has_no_cursor() {
        let index = Arc::new(MemoryIndex::from_texts(&["a"]));
        let raw = QueryNode::multi_term(FIELD, "word", MultiTermKind::Prefix, "a");
        let err = raw.create_cursor(&index.segment_context()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(QueryNode::no_hits(FIELD)
            .create_cursor(&index.segment_context())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_rewrite_preserves_hits() {
        let index = corpus();
        let b_star = || QueryNode::repetition(word("b"), 0, None).unwrap();
        let not_b = || QueryNode::not(FIELD, Some(word("b"))).unwrap();
        let queries = vec![
            seq(vec![b_star(), any(1, Some(1))]),
            seq(vec![any(1, Some(1)), b_star()]),
            seq(vec![word("a"), QueryNode::repetition(word("b"), 0, Some(2)).unwrap(), word("c")]),
            seq(vec![word("a"), any(0, Some(2)), word("c")]),
            seq(vec![any(0, Some(1)), word("a"), any(1, None)]),
            seq(vec![
                QueryNode::repetition(word("a"), 0, Some(1)).unwrap(),
                QueryNode::repetition(word("b"), 0, Some(1)).unwrap(),
            ]),
            seq(vec![word("b"), word("b")]),
            QueryNode::expansion(b_star(), Direction::Left, 1, Some(2)).unwrap(),
            QueryNode::expansion(b_star(), Direction::Right, 0, Some(1)).unwrap(),
            QueryNode::repetition(QueryNode::repetition(word("b"), 0, Some(1)).unwrap(), 2, Some(3)).unwrap(),
            seq(vec![
                word("a"),
                QueryNode::repetition(QueryNode::repetition(word("b"), 0, Some(1)).unwrap(), 1, Some(2)).unwrap(),
            ]),
            QueryNode::not(FIELD, Some(b_star())).unwrap(),
            QueryNode::or(vec![QueryNode::repetition(word("a"), 0, Some(1)).unwrap(), word("b")]).unwrap(),
            QueryNode::and_not(vec![not_b()], vec![seq(vec![word("a"), word("c")])]).unwrap(),
            QueryNode::and_not(vec![not_b()], vec![word("c")]).unwrap(),
            QueryNode::and_not(vec![seq(vec![word("a"), any(1, Some(1))])], vec![word("b")]).unwrap(),
            QueryNode::and_not(vec![any(1, Some(2))], vec![seq(vec![word("b"), word("c")])]).unwrap(),
            QueryNode::and_not(vec![any(1, Some(2))], vec![b_star()]).unwrap(),
            QueryNode::and_not(vec![word("a"), not_b()], vec![]).unwrap(),
        ];
        for options in all_options() {
            for query in &queries {
                let found: BTreeSet<(DocId, i32, i32)> = search(&index, query, &options).into_iter().collect();
                let expected: BTreeSet<(DocId, i32, i32)> = TEXTS
                    .iter()
                    .enumerate()
                    .flat_map(|(doc, text)| {
                        let tokens: Vec<&str> = text.split(' ').collect();
                        brute_force(query, &tokens)
                            .into_iter()
                            .filter(|(s, e)| s < e)
                            .map(move |(s, e)| (doc as DocId, s, e))
                            .collect::<Vec<_>>()
                    })
                    .collect();
                assert_eq!(found, expected, "hits of {:?} under {:?}", query, options);
            }
        }
    }

    #[test]
    fn test_optional_clause_next_to_gap() {
        let index = Arc::new(MemoryIndex::from_texts(&["a b c"]));
        let b_star = || QueryNode::repetition(word("b"), 0, None).unwrap();
        let trailing = seq(vec![b_star(), any(1, Some(1))]);
        let leading = seq(vec![any(1, Some(1)), b_star()]);
        let expanded = QueryNode::expansion(b_star(), Direction::Right, 1, Some(1)).unwrap();
        for options in all_options() {
            assert_eq!(
                search(&index, &trailing, &options),
                vec![(0, 0, 1), (0, 1, 2), (0, 1, 3), (0, 2, 3)]
            );
            assert_eq!(
                search(&index, &leading, &options),
                vec![(0, 0, 1), (0, 0, 2), (0, 1, 2), (0, 2, 3)]
            );
            assert_eq!(search(&index, &expanded, &options), search(&index, &trailing, &options));
            let rewritten = expanded.rewrite(index.as_ref(), &options).unwrap();
            assert!(!rewritten.matches_empty_sequence());
        }
    }

    #[test]
    fn test_optional_repetition_has_no_cursor() {
        let index = Arc::new(MemoryIndex::from_texts(&["a b"]));
        let optional = QueryNode::repetition(word("b"), 0, Some(2)).unwrap();
        let err = optional.create_cursor(&index.segment_context()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Internal);
        let rewritten = optional.rewrite(index.as_ref(), &RewriteOptions::default()).unwrap();
        assert!(rewritten.create_cursor(&index.segment_context()).is_ok());
    }

    #[test]
    fn test_and_not_keeps_multi_token_exclusions_for_negated_includes() {
        let index = Arc::new(MemoryIndex::from_texts(&["a c b"]));
        let not_b = || QueryNode::not(FIELD, Some(word("b"))).unwrap();
        let phrase = || seq(vec![word("a"), word("c")]);
        let negated = QueryNode::and_not(vec![not_b()], vec![phrase()]).unwrap();
        let positive = QueryNode::and_not(
            vec![QueryNode::or(vec![word("a"), word("c")]).unwrap()],
            vec![phrase()],
        )
        .unwrap();
        let single = QueryNode::and_not(vec![not_b()], vec![word("c")]).unwrap();
        for options in all_options() {
            assert_eq!(search(&index, &negated, &options), vec![(0, 0, 1), (0, 1, 2)]);
            assert_eq!(search(&index, &positive, &options), vec![(0, 0, 1), (0, 1, 2)]);
            assert_eq!(search(&index, &single, &options), vec![(0, 0, 1)]);
        }
        let rewritten = single.rewrite(index.as_ref(), &RewriteOptions::default()).unwrap();
        assert!(matches!(rewritten, QueryNode::Not { .. }));
    }

    #[test]
    fn test_cursor_output_honours_shape() {
        let index = corpus();
        let nodes = vec![
            word("b"),
            QueryNode::or(vec![word("a"), word("b")]).unwrap(),
            QueryNode::or(vec![word("a"), seq(vec![word("a"), word("b")])]).unwrap(),
            seq(vec![word("a"), QueryNode::repetition(word("b"), 1, None).unwrap()]),
            seq(vec![QueryNode::repetition(word("b"), 1, None).unwrap(), word("c")]),
            QueryNode::repetition(word("b"), 1, None).unwrap(),
            QueryNode::expansion(word("a"), Direction::Right, 0, Some(2)).unwrap(),
            QueryNode::expansion(word("b"), Direction::Left, 1, Some(1)).unwrap(),
            QueryNode::sorted(
                QueryNode::expansion(word("a"), Direction::Left, 0, Some(2)).unwrap(),
                SortBy::End,
                false,
            ),
            QueryNode::not(FIELD, Some(word("a"))).unwrap(),
            any(1, Some(2)),
            QueryNode::position_filter(any(1, Some(2)), word("b"), FilterOperation::Containing, false).unwrap(),
            QueryNode::unique(QueryNode::Or(vec![word("a"), word("a")])),
            QueryNode::capture_group(seq(vec![word("a"), word("b")]), "g"),
            QueryNode::and(vec![word("a"), any(1, Some(1))]).unwrap(),
            QueryNode::forward_index_match(
                word("a"),
                QueryNode::repetition(word("b"), 1, None).unwrap(),
                MatchDirection::Forward,
                10_000,
            )
            .unwrap(),
        ];
        for node in &nodes {
            let shape = node.shape();
            let hits = collect_hits(node, &index.segment_context(), None).unwrap().hits;
            assert!(!hits.is_empty(), "no hits for {:?}", node);
            for (doc, hit) in &hits {
                let length = (hit.span.end - hit.span.start) as u32;
                assert!(length >= shape.min_length, "{:?} in doc {} shorter than claimed by {:?}", hit.span, doc, node);
                assert!(shape.max_length.map_or(true, |max| length <= max));
            }
            for pair in hits.windows(2) {
                let ((doc_a, a), (doc_b, b)) = (&pair[0], &pair[1]);
                if doc_a != doc_b {
                    assert!(doc_a < doc_b);
                    continue;
                }
                let (a, b) = (a.span, b.span);
                let context = format!("{:?} then {:?} from {:?}", a, b, node);
                if shape.start_sorted {
                    assert!(a.start <= b.start, "start order: {}", context);
                }
                if shape.end_sorted {
                    assert!(a.end <= b.end, "end order: {}", context);
                }
                if shape.unique_start {
                    assert_ne!(a.start, b.start, "unique start: {}", context);
                }
                if shape.unique_end {
                    assert_ne!(a.end, b.end, "unique end: {}", context);
                }
                if shape.all_unique && (shape.start_sorted || shape.end_sorted) {
                    assert_ne!(a, b, "unique hits: {}", context);
                }
            }
        }
    }

    #[test]
    fn test_query_from_json() {
        let json = r#"{"Sequence":[
            {"Term":{"field":"contents","annotation":"word","term":"quick"}},
            {"AnyToken":{"field":"contents","min":1,"max":1}}
        ]}"#;
        let parsed: QueryNode = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, seq(vec![word("quick"), any(1, Some(1))]));
    }
}
