//! Tests for the tantivy-backed index collaborators.

#[cfg(test)]
mod tests {
    use tantivy::tokenizer::{TokenStream, Tokenizer};

    use crate::engine::{SpanConfig, SpanDocument, SpanEngine};
    use crate::error::{ErrorKind, SpanError};
    use crate::index::{ForwardIndex, IndexStats, PostingsIterator, SegmentIndex, END_TAG_ANNOTATION, TAG_ANNOTATION};
    use crate::tantivy_integration::position_tokenizer::*;
    use crate::tantivy_integration::{TantivySegment, TantivyStats};
    use crate::types::{NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

    fn engine_with(docs: &[SpanDocument]) -> SpanEngine {
        let mut engine = SpanEngine::in_ram(SpanConfig::default()).unwrap();
        engine.add_documents(docs).unwrap();
        engine.commit().unwrap();
        engine
    }

    fn only_segment(engine: &SpanEngine) -> TantivySegment {
        let searcher = engine.searcher();
        assert_eq!(searcher.segment_readers().len(), 1);
        TantivySegment::open(&searcher.segment_readers()[0], engine.fields.clone()).unwrap()
    }

    fn positions(postings: &mut dyn PostingsIterator) -> Vec<i32> {
        let mut out = Vec::new();
        loop {
            let p = postings.next_position().unwrap();
            if p == NO_MORE_POSITIONS {
                return out;
            }
            out.push(p);
        }
    }

    #[test]
    fn test_tag_token_stream() {
        let labels = vec![
            vec!["np".to_string(), "@type=full".to_string()],
            vec![],
            vec!["s".to_string()],
        ];
        let mut stream = TagTokenStream::new(labels);

        assert!(stream.advance());
        assert_eq!(stream.token().text, "np");
        assert_eq!(stream.token().position, 0);

        assert!(stream.advance());
        assert_eq!(stream.token().text, "@type=full");
        assert_eq!(stream.token().position, 0);

        assert!(stream.advance());
        assert_eq!(stream.token().text, "s");
        assert_eq!(stream.token().position, 2);

        assert!(!stream.advance());
    }

    #[test]
    fn test_tag_tokenizer_roundtrip() {
        let labels = vec![vec![], vec!["np".to_string()], vec![], vec!["vp".to_string(), "s".to_string()]];
        let encoded = encode_tag_positions(&labels);
        assert_eq!(encoded, "|np||vp,s");

        let mut tokenizer = TagTokenizer;
        let mut stream = tokenizer.token_stream(&encoded);
        let mut seen = Vec::new();
        while stream.advance() {
            seen.push((stream.token().text.clone(), stream.token().position));
        }
        assert_eq!(
            seen,
            vec![("np".to_string(), 1), ("vp".to_string(), 3), ("s".to_string(), 3)]
        );
    }

    #[test]
    fn test_annotation_tokenizer_roundtrip() {
        let tokens = vec!["The".to_string(), "quick".to_string(), "fox".to_string()];
        let encoded = encode_tokens(&tokens);
        assert_eq!(encoded, "The|quick|fox");

        let mut tokenizer = AnnotationTokenizer;
        let mut stream = tokenizer.token_stream(&encoded);
        for (i, expected) in tokens.iter().enumerate() {
            assert!(stream.advance());
            assert_eq!(&stream.token().text, expected);
            assert_eq!(stream.token().position, i);
        }
        assert!(!stream.advance());
        assert_eq!(split_tokens("").count(), 0);
    }

    #[test]
    fn test_segment_postings_and_lengths() {
        let engine = engine_with(&[SpanDocument::from_words("d1", "a b a")]);
        let segment = only_segment(&engine);
        assert_eq!(segment.max_doc(), 1);
        assert!(segment.is_live(0));
        assert_eq!(segment.field_length(0).unwrap(), 3);

        let mut postings = segment.postings("word", "a").unwrap().unwrap();
        assert_eq!(postings.doc(), NOT_STARTED_DOC);
        assert_eq!(postings.next_doc().unwrap(), 0);
        assert_eq!(postings.freq(), 2);
        assert_eq!(positions(postings.as_mut()), vec![0, 2]);
        assert!(postings.payload().is_none());
        assert_eq!(postings.next_doc().unwrap(), NO_MORE_DOCS);

        let mut advanced = segment.postings("word", "b").unwrap().unwrap();
        assert_eq!(advanced.advance(0).unwrap(), 0);
        assert_eq!(positions(advanced.as_mut()), vec![1]);

        assert!(segment.postings("word", "zebra").unwrap().is_none());
        assert!(matches!(
            segment.postings("entity", "a"),
            Err(SpanError::UnknownAnnotation(_))
        ));
    }

    #[test]
    fn test_tags_indexed_at_element_bounds() {
        let doc = SpanDocument::from_words("d1", "the big dog barked")
            .with_tag_attributes("np", 0, 3, &[("type", "full")])
            .with_tag("s", 0, 4);
        let engine = engine_with(&[doc]);
        let segment = only_segment(&engine);

        let mut starts = segment.postings(TAG_ANNOTATION, "np").unwrap().unwrap();
        starts.next_doc().unwrap();
        assert_eq!(positions(starts.as_mut()), vec![0]);

        let mut ends = segment.postings(END_TAG_ANNOTATION, "s").unwrap().unwrap();
        ends.next_doc().unwrap();
        assert_eq!(positions(ends.as_mut()), vec![4]);

        let mut attribute = segment.postings(TAG_ANNOTATION, "@type=full").unwrap().unwrap();
        attribute.next_doc().unwrap();
        assert_eq!(positions(attribute.as_mut()), vec![0]);
    }

    #[test]
    fn test_empty_elements_are_not_indexed() {
        let doc = SpanDocument::from_words("d1", "a b c")
            .with_tag("s", 0, 3)
            .with_tag("s", 1, 1);
        let engine = engine_with(&[doc]);
        let segment = only_segment(&engine);

        let mut starts = segment.postings(TAG_ANNOTATION, "s").unwrap().unwrap();
        starts.next_doc().unwrap();
        assert_eq!(positions(starts.as_mut()), vec![0]);

        let mut ends = segment.postings(END_TAG_ANNOTATION, "s").unwrap().unwrap();
        ends.next_doc().unwrap();
        assert_eq!(positions(ends.as_mut()), vec![3]);
    }

    #[test]
    fn test_stored_forward_index() {
        let doc = SpanDocument::new("d1")
            .with_annotation("word", ["a", "b", "a"])
            .with_annotation("lemma", ["x", "y", "x"]);
        let engine = engine_with(&[doc]);
        let segment = only_segment(&engine);

        let a = segment.term_id("word", "a").unwrap().unwrap();
        let b = segment.term_id("word", "b").unwrap().unwrap();
        assert_ne!(a, b);
        assert!(segment.term_id("word", "zebra").unwrap().is_none());

        let mut tokens = Vec::new();
        segment.document_tokens(0, "word", &mut tokens).unwrap();
        assert_eq!(tokens, vec![a, b, a]);
        assert_eq!(segment.token_id_at(0, "word", 1).unwrap(), b);
        assert_eq!(segment.doc_length(0).unwrap(), 3);

        let x = segment.term_id("lemma", "x").unwrap().unwrap();
        assert_eq!(segment.token_id_at(0, "lemma", 2).unwrap(), x);
    }

    #[test]
    fn test_forward_index_requires_stored_annotations() {
        let mut config = SpanConfig::default();
        config.schema.store_annotations = false;
        let mut engine = SpanEngine::in_ram(config).unwrap();
        engine.add_document(&SpanDocument::from_words("d1", "a b")).unwrap();
        engine.commit().unwrap();
        let segment = only_segment(&engine);
        let mut tokens = Vec::new();
        let err = segment.document_tokens(0, "word", &mut tokens).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_stats_and_expansion() {
        let engine = engine_with(&[
            SpanDocument::from_words("d1", "cat car cat"),
            SpanDocument::from_words("d2", "dog cat"),
        ]);
        let searcher = engine.searcher();
        let stats = TantivyStats::new(&searcher, &engine.fields);

        assert_eq!(stats.total_term_freq("word", "cat").unwrap(), 3);
        assert_eq!(stats.total_term_freq("word", "zebra").unwrap(), 0);
        assert_eq!(stats.sum_total_term_freq("word").unwrap(), 5);
        assert!(stats.has_forward_index("word"));
        assert!(!stats.has_forward_index(TAG_ANNOTATION));

        assert_eq!(stats.expand_terms("word", "ca.*", 10).unwrap(), vec!["car", "cat"]);
        assert_eq!(stats.expand_terms("word", "ca.*", 1).unwrap(), vec!["car"]);
        assert!(stats.expand_terms("word", "z.*", 10).unwrap().is_empty());

        let err = stats.expand_terms("word", "(ca", 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rewrite);
    }
}
