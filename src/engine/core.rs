//! Core SpanEngine struct and constructor

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tantivy::directory::MmapDirectory;
use tantivy::schema::Schema;
use tantivy::{Index, IndexReader, IndexWriter};

use crate::engine::config::SpanConfig;
use crate::engine::constants::{ANNOTATION_TOKENIZER, TAG_TOKENIZER};
use crate::engine::schema::build_schema;
use crate::tantivy_integration::{AnnotationTokenizer, IndexFields, TagTokenizer};

/// Span search over a tantivy index of token documents
pub struct SpanEngine {
    pub(crate) index: Index,
    pub(crate) reader: IndexReader,
    pub(crate) writer: Option<IndexWriter>,
    pub(crate) schema: Schema,
    pub(crate) fields: Arc<IndexFields>,
    pub(crate) config: SpanConfig,
}

impl SpanEngine {
    /// Open the index in `index_dir`, creating it if the directory is empty
    pub fn open(index_dir: &Path, config: SpanConfig) -> Result<Self> {
        let schema = build_schema(&config.schema)?;
        let index = Self::open_index(index_dir, schema.clone())?;
        Self::with_index(index, schema, config)
    }

    /// Open with the configuration found in `config_path`, or the default one
    pub fn from_path(index_dir: &str, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => SpanConfig::from_yaml_file(path)?,
            None => SpanConfig::default(),
        };
        Self::open(Path::new(index_dir), config)
    }

    /// Engine over an index held in memory
    pub fn in_ram(config: SpanConfig) -> Result<Self> {
        let schema = build_schema(&config.schema)?;
        let index = Index::create_in_ram(schema.clone());
        Self::with_index(index, schema, config)
    }

    fn with_index(index: Index, schema: Schema, config: SpanConfig) -> Result<Self> {
        Self::register_tokenizers(&index);
        let reader = index.reader()?;
        let writer = Self::try_create_writer(&index)?;
        let fields = IndexFields::from_schema(&schema, &config.schema.annotations)
            .map_err(|e| anyhow!("Index schema does not match the configuration: {}", e))?;
        log::info!(
            "Opened span index: {} documents in {} segments",
            reader.searcher().num_docs(),
            reader.searcher().segment_readers().len()
        );
        Ok(Self {
            index,
            reader,
            writer,
            schema,
            fields: Arc::new(fields),
            config,
        })
    }

    fn open_index(index_dir: &Path, schema: Schema) -> Result<Index> {
        let dir = MmapDirectory::open(index_dir)?;
        Ok(Index::open_or_create(dir, schema)?)
    }

    fn register_tokenizers(index: &Index) {
        index.tokenizers().register(ANNOTATION_TOKENIZER, AnnotationTokenizer);
        index.tokenizers().register(TAG_TOKENIZER, TagTokenizer);
        log::info!("Registered position-aware tokenizers (annotation and tag)");
    }

    fn try_create_writer(index: &Index) -> Result<Option<IndexWriter>> {
        match index.writer(50_000_000) {
            Ok(w) => Ok(Some(w)),
            Err(tantivy::TantivyError::LockFailure(e, _)) => {
                log::warn!("Could not acquire index lock, running in READ-ONLY mode: {}", e);
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::from(e)),
        }
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn num_segments(&self) -> usize {
        self.reader.searcher().segment_readers().len()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &SpanConfig {
        &self.config
    }

    pub fn searcher(&self) -> tantivy::Searcher {
        self.reader.searcher()
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn is_read_only(&self) -> bool {
        self.writer.is_none()
    }
}
