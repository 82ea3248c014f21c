//! In-memory document storage with optimistic versioning.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use quire_sync::persist::{DocumentRecord, SaveRequest, SaveResponse, SavedDocument};
use smol_str::SmolStr;
use tracing::{debug, info};

use crate::config::SeedDocument;

#[derive(Debug, Clone)]
struct StoredDocument {
    name: SmolStr,
    markdown: String,
    version: i64,
    updated_at: DateTime<Utc>,
}

/// Stored documents keyed by id.
#[derive(Debug, Default)]
pub struct DocumentRepo {
    documents: DashMap<i64, StoredDocument>,
}

impl DocumentRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repo pre-populated with `seeds`.
    pub fn with_seeds(seeds: &[SeedDocument]) -> Self {
        let repo = Self::new();
        for seed in seeds {
            repo.insert(seed.doc_id, seed.name.as_str(), &seed.markdown);
        }
        if !seeds.is_empty() {
            info!(count = seeds.len(), "seeded documents");
        }
        repo
    }

    /// Create or replace a document at version 1.
    pub fn insert(&self, doc_id: i64, name: impl Into<SmolStr>, markdown: &str) {
        self.documents.insert(
            doc_id,
            StoredDocument {
                name: name.into(),
                markdown: markdown.to_owned(),
                version: 1,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn get(&self, doc_id: i64) -> Option<DocumentRecord> {
        self.documents.get(&doc_id).map(|doc| DocumentRecord {
            doc_id,
            doc_name: doc.name.clone(),
            markdown: doc.markdown.clone(),
            version: doc.version,
        })
    }

    /// Stored markdown, if the document exists.
    pub fn markdown(&self, doc_id: i64) -> Option<String> {
        self.documents.get(&doc_id).map(|doc| doc.markdown.clone())
    }

    pub fn updated_at(&self, doc_id: i64) -> Option<DateTime<Utc>> {
        self.documents.get(&doc_id).map(|doc| doc.updated_at)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Save if `request.version` matches the stored version, or `cover` is set.
    pub fn save(&self, doc_id: i64, request: &SaveRequest) -> SaveResponse {
        let Some(mut doc) = self.documents.get_mut(&doc_id) else {
            return SaveResponse::not_found();
        };

        if !request.cover && request.version != doc.version {
            debug!(
                doc_id,
                stored = doc.version,
                based_on = request.version,
                "save rejected, version conflict"
            );
            return SaveResponse::conflict(SavedDocument {
                doc_id,
                version: doc.version,
            });
        }

        doc.markdown.clone_from(&request.markdown);
        doc.version += 1;
        doc.updated_at = Utc::now();
        metrics::counter!("quire_documents_saved_total").increment(1);
        debug!(doc_id, version = doc.version, cover = request.cover, "document saved");

        SaveResponse::ok(SavedDocument {
            doc_id,
            version: doc.version,
        })
    }
}
