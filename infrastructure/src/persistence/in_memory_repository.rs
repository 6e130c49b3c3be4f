use super::author_registry::AuthorRegistry;
use application::{ApplicationError, DocumentRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Author, AuthorId, Document, DocumentId, DomainError, IdSequence, SearchRequest, StoreConfig,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// A document as kept by the store: the author is a handle into the registry.
#[derive(Debug, Clone)]
struct StoredDocument {
    id: DocumentId,
    title: String,
    content: String,
    author_id: AuthorId,
    created: DateTime<Utc>,
}

/// Everything a save has to change together, kept behind one lock.
#[derive(Debug)]
struct StoreState {
    config: StoreConfig,
    // Insertion order is the order searches report in
    documents: Vec<StoredDocument>,
    authors: AuthorRegistry,
    document_ids: IdSequence,
    author_ids: IdSequence,
}

impl StoreState {
    fn new(config: StoreConfig) -> Self {
        Self {
            document_ids: IdSequence::new(config.document_id_prefix.clone()),
            author_ids: IdSequence::new(config.author_id_prefix.clone()),
            documents: Vec::new(),
            authors: AuthorRegistry::default(),
            config,
        }
    }

    fn position(&self, id: &DocumentId) -> Option<usize> {
        self.documents.iter().position(|d| &d.id == id)
    }

    fn view(&self, stored: &StoredDocument) -> Document {
        Document {
            id: Some(stored.id.clone()),
            title: stored.title.clone(),
            content: stored.content.clone(),
            author: self.authors.author(&stored.author_id),
            created: Some(stored.created),
        }
    }

    fn save(
        &mut self,
        document: Document,
        now: DateTime<Utc>,
    ) -> Result<Document, DomainError> {
        match document.id.as_ref().and_then(|id| self.position(id)) {
            Some(index) => self.update(index, document),
            None => self.insert(document, now),
        }
    }

    fn insert(
        &mut self,
        document: Document,
        created: DateTime<Utc>,
    ) -> Result<Document, DomainError> {
        let id = DocumentId::new(self.document_ids.next_id()?);
        if let Some(requested) = &document.id {
            debug!(requested = %requested, assigned = %id, "Unknown document id, inserting under a new id");
        }
        let title = if document.title.is_empty() {
            self.config.derive_title(&document.content)
        } else {
            document.title
        };
        let author_id = self
            .authors
            .resolve(&document.author.name, &mut self.author_ids)?;

        let stored = StoredDocument {
            id,
            title,
            content: document.content,
            author_id,
            created,
        };
        debug!(doc_id = %stored.id, author_id = %stored.author_id, "Inserting document");
        let view = self.view(&stored);
        self.documents.push(stored);
        Ok(view)
    }

    /// Overwrites title, content and author in place. The title is taken as
    /// given and the author is never looked up by name.
    fn update(&mut self, index: usize, document: Document) -> Result<Document, DomainError> {
        let author_id = self.supplied_author(&document.author)?;
        let stored = &mut self.documents[index];
        stored.title = document.title;
        stored.content = document.content;
        stored.author_id = author_id;
        debug!(doc_id = %stored.id, author_id = %stored.author_id, "Updated document in place");
        let stored = stored.clone();
        Ok(self.view(&stored))
    }

    /// Records an author exactly as supplied on update. One carrying an id is
    /// registered under that id with the supplied name; one without an id gets
    /// a fresh id of its own and is not merged with a same-named author.
    fn supplied_author(&mut self, author: &Author) -> Result<AuthorId, DomainError> {
        let id = match &author.id {
            Some(id) => {
                self.author_ids.observe(id.as_str());
                id.clone()
            }
            None => {
                let id = AuthorId::new(self.author_ids.next_id()?);
                debug!(author_id = %id, author = %author.name, "Registering author supplied without an id");
                id
            }
        };
        self.authors.register(&id, &author.name);
        Ok(id)
    }

    /// Adds caller-provided documents as they are, filling in what a stored
    /// record cannot be without: an id, a creation time and an author handle.
    fn preload(
        &mut self,
        documents: Vec<Document>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        // Claim every provided id first so generated ones cannot collide with later entries.
        for document in &documents {
            if let Some(id) = &document.id {
                self.document_ids.observe(id.as_str());
            }
            if let Some(id) = &document.author.id {
                self.author_ids.observe(id.as_str());
            }
        }

        for document in documents {
            let id = match document.id {
                Some(id) if self.position(&id).is_none() => id,
                Some(duplicate) => {
                    let id = DocumentId::new(self.document_ids.next_id()?);
                    debug!(duplicate = %duplicate, assigned = %id, "Re-keying duplicate preloaded document");
                    id
                }
                None => DocumentId::new(self.document_ids.next_id()?),
            };
            // Seeded authors without an id are de-duplicated by name, as on insert.
            let author_id = match &document.author.id {
                Some(_) => self.supplied_author(&document.author)?,
                None => self
                    .authors
                    .resolve(&document.author.name, &mut self.author_ids)?,
            };
            self.documents.push(StoredDocument {
                id,
                title: document.title,
                content: document.content,
                author_id,
                created: document.created.unwrap_or(now),
            });
        }
        Ok(())
    }
}

// --- Document Repository Implementation ---

/// In-memory document store.
///
/// Records, the author registry and both id counters sit behind a single
/// `RwLock`, so a save assigns ids and appends atomically. Clones share state.
#[derive(Debug, Clone)]
pub struct InMemoryDocumentRepository {
    state: Arc<RwLock<StoreState>>,
}

impl Default for InMemoryDocumentRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentRepository {
    /// Empty store with the default configuration.
    pub fn new() -> Self {
        Self::from_state(StoreState::new(StoreConfig::default()))
    }

    /// Empty store with a custom configuration.
    pub fn with_config(config: StoreConfig) -> Result<Self, DomainError> {
        let config = config.validate()?;
        Ok(Self::from_state(StoreState::new(config)))
    }

    /// Store seeded with an initial collection, kept in the given order.
    ///
    /// Missing ids and creation times are filled in; duplicate ids are
    /// re-keyed. Generated ids continue after the highest preloaded one.
    pub fn with_documents(
        config: StoreConfig,
        documents: Vec<Document>,
    ) -> Result<Self, DomainError> {
        let config = config.validate()?;
        let count = documents.len();
        let mut state = StoreState::new(config);
        state.preload(documents, Utc::now())?;
        info!(
            documents = count,
            authors = state.authors.len(),
            "Seeded in-memory document store"
        );
        Ok(Self::from_state(state))
    }

    fn from_state(state: StoreState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.documents.is_empty()
    }

    /// Every author known to the store, in registration order.
    pub async fn authors(&self) -> Vec<Author> {
        self.state.read().await.authors.authors()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    #[instrument(skip(self, document), fields(doc_id = ?document.id))]
    async fn save(&self, document: Document) -> Result<Document, ApplicationError> {
        debug!("Saving document to in-memory store");
        let mut state = self.state.write().await;
        Ok(state.save(document, Utc::now())?)
    }

    #[instrument(skip(self, request))]
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Document>, ApplicationError> {
        debug!(unconstrained = request.is_unconstrained(), "Searching in-memory store");
        let state = self.state.read().await;
        let hits: Vec<Document> = state
            .documents
            .iter()
            .map(|stored| state.view(stored))
            .filter(|document| request.matches(document))
            .collect();
        debug!(hits = hits.len(), scanned = state.documents.len(), "Search finished");
        Ok(hits)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<Document>, ApplicationError> {
        debug!(doc_id = %id, "Getting document from in-memory store");
        let state = self.state.read().await;
        Ok(state
            .documents
            .iter()
            .find(|stored| stored.id.as_str() == id)
            .map(|stored| state.view(stored)))
    }

    async fn count(&self) -> Result<usize, ApplicationError> {
        Ok(self.len().await)
    }
}
