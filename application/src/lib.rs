use async_trait::async_trait;
use domain::{Document, DomainError, SearchRequest};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

// --- Application Errors ---
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Domain validation error: {0}")]
    DomainError(#[from] DomainError), // Propagate domain errors cleanly
}

// --- Infrastructure Interfaces (Traits) ---

/// Interface for storing, looking up and searching documents.
///
/// Implementations own id generation, title defaulting and author
/// de-duplication; callers hand in documents as they have them.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Inserts or updates a document and returns it as stored.
    ///
    /// A document without an id, or with an id the repository does not know,
    /// is inserted under a freshly generated id. A known id updates title,
    /// content and author in place; the creation time never changes.
    async fn save(&self, document: Document) -> Result<Document, ApplicationError>;
    /// Returns the documents matching every criterion of `request`, in insertion order.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Document>, ApplicationError>;
    /// Retrieves a document by its id.
    async fn find_by_id(&self, id: &str) -> Result<Option<Document>, ApplicationError>;
    /// Number of stored documents.
    async fn count(&self) -> Result<usize, ApplicationError>;
}

// --- Application Services (Use Cases) ---

/// Service for saving, fetching and searching documents.
///
/// Checks the caller input the repository takes on trust before handing it on.
pub struct DocumentService {
    repository: Arc<dyn DocumentRepository>,
}

impl DocumentService {
    pub fn new(repository: Arc<dyn DocumentRepository>) -> Self {
        Self { repository }
    }

    #[instrument(skip(self, document), fields(doc_id = ?document.id, author = %document.author.name))]
    pub async fn save_document(&self, document: Document) -> Result<Document, ApplicationError> {
        info!("Attempting to save document");

        if document.author.name.trim().is_empty() {
            warn!("Save rejected: author name is blank");
            return Err(ApplicationError::InvalidInput(
                "Author name must not be empty".to_string(),
            ));
        }

        let saved = self.repository.save(document).await?;
        info!(
            doc_id = ?saved.id,
            author_id = ?saved.author.id,
            "Document saved successfully"
        );
        Ok(saved)
    }

    #[instrument(skip(self, request))]
    pub async fn search_documents(
        &self,
        request: SearchRequest,
    ) -> Result<Vec<Document>, ApplicationError> {
        info!(
            title_prefixes = request.title_prefixes.len(),
            contains_contents = request.contains_contents.len(),
            author_ids = request.author_ids.len(),
            has_date_range = request.created_from.is_some() || request.created_to.is_some(),
            "Attempting to search documents"
        );

        if let (Some(from), Some(to)) = (request.created_from, request.created_to) {
            if from.timestamp_millis() > to.timestamp_millis() {
                debug!(%from, %to, "Date range is empty, nothing can match");
                return Ok(Vec::new());
            }
        }

        let hits = self.repository.search(&request).await?;
        info!(hits = hits.len(), "Search successful");
        Ok(hits)
    }

    /// Looks a document up by id; absence is a normal outcome.
    #[instrument(skip(self))]
    pub async fn find_document(&self, id: &str) -> Result<Option<Document>, ApplicationError> {
        debug!(doc_id = %id, "Looking up document");
        self.repository.find_by_id(id).await
    }

    /// Like [`find_document`](Self::find_document), but a missing id is an error.
    #[instrument(skip(self))]
    pub async fn get_document(&self, id: &str) -> Result<Document, ApplicationError> {
        info!(doc_id = %id, "Attempting to retrieve document");
        self.repository.find_by_id(id).await?.ok_or_else(|| {
            warn!(doc_id = %id, "Document not found");
            ApplicationError::NotFound(id.to_string())
        })
    }

    pub async fn document_count(&self) -> Result<usize, ApplicationError> {
        self.repository.count().await
    }
}
