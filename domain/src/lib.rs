use chrono::{DateTime, Utc}; // Creation timestamps
use serde::{Deserialize, Serialize}; // Documents and requests cross the API boundary as JSON
use std::fmt;
use thiserror::Error; // For domain-specific errors

// --- Domain Errors ---
#[derive(Error, Debug, PartialEq)]
pub enum DomainError {
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),
    #[error("Id sequence '{0}' is exhausted")]
    IdSpaceExhausted(String),
}

// --- Identifiers ---

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}
impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuthorId(String);

impl AuthorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<String> for AuthorId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}
impl From<&str> for AuthorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Largest caller-supplied number an [`IdSequence`] will skip past. Anything
/// above is left alone so the counter always has room to keep counting.
pub const MAX_OBSERVED_ID: u64 = u64::MAX / 2;

/// Hands out `<PREFIX>-<n>` identifiers from a counter that starts at 0 and is
/// incremented before each use, so the first value is `<PREFIX>-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSequence {
    prefix: String,
    last: u64,
}

impl IdSequence {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            last: 0,
        }
    }

    /// The last number handed out (0 if none yet).
    pub fn last(&self) -> u64 {
        self.last
    }

    /// Next identifier, or `IdSpaceExhausted` once the counter cannot advance.
    pub fn next_id(&mut self) -> Result<String, DomainError> {
        self.last = self
            .last
            .checked_add(1)
            .ok_or_else(|| DomainError::IdSpaceExhausted(self.prefix.clone()))?;
        Ok(format!("{}-{}", self.prefix, self.last))
    }

    /// Moves the counter past `id` when it has the shape this sequence produces
    /// and its number is at most [`MAX_OBSERVED_ID`].
    pub fn observe(&mut self, id: &str) {
        let seen = id
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|n| n.parse::<u64>().ok())
            .filter(|n| *n <= MAX_OBSERVED_ID);
        if let Some(n) = seen {
            self.last = self.last.max(n);
        }
    }
}

// --- Store Configuration ---

pub const DEFAULT_DOCUMENT_ID_PREFIX: &str = "DOC";
pub const DEFAULT_AUTHOR_ID_PREFIX: &str = "AUTH";
pub const DEFAULT_TITLE_LENGTH: usize = 25;
pub const DEFAULT_UNTITLED_TITLE: &str = "Untitled";

/// Tunables for id generation and title derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub document_id_prefix: String,
    pub author_id_prefix: String,
    /// Number of characters of content used as a derived title.
    pub title_length: usize,
    /// Title given to a document inserted with neither title nor content.
    pub untitled_title: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            document_id_prefix: DEFAULT_DOCUMENT_ID_PREFIX.to_string(),
            author_id_prefix: DEFAULT_AUTHOR_ID_PREFIX.to_string(),
            title_length: DEFAULT_TITLE_LENGTH,
            untitled_title: DEFAULT_UNTITLED_TITLE.to_string(),
        }
    }
}

impl StoreConfig {
    /// Checks the configuration and returns it unchanged if usable.
    pub fn validate(self) -> Result<Self, DomainError> {
        if self.document_id_prefix.trim().is_empty() || self.author_id_prefix.trim().is_empty() {
            return Err(DomainError::InvalidConfig(
                "Id prefixes must be non-empty.".to_string(),
            ));
        }
        if self.document_id_prefix == self.author_id_prefix {
            return Err(DomainError::InvalidConfig(format!(
                "Document and author id prefixes must differ (both '{}')",
                self.document_id_prefix
            )));
        }
        if self.title_length == 0 {
            return Err(DomainError::InvalidConfig(
                "Title length must be at least 1.".to_string(),
            ));
        }
        if self.untitled_title.is_empty() {
            return Err(DomainError::InvalidConfig(
                "Untitled title must be non-empty.".to_string(),
            ));
        }
        Ok(self)
    }

    /// Title used when a document is inserted without one: the untitled
    /// sentinel for empty content, otherwise the leading `title_length`
    /// characters of the content.
    pub fn derive_title(&self, content: &str) -> String {
        if content.is_empty() {
            return self.untitled_title.clone();
        }
        content.chars().take(self.title_length).collect()
    }
}

// --- Authors and Documents ---

/// A named author. Authors are de-duplicated by `name`; the id is assigned by the store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Author {
    #[serde(default)]
    pub id: Option<AuthorId>,
    pub name: String,
}

impl Author {
    /// An author known only by name, as supplied by callers before saving.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn new(id: AuthorId, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }
}

/// A document as exchanged with the store.
///
/// `id` and `created` are `None` on documents that were never saved; every
/// document handed back by a store carries both.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    #[serde(default)]
    pub id: Option<DocumentId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub author: Author,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(title: impl Into<String>, content: impl Into<String>, author: Author) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
            author,
            created: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<DocumentId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    pub fn author_id(&self) -> Option<&AuthorId> {
        self.author.id.as_ref()
    }
}

// --- Search ---

/// Search criteria. Groups are combined with AND, the alternatives inside a
/// group with OR. An empty group places no constraint.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SearchRequest {
    pub title_prefixes: Vec<String>,
    pub contains_contents: Vec<String>,
    pub author_ids: Vec<AuthorId>,
    /// Inclusive lower bound on `created`, compared at millisecond resolution.
    pub created_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created`, compared at millisecond resolution.
    pub created_to: Option<DateTime<Utc>>,
}

impl SearchRequest {
    pub fn builder() -> SearchRequestBuilder {
        SearchRequestBuilder::default()
    }

    /// True when no criterion is set, i.e. every document matches.
    pub fn is_unconstrained(&self) -> bool {
        self.title_prefixes.is_empty()
            && self.contains_contents.is_empty()
            && self.author_ids.is_empty()
            && self.created_from.is_none()
            && self.created_to.is_none()
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.matches_title(&document.title)
            && self.matches_content(&document.content)
            && self.matches_author(document.author_id())
            && self.matches_created(document.created)
    }

    fn matches_title(&self, title: &str) -> bool {
        self.title_prefixes.is_empty()
            || self
                .title_prefixes
                .iter()
                .any(|prefix| title.starts_with(prefix.as_str()))
    }

    fn matches_content(&self, content: &str) -> bool {
        self.contains_contents.is_empty()
            || self
                .contains_contents
                .iter()
                .any(|needle| content.contains(needle.as_str()))
    }

    fn matches_author(&self, author_id: Option<&AuthorId>) -> bool {
        if self.author_ids.is_empty() {
            return true;
        }
        author_id.is_some_and(|id| self.author_ids.contains(id))
    }

    fn matches_created(&self, created: Option<DateTime<Utc>>) -> bool {
        if self.created_from.is_none() && self.created_to.is_none() {
            return true;
        }
        // An unsaved document has no creation time and cannot satisfy a date bound.
        let Some(created) = created else {
            return false;
        };
        // Millisecond resolution, so a bound taken from a rendered timestamp still hits.
        let created = created.timestamp_millis();
        self.created_from
            .is_none_or(|from| created >= from.timestamp_millis())
            && self
                .created_to
                .is_none_or(|to| created <= to.timestamp_millis())
    }
}

/// Fluent construction of a [`SearchRequest`].
#[derive(Debug, Clone, Default)]
pub struct SearchRequestBuilder {
    request: SearchRequest,
}

impl SearchRequestBuilder {
    pub fn title_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.request.title_prefixes.push(prefix.into());
        self
    }

    pub fn contains_content(mut self, needle: impl Into<String>) -> Self {
        self.request.contains_contents.push(needle.into());
        self
    }

    pub fn author_id(mut self, id: impl Into<AuthorId>) -> Self {
        self.request.author_ids.push(id.into());
        self
    }

    pub fn created_from(mut self, from: DateTime<Utc>) -> Self {
        self.request.created_from = Some(from);
        self
    }

    pub fn created_to(mut self, to: DateTime<Utc>) -> Self {
        self.request.created_to = Some(to);
        self
    }

    pub fn build(self) -> SearchRequest {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    fn saved(id: &str, title: &str, content: &str, author: &str, created: i64) -> Document {
        Document::new(title, content, Author::new(AuthorId::new(author), "someone"))
            .with_id(id)
            .with_created(at(created))
    }

    #[test]
    fn id_sequence_starts_at_one_and_increments() {
        let mut seq = IdSequence::new("DOC");
        assert_eq!(seq.last(), 0);
        assert_eq!(seq.next_id(), Ok("DOC-1".to_string()));
        assert_eq!(seq.next_id(), Ok("DOC-2".to_string()));
        assert_eq!(seq.last(), 2);
    }

    #[test]
    fn id_sequence_observe_skips_past_seen_ids() {
        let mut seq = IdSequence::new("DOC");
        seq.observe("DOC-7");
        seq.observe("DOC-3"); // lower numbers never move the counter back
        seq.observe("AUTH-40"); // other prefixes are ignored
        seq.observe("DOC-abc");
        seq.observe("DOCX-90");
        assert_eq!(seq.next_id(), Ok("DOC-8".to_string()));
    }

    #[test]
    fn id_sequence_observe_ignores_numbers_past_the_cap() {
        let mut seq = IdSequence::new("AUTH");
        seq.observe("AUTH-3");
        seq.observe(&format!("AUTH-{}", u64::MAX));
        seq.observe(&format!("AUTH-{}", MAX_OBSERVED_ID + 1));
        assert_eq!(seq.next_id(), Ok("AUTH-4".to_string()));

        seq.observe(&format!("AUTH-{}", MAX_OBSERVED_ID));
        assert_eq!(seq.last(), MAX_OBSERVED_ID);
        assert!(seq.next_id().is_ok());
    }

    #[test]
    fn id_sequence_reports_exhaustion_instead_of_wrapping() {
        let mut seq = IdSequence {
            prefix: "AUTH".to_string(),
            last: u64::MAX - 1,
        };
        assert_eq!(seq.next_id(), Ok(format!("AUTH-{}", u64::MAX)));
        assert_eq!(
            seq.next_id(),
            Err(DomainError::IdSpaceExhausted("AUTH".to_string()))
        );
        assert_eq!(seq.last(), u64::MAX);
    }

    #[test]
    fn derive_title_takes_leading_characters() {
        let config = StoreConfig::default();
        assert_eq!(
            config.derive_title("Quarterly financial report for Q3 2024 earnings"),
            "Quarterly financial repor"
        );
        assert_eq!(config.derive_title("short note"), "short note");
        assert_eq!(config.derive_title(""), "Untitled");
    }

    #[test]
    fn derive_title_counts_characters_not_bytes() {
        let config = StoreConfig {
            title_length: 3,
            ..StoreConfig::default()
        };
        assert_eq!(config.derive_title("héllo wörld"), "hél");
        assert_eq!(config.derive_title("日本語のテキスト"), "日本語");
    }

    #[test]
    fn config_validation_rejects_unusable_values() {
        assert!(StoreConfig::default().validate().is_ok());

        let empty_prefix = StoreConfig {
            document_id_prefix: "  ".to_string(),
            ..StoreConfig::default()
        };
        assert!(
            matches!(empty_prefix.validate(), Err(DomainError::InvalidConfig(msg)) if msg.contains("prefixes"))
        );

        let same_prefix = StoreConfig {
            author_id_prefix: "DOC".to_string(),
            ..StoreConfig::default()
        };
        assert!(matches!(
            same_prefix.validate(),
            Err(DomainError::InvalidConfig(_))
        ));

        let zero_length = StoreConfig {
            title_length: 0,
            ..StoreConfig::default()
        };
        assert!(
            matches!(zero_length.validate(), Err(DomainError::InvalidConfig(msg)) if msg.contains("Title length"))
        );
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"title_length": 10}"#).expect("config parses");
        assert_eq!(config.title_length, 10);
        assert_eq!(config.document_id_prefix, "DOC");
        assert_eq!(config.untitled_title, "Untitled");
    }

    #[test]
    fn empty_request_matches_everything() {
        let request = SearchRequest::default();
        assert!(request.is_unconstrained());
        assert!(request.matches(&saved("DOC-1", "a", "b", "AUTH-1", 0)));
        assert!(request.matches(&Document::new("", "", Author::named("x"))));
    }

    #[test]
    fn groups_combine_with_and_alternatives_with_or() {
        let d1 = saved("DOC-1", "Alpha notes", "budget", "AUTH-1", 0);
        let d2 = saved("DOC-2", "Beta notes", "forecast", "AUTH-1", 0);
        let d3 = saved("DOC-3", "Alpha plan", "forecast", "AUTH-1", 0);

        let request = SearchRequest::builder()
            .title_prefix("Alpha")
            .contains_content("forecast")
            .build();
        assert!(!request.matches(&d1));
        assert!(!request.matches(&d2));
        assert!(request.matches(&d3));

        let either_title = SearchRequest::builder()
            .title_prefix("Beta")
            .title_prefix("Alpha p")
            .build();
        assert!(!either_title.matches(&d1));
        assert!(either_title.matches(&d2));
        assert!(either_title.matches(&d3));
    }

    #[test]
    fn title_prefix_is_case_sensitive_and_anchored() {
        let doc = saved("DOC-1", "Alpha notes", "", "AUTH-1", 0);
        assert!(!SearchRequest::builder().title_prefix("alpha").build().matches(&doc));
        assert!(!SearchRequest::builder().title_prefix("notes").build().matches(&doc));
        assert!(SearchRequest::builder().title_prefix("").build().matches(&doc));
    }

    #[test]
    fn author_filter_requires_membership() {
        let doc = saved("DOC-1", "t", "c", "AUTH-2", 0);
        let hit = SearchRequest::builder()
            .author_id("AUTH-1")
            .author_id("AUTH-2")
            .build();
        let miss = SearchRequest::builder().author_id("AUTH-3").build();
        assert!(hit.matches(&doc));
        assert!(!miss.matches(&doc));

        let anonymous = Document::new("t", "c", Author::named("nobody"));
        assert!(!hit.matches(&anonymous));
    }

    #[test]
    fn created_bounds_are_inclusive() {
        let doc = saved("DOC-1", "t", "c", "AUTH-1", 1_000);
        let exact = at(1_000);

        let from = SearchRequest::builder().created_from(exact).build();
        let to = SearchRequest::builder().created_to(exact).build();
        let both = SearchRequest::builder()
            .created_from(exact)
            .created_to(exact)
            .build();
        assert!(from.matches(&doc));
        assert!(to.matches(&doc));
        assert!(both.matches(&doc));

        let later = SearchRequest::builder()
            .created_from(exact + Duration::milliseconds(1))
            .build();
        let earlier = SearchRequest::builder()
            .created_to(exact - Duration::milliseconds(1))
            .build();
        assert!(!later.matches(&doc));
        assert!(!earlier.matches(&doc));
    }

    #[test]
    fn created_bounds_compare_whole_milliseconds() {
        let created = at(1_000) + Duration::microseconds(500);
        let doc = saved("DOC-1", "t", "c", "AUTH-1", 0).with_created(created);

        let same_ms_later = SearchRequest::builder()
            .created_from(at(1_000) + Duration::microseconds(900))
            .build();
        let same_ms_earlier = SearchRequest::builder()
            .created_to(at(1_000) + Duration::microseconds(100))
            .build();
        assert!(same_ms_later.matches(&doc));
        assert!(same_ms_earlier.matches(&doc));

        let next_ms = SearchRequest::builder()
            .created_from(at(1_000) + Duration::milliseconds(1))
            .build();
        assert!(!next_ms.matches(&doc));
    }

    #[test]
    fn date_bound_excludes_unsaved_documents() {
        let unsaved = Document::new("t", "c", Author::named("x"));
        let request = SearchRequest::builder().created_from(at(0)).build();
        assert!(!request.matches(&unsaved));
    }

    #[test]
    fn search_request_deserializes_partial_json() {
        let request: SearchRequest = serde_json::from_str(
            r#"{"title_prefixes": ["Alpha"], "created_to": "2024-01-01T00:00:00Z"}"#,
        )
        .expect("request parses");
        assert_eq!(request.title_prefixes, vec!["Alpha".to_string()]);
        assert!(request.contains_contents.is_empty());
        assert!(request.author_ids.is_empty());
        assert!(request.created_from.is_none());
        assert_eq!(request.created_to, Some(at(1_704_067_200)));
    }

    #[test]
    fn document_ids_serialize_as_plain_strings() {
        let doc = saved("DOC-4", "t", "c", "AUTH-9", 0);
        let json = serde_json::to_value(&doc).expect("document serializes");
        assert_eq!(json["id"], "DOC-4");
        assert_eq!(json["author"]["id"], "AUTH-9");
    }
}
