use domain::{Author, AuthorId, DomainError, IdSequence};
use std::collections::HashMap;
use tracing::debug;

/// Authors known to a store, keyed both by id and by name.
///
/// Documents hold an `AuthorId`; the name lives here only, so renaming an
/// author is visible from every document that references it.
#[derive(Debug, Default)]
pub(crate) struct AuthorRegistry {
    // Author ID -> Name
    names: HashMap<AuthorId, String>,
    // Name -> Author ID, used for de-duplication on insert
    by_name: HashMap<String, AuthorId>,
    // Registration order
    order: Vec<AuthorId>,
}

impl AuthorRegistry {
    /// Returns the author registered under `name`, creating one with the next
    /// id from `ids` if there is none.
    pub(crate) fn resolve(
        &mut self,
        name: &str,
        ids: &mut IdSequence,
    ) -> Result<AuthorId, DomainError> {
        if let Some(id) = self.by_name.get(name) {
            debug!(author_id = %id, author = %name, "Reusing existing author");
            return Ok(id.clone());
        }
        let id = AuthorId::new(ids.next_id()?);
        debug!(author_id = %id, author = %name, "Registering new author");
        self.names.insert(id.clone(), name.to_string());
        self.by_name.insert(name.to_string(), id.clone());
        self.order.push(id.clone());
        Ok(id)
    }

    /// Records `name` for `id` as given, without de-duplicating by name.
    ///
    /// A name that already belongs to another author keeps pointing at that
    /// author for later lookups by name.
    pub(crate) fn register(&mut self, id: &AuthorId, name: &str) {
        match self.names.insert(id.clone(), name.to_string()) {
            Some(previous) => {
                if previous != name && self.by_name.get(&previous) == Some(id) {
                    self.by_name.remove(&previous);
                }
            }
            None => self.order.push(id.clone()),
        }
        self.by_name
            .entry(name.to_string())
            .or_insert_with(|| id.clone());
    }

    pub(crate) fn author(&self, id: &AuthorId) -> Author {
        Author::new(id.clone(), self.names.get(id).cloned().unwrap_or_default())
    }

    /// All authors in registration order.
    pub(crate) fn authors(&self) -> Vec<Author> {
        self.order.iter().map(|id| self.author(id)).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }
}
