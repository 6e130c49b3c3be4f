mod author_registry;
pub mod in_memory_repository;

pub use in_memory_repository::InMemoryDocumentRepository;
