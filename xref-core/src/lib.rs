//! xref core library: domain types, repository traits, stores, config.
//!
//! - [`types`]: [`IdentifierRecord`] and supporting newtypes
//! - [`repository`]: [`IdentifierRepository`] / [`GeneRepository`]
//! - [`store`]: JSON-file and in-memory repository implementations
//! - [`config`]: YAML [`SyncConfig`] load / save / init
//! - [`error`]: [`StoreError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod repository;
pub mod store;
pub mod types;

pub use config::SyncConfig;
pub use error::{ConfigError, StoreError};
pub use repository::{GeneRepository, IdentifierRepository};
pub use store::{GeneTable, JsonStore, MemoryStore, StoreData};
pub use types::{
    ExternalAccession, Gene, GeneKind, IdentifierRecord, NamespaceKey, RecordKey, SourcePipeline,
    Species, SubjectId,
};
