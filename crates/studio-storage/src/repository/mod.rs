//! Repository implementations for database operations.

mod collection;

pub use collection::{Collection, CollectionRepo, Record};
