//! Entity service capabilities.
//!
//! These traits define the interface the resolution strategies consume from
//! the surrounding platform. An in-memory backend is provided for embedded
//! use and tests.

pub mod memory;
mod traits;

pub use memory::{InMemoryEntityService, InMemoryServices};
pub use traits::{
    EntityRecord, EntityServices, NamedEntityService, Page, PageLink, TitleSearchService,
};
