//! Entity resolution (spec §4.2): canonical person/organization/address
//! records, exact + fuzzy matching, and merge-on-duplicate-identifier.

pub mod repository;
pub mod resolver;
pub mod types;

pub use repository::{EntityRepository, InMemoryEntityRepository, PostgresEntityRepository};
pub use resolver::{EntityResolver, MatchOutcome, SubjectIdentifiers};
pub use types::{
    Entity, EntityProfile, EntityRelation, EntityType, Identifier, IdentifierKind, RelationType,
};
