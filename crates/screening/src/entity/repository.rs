use super::types::{Entity, EntityProfile, EntityRelation, Identifier, IdentifierKind};
use async_trait::async_trait;
use dashmap::DashMap;
use screening_core::error::Result;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Storage contract for entity resolution (spec §4.2, §6 persistence). A
/// single trait so the resolver can run against either the Postgres-backed
/// implementation or the in-memory fake used by tests.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    async fn find_by_canonical(&self, kind: &IdentifierKind, value: &str) -> Result<Option<Entity>>;

    /// Candidates considered for fuzzy matching. `has_ssn` lets the caller
    /// narrow the candidate pool when an exact identifier family is present
    /// but didn't match (cheap pre-filter, not part of the scoring itself).
    async fn fuzzy_candidates(&self, has_ssn: bool) -> Result<Vec<Entity>>;

    async fn insert(&self, entity: Entity) -> Result<()>;

    async fn add_identifier(&self, identifier: Identifier) -> Result<()>;

    async fn get(&self, entity_id: Uuid) -> Result<Option<Entity>>;

    /// Merge `absorbed` into `survivor`: re-point relations and profiles,
    /// union identifiers deduped by `(kind, value)`, mark `absorbed`
    /// superseded. Does not emit the `ENTITY_MERGED` audit event -- that is
    /// the resolver's responsibility, since only it has the request context.
    async fn merge(&self, survivor: Uuid, absorbed: Uuid) -> Result<()>;

    async fn add_relation(&self, relation: EntityRelation) -> Result<()>;

    async fn relations_for(&self, entity_id: Uuid) -> Result<Vec<EntityRelation>>;

    async fn add_profile(&self, profile: EntityProfile) -> Result<()>;

    async fn latest_profile(&self, entity_id: Uuid) -> Result<Option<EntityProfile>>;
}

/// In-memory fake used by unit/integration tests; no tenant scoping beyond
/// what the resolver itself enforces at the call site.
#[derive(Default)]
pub struct InMemoryEntityRepository {
    entities: DashMap<Uuid, Entity>,
    identifiers: DashMap<Uuid, Vec<Identifier>>,
    relations: DashMap<Uuid, Vec<EntityRelation>>,
    profiles: DashMap<Uuid, Vec<EntityProfile>>,
}

impl InMemoryEntityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityRepository for InMemoryEntityRepository {
    async fn find_by_canonical(&self, kind: &IdentifierKind, value: &str) -> Result<Option<Entity>> {
        Ok(self
            .entities
            .iter()
            .find(|e| !e.is_superseded() && e.canonical_identifiers.get(kind).map(|v| v.as_str()) == Some(value))
            .map(|e| e.clone()))
    }

    async fn fuzzy_candidates(&self, _has_ssn: bool) -> Result<Vec<Entity>> {
        Ok(self.entities.iter().filter(|e| !e.is_superseded()).map(|e| e.clone()).collect())
    }

    async fn insert(&self, entity: Entity) -> Result<()> {
        self.entities.insert(entity.id, entity);
        Ok(())
    }

    async fn add_identifier(&self, identifier: Identifier) -> Result<()> {
        if let Some(mut entity) = self.entities.get_mut(&identifier.entity_id) {
            entity.canonical_identifiers.insert(identifier.kind.clone(), identifier.value.clone());
        }
        self.identifiers.entry(identifier.entity_id).or_default().push(identifier);
        Ok(())
    }

    async fn get(&self, entity_id: Uuid) -> Result<Option<Entity>> {
        Ok(self.entities.get(&entity_id).map(|e| e.clone()))
    }

    async fn merge(&self, survivor: Uuid, absorbed: Uuid) -> Result<()> {
        let absorbed_identifiers: Vec<Identifier> =
            self.identifiers.get(&absorbed).map(|v| v.clone()).unwrap_or_default();
        {
            let mut survivor_entry = self.identifiers.entry(survivor).or_default();
            for ident in absorbed_identifiers {
                let already_present = survivor_entry
                    .iter()
                    .any(|i| i.kind == ident.kind && i.value == ident.value);
                if !already_present {
                    if let Some(mut entity) = self.entities.get_mut(&survivor) {
                        entity.canonical_identifiers.insert(ident.kind.clone(), ident.value.clone());
                    }
                    survivor_entry.push(ident);
                }
            }
        }

        if let Some(absorbed_relations) = self.relations.get(&absorbed).map(|v| v.clone()) {
            let mut survivor_relations = self.relations.entry(survivor).or_default();
            for mut relation in absorbed_relations {
                if relation.from_id == absorbed {
                    relation.from_id = survivor;
                }
                if relation.to_id == absorbed {
                    relation.to_id = survivor;
                }
                survivor_relations.push(relation);
            }
        }

        if let Some(absorbed_profiles) = self.profiles.remove(&absorbed) {
            self.profiles.entry(survivor).or_default().extend(absorbed_profiles.1);
        }

        if let Some(mut entity) = self.entities.get_mut(&absorbed) {
            entity.superseded_by = Some(survivor);
        }

        Ok(())
    }

    async fn add_relation(&self, relation: EntityRelation) -> Result<()> {
        self.relations.entry(relation.from_id).or_default().push(relation.clone());
        Ok(())
    }

    async fn relations_for(&self, entity_id: Uuid) -> Result<Vec<EntityRelation>> {
        let mut out = Vec::new();
        if let Some(rels) = self.relations.get(&entity_id) {
            out.extend(rels.iter().cloned());
        }
        for entry in self.relations.iter() {
            for rel in entry.value() {
                if rel.to_id == entity_id && rel.from_id != entity_id {
                    out.push(rel.clone());
                }
            }
        }
        Ok(out)
    }

    async fn add_profile(&self, profile: EntityProfile) -> Result<()> {
        self.profiles.entry(profile.entity_id).or_default().push(profile);
        Ok(())
    }

    async fn latest_profile(&self, entity_id: Uuid) -> Result<Option<EntityProfile>> {
        Ok(self
            .profiles
            .get(&entity_id)
            .and_then(|profiles| profiles.iter().max_by_key(|p| p.version).cloned()))
    }
}

/// Postgres-backed repository (spec §6 persistence contract). Row structs
/// use `sqlx::query_as` with runtime SQL -- never the `query!`/`query_as!`
/// compile-time macros, which require a live database connection to
/// type-check.
pub struct PostgresEntityRepository {
    pool: Arc<PgPool>,
}

impl PostgresEntityRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EntityRow {
    id: Uuid,
    entity_type: String,
    tenant_id: Option<Uuid>,
    data_origin: String,
    canonical_identifiers: serde_json::Value,
    superseded_by: Option<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
impl EntityRepository for PostgresEntityRepository {
    async fn find_by_canonical(&self, kind: &IdentifierKind, value: &str) -> Result<Option<Entity>> {
        let row: Option<EntityRow> = sqlx::query_as(
            "SELECT id, entity_type, tenant_id, data_origin, canonical_identifiers, superseded_by, created_at \
             FROM entities WHERE superseded_by IS NULL AND canonical_identifiers ->> $1 = $2 LIMIT 1",
        )
        .bind(kind.to_string())
        .bind(value)
        .fetch_optional(self.pool.as_ref())
        .await?;
        row.map(row_to_entity).transpose()
    }

    async fn fuzzy_candidates(&self, _has_ssn: bool) -> Result<Vec<Entity>> {
        let rows: Vec<EntityRow> = sqlx::query_as(
            "SELECT id, entity_type, tenant_id, data_origin, canonical_identifiers, superseded_by, created_at \
             FROM entities WHERE superseded_by IS NULL LIMIT 5000",
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.into_iter().map(row_to_entity).collect()
    }

    async fn insert(&self, entity: Entity) -> Result<()> {
        let identifiers_json = serde_json::to_value(
            entity
                .canonical_identifiers
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<std::collections::HashMap<_, _>>(),
        )?;
        sqlx::query(
            "INSERT INTO entities (id, entity_type, tenant_id, data_origin, canonical_identifiers, superseded_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(entity.id)
        .bind(format!("{:?}", entity.entity_type))
        .bind(entity.tenant_id.map(|t| t.0))
        .bind(format!("{:?}", entity.data_origin))
        .bind(identifiers_json)
        .bind(entity.superseded_by)
        .bind(entity.created_at)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn add_identifier(&self, identifier: Identifier) -> Result<()> {
        sqlx::query(
            "INSERT INTO identifiers (entity_id, kind, value, confidence, source, discovered_at, superseded) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(identifier.entity_id)
        .bind(identifier.kind.to_string())
        .bind(&identifier.value)
        .bind(identifier.confidence)
        .bind(&identifier.source)
        .bind(identifier.discovered_at)
        .bind(identifier.superseded)
        .execute(self.pool.as_ref())
        .await?;
        sqlx::query("UPDATE entities SET canonical_identifiers = canonical_identifiers || jsonb_build_object($2, $3) WHERE id = $1")
            .bind(identifier.entity_id)
            .bind(identifier.kind.to_string())
            .bind(identifier.value)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn get(&self, entity_id: Uuid) -> Result<Option<Entity>> {
        let row: Option<EntityRow> = sqlx::query_as(
            "SELECT id, entity_type, tenant_id, data_origin, canonical_identifiers, superseded_by, created_at \
             FROM entities WHERE id = $1",
        )
        .bind(entity_id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        row.map(row_to_entity).transpose()
    }

    async fn merge(&self, survivor: Uuid, absorbed: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE entity_relations SET from_id = $1 WHERE from_id = $2")
            .bind(survivor)
            .bind(absorbed)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE entity_relations SET to_id = $1 WHERE to_id = $2")
            .bind(survivor)
            .bind(absorbed)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE entity_profiles SET entity_id = $1 WHERE entity_id = $2")
            .bind(survivor)
            .bind(absorbed)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE entities SET canonical_identifiers = e2.canonical_identifiers || e1.canonical_identifiers \
             FROM entities e1, entities e2 WHERE e1.id = $1 AND e2.id = $2 AND entities.id = $2",
        )
        .bind(survivor)
        .bind(absorbed)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE entities SET superseded_by = $1 WHERE id = $2")
            .bind(survivor)
            .bind(absorbed)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn add_relation(&self, relation: EntityRelation) -> Result<()> {
        sqlx::query(
            "INSERT INTO entity_relations (from_id, to_id, relation_type, confidence, current, discovered_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(relation.from_id)
        .bind(format!("{:?}", relation.relation_type))
        .bind(relation.to_id)
        .bind(relation.confidence)
        .bind(relation.current)
        .bind(relation.discovered_at)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn relations_for(&self, entity_id: Uuid) -> Result<Vec<EntityRelation>> {
        #[derive(sqlx::FromRow)]
        struct RelationRow {
            from_id: Uuid,
            to_id: Uuid,
            relation_type: String,
            confidence: f64,
            current: bool,
            discovered_at: chrono::DateTime<chrono::Utc>,
        }
        let rows: Vec<RelationRow> = sqlx::query_as(
            "SELECT from_id, to_id, relation_type, confidence, current, discovered_at FROM entity_relations \
             WHERE from_id = $1 OR to_id = $1",
        )
        .bind(entity_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| EntityRelation {
                from_id: r.from_id,
                to_id: r.to_id,
                relation_type: parse_relation_type(&r.relation_type),
                confidence: r.confidence,
                current: r.current,
                discovered_at: r.discovered_at,
            })
            .collect())
    }

    async fn add_profile(&self, profile: EntityProfile) -> Result<()> {
        sqlx::query(
            "INSERT INTO entity_profiles (entity_id, version, trigger, findings_blob, risk_score, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(profile.entity_id)
        .bind(profile.version)
        .bind(&profile.trigger)
        .bind(&profile.findings_blob)
        .bind(profile.risk_score)
        .bind(profile.created_at)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn latest_profile(&self, entity_id: Uuid) -> Result<Option<EntityProfile>> {
        #[derive(sqlx::FromRow)]
        struct ProfileRow {
            entity_id: Uuid,
            version: i64,
            trigger: String,
            findings_blob: serde_json::Value,
            risk_score: f64,
            created_at: chrono::DateTime<chrono::Utc>,
        }
        let row: Option<ProfileRow> = sqlx::query_as(
            "SELECT entity_id, version, trigger, findings_blob, risk_score, created_at FROM entity_profiles \
             WHERE entity_id = $1 ORDER BY version DESC LIMIT 1",
        )
        .bind(entity_id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(row.map(|r| EntityProfile {
            entity_id: r.entity_id,
            version: r.version,
            trigger: r.trigger,
            findings_blob: r.findings_blob,
            risk_score: r.risk_score,
            created_at: r.created_at,
        }))
    }
}

fn row_to_entity(row: EntityRow) -> Result<Entity> {
    use crate::types::DataOrigin;
    use super::types::EntityType;

    let entity_type = match row.entity_type.as_str() {
        "Person" => EntityType::Person,
        "Organization" => EntityType::Organization,
        _ => EntityType::Address,
    };
    let data_origin = match row.data_origin.as_str() {
        "PaidExternal" => DataOrigin::PaidExternal,
        _ => DataOrigin::CustomerProvided,
    };
    let canonical_identifiers = serde_json::from_value::<std::collections::HashMap<String, String>>(row.canonical_identifiers)
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (parse_identifier_kind(&k), v))
        .collect();

    Ok(Entity {
        id: row.id,
        entity_type,
        tenant_id: row.tenant_id.map(Into::into),
        data_origin,
        canonical_identifiers,
        superseded_by: row.superseded_by,
        created_at: row.created_at,
    })
}

fn parse_identifier_kind(s: &str) -> IdentifierKind {
    match s {
        "Ssn" => IdentifierKind::Ssn,
        "Ein" => IdentifierKind::Ein,
        "Passport" => IdentifierKind::Passport,
        "DriversLicense" => IdentifierKind::DriversLicense,
        "NationalId" => IdentifierKind::NationalId,
        "FullName" => IdentifierKind::FullName,
        "Dob" => IdentifierKind::Dob,
        "Address" => IdentifierKind::Address,
        other => IdentifierKind::Other(other.trim_start_matches("OTHER_").to_string()),
    }
}

fn parse_relation_type(s: &str) -> super::types::RelationType {
    use super::types::RelationType;
    match s {
        "Ownership" => RelationType::Ownership,
        "Financial" => RelationType::Financial,
        "Business" => RelationType::Business,
        "Political" => RelationType::Political,
        "Family" => RelationType::Family,
        "Legal" => RelationType::Legal,
        "Employment" => RelationType::Employment,
        "Social" => RelationType::Social,
        _ => RelationType::Educational,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::types::EntityType;
    use crate::types::DataOrigin;

    #[tokio::test]
    async fn merge_unions_identifiers_and_marks_absorbed_superseded() {
        let repo = InMemoryEntityRepository::new();
        let survivor = Entity::new(EntityType::Person, None, DataOrigin::PaidExternal)
            .with_identifier(IdentifierKind::Ssn, "123-45-6789");
        let absorbed = Entity::new(EntityType::Person, None, DataOrigin::PaidExternal)
            .with_identifier(IdentifierKind::Passport, "X1234567");
        let (survivor_id, absorbed_id) = (survivor.id, absorbed.id);
        repo.insert(survivor).await.unwrap();
        repo.insert(absorbed).await.unwrap();

        repo.merge(survivor_id, absorbed_id).await.unwrap();

        let absorbed_after = repo.get(absorbed_id).await.unwrap().unwrap();
        assert_eq!(absorbed_after.superseded_by, Some(survivor_id));
    }
}
