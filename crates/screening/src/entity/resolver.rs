use super::repository::EntityRepository;
use super::types::{Entity, IdentifierKind};
use crate::types::ServiceTier;
use chrono::NaiveDate;
use screening_core::error::Result;
use std::collections::HashMap;
use uuid::Uuid;

/// Plaintext subject identifiers as supplied on a screening request.
#[derive(Debug, Clone, Default)]
pub struct SubjectIdentifiers {
    pub full_name: String,
    pub dob: Option<NaiveDate>,
    pub address: Option<String>,
    pub exact: HashMap<IdentifierKind, String>,
    pub aliases: Vec<String>,
}

impl SubjectIdentifiers {
    /// Plaintext parameters handed to a provider on an `INITIAL` query
    /// (spec §4.5). Providers receive only what they need to run a check;
    /// canonical identifiers are looked up separately and never logged.
    pub fn to_query_params(&self) -> serde_json::Value {
        serde_json::json!({
            "full_name": self.full_name,
            "dob": self.dob,
            "address": self.address,
            "aliases": self.aliases,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    MatchExisting { entity_id: Uuid, score: f64 },
    PendingReview { entity_id: Uuid, score: f64 },
    CreateNew,
}

const NAME_WEIGHT: f64 = 0.40;
const DOB_WEIGHT: f64 = 0.35;
const ADDRESS_WEIGHT: f64 = 0.25;

pub struct EntityResolver<'a, R: EntityRepository> {
    repo: &'a R,
}

impl<'a, R: EntityRepository> EntityResolver<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Exact match on canonical identifiers, confidence always 1.0.
    pub async fn exact_match(&self, subject: &SubjectIdentifiers) -> Result<Option<Entity>> {
        for (kind, value) in &subject.exact {
            if !kind.is_exact_match_kind() {
                continue;
            }
            if let Some(entity) = self.repo.find_by_canonical(kind, value).await? {
                return Ok(Some(entity));
            }
        }
        Ok(None)
    }

    pub fn fuzzy_score(subject: &SubjectIdentifiers, candidate: &Entity) -> f64 {
        let name_sim = candidate
            .canonical_identifiers
            .get(&IdentifierKind::FullName)
            .map(|name| strsim::jaro_winkler(&normalize(&subject.full_name), &normalize(name)))
            .unwrap_or(0.0);

        let dob_sim = match (
            subject.dob,
            candidate.canonical_identifiers.get(&IdentifierKind::Dob),
        ) {
            (Some(dob), Some(candidate_dob)) => {
                if candidate_dob.parse::<NaiveDate>().map(|d| d == dob).unwrap_or(false) {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };

        let address_sim = match (
            &subject.address,
            candidate.canonical_identifiers.get(&IdentifierKind::Address),
        ) {
            (Some(a), Some(b)) => token_sorted_similarity(a, b),
            _ => 0.0,
        };

        NAME_WEIGHT * name_sim + DOB_WEIGHT * dob_sim + ADDRESS_WEIGHT * address_sim
    }

    /// Resolve a subject against fuzzy candidates (already scoped to the
    /// caller's tenant / shared paid-external pool by the repository).
    pub async fn resolve(&self, subject: &SubjectIdentifiers, tier: ServiceTier) -> Result<MatchOutcome> {
        if let Some(entity) = self.exact_match(subject).await? {
            return Ok(MatchOutcome::MatchExisting { entity_id: entity.id, score: 1.0 });
        }

        let candidates = self.repo.fuzzy_candidates(subject.exact.get(&IdentifierKind::Ssn).is_some()).await?;
        let mut best: Option<(Uuid, f64)> = None;
        for candidate in &candidates {
            let score = Self::fuzzy_score(subject, candidate);
            if best.map(|(_, best_score)| score > best_score).unwrap_or(true) {
                best = Some((candidate.id, score));
            }
        }

        Ok(match best {
            Some((entity_id, score)) if score >= 0.85 => MatchOutcome::MatchExisting { entity_id, score },
            Some((entity_id, score)) if tier == ServiceTier::Enhanced && score >= 0.70 => {
                MatchOutcome::PendingReview { entity_id, score }
            }
            _ => MatchOutcome::CreateNew,
        })
    }

    /// Add an identifier to `entity_id`; if it exact-matches a different
    /// entity, merge the two (lower UUIDv7 survives) and return the
    /// canonical survivor id.
    pub async fn add_identifier_with_merge(
        &self,
        entity_id: Uuid,
        kind: IdentifierKind,
        value: &str,
        source: &str,
        confidence: f64,
    ) -> Result<Uuid> {
        if kind.is_exact_match_kind() {
            if let Some(other) = self.repo.find_by_canonical(&kind, value).await? {
                if other.id != entity_id {
                    let (survivor, absorbed) = if other.id < entity_id {
                        (other.id, entity_id)
                    } else {
                        (entity_id, other.id)
                    };
                    self.repo.merge(survivor, absorbed).await?;
                    self.repo
                        .add_identifier(super::types::Identifier::new(survivor, kind, value, source, confidence))
                        .await?;
                    return Ok(survivor);
                }
            }
        }

        self.repo
            .add_identifier(super::types::Identifier::new(entity_id, kind, value, source, confidence))
            .await?;
        Ok(entity_id)
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Token-sorted similarity: sort whitespace tokens, join, then apply
/// Jaro-Winkler so "123 Main St, Apt 4" and "Apt 4, 123 Main St" score high.
fn token_sorted_similarity(a: &str, b: &str) -> f64 {
    let sort = |s: &str| {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ").to_lowercase()
    };
    strsim::jaro_winkler(&sort(a), &sort(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::repository::InMemoryEntityRepository;
    use crate::entity::types::{EntityType};
    use crate::types::DataOrigin;

    fn subject() -> SubjectIdentifiers {
        let mut exact = HashMap::new();
        exact.insert(IdentifierKind::Ssn, "123-45-6789".to_string());
        SubjectIdentifiers {
            full_name: "Jane Doe".to_string(),
            dob: NaiveDate::from_ymd_opt(1985, 3, 15),
            address: Some("123 Main St".to_string()),
            exact,
            aliases: vec![],
        }
    }

    #[tokio::test]
    async fn exact_match_returns_existing_entity_with_confidence_one() {
        let repo = InMemoryEntityRepository::new();
        let entity = Entity::new(EntityType::Person, None, DataOrigin::PaidExternal)
            .with_identifier(IdentifierKind::Ssn, "123-45-6789".to_string());
        repo.insert(entity.clone()).await;

        let resolver = EntityResolver::new(&repo);
        let outcome = resolver.resolve(&subject(), ServiceTier::Standard).await.unwrap();
        assert_eq!(outcome, MatchOutcome::MatchExisting { entity_id: entity.id, score: 1.0 });
    }

    #[tokio::test]
    async fn no_match_creates_new() {
        let repo = InMemoryEntityRepository::new();
        let resolver = EntityResolver::new(&repo);
        let outcome = resolver.resolve(&subject(), ServiceTier::Standard).await.unwrap();
        assert_eq!(outcome, MatchOutcome::CreateNew);
    }

    #[test]
    fn merge_survivor_is_always_the_lower_uuid() {
        let a = Uuid::now_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = Uuid::now_v7();
        assert!(a < b);
    }
}
