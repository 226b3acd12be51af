//! Catalog storage
//!
//! [`PokemonStore`] is the data source seam: page fetches for connections,
//! and relation fetches keyed by many ids at once so field resolvers can
//! batch them. Relation fetches return one entry per requested id, in
//! request order; `None` marks an id the store does not know.
//!
//! [`InMemoryStore`] holds the whole catalog behind a tokio `RwLock` and is
//! loaded from a JSON seed file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::{PhysicalQuantity, Pokemon, PokemonAttack, PokemonFilter, SeedPokemon};

/// Store error type
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    #[error("Invalid seed data: {reason}")]
    InvalidSeed { reason: String },

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse seed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn invalid_seed(reason: impl Into<String>) -> Self {
        Self::InvalidSeed {
            reason: reason.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One fetched window of rows plus the size of the full filtered collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Type-name relations of a pokemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRelation {
    Types,
    ResistantTo,
    Weaknesses,
}

/// Single-valued relations of an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackRelation {
    Category,
    Type,
}

#[async_trait]
pub trait PokemonStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Pokemon>>;

    /// Exact, case-insensitive name match.
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Pokemon>>;

    async fn count(&self, filter: &PokemonFilter) -> StoreResult<i64>;

    /// Rows `[offset, offset + limit)` of the filtered collection, ordered by id.
    async fn fetch_page(
        &self,
        filter: &PokemonFilter,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Page<Pokemon>>;

    async fn fetch_type_relation(
        &self,
        pokemon_ids: &[i64],
        relation: TypeRelation,
    ) -> StoreResult<Vec<Option<Vec<String>>>>;

    async fn fetch_attacks(&self, pokemon_ids: &[i64])
        -> StoreResult<Vec<Option<Vec<PokemonAttack>>>>;

    async fn fetch_attack_relation(
        &self,
        attack_ids: &[i64],
        relation: AttackRelation,
    ) -> StoreResult<Vec<Option<String>>>;

    /// The pokemon each attack belongs to.
    async fn fetch_attack_pokemon(&self, attack_ids: &[i64]) -> StoreResult<Vec<Option<Pokemon>>>;

    /// Every distinct pokemon type name, sorted.
    async fn all_types(&self) -> StoreResult<Vec<String>>;

    /// Flip the favorite flag and return the updated row.
    async fn toggle_favorite(&self, id: i64) -> StoreResult<Pokemon>;
}

struct PokemonRecord {
    pokemon: Pokemon,
    types: Vec<String>,
    resistant_to: Vec<String>,
    weaknesses: Vec<String>,
    attack_ids: Vec<i64>,
}

impl PokemonRecord {
    fn relation(&self, relation: TypeRelation) -> &[String] {
        match relation {
            TypeRelation::Types => &self.types,
            TypeRelation::ResistantTo => &self.resistant_to,
            TypeRelation::Weaknesses => &self.weaknesses,
        }
    }
}

struct AttackRecord {
    attack: PokemonAttack,
    category: String,
    attack_type: String,
}

#[derive(Default)]
struct Catalog {
    pokemon: BTreeMap<i64, PokemonRecord>,
    attacks: BTreeMap<i64, AttackRecord>,
}

impl Catalog {
    fn filtered<'a>(&'a self, filter: &'a PokemonFilter) -> impl Iterator<Item = &'a PokemonRecord> {
        self.pokemon
            .values()
            .filter(move |record| filter.matches(&record.pokemon, &record.types))
    }
}

/// Catalog held entirely in memory
#[derive(Default)]
pub struct InMemoryStore {
    catalog: RwLock<Catalog>,
}

impl InMemoryStore {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from seed rows. Attack ids are assigned in seed order.
    pub fn from_seed(seed: Vec<SeedPokemon>) -> StoreResult<Self> {
        let mut catalog = Catalog::default();
        let mut next_attack_id = 1;

        for row in seed {
            if row.name.trim().is_empty() {
                return Err(StoreError::invalid_seed(format!(
                    "pokemon {} has an empty name",
                    row.id
                )));
            }
            if catalog.pokemon.contains_key(&row.id) {
                return Err(StoreError::invalid_seed(format!(
                    "duplicate pokemon id {}",
                    row.id
                )));
            }

            let mut attack_ids = Vec::new();
            for (category, attacks) in row.attacks {
                for seed_attack in attacks {
                    let id = next_attack_id;
                    next_attack_id += 1;
                    attack_ids.push(id);
                    catalog.attacks.insert(
                        id,
                        AttackRecord {
                            attack: PokemonAttack {
                                id,
                                pokemon_id: row.id,
                                name: seed_attack.name,
                                damage: seed_attack.damage,
                            },
                            category: category.clone(),
                            attack_type: seed_attack.attack_type,
                        },
                    );
                }
            }

            let pokemon = Pokemon {
                id: row.id,
                name: row.name,
                classification: row.classification,
                height: PhysicalQuantity {
                    minimum: row.min_height,
                    maximum: row.max_height,
                },
                weight: PhysicalQuantity {
                    minimum: row.min_weight,
                    maximum: row.max_weight,
                },
                flee_rate: row.flee_rate,
                max_cp: row.max_cp,
                max_hp: row.max_hp,
                is_favorite: false,
            };

            catalog.pokemon.insert(
                row.id,
                PokemonRecord {
                    pokemon,
                    types: row.types,
                    resistant_to: row.resistant,
                    weaknesses: row.weaknesses,
                    attack_ids,
                },
            );
        }

        info!(
            pokemon = catalog.pokemon.len(),
            attacks = catalog.attacks.len(),
            "catalog loaded"
        );

        Ok(Self {
            catalog: RwLock::new(catalog),
        })
    }

    /// Parse a JSON array of [`SeedPokemon`].
    pub fn from_seed_json(json: &str) -> StoreResult<Self> {
        let seed: Vec<SeedPokemon> = serde_json::from_str(json)?;
        Self::from_seed(seed)
    }

    pub async fn load_seed_file(path: &Path) -> StoreResult<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_seed_json(&json)
    }
}

#[async_trait]
impl PokemonStore for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Pokemon>> {
        let catalog = self.catalog.read().await;
        Ok(catalog.pokemon.get(&id).map(|record| record.pokemon.clone()))
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Pokemon>> {
        let wanted = name.trim().to_lowercase();
        let catalog = self.catalog.read().await;
        Ok(catalog
            .pokemon
            .values()
            .find(|record| record.pokemon.name.to_lowercase() == wanted)
            .map(|record| record.pokemon.clone()))
    }

    async fn count(&self, filter: &PokemonFilter) -> StoreResult<i64> {
        let catalog = self.catalog.read().await;
        Ok(catalog.filtered(filter).count() as i64)
    }

    async fn fetch_page(
        &self,
        filter: &PokemonFilter,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Page<Pokemon>> {
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);

        let catalog = self.catalog.read().await;
        let matching: Vec<&PokemonRecord> = catalog.filtered(filter).collect();
        let items = matching
            .iter()
            .skip(offset)
            .take(limit)
            .map(|record| record.pokemon.clone())
            .collect::<Vec<_>>();

        debug!(offset, limit, rows = items.len(), total = matching.len(), "fetched pokemon page");
        Ok(Page {
            items,
            total: matching.len() as i64,
        })
    }

    async fn fetch_type_relation(
        &self,
        pokemon_ids: &[i64],
        relation: TypeRelation,
    ) -> StoreResult<Vec<Option<Vec<String>>>> {
        debug!(ids = pokemon_ids.len(), ?relation, "fetching type relation");
        let catalog = self.catalog.read().await;
        Ok(pokemon_ids
            .iter()
            .map(|id| {
                catalog
                    .pokemon
                    .get(id)
                    .map(|record| record.relation(relation).to_vec())
            })
            .collect())
    }

    async fn fetch_attacks(
        &self,
        pokemon_ids: &[i64],
    ) -> StoreResult<Vec<Option<Vec<PokemonAttack>>>> {
        debug!(ids = pokemon_ids.len(), "fetching attacks");
        let catalog = self.catalog.read().await;
        Ok(pokemon_ids
            .iter()
            .map(|id| {
                catalog.pokemon.get(id).map(|record| {
                    record
                        .attack_ids
                        .iter()
                        .filter_map(|attack_id| catalog.attacks.get(attack_id))
                        .map(|attack| attack.attack.clone())
                        .collect()
                })
            })
            .collect())
    }

    async fn fetch_attack_relation(
        &self,
        attack_ids: &[i64],
        relation: AttackRelation,
    ) -> StoreResult<Vec<Option<String>>> {
        debug!(ids = attack_ids.len(), ?relation, "fetching attack relation");
        let catalog = self.catalog.read().await;
        Ok(attack_ids
            .iter()
            .map(|id| {
                catalog.attacks.get(id).map(|record| match relation {
                    AttackRelation::Category => record.category.clone(),
                    AttackRelation::Type => record.attack_type.clone(),
                })
            })
            .collect())
    }

    async fn fetch_attack_pokemon(&self, attack_ids: &[i64]) -> StoreResult<Vec<Option<Pokemon>>> {
        debug!(ids = attack_ids.len(), "fetching attack owners");
        let catalog = self.catalog.read().await;
        Ok(attack_ids
            .iter()
            .map(|id| {
                catalog
                    .attacks
                    .get(id)
                    .and_then(|record| catalog.pokemon.get(&record.attack.pokemon_id))
                    .map(|record| record.pokemon.clone())
            })
            .collect())
    }

    async fn all_types(&self) -> StoreResult<Vec<String>> {
        let catalog = self.catalog.read().await;
        let types: BTreeSet<&String> = catalog
            .pokemon
            .values()
            .flat_map(|record| record.types.iter())
            .collect();
        Ok(types.into_iter().cloned().collect())
    }

    async fn toggle_favorite(&self, id: i64) -> StoreResult<Pokemon> {
        let mut catalog = self.catalog.write().await;
        let record = catalog
            .pokemon
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("pokemon", id))?;
        record.pokemon.is_favorite = !record.pokemon.is_favorite;
        debug!(id, is_favorite = record.pokemon.is_favorite, "toggled favorite");
        Ok(record.pokemon.clone())
    }
}
