//! Field resolution
//!
//! Relation fields resolve through request-scoped loaders: every node in a
//! response that needs, say, its `types` asks the `Pokemon.types` loader,
//! and the store sees one call for the whole page. Loaders key on the
//! identity of the source row, so each resolved row is fetched once per
//! field per request.
//!
//! Everything here must run inside a [`RequestScope`](pokedex_core::RequestScope).

use std::sync::Arc;

use futures::future::try_join_all;
use pokedex_core::{
    connection_from_slice, cursor, fetch_window, load_batched, BatchError, ByAddress,
    Connection, Edge, KeyError, LoadError, LoadResult, PageArguments, PaginationError,
    SliceMeta,
};
use serde::Serialize;

use crate::global_id::{self, from_global_id, to_global_id};
use crate::models::{AttackNode, Pokemon, PokemonAttack, PokemonFilter, PokemonNode, PokemonRef};
use crate::store::{AttackRelation, PokemonStore, StoreError, TypeRelation};

pub const POKEMON_TYPES: &str = "Pokemon.types";
pub const POKEMON_RESISTANT_TO: &str = "Pokemon.resistantTo";
pub const POKEMON_WEAKNESSES: &str = "Pokemon.weaknesses";
pub const POKEMON_ATTACKS: &str = "Pokemon.attacks";
pub const ATTACK_CATEGORY: &str = "PokemonAttack.category";
pub const ATTACK_TYPE: &str = "PokemonAttack.type";
pub const ATTACK_POKEMON: &str = "PokemonAttack.pokemon";

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Pagination(#[from] PaginationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("'{id}' is not a valid {expected} id")]
    InvalidId { id: String, expected: &'static str },
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// A page of fully resolved pokemon
///
/// Serializes the edges plus a `nodes` list holding the same nodes without
/// their cursors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PokemonConnection {
    #[serde(flatten)]
    pub connection: Connection<PokemonNode>,
    pub nodes: Vec<PokemonNode>,
    pub total_count: i64,
}

/// How a single pokemon is looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PokemonLookup {
    GlobalId(String),
    Code(i64),
    Name(String),
}

#[derive(Clone)]
pub struct PokemonResolver {
    store: Arc<dyn PokemonStore>,
}

impl PokemonResolver {
    pub fn new(store: Arc<dyn PokemonStore>) -> Self {
        Self { store }
    }

    /// One page of pokemon matching `filter`, with every node resolved.
    ///
    /// A plain forward page is fetched directly from the `after` offset.
    /// Anything involving `last` or `before` counts the collection first so
    /// only the window the slicer keeps is read.
    pub async fn pokemon_connection(
        &self,
        filter: &PokemonFilter,
        args: &PageArguments,
    ) -> ResolveResult<PokemonConnection> {
        args.validate()?;

        let (offset, limit) = match (args.first, args.last, args.before.as_deref()) {
            (Some(first), None, None) => {
                let after = cursor::offset_with_default(args.after.as_deref(), -1);
                (after.saturating_add(1), first)
            }
            _ => {
                let total = self.store.count(filter).await?;
                let (start, end) = fetch_window(args, total)?;
                (start, end - start)
            }
        };

        let page = self.store.fetch_page(filter, offset, limit).await?;
        let total_count = page.total;
        let connection =
            connection_from_slice(page.items, args, SliceMeta::new(offset, total_count)?)?;

        let connection = self.resolve_edges(connection).await?;
        Ok(PokemonConnection {
            nodes: connection.nodes().cloned().collect(),
            connection,
            total_count,
        })
    }

    /// Look up one pokemon. Ids naming another type resolve to `None`.
    pub async fn find_pokemon(&self, lookup: &PokemonLookup) -> ResolveResult<Option<PokemonNode>> {
        let row = match lookup {
            PokemonLookup::GlobalId(id) => {
                match from_global_id(id).and_then(|g| g.local_id_for(global_id::POKEMON)) {
                    Some(local) => self.store.find_by_id(local).await?,
                    None => None,
                }
            }
            PokemonLookup::Code(code) => self.store.find_by_id(*code).await?,
            PokemonLookup::Name(name) => self.store.find_by_name(name).await?,
        };

        match row {
            Some(pokemon) => Ok(Some(self.node(Arc::new(pokemon)).await?)),
            None => Ok(None),
        }
    }

    pub async fn pokemon_types(&self) -> ResolveResult<Vec<String>> {
        Ok(self.store.all_types().await?)
    }

    pub async fn toggle_favorite(&self, pokemon_id: &str) -> ResolveResult<PokemonNode> {
        let local = from_global_id(pokemon_id)
            .and_then(|g| g.local_id_for(global_id::POKEMON))
            .ok_or_else(|| ResolveError::InvalidId {
                id: pokemon_id.to_owned(),
                expected: global_id::POKEMON,
            })?;
        let pokemon = self.store.toggle_favorite(local).await?;
        Ok(self.node(Arc::new(pokemon)).await?)
    }

    async fn resolve_edges(
        &self,
        connection: Connection<Pokemon>,
    ) -> LoadResult<Connection<PokemonNode>> {
        let Connection { edges, page_info } = connection.map(Arc::new);
        let nodes = try_join_all(edges.iter().map(|edge| self.node(Arc::clone(&edge.node)))).await?;
        let edges = edges
            .into_iter()
            .zip(nodes)
            .map(|(edge, node)| Edge {
                node,
                cursor: edge.cursor,
            })
            .collect();
        Ok(Connection { edges, page_info })
    }

    /// Resolve every field of `pokemon`, relations concurrently.
    pub async fn node(&self, pokemon: Arc<Pokemon>) -> LoadResult<PokemonNode> {
        let (types, resistant_to, weaknesses, attacks) = futures::try_join!(
            self.types(&pokemon),
            self.resistant_to(&pokemon),
            self.weaknesses(&pokemon),
            self.attack_nodes(&pokemon),
        )?;

        Ok(PokemonNode {
            id: to_global_id(global_id::POKEMON, pokemon.id),
            code: pokemon.id.to_string(),
            name: pokemon.name.clone(),
            classification: pokemon.classification.clone(),
            height: pokemon.height.clone(),
            weight: pokemon.weight.clone(),
            flee_rate: pokemon.flee_rate,
            max_cp: pokemon.max_cp,
            max_hp: pokemon.max_hp,
            is_favorite: pokemon.is_favorite,
            types,
            resistant_to,
            weaknesses,
            attacks,
        })
    }

    pub async fn types(&self, pokemon: &Arc<Pokemon>) -> LoadResult<Vec<String>> {
        self.type_relation(POKEMON_TYPES, TypeRelation::Types, pokemon).await
    }

    pub async fn resistant_to(&self, pokemon: &Arc<Pokemon>) -> LoadResult<Vec<String>> {
        self.type_relation(POKEMON_RESISTANT_TO, TypeRelation::ResistantTo, pokemon)
            .await
    }

    pub async fn weaknesses(&self, pokemon: &Arc<Pokemon>) -> LoadResult<Vec<String>> {
        self.type_relation(POKEMON_WEAKNESSES, TypeRelation::Weaknesses, pokemon)
            .await
    }

    async fn type_relation(
        &self,
        loader: &str,
        relation: TypeRelation,
        pokemon: &Arc<Pokemon>,
    ) -> LoadResult<Vec<String>> {
        let store = Arc::clone(&self.store);
        load_batched(
            loader,
            ByAddress(Arc::clone(pokemon)),
            move |sources: Vec<ByAddress<Pokemon>>| {
                let store = Arc::clone(&store);
                async move {
                    let ids: Vec<i64> = sources.iter().map(|p| p.id).collect();
                    let rows = store
                        .fetch_type_relation(&ids, relation)
                        .await
                        .map_err(BatchError::new)?;
                    Ok::<_, BatchError>(align("pokemon", &ids, rows))
                }
            },
        )
        .await
    }

    pub async fn attacks(&self, pokemon: &Arc<Pokemon>) -> LoadResult<Vec<PokemonAttack>> {
        let store = Arc::clone(&self.store);
        load_batched(
            POKEMON_ATTACKS,
            ByAddress(Arc::clone(pokemon)),
            move |sources: Vec<ByAddress<Pokemon>>| {
                let store = Arc::clone(&store);
                async move {
                    let ids: Vec<i64> = sources.iter().map(|p| p.id).collect();
                    let rows = store.fetch_attacks(&ids).await.map_err(BatchError::new)?;
                    Ok::<_, BatchError>(align("pokemon", &ids, rows))
                }
            },
        )
        .await
    }

    async fn attack_nodes(&self, pokemon: &Arc<Pokemon>) -> LoadResult<Vec<AttackNode>> {
        let attacks = self.attacks(pokemon).await?;
        try_join_all(
            attacks
                .into_iter()
                .map(|attack| self.attack_node(Arc::new(attack))),
        )
        .await
    }

    pub async fn attack_node(&self, attack: Arc<PokemonAttack>) -> LoadResult<AttackNode> {
        let (category, attack_type, owner) = futures::try_join!(
            self.attack_relation(ATTACK_CATEGORY, AttackRelation::Category, &attack),
            self.attack_relation(ATTACK_TYPE, AttackRelation::Type, &attack),
            self.attack_pokemon(&attack),
        )?;

        Ok(AttackNode {
            id: to_global_id(global_id::POKEMON_ATTACK, attack.id),
            name: attack.name.clone(),
            category,
            attack_type,
            damage: attack.damage,
            pokemon: PokemonRef {
                id: to_global_id(global_id::POKEMON, owner.id),
                name: owner.name,
            },
        })
    }

    /// The pokemon `attack` belongs to.
    pub async fn attack_pokemon(&self, attack: &Arc<PokemonAttack>) -> LoadResult<Pokemon> {
        let store = Arc::clone(&self.store);
        load_batched(
            ATTACK_POKEMON,
            ByAddress(Arc::clone(attack)),
            move |sources: Vec<ByAddress<PokemonAttack>>| {
                let store = Arc::clone(&store);
                async move {
                    let ids: Vec<i64> = sources.iter().map(|a| a.id).collect();
                    let rows = store.fetch_attack_pokemon(&ids).await.map_err(BatchError::new)?;
                    Ok::<_, BatchError>(align("attack", &ids, rows))
                }
            },
        )
        .await
    }

    async fn attack_relation(
        &self,
        loader: &str,
        relation: AttackRelation,
        attack: &Arc<PokemonAttack>,
    ) -> LoadResult<String> {
        let store = Arc::clone(&self.store);
        load_batched(
            loader,
            ByAddress(Arc::clone(attack)),
            move |sources: Vec<ByAddress<PokemonAttack>>| {
                let store = Arc::clone(&store);
                async move {
                    let ids: Vec<i64> = sources.iter().map(|a| a.id).collect();
                    let rows = store
                        .fetch_attack_relation(&ids, relation)
                        .await
                        .map_err(BatchError::new)?;
                    Ok::<_, BatchError>(align("attack", &ids, rows))
                }
            },
        )
        .await
    }
}

/// Turn store rows aligned with `ids` into per-key results.
fn align<V>(resource: &str, ids: &[i64], rows: Vec<Option<V>>) -> Vec<Result<V, KeyError>> {
    ids.iter()
        .zip(rows)
        .map(|(id, row)| row.ok_or_else(|| KeyError::new(format!("{} {} not found", resource, id))))
        .collect()
}
