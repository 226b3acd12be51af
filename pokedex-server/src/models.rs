//! Catalog domain models
//!
//! Rows as the store hands them out, the seed file shape, and the node
//! shapes the HTTP layer serializes after field resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// A pokemon species row. Relations are resolved separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pokemon {
    pub id: i64,
    pub name: String,
    pub classification: Option<String>,
    pub height: PhysicalQuantity,
    pub weight: PhysicalQuantity,
    pub flee_rate: Option<f64>,
    pub max_cp: Option<i64>,
    pub max_hp: Option<i64>,
    pub is_favorite: bool,
}

/// Range of a physical measurement, e.g. "0.61m" to "0.79m".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalQuantity {
    pub minimum: Option<String>,
    pub maximum: Option<String>,
}

/// An attack a species can perform. Category and type are relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PokemonAttack {
    pub id: i64,
    pub pokemon_id: i64,
    pub name: String,
    pub damage: i64,
}

/// Filters for listing pokemon. Results are always ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PokemonFilter {
    /// Case-insensitive substring of the name
    pub name: Option<String>,
    /// Exact pokemon type name
    pub pokemon_type: Option<String>,
    pub is_favorite: Option<bool>,
}

impl PokemonFilter {
    pub fn matches(&self, pokemon: &Pokemon, types: &[String]) -> bool {
        if let Some(needle) = &self.name {
            if !pokemon.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if let Some(wanted) = &self.pokemon_type {
            if !types.iter().any(|t| t == wanted) {
                return false;
            }
        }
        if let Some(favorite) = self.is_favorite {
            if pokemon.is_favorite != favorite {
                return false;
            }
        }
        true
    }
}

/// One species in a seed file.
///
/// `id` may be a number or a zero-padded string such as `"001"`.
/// `attacks` maps an attack category (e.g. "fast", "special") to its attacks.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedPokemon {
    #[serde(deserialize_with = "numeric_id")]
    pub id: i64,
    pub name: String,
    pub classification: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub resistant: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub attacks: BTreeMap<String, Vec<SeedAttack>>,
    pub min_weight: Option<String>,
    pub max_weight: Option<String>,
    pub min_height: Option<String>,
    pub max_height: Option<String>,
    pub flee_rate: Option<f64>,
    #[serde(alias = "maxCP")]
    pub max_cp: Option<i64>,
    #[serde(alias = "maxHP")]
    pub max_hp: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAttack {
    pub name: String,
    #[serde(rename = "type")]
    pub attack_type: String,
    pub damage: i64,
}

fn numeric_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(i64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Number(n) => Ok(n),
        Repr::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid pokemon id '{}'", s))),
    }
}

/// A pokemon with every field resolved, as returned over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PokemonNode {
    /// Global id (`Pokemon:<id>`)
    pub id: String,
    /// Species number in decimal
    pub code: String,
    pub name: String,
    pub classification: Option<String>,
    pub height: PhysicalQuantity,
    pub weight: PhysicalQuantity,
    pub flee_rate: Option<f64>,
    pub max_cp: Option<i64>,
    pub max_hp: Option<i64>,
    pub is_favorite: bool,
    pub types: Vec<String>,
    pub resistant_to: Vec<String>,
    pub weaknesses: Vec<String>,
    pub attacks: Vec<AttackNode>,
}

/// An attack with its category, type and owner resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackNode {
    /// Global id (`PokemonAttack:<id>`)
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(rename = "type")]
    pub attack_type: String,
    pub damage: i64,
    pub pokemon: PokemonRef,
}

/// The pokemon an attack belongs to, without its own relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PokemonRef {
    /// Global id (`Pokemon:<id>`)
    pub id: String,
    pub name: String,
}
