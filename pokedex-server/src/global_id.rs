//! Opaque global object ids: `base64("<Type>:<id>")`

use base64::{engine::general_purpose::STANDARD, Engine as _};

pub const POKEMON: &str = "Pokemon";
pub const POKEMON_ATTACK: &str = "PokemonAttack";

/// A decoded global id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalId {
    pub type_name: String,
    pub id: String,
}

impl GlobalId {
    /// The local id as a number, if this id names `type_name`.
    pub fn local_id_for(&self, type_name: &str) -> Option<i64> {
        if self.type_name != type_name {
            return None;
        }
        self.id.parse().ok()
    }
}

pub fn to_global_id(type_name: &str, id: impl std::fmt::Display) -> String {
    STANDARD.encode(format!("{}:{}", type_name, id))
}

/// Decode a global id. Anything that is not base64 of `Type:id` yields `None`.
pub fn from_global_id(global_id: &str) -> Option<GlobalId> {
    let bytes = STANDARD.decode(global_id.trim()).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let (type_name, id) = text.split_once(':')?;
    if type_name.is_empty() || id.is_empty() {
        return None;
    }
    Some(GlobalId {
        type_name: type_name.to_owned(),
        id: id.to_owned(),
    })
}
