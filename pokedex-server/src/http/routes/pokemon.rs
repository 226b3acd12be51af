//! Pokemon endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use pokedex_core::PageArguments;
use serde::{Deserialize, Serialize};

use crate::http::error::{ApiError, ApiResult};
use crate::http::extractors::{ApiJson, ApiQuery};
use crate::models::{PokemonFilter, PokemonNode};
use crate::resolvers::{PokemonConnection, PokemonLookup};
use crate::state::AppState;

/// Query string of `GET /pokemon`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPokemonParams {
    pub first: Option<i64>,
    pub after: Option<String>,
    pub last: Option<i64>,
    pub before: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub pokemon_type: Option<String>,
    pub is_favorite: Option<bool>,
}

impl ListPokemonParams {
    fn into_parts(self) -> (PageArguments, PokemonFilter) {
        let args = PageArguments {
            first: self.first,
            after: self.after,
            last: self.last,
            before: self.before,
        };
        let filter = PokemonFilter {
            name: self.name.filter(|n| !n.trim().is_empty()),
            pokemon_type: self.pokemon_type.filter(|t| !t.is_empty()),
            is_favorite: self.is_favorite,
        };
        (args, filter)
    }
}

/// Query string of `GET /pokemon/lookup`; exactly one field must be set
#[derive(Debug, Default, Deserialize)]
pub struct LookupParams {
    pub id: Option<String>,
    pub code: Option<String>,
    pub name: Option<String>,
}

impl TryFrom<LookupParams> for PokemonLookup {
    type Error = ApiError;

    fn try_from(params: LookupParams) -> Result<Self, Self::Error> {
        match (params.id, params.code, params.name) {
            (Some(id), None, None) => Ok(Self::GlobalId(id)),
            (None, Some(code), None) => code
                .trim()
                .parse()
                .map(Self::Code)
                .map_err(|_| ApiError::validation(format!("code '{}' is not a number", code))),
            (None, None, Some(name)) => Ok(Self::Name(name)),
            _ => Err(ApiError::validation(
                "exactly one of 'id', 'code' or 'name' is required",
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleFavoriteRequest {
    pub pokemon_id: String,
}

/// Single pokemon response; `pokemon` is `null` when nothing matched
#[derive(Debug, Serialize)]
pub struct PokemonResponse {
    pub pokemon: Option<PokemonNode>,
}

/// GET /pokemon - one page of the catalog
async fn list_pokemon(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ListPokemonParams>,
) -> ApiResult<Json<PokemonConnection>> {
    let (args, filter) = params.into_parts();
    let args = state.page_limits.apply(args);

    let page = state.resolver().pokemon_connection(&filter, &args).await?;
    tracing::debug!(edges = page.connection.len(), total = page.total_count, "listed pokemon");
    Ok(Json(page))
}

/// GET /pokemon/lookup - find one pokemon by global id, code or name
async fn lookup_pokemon(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<LookupParams>,
) -> ApiResult<Json<PokemonResponse>> {
    let lookup = PokemonLookup::try_from(params)?;
    let pokemon = state.resolver().find_pokemon(&lookup).await?;
    Ok(Json(PokemonResponse { pokemon }))
}

/// GET /pokemon-types - every type name, sorted
async fn pokemon_types(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.resolver().pokemon_types().await?))
}

/// POST /pokemon/toggle-favorite
async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ToggleFavoriteRequest>,
) -> ApiResult<Json<PokemonResponse>> {
    let pokemon = state.resolver().toggle_favorite(&req.pokemon_id).await?;
    tracing::info!(id = %pokemon.id, is_favorite = pokemon.is_favorite, "favorite toggled");
    Ok(Json(PokemonResponse {
        pokemon: Some(pokemon),
    }))
}

/// Pokemon routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pokemon", get(list_pokemon))
        .route("/pokemon/lookup", get(lookup_pokemon))
        .route("/pokemon/toggle-favorite", post(toggle_favorite))
        .route("/pokemon-types", get(pokemon_types))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global_id::to_global_id;
    use crate::http::server::build_router;
    use crate::state::PageLimits;
    use crate::store::tests::seeded;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use pokedex_core::cursor;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        app_with_limits(PageLimits::default())
    }

    fn app_with_limits(limits: PageLimits) -> Router {
        build_router(AppState::new(Arc::new(seeded()), limits), false)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn names(body: &Value) -> Vec<&str> {
        body["edges"]
            .as_array()
            .unwrap()
            .iter()
            .map(|edge| edge["node"]["name"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn list_first_page() {
        let (status, body) = get_json(app(), "/pokemon?first=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names(&body), vec!["Bulbasaur", "Charmander"]);
        assert_eq!(body["totalCount"], 4);
        assert_eq!(body["pageInfo"]["hasNextPage"], true);
        assert_eq!(body["pageInfo"]["hasPreviousPage"], false);
        assert_eq!(body["edges"][1]["cursor"], cursor::encode(1));
    }

    #[tokio::test]
    async fn list_after_cursor() {
        let uri = format!("/pokemon?first=2&after={}", cursor::encode(1));
        let (_, body) = get_json(app(), &uri).await;
        assert_eq!(names(&body), vec!["Squirtle", "Pikachu"]);
        assert_eq!(body["pageInfo"]["hasNextPage"], false);
    }

    #[tokio::test]
    async fn list_last_page() {
        let (_, body) = get_json(app(), "/pokemon?last=3").await;
        assert_eq!(names(&body), vec!["Charmander", "Squirtle", "Pikachu"]);
        assert_eq!(body["pageInfo"]["hasPreviousPage"], true);
    }

    #[tokio::test]
    async fn list_uses_default_and_max_page_size() {
        let limits = PageLimits {
            default_page_size: 1,
            max_page_size: 3,
        };
        let (_, body) = get_json(app_with_limits(limits), "/pokemon").await;
        assert_eq!(names(&body).len(), 1);

        let (_, body) = get_json(app_with_limits(limits), "/pokemon?first=50").await;
        assert_eq!(names(&body).len(), 3);
    }

    #[tokio::test]
    async fn list_filters() {
        let (_, body) = get_json(app(), "/pokemon?type=Fire").await;
        assert_eq!(names(&body), vec!["Charmander"]);
        assert_eq!(body["totalCount"], 1);

        let (_, body) = get_json(app(), "/pokemon?name=SQU").await;
        assert_eq!(names(&body), vec!["Squirtle"]);

        let (_, body) = get_json(app(), "/pokemon?isFavorite=true").await;
        assert!(names(&body).is_empty());
        assert_eq!(body["totalCount"], 0);
    }

    #[tokio::test]
    async fn list_resolves_relations() {
        let (_, body) = get_json(app(), "/pokemon?first=1").await;
        let node = &body["edges"][0]["node"];
        assert_eq!(node["id"], to_global_id("Pokemon", 1));
        assert_eq!(node["types"], json!(["Grass", "Poison"]));
        assert_eq!(node["weaknesses"], json!(["Fire", "Ice"]));
        assert_eq!(node["weight"], json!({ "minimum": "6.04kg", "maximum": "7.76kg" }));
        assert_eq!(node["maxCp"], 951);
        assert_eq!(node["attacks"][1]["type"], "Grass");
        assert_eq!(node["attacks"][1]["category"], "special");
        assert_eq!(
            node["attacks"][1]["pokemon"],
            json!({ "id": to_global_id("Pokemon", 1), "name": "Bulbasaur" })
        );
        assert_eq!(body["nodes"][0], *node);
    }

    #[tokio::test]
    async fn negative_first_is_400() {
        let (status, body) = get_json(app(), "/pokemon?first=-1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn malformed_query_is_json_400() {
        let (status, body) = get_json(app(), "/pokemon?first=many").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn garbage_cursor_falls_back() {
        let (status, body) = get_json(app(), "/pokemon?first=1&after=garbage").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names(&body), vec!["Bulbasaur"]);
    }

    #[tokio::test]
    async fn out_of_range_cursors_degrade() {
        let huge = cursor::encode(i64::MAX);

        let (status, body) = get_json(app(), &format!("/pokemon?first=2&after={}", huge)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(names(&body).is_empty());
        assert_eq!(body["pageInfo"]["hasNextPage"], false);
        assert_eq!(body["nodes"], json!([]));

        let (status, body) = get_json(app(), &format!("/pokemon?last=2&after={}", huge)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(names(&body).is_empty());

        let (status, body) = get_json(app(), &format!("/pokemon?last=2&before={}", huge)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names(&body), vec!["Squirtle", "Pikachu"]);
    }

    #[tokio::test]
    async fn lookup_by_each_key() {
        let (_, body) = get_json(app(), "/pokemon/lookup?code=25").await;
        assert_eq!(body["pokemon"]["name"], "Pikachu");

        let (_, body) = get_json(app(), "/pokemon/lookup?name=charmander").await;
        assert_eq!(body["pokemon"]["code"], "4");

        let uri = format!("/pokemon/lookup?id={}", to_global_id("Pokemon", 7));
        let (_, body) = get_json(app(), &uri).await;
        assert_eq!(body["pokemon"]["name"], "Squirtle");
    }

    #[tokio::test]
    async fn lookup_foreign_id_is_null() {
        let uri = format!("/pokemon/lookup?id={}", to_global_id("PokemonAttack", 1));
        let (status, body) = get_json(app(), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pokemon"], Value::Null);
    }

    #[tokio::test]
    async fn lookup_requires_exactly_one_argument() {
        let (status, _) = get_json(app(), "/pokemon/lookup").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(app(), "/pokemon/lookup?code=1&name=Bulbasaur").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn types_are_sorted() {
        let (_, body) = get_json(app(), "/pokemon-types").await;
        assert_eq!(body, json!(["Electric", "Fire", "Grass", "Poison", "Water"]));
    }

    #[tokio::test]
    async fn toggle_favorite_flips_and_persists() {
        let app = app();
        let id = to_global_id("Pokemon", 25);

        let (status, body) =
            post_json(app.clone(), "/pokemon/toggle-favorite", json!({ "pokemonId": id })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pokemon"]["isFavorite"], true);

        let (_, body) = get_json(app, "/pokemon?isFavorite=true").await;
        assert_eq!(names(&body), vec!["Pikachu"]);
    }

    #[tokio::test]
    async fn toggle_favorite_errors() {
        let unknown = to_global_id("Pokemon", 151);
        let (status, body) =
            post_json(app(), "/pokemon/toggle-favorite", json!({ "pokemonId": unknown })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let foreign = to_global_id("PokemonAttack", 1);
        let (status, _) =
            post_json(app(), "/pokemon/toggle-favorite", json!({ "pokemonId": foreign })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
