use crate::config::{AppConfig, TooltipStyle};
use crate::data::{GeometryCatalog, Inputs};
use crate::processing::{merge, MergeOptions, MergedDataset};
use crate::render::{build_scene, Scene};
use crate::tooltip::{InteractionEvent, TooltipPayload, TooltipResolver};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

/// Built once at startup and only read afterwards.
pub struct AppState {
    pub dataset: MergedDataset,
    pub geometry: GeometryCatalog,
    pub feature_collection: FeatureCollection,
    pub scene: Scene,
    pub tooltip_style: TooltipStyle,
}

impl AppState {
    pub fn new(config: &AppConfig, inputs: Inputs) -> Self {
        let options = MergeOptions {
            strategy: config.merge.strategy,
            matching: config.merge.matching,
        };
        let dataset = merge(&inputs.region_metadata, &inputs.points, options);
        let scene = build_scene(&dataset, &config.scene);
        let feature_collection = inputs.geometry.to_feature_collection();

        Self {
            dataset,
            geometry: inputs.geometry,
            feature_collection,
            scene,
            tooltip_style: config.scene.tooltip_style,
        }
    }

    fn tooltip(&self, event: &InteractionEvent) -> TooltipResponse {
        let payload = TooltipResolver::new(&self.dataset).resolve_event(event);
        let html = payload.to_html(self.tooltip_style);
        TooltipResponse { payload, html }
    }
}

#[derive(Deserialize)]
pub struct TooltipParams {
    kind: String,
    #[serde(default)]
    name: String,
    index: Option<usize>,
}

#[derive(Deserialize)]
pub struct QueryParams {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Serialize)]
pub struct TooltipResponse {
    payload: TooltipPayload,
    html: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    region: String,
    tooltip: TooltipResponse,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/scene", get(scene_handler))
        .route("/api/geometry", get(geometry_handler))
        .route("/api/tooltip", get(tooltip_handler))
        .route("/api/query", get(query_handler))
        .fallback_service(ServeDir::new("."))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, inputs: Inputs) -> Result<()> {
    let state = Arc::new(AppState::new(&config, inputs));
    info!("Merged {} regions for the API", state.dataset.len());

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

async fn scene_handler(State(state): State<Arc<AppState>>) -> Json<Scene> {
    Json(state.scene.clone())
}

async fn geometry_handler(State(state): State<Arc<AppState>>) -> Json<FeatureCollection> {
    Json(state.feature_collection.clone())
}

async fn tooltip_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TooltipParams>,
) -> Json<TooltipResponse> {
    let event = InteractionEvent {
        series_type: params.kind,
        name: params.name,
        data_index: params.index,
    };
    Json(state.tooltip(&event))
}

/// Hit-tests the coordinate against the geometry, then answers as if that
/// region had been hovered.
async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<QueryResponse>> {
    let Some(region) = state.geometry.region_at(params.lon, params.lat) else {
        return Json(None);
    };

    let event = InteractionEvent {
        series_type: "map".to_string(),
        name: region.to_string(),
        data_index: None,
    };

    Json(Some(QueryResponse {
        region: region.to_string(),
        tooltip: state.tooltip(&event),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::squares;
    use crate::data::{builtin_points, builtin_region_metadata};
    use crate::types::MergeStrategy;

    fn state(strategy: MergeStrategy) -> Arc<AppState> {
        let mut config = AppConfig::from_toml("[input]\ngeometry = \"world.geojson\"\n").unwrap();
        config.merge.strategy = strategy;
        let inputs = Inputs {
            geometry: squares(),
            region_metadata: builtin_region_metadata(),
            points: builtin_points(strategy),
        };
        Arc::new(AppState::new(&config, inputs))
    }

    #[tokio::test]
    async fn tooltip_endpoint_returns_payload_and_markup() {
        let params = TooltipParams {
            kind: "map".to_string(),
            name: "Japan".to_string(),
            index: None,
        };
        let state = state(MergeStrategy::IndependentMarkers);
        let Json(response) = tooltip_handler(State(state), Query(params)).await;

        assert_eq!(response.payload.heading, "Tokyo");
        assert!(response.html.contains("JST (UTC+9)"));
    }

    #[tokio::test]
    async fn unknown_series_kind_yields_empty_tooltip() {
        let params = TooltipParams {
            kind: "pie".to_string(),
            name: "Japan".to_string(),
            index: None,
        };
        let state = state(MergeStrategy::IndependentMarkers);
        let Json(response) = tooltip_handler(State(state), Query(params)).await;
        assert!(response.payload.is_empty());
        assert_eq!(response.html, "");
    }

    #[tokio::test]
    async fn query_hits_region_under_coordinate() {
        let params = QueryParams { lat: 28.7041, lon: 77.1025 };
        let state = state(MergeStrategy::FusedIntoRegions);
        let Json(response) = query_handler(State(state), Query(params)).await;
        let response = response.unwrap();

        assert_eq!(response.region, "India");
        assert_eq!(response.tooltip.payload.heading, "Delhi");
        let footer = response.tooltip.payload.footer.as_deref();
        assert_eq!(footer, Some("Data point value: 100"));
    }

    #[tokio::test]
    async fn query_over_open_water_is_null() {
        let params = QueryParams { lat: 0.0, lon: -30.0 };
        let state = state(MergeStrategy::IndependentMarkers);
        let Json(response) = query_handler(State(state), Query(params)).await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn scene_and_geometry_endpoints() {
        let state = state(MergeStrategy::FusedIntoRegions);
        let Json(scene) = scene_handler(State(Arc::clone(&state))).await;
        assert_eq!(scene.series.len(), 1);

        let Json(geometry) = geometry_handler(State(state)).await;
        assert_eq!(geometry.features.len(), 2);
    }

    #[test]
    fn router_builds() {
        let _router = build_router(state(MergeStrategy::IndependentMarkers));
    }
}
