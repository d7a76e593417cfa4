//! REST API for the box calculator.
//!
//! Exposes the single-SKU allocator, the quantity plan and the orientation
//! variant search as JSON endpoints. Uses Axum as the web framework and
//! supports CORS. Engine calls run on the blocking thread pool.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::allocator::{
    AllocationOptions, choose_boxes_for_quantity, choose_boxes_for_quantity_extended,
    choose_single_box_for_quantity,
};
use crate::config::{ApiConfig, EngineConfig};
use crate::model::{Carton, OrientationMode, Sku, ValidationError};
use crate::multi::MultiSkuOptions;
use crate::plan::{CalculationResult, ExtendedCalculationResult, ShipmentPlan};
use crate::quantity_plan::{QuantityGroup, build_quantity_plan};
use crate::settings::{SkuInput, SkuOverride, resolve_sku};
use crate::trace::CalculationLog;
use crate::variants::{SkuEntry, VariantSearchOutcome, search_orientation_variants};
use crate::weight::{ShipmentWeight, shipment_weight};

#[derive(Clone)]
struct ApiState {
    engine: EngineConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>box-calculator API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request for a single-SKU calculation.
///
/// Unset clearances are resolved from `overrides` (by `sku.sku_id`) and the
/// server's configured defaults. `box_padding` falls back to the server value.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(
    example = json!({
        "boxes": [
            { "id": 1, "inner": { "w": 300.0, "d": 200.0, "h": 180.0 }, "max_weight_kg": 20.0, "box_weight_kg": 0.4 },
            { "id": 2, "inner": { "w": 110.0, "d": 100.0, "h": 60.0 } }
        ],
        "sku": { "sku_id": "A-100", "dims": { "w": 50.0, "d": 50.0, "h": 30.0 }, "unit_weight_kg": 0.1 },
        "quantity": 150,
        "allow_partial": true
    })
)]
pub struct QuantityRequest {
    pub boxes: Vec<Carton>,
    pub sku: SkuInput,
    pub quantity: u32,
    #[serde(default)]
    pub box_id: Option<u32>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub box_padding: Option<f64>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub allow_partial: Option<bool>,
    #[serde(default)]
    pub overrides: Vec<SkuOverride>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub trace: Option<bool>,
}

/// Request for the quantity plan of one SKU.
#[derive(Deserialize, Clone, ToSchema)]
pub struct QuantityPlanRequest {
    pub boxes: Vec<Carton>,
    pub sku: SkuInput,
    /// Clamped to `1..=500`.
    pub max_quantity: u32,
    #[serde(default)]
    pub box_id: Option<u32>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub box_padding: Option<f64>,
    #[serde(default)]
    pub overrides: Vec<SkuOverride>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub trace: Option<bool>,
}

/// One SKU of a joint request.
#[derive(Deserialize, Clone, ToSchema)]
pub struct MultiSkuItem {
    pub sku: SkuInput,
    #[serde(default)]
    pub mode: OrientationMode,
    pub quantity: u32,
}

/// Request for the orientation variant search over several SKUs.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(
    example = json!({
        "boxes": [{ "id": 1, "inner": { "w": 300.0, "d": 300.0, "h": 100.0 } }],
        "skus": [
            { "sku": { "dims": { "w": 50.0, "d": 50.0, "h": 50.0 } }, "mode": "auto", "quantity": 50 },
            { "sku": { "dims": { "w": 50.0, "d": 50.0, "h": 50.0 } }, "mode": "flat", "quantity": 50 }
        ]
    })
)]
pub struct MultiRequest {
    pub boxes: Vec<Carton>,
    pub skus: Vec<MultiSkuItem>,
    #[serde(default)]
    pub box_id: Option<u32>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub box_padding: Option<f64>,
    #[serde(default)]
    pub overrides: Vec<SkuOverride>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub trace: Option<bool>,
}

#[derive(Debug)]
enum RequestValidationError {
    MissingSkus,
    Invalid(ValidationError),
}

#[derive(Debug)]
struct ValidatedQuantityRequest {
    boxes: Vec<Carton>,
    sku: Sku,
    quantity: u32,
    options: AllocationOptions,
    trace: bool,
}

#[derive(Debug)]
struct ValidatedMultiRequest {
    boxes: Vec<Carton>,
    entries: Vec<SkuEntry>,
    options: MultiSkuOptions,
    trace: bool,
}

impl QuantityRequest {
    fn into_validated(
        self,
        engine: &EngineConfig,
    ) -> Result<ValidatedQuantityRequest, RequestValidationError> {
        let sku = resolve_sku(&self.sku, &self.overrides, &engine.general);
        sku.validate().map_err(RequestValidationError::Invalid)?;

        Ok(ValidatedQuantityRequest {
            boxes: self.boxes,
            sku,
            quantity: self.quantity,
            options: AllocationOptions {
                box_id: self.box_id,
                box_padding: self.box_padding.unwrap_or(engine.box_padding),
                allow_partial: self.allow_partial.unwrap_or(true),
            },
            trace: self.trace.unwrap_or(engine.trace_by_default),
        })
    }
}

impl QuantityPlanRequest {
    fn into_validated(
        self,
        engine: &EngineConfig,
    ) -> Result<ValidatedQuantityRequest, RequestValidationError> {
        QuantityRequest {
            boxes: self.boxes,
            sku: self.sku,
            quantity: self.max_quantity,
            box_id: self.box_id,
            box_padding: self.box_padding,
            allow_partial: None,
            overrides: self.overrides,
            trace: self.trace,
        }
        .into_validated(engine)
    }
}

impl MultiRequest {
    fn into_validated(
        self,
        engine: &EngineConfig,
    ) -> Result<ValidatedMultiRequest, RequestValidationError> {
        if self.skus.is_empty() {
            return Err(RequestValidationError::MissingSkus);
        }

        let entries = self
            .skus
            .iter()
            .map(|item| {
                let sku = resolve_sku(&item.sku, &self.overrides, &engine.general);
                sku.validate().map(|_| SkuEntry {
                    sku,
                    mode: item.mode,
                    quantity: item.quantity,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()
            .map_err(RequestValidationError::Invalid)?;

        Ok(ValidatedMultiRequest {
            boxes: self.boxes,
            entries,
            options: MultiSkuOptions {
                box_id: self.box_id,
                box_padding: self.box_padding.unwrap_or(engine.box_padding),
            },
            trace: self.trace.unwrap_or(engine.trace_by_default),
        })
    }
}

/// Response of `POST /quantity`.
///
/// # Fields
/// * `standard` / `extended` - The same allocation in both plan shapes
/// * `single_box` - Smallest carton taking the whole quantity, if any
/// * `weights` - Weight of each standard shipment, in shipment order
/// * `trace` - Calculation trace, empty unless requested
#[derive(Serialize, ToSchema)]
pub struct QuantityResponse {
    pub standard: CalculationResult,
    pub extended: ExtendedCalculationResult,
    pub single_box: Option<ShipmentPlan>,
    pub weights: Vec<ShipmentWeight>,
    pub trace: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct QuantityPlanResponse {
    pub groups: Vec<QuantityGroup>,
    pub trace: Vec<String>,
}

/// Response of `POST /multi`.
///
/// `weights` belongs to the selected variant's extended shipments.
#[derive(Serialize, ToSchema)]
pub struct MultiResponse {
    pub outcome: VariantSearchOutcome,
    pub weights: Vec<ShipmentWeight>,
    pub trace: Vec<String>,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn request_error(err: RequestValidationError) -> Response {
    match err {
        RequestValidationError::MissingSkus => {
            validation_error("At least one SKU must be specified")
        }
        RequestValidationError::Invalid(err) => validation_error(err.to_string()),
    }
}

fn unwrap_payload<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match payload {
        Ok(Json(payload)) => Ok(payload),
        Err(err) => Err(json_deserialize_error(err)),
    }
}

/// Runs an engine call on the blocking pool and maps its errors to responses.
async fn run_engine<T, F>(calculation: F) -> Result<T, Response>
where
    F: FnOnce() -> Result<T, ValidationError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(calculation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(validation_error(err.to_string())),
        Err(err) => {
            tracing::error!("❌ Calculation task failed: {}", err);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Calculation failed",
                err.to_string(),
            ))
        }
    }
}

fn carton_by_id(boxes: &[Carton], id: u32) -> Option<&Carton> {
    boxes.iter().find(|carton| carton.id == id)
}

fn quantity_response(
    request: ValidatedQuantityRequest,
    packaging_multiplier: f64,
) -> Result<QuantityResponse, ValidationError> {
    let ValidatedQuantityRequest {
        boxes,
        sku,
        quantity,
        options,
        trace,
    } = request;
    let mut log = CalculationLog::new(trace);

    let standard = choose_boxes_for_quantity(&boxes, &sku, quantity, &options, &mut log)?;
    let extended = choose_boxes_for_quantity_extended(&boxes, &sku, quantity, &options, &mut log)?;
    let single_box = choose_single_box_for_quantity(&boxes, &sku, quantity, &options, &mut log)?;

    let skus = std::slice::from_ref(&sku);
    let weights = standard
        .shipments
        .iter()
        .map(|shipment| {
            shipment_weight(
                skus,
                &shipment.sku_quantities,
                carton_by_id(&boxes, shipment.plan.box_id),
                packaging_multiplier,
            )
        })
        .collect();

    Ok(QuantityResponse {
        standard,
        extended,
        single_box,
        weights,
        trace: log.drain(),
    })
}

fn multi_outcome(
    request: &ValidatedMultiRequest,
    log: &mut CalculationLog,
) -> Result<VariantSearchOutcome, ValidationError> {
    search_orientation_variants(&request.boxes, &request.entries, &request.options, log)
}

fn multi_weights(
    request: &ValidatedMultiRequest,
    outcome: &VariantSearchOutcome,
    packaging_multiplier: f64,
) -> Vec<ShipmentWeight> {
    let skus: Vec<Sku> = request.entries.iter().map(|e| e.sku.clone()).collect();
    outcome
        .selected
        .extended
        .shipments
        .iter()
        .map(|shipment| {
            shipment_weight(
                &skus,
                &shipment.sku_quantities,
                carton_by_id(&request.boxes, shipment.plan.box_id),
                packaging_multiplier,
            )
        })
        .collect()
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_quantity,
        handle_quantity_plan,
        handle_multi,
        handle_multi_stream
    ),
    components(
        schemas(
            QuantityRequest,
            QuantityPlanRequest,
            MultiRequest,
            MultiSkuItem,
            QuantityResponse,
            QuantityPlanResponse,
            MultiResponse,
            ErrorResponse,
            Carton,
            SkuInput,
            SkuOverride,
            OrientationMode,
            ShipmentWeight
        )
    ),
    tags((name = "calculation", description = "Carton selection and packing plans"))
)]
struct ApiDoc;

fn router(engine: EngineConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/quantity", post(handle_quantity))
        .route("/quantity_plan", post(handle_quantity_plan))
        .route("/multi", post(handle_multi))
        .route("/multi_stream", post(handle_multi_stream))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(ApiState { engine })
}

/// Starts the API server and serves until it terminates.
///
/// Configures CORS for cross-origin requests from any frontend.
pub async fn start_api_server(config: ApiConfig, engine: EngineConfig) {
    let app = router(engine);

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("❌ Could not bind API server to {}: {}", addr, err);
            return;
        }
    };

    tracing::info!(
        "🚀 Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        tracing::info!("💡 Local access: http://localhost:{}", config.port());
    }
    tracing::info!(
        "📦 API Endpoints: POST /quantity, POST /quantity_plan, POST /multi, POST /multi_stream"
    );
    tracing::info!("📑 Documentation: GET /docs, GET /docs/openapi.json");

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("❌ API server terminated with an error: {err}");
    }
}

/// Handler for POST /quantity.
///
/// Splits the quantity of one SKU into shipments and reports the smallest
/// carton that would take it all at once.
#[utoipa::path(
    post,
    path = "/quantity",
    request_body = QuantityRequest,
    responses(
        (status = 200, description = "Allocation of the requested quantity", body = QuantityResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "calculation"
)]
async fn handle_quantity(
    State(state): State<ApiState>,
    payload: Result<Json<QuantityRequest>, JsonRejection>,
) -> Response {
    let request = match unwrap_payload(payload)
        .and_then(|p| p.into_validated(&state.engine).map_err(request_error))
    {
        Ok(request) => request,
        Err(response) => return response,
    };

    tracing::info!(
        "📥 Quantity request: {} units, {} boxes",
        request.quantity,
        request.boxes.len()
    );
    let multiplier = state.engine.packaging_weight_multiplier;
    match run_engine(move || quantity_response(request, multiplier)).await {
        Ok(response) => {
            tracing::info!(
                "📦 Result: {} shipments, {} leftover",
                response.standard.shipments.len(),
                response.standard.leftover
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(response) => response,
    }
}

/// Handler for POST /quantity_plan.
#[utoipa::path(
    post,
    path = "/quantity_plan",
    request_body = QuantityPlanRequest,
    responses(
        (status = 200, description = "Single-carton plan per quantity range", body = QuantityPlanResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "calculation"
)]
async fn handle_quantity_plan(
    State(state): State<ApiState>,
    payload: Result<Json<QuantityPlanRequest>, JsonRejection>,
) -> Response {
    let request = match unwrap_payload(payload)
        .and_then(|p| p.into_validated(&state.engine).map_err(request_error))
    {
        Ok(request) => request,
        Err(response) => return response,
    };

    tracing::info!("📥 Quantity plan request: up to {} units", request.quantity);
    let result = run_engine(move || {
        let mut log = CalculationLog::new(request.trace);
        let groups = build_quantity_plan(
            &request.boxes,
            &request.sku,
            request.quantity,
            &request.options,
            &mut log,
        )?;
        Ok(QuantityPlanResponse {
            groups,
            trace: log.drain(),
        })
    })
    .await;

    match result {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(response) => response,
    }
}

/// Handler for POST /multi.
///
/// Packs several SKUs jointly and returns the best orientation variant.
#[utoipa::path(
    post,
    path = "/multi",
    request_body = MultiRequest,
    responses(
        (status = 200, description = "Selected orientation variant", body = MultiResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "calculation"
)]
async fn handle_multi(
    State(state): State<ApiState>,
    payload: Result<Json<MultiRequest>, JsonRejection>,
) -> Response {
    let request = match unwrap_payload(payload)
        .and_then(|p| p.into_validated(&state.engine).map_err(request_error))
    {
        Ok(request) => request,
        Err(response) => return response,
    };

    tracing::info!(
        "📥 Multi-SKU request: {} SKUs, {} boxes",
        request.entries.len(),
        request.boxes.len()
    );
    let multiplier = state.engine.packaging_weight_multiplier;
    let result = run_engine(move || {
        let mut log = CalculationLog::new(request.trace);
        let outcome = multi_outcome(&request, &mut log)?;
        let weights = multi_weights(&request, &outcome, multiplier);
        Ok(MultiResponse {
            outcome,
            weights,
            trace: log.drain(),
        })
    })
    .await;

    match result {
        Ok(response) => {
            tracing::info!(
                "📦 Variant '{}' selected out of {}",
                response.outcome.selected.variant.label,
                response.outcome.variants_evaluated
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(response) => response,
    }
}

fn stream_event(name: &str, data: String) -> Event {
    Event::default().event(name).data(data)
}

/// Handler for POST /multi_stream (SSE).
///
/// Streams one `trace` event per trace line, then a single `result` event
/// with the [`MultiResponse`] (or an `error` event). The trace is always on.
#[utoipa::path(
    post,
    path = "/multi_stream",
    request_body = MultiRequest,
    responses(
        (
            status = 200,
            description = "Trace lines followed by the result",
            content_type = "text/event-stream",
            body = String
        ),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "calculation"
)]
async fn handle_multi_stream(
    State(state): State<ApiState>,
    payload: Result<Json<MultiRequest>, JsonRejection>,
) -> Response {
    let request = match unwrap_payload(payload)
        .and_then(|p| p.into_validated(&state.engine).map_err(request_error))
    {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<Event>(32);
    let multiplier = state.engine.packaging_weight_multiplier;

    tokio::task::spawn_blocking(move || {
        let mut log = CalculationLog::new(true);
        let final_event = match multi_outcome(&request, &mut log) {
            Ok(outcome) => {
                let weights = multi_weights(&request, &outcome, multiplier);
                let response = MultiResponse {
                    outcome,
                    weights,
                    trace: Vec::new(),
                };
                match serde_json::to_string(&response) {
                    Ok(json) => stream_event("result", json),
                    Err(err) => stream_event("error", err.to_string()),
                }
            }
            Err(err) => stream_event("error", err.to_string()),
        };

        for line in log.drain() {
            if tx.blocking_send(stream_event("trace", line)).is_err() {
                // Receiver has closed the stream; remaining events are discarded.
                return;
            }
        }
        let _ = tx.blocking_send(final_event);
    });

    let stream = ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>);
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
