//! JSON endpoints behind the storefront calculator and the admin formula
//! editor.
//!
//! Every request reads reference data from the shared source and builds its
//! own `PricingContext`; nothing priced here is cached between requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use paperquote_core::config::PricingSettings;
use paperquote_core::formula::{preview, Formula, FormulaKind};
use paperquote_core::pricing::{DeterministicPricingEngine, PricingEngine, PricingMode, Quote};
use paperquote_core::reference::{ReferenceData, ReferenceSource};
use paperquote_core::{
    ApplicationError, ContactDetails, InterfaceError, OrderSnapshot, PricingError, ProductId,
    ProductQuoteInput,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    source: Arc<dyn ReferenceSource>,
    settings: PricingSettings,
    engine: Arc<dyn PricingEngine>,
}

impl AppState {
    pub fn new(source: Arc<dyn ReferenceSource>, settings: PricingSettings) -> Self {
        Self { source, settings, engine: Arc::new(DeterministicPricingEngine) }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub kind: String,
    pub correlation_id: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Default, Deserialize)]
pub struct QuoteParams {
    /// Standard formula to price against, e.g. `roll` or `sheet`.
    pub product_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FormulaValidateRequest {
    pub formula: String,
    #[serde(default)]
    pub kind: FormulaKind,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct FormulaValidateResponse {
    pub valid: bool,
    pub variables: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FormulaPreviewRequest {
    pub formula: String,
    #[serde(default)]
    pub kind: FormulaKind,
    #[serde(default)]
    pub bindings: BTreeMap<String, f64>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct FormulaPreviewResponse {
    pub result: f64,
}

/// Either a catalog product plus the customer's input, priced from the
/// product record, or an explicit `mode` for work with no catalog entry.
#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub input: Option<ProductQuoteInput>,
    #[serde(default)]
    pub mode: Option<PricingMode>,
    pub contact: ContactDetails,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/quotes", post(create_quote))
        .route("/api/v1/products/{id}/quote", post(quote_product))
        .route("/api/v1/formulas/validate", post(validate_formula))
        .route("/api/v1/formulas/preview", post(preview_formula))
        .route("/api/v1/orders", post(create_order))
        .with_state(state)
}

pub async fn create_quote(
    State(state): State<AppState>,
    Query(params): Query<QuoteParams>,
    Json(mode): Json<PricingMode>,
) -> ApiResult<Json<Quote>> {
    let correlation_id = new_correlation_id();
    let data = load_reference(&state, &correlation_id)?;

    price(&state, &data, &mode, params.product_type.as_deref(), &correlation_id).map(Json)
}

pub async fn quote_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ProductQuoteInput>,
) -> ApiResult<Json<Quote>> {
    let correlation_id = new_correlation_id();
    let data = load_reference(&state, &correlation_id)?;

    let product_id = ProductId(id);
    let Some(product) = data.product(&product_id) else {
        return Err(reject(
            ApplicationError::NotFound(format!("product `{}` does not exist", product_id.0)),
            &correlation_id,
        ));
    };
    let mode = product
        .pricing_mode(&input)
        .map_err(|error| reject(ApplicationError::from(error), &correlation_id))?;

    price(&state, &data, &mode, Some(product.product_type.as_str()), &correlation_id).map(Json)
}

/// Admin save-time check. An invalid formula is a normal answer here, not an
/// error status.
pub async fn validate_formula(
    Json(request): Json<FormulaValidateRequest>,
) -> Json<FormulaValidateResponse> {
    let response = match Formula::parse(&request.formula, request.kind) {
        Ok(formula) => FormulaValidateResponse {
            valid: true,
            variables: formula
                .variables()
                .iter()
                .map(|variable| variable.name().to_string())
                .collect(),
            error: None,
        },
        Err(error) => FormulaValidateResponse {
            valid: false,
            variables: Vec::new(),
            error: Some(error.to_string()),
        },
    };
    Json(response)
}

pub async fn preview_formula(
    Json(request): Json<FormulaPreviewRequest>,
) -> ApiResult<Json<FormulaPreviewResponse>> {
    let correlation_id = new_correlation_id();
    preview(&request.formula, request.kind, &request.bindings)
        .map(|result| Json(FormulaPreviewResponse { result }))
        .map_err(|error| reject(PricingError::from(error).into(), &correlation_id))
}

/// Prices the request and freezes it with the customer's contact details.
/// The snapshot is returned to the caller; storing it is the storefront's job.
///
/// Catalog products are always priced from their record, so the stored price
/// and the stock/minimum-order bounds come from reference data, never from the
/// request body.
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<OrderRequest>,
) -> ApiResult<(StatusCode, Json<OrderSnapshot>)> {
    let correlation_id = new_correlation_id();
    let OrderRequest { product_id, input, mode, contact } = request;
    contact.validate().map_err(|error| reject(ApplicationError::from(error), &correlation_id))?;

    let data = load_reference(&state, &correlation_id)?;
    let product = match &product_id {
        Some(id) => Some(data.product(id).ok_or_else(|| {
            reject(
                ApplicationError::NotFound(format!("product `{}` does not exist", id.0)),
                &correlation_id,
            )
        })?),
        None => None,
    };
    let (mode, product_type) = match (product, input, mode) {
        (Some(_), _, Some(_)) => {
            return Err(reject(
                PricingError::invalid_input(
                    "mode",
                    "catalog products are priced from the product record; send `input` instead",
                )
                .into(),
                &correlation_id,
            ));
        }
        (Some(product), Some(input), None) => {
            let mode = product
                .pricing_mode(&input)
                .map_err(|error| reject(ApplicationError::from(error), &correlation_id))?;
            (mode, Some(product.product_type.as_str()))
        }
        (Some(_), None, None) => {
            return Err(reject(
                PricingError::invalid_input("input", "is required when ordering a catalog product")
                    .into(),
                &correlation_id,
            ));
        }
        (None, _, Some(mode)) => (mode, None),
        (None, _, None) => {
            return Err(reject(
                PricingError::invalid_input("mode", "is required without a product_id").into(),
                &correlation_id,
            ));
        }
    };

    let quote = price(&state, &data, &mode, product_type, &correlation_id)?;
    let snapshot = OrderSnapshot::freeze(quote, product_id, contact)
        .map_err(|error| reject(ApplicationError::from(error), &correlation_id))?;

    info!(
        event_name = "server.order.frozen",
        correlation_id = %correlation_id,
        order_id = %snapshot.id.0,
        content_hash = %snapshot.content_hash,
        total = snapshot.quote.total(),
        "order snapshot created"
    );
    Ok((StatusCode::CREATED, Json(snapshot)))
}

fn load_reference(state: &AppState, correlation_id: &str) -> ApiResult<ReferenceData> {
    state.source.load().map_err(|error| reject(ApplicationError::from(error), correlation_id))
}

fn price(
    state: &AppState,
    data: &ReferenceData,
    mode: &PricingMode,
    product_type: Option<&str>,
    correlation_id: &str,
) -> ApiResult<Quote> {
    let context = data
        .context(&state.settings, product_type)
        .map_err(|error| reject(ApplicationError::from(error), correlation_id))?;

    let quote = state
        .engine
        .price(mode, &context)
        .map_err(|error| reject(ApplicationError::from(error), correlation_id))?;

    info!(
        event_name = "server.quote.priced",
        correlation_id = %correlation_id,
        mode = ?quote.mode,
        total = quote.total(),
        "quote calculated"
    );
    Ok(quote)
}

fn reject(error: ApplicationError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    let interface = error.into_interface(correlation_id);
    let status = match interface {
        InterfaceError::BadRequest { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    warn!(
        event_name = "server.request.rejected",
        correlation_id = %correlation_id,
        kind = interface.kind(),
        error = %interface,
        "request rejected"
    );

    // Internal details stay in the log.
    let error = match interface {
        InterfaceError::Internal { .. } => interface.user_message().to_string(),
        _ => interface.message().to_string(),
    };
    (
        status,
        Json(ApiError {
            error,
            kind: interface.kind().to_string(),
            correlation_id: correlation_id.to_string(),
        }),
    )
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}
