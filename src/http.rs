//! HTTP transport: wire bodies, routes, and the outcome -> response mapping.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::Amount;
use crate::engine::Engine;
use crate::model::{ItemLine, TransactionOutcome, TransactionRequest};

pub const SUBMIT_PATH: &str = "/api/submittrxmessage";
pub const GENERATE_SIGNATURE_PATH: &str = "/api/partner/generatesignature";
pub const HEALTH_PATH: &str = "/health";

/// Inbound body of [`SUBMIT_PATH`]. Missing fields default to empty so the
/// field validator reports them.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubmitRequestBody {
    pub partnerkey: String,
    pub partnerrefno: String,
    pub partnerpassword: String,
    pub totalamount: i64,
    pub items: Option<Vec<ItemBody>>,
    pub timestamp: String,
    pub sig: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ItemBody {
    pub partneritemref: String,
    pub name: String,
    pub qty: i32,
    pub unitprice: i64,
}

/// Outbound body of [`SUBMIT_PATH`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitResponseBody {
    pub result: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totalamount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totaldiscount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalamount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resultmessage: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GenerateSignatureBody {
    pub partnerkey: String,
    pub partnerrefno: String,
    pub totalamount: i64,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateSignatureResponseBody {
    pub timestamp: String,
    pub sig: String,
}

impl From<SubmitRequestBody> for TransactionRequest {
    fn from(body: SubmitRequestBody) -> Self {
        TransactionRequest {
            partner_key: body.partnerkey,
            partner_ref_no: body.partnerrefno,
            partner_password: body.partnerpassword,
            total_amount: Amount::from_minor(body.totalamount),
            items: body.items.map(|items| {
                items
                    .into_iter()
                    .map(|item| ItemLine {
                        partner_item_ref: item.partneritemref,
                        name: item.name,
                        quantity: item.qty,
                        unit_price: Amount::from_minor(item.unitprice),
                    })
                    .collect()
            }),
            timestamp: body.timestamp,
            signature: body.sig,
        }
    }
}

impl SubmitResponseBody {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            result: 0,
            totalamount: None,
            totaldiscount: None,
            finalamount: None,
            resultmessage: Some(message.into()),
        }
    }
}

/// The one place an outcome becomes a status code and a body.
pub fn outcome_response(outcome: &TransactionOutcome) -> (StatusCode, SubmitResponseBody) {
    match outcome {
        TransactionOutcome::Success(settlement) => (
            StatusCode::OK,
            SubmitResponseBody {
                result: outcome.result().code(),
                totalamount: Some(settlement.total_amount.minor()),
                totaldiscount: Some(settlement.total_discount.minor()),
                finalamount: Some(settlement.final_amount.minor()),
                resultmessage: None,
            },
        ),
        TransactionOutcome::Failure { message } => {
            (StatusCode::BAD_REQUEST, SubmitResponseBody::failure(message.clone()))
        }
    }
}

/// Build the service router around a shared engine.
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route(SUBMIT_PATH, post(submit_transaction))
        .route(GENERATE_SIGNATURE_PATH, post(generate_signature))
        .route(HEALTH_PATH, get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

async fn submit_transaction(
    State(engine): State<Arc<Engine>>,
    payload: Result<Json<SubmitRequestBody>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => return bad_body(rejection),
    };

    let outcome = engine.process(&body.into());
    let (status, body) = outcome_response(&outcome);
    (status, Json(body)).into_response()
}

async fn generate_signature(
    State(engine): State<Arc<Engine>>,
    payload: Result<Json<GenerateSignatureBody>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => return bad_body(rejection),
    };

    match engine.generate_signature(
        &body.partnerkey,
        &body.partnerrefno,
        Amount::from_minor(body.totalamount),
        &body.timestamp,
    ) {
        Ok(stamp) => Json(GenerateSignatureResponseBody {
            timestamp: stamp.timestamp,
            sig: stamp.signature,
        })
        .into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(SubmitResponseBody::failure(e.to_string())))
            .into_response(),
    }
}

async fn health() -> &'static str {
    "ok"
}

fn bad_body(rejection: JsonRejection) -> Response {
    warn!(reason = %rejection.body_text(), "request body rejected");
    (
        StatusCode::BAD_REQUEST,
        Json(SubmitResponseBody::failure(rejection.body_text())),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::Percent;
    use crate::model::Settlement;

    #[test]
    fn success_maps_to_ok_without_message() {
        let outcome = TransactionOutcome::Success(Settlement {
            total_amount: Amount::from_minor(100_000),
            total_discount: Amount::from_minor(10_000),
            final_amount: Amount::from_minor(90_000),
            percent: Percent::from_whole(10),
        });
        let (status, body) = outcome_response(&outcome);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "result": 1,
                "totalamount": 100000,
                "totaldiscount": 10000,
                "finalamount": 90000,
            })
        );
    }

    #[test]
    fn failure_maps_to_bad_request_with_message_only() {
        let outcome = TransactionOutcome::failure("Access Denied!");
        let (status, body) = outcome_response(&outcome);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "result": 0, "resultmessage": "Access Denied!" })
        );
    }

    #[test]
    fn request_body_converts_items() {
        let body: SubmitRequestBody = serde_json::from_value(serde_json::json!({
            "partnerkey": "FAKEGOOGLE",
            "partnerrefno": "FG-00001",
            "partnerpassword": "RkFLRVBBU1NXT1JEMTIzNA==",
            "totalamount": 1000,
            "items": [
                { "partneritemref": "i-00001", "name": "Pen", "qty": 4, "unitprice": 250 }
            ],
            "timestamp": "2024-08-15T02:11:22.0000000Z",
            "sig": "abc"
        }))
        .unwrap();

        let request = TransactionRequest::from(body);
        assert_eq!(request.total_amount, Amount::from_minor(1000));
        let items = request.items.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 4);
        assert_eq!(items[0].unit_price, Amount::from_minor(250));
        assert_eq!(request.signature, "abc");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let body: SubmitRequestBody = serde_json::from_str("{}").unwrap();
        let request = TransactionRequest::from(body);
        assert!(request.partner_key.is_empty());
        assert_eq!(request.total_amount, Amount::ZERO);
        assert!(request.items.is_none());
    }
}
