use crate::error::SettlementError;
use crate::model::{BankAccountDraft, EligibleOrder, PaymentMethod};
use crate::payout_fsm::PayoutStatus;
use crate::settlement::SettlementService;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Responder, ResponseError, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

impl ResponseError for SettlementError {
    fn status_code(&self) -> StatusCode {
        match self {
            SettlementError::Validation(_) => StatusCode::BAD_REQUEST,
            SettlementError::NotFound(_) => StatusCode::NOT_FOUND,
            SettlementError::InvalidTransition { .. } => StatusCode::CONFLICT,
            SettlementError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            SettlementError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "code": self.kind(),
            "error": self.to_string(),
        }))
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// --- Payout handlers ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutListQuery {
    producer_id: Option<String>,
    status: Option<PayoutStatus>,
}

pub async fn list_payouts(
    service: web::Data<Arc<SettlementService>>,
    query: web::Query<PayoutListQuery>,
) -> impl Responder {
    let payouts = service.payouts(query.producer_id.as_deref(), query.status);
    HttpResponse::Ok().json(payouts)
}

pub async fn get_payout(
    service: web::Data<Arc<SettlementService>>,
    payout_id: web::Path<String>,
) -> Result<HttpResponse, SettlementError> {
    let payout = service.payout(&payout_id)?;
    Ok(HttpResponse::Ok().json(payout))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayoutRequest {
    producer_id: String,
    orders: Vec<EligibleOrder>,
}

pub async fn create_payout(
    service: web::Data<Arc<SettlementService>>,
    body: web::Json<CreatePayoutRequest>,
) -> Result<HttpResponse, SettlementError> {
    let payout = service.create_payout(&body.producer_id, &body.orders)?;
    Ok(HttpResponse::Created().json(payout))
}

pub async fn aggregate_payout(
    service: web::Data<Arc<SettlementService>>,
    producer_id: web::Path<String>,
) -> Result<HttpResponse, SettlementError> {
    let payout = service.aggregate_for_producer(&producer_id).await?;
    Ok(HttpResponse::Created().json(payout))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    scheduled_for: DateTime<Utc>,
    expected_version: Option<u64>,
}

pub async fn schedule_payout(
    service: web::Data<Arc<SettlementService>>,
    payout_id: web::Path<String>,
    body: web::Json<ScheduleRequest>,
) -> Result<HttpResponse, SettlementError> {
    let payout = service.schedule(&payout_id, body.scheduled_for, body.expected_version)?;
    Ok(HttpResponse::Ok().json(payout))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkProcessingRequest {
    expected_version: Option<u64>,
}

pub async fn mark_processing(
    service: web::Data<Arc<SettlementService>>,
    payout_id: web::Path<String>,
    body: web::Json<MarkProcessingRequest>,
) -> Result<HttpResponse, SettlementError> {
    let payout = service.mark_processing(&payout_id, body.expected_version)?;
    Ok(HttpResponse::Ok().json(payout))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    bank_account_id: String,
    payment_reference: String,
    payment_method: PaymentMethod,
    expected_version: Option<u64>,
}

pub async fn complete_payout(
    service: web::Data<Arc<SettlementService>>,
    payout_id: web::Path<String>,
    body: web::Json<CompleteRequest>,
) -> Result<HttpResponse, SettlementError> {
    let payout = service.complete(
        &payout_id,
        &body.bank_account_id,
        &body.payment_reference,
        body.payment_method,
        body.expected_version,
    )?;
    Ok(HttpResponse::Ok().json(payout))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailRequest {
    reason: String,
    expected_version: Option<u64>,
}

pub async fn fail_payout(
    service: web::Data<Arc<SettlementService>>,
    payout_id: web::Path<String>,
    body: web::Json<FailRequest>,
) -> Result<HttpResponse, SettlementError> {
    let payout = service.fail(&payout_id, &body.reason, body.expected_version)?;
    Ok(HttpResponse::Ok().json(payout))
}

// --- Bank account handlers ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountListQuery {
    producer_id: String,
    #[serde(default)]
    include_unverified: bool,
}

pub async fn list_bank_accounts(
    service: web::Data<Arc<SettlementService>>,
    query: web::Query<AccountListQuery>,
) -> impl Responder {
    let accounts = service.bank_accounts(&query.producer_id, query.include_unverified);
    HttpResponse::Ok().json(accounts)
}

pub async fn register_bank_account(
    service: web::Data<Arc<SettlementService>>,
    body: web::Json<BankAccountDraft>,
) -> Result<HttpResponse, SettlementError> {
    let account = service.register_bank_account(body.into_inner())?;
    Ok(HttpResponse::Created().json(account))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAccountRequest {
    verified_by: String,
}

pub async fn verify_bank_account(
    service: web::Data<Arc<SettlementService>>,
    account_id: web::Path<String>,
    body: web::Json<VerifyAccountRequest>,
) -> Result<HttpResponse, SettlementError> {
    let account = service.verify_bank_account(&account_id, &body.verified_by)?;
    Ok(HttpResponse::Ok().json(account))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectAccountRequest {
    reason: String,
}

pub async fn reject_bank_account(
    service: web::Data<Arc<SettlementService>>,
    account_id: web::Path<String>,
    body: web::Json<RejectAccountRequest>,
) -> Result<HttpResponse, SettlementError> {
    let account = service.reject_bank_account(&account_id, &body.reason)?;
    Ok(HttpResponse::Ok().json(account))
}

pub async fn resubmit_bank_account(
    service: web::Data<Arc<SettlementService>>,
    account_id: web::Path<String>,
) -> Result<HttpResponse, SettlementError> {
    let account = service.resubmit_bank_account(&account_id)?;
    Ok(HttpResponse::Ok().json(account))
}

// Route table
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health_check)))
        .service(
            web::resource("/payouts")
                .route(web::get().to(list_payouts))
                .route(web::post().to(create_payout)),
        )
        .service(
            web::resource("/payouts/aggregate/{producer_id}")
                .route(web::post().to(aggregate_payout)),
        )
        .service(web::resource("/payouts/{id}").route(web::get().to(get_payout)))
        .service(web::resource("/payouts/{id}/schedule").route(web::post().to(schedule_payout)))
        .service(web::resource("/payouts/{id}/processing").route(web::post().to(mark_processing)))
        .service(web::resource("/payouts/{id}/complete").route(web::post().to(complete_payout)))
        .service(web::resource("/payouts/{id}/fail").route(web::post().to(fail_payout)))
        .service(
            web::resource("/bank-accounts")
                .route(web::get().to(list_bank_accounts))
                .route(web::post().to(register_bank_account)),
        )
        .service(
            web::resource("/bank-accounts/{id}/verify").route(web::post().to(verify_bank_account)),
        )
        .service(
            web::resource("/bank-accounts/{id}/reject").route(web::post().to(reject_bank_account)),
        )
        .service(
            web::resource("/bank-accounts/{id}/resubmit")
                .route(web::post().to(resubmit_bank_account)),
        );
}
