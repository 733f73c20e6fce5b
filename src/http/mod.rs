//! JSON API over a [`SplitLedger`]
//!
//! Routes live under `/api/v1`. Every failure answers with a
//! `{"detail": "..."}` body.

pub mod dto;
pub mod error;

use actix_web::{web, HttpResponse};
use tokio::sync::Mutex;

use crate::ledger::SplitLedger;
use crate::traits::SplitStorage;
use crate::types::*;
use dto::*;

/// Shared state of the HTTP layer
///
/// The ledger sits behind an async mutex, so requests are applied one at a
/// time and every read sees the writes before it.
pub struct AppState<S: SplitStorage> {
    pub ledger: Mutex<SplitLedger<S>>,
}

impl<S: SplitStorage> AppState<S> {
    pub fn new(ledger: SplitLedger<S>) -> Self {
        Self {
            ledger: Mutex::new(ledger),
        }
    }
}

type Handled = Result<HttpResponse, LedgerError>;

/// Register the API routes for a ledger over storage `S`
///
/// Expects a `web::Data<AppState<S>>` in the app data.
pub fn configure<S>(cfg: &mut web::ServiceConfig)
where
    S: SplitStorage + Clone + 'static,
{
    cfg.app_data(web::JsonConfig::default().error_handler(error::json_error_handler))
        .app_data(web::PathConfig::default().error_handler(error::path_error_handler))
        .service(
            web::scope("/api/v1")
                .route("/members", web::post().to(create_member::<S>))
                .route("/members/{member_id}", web::get().to(get_member::<S>))
                .service(
                    web::resource("/groups")
                        .route(web::get().to(list_groups::<S>))
                        .route(web::post().to(create_group::<S>)),
                )
                .route("/groups/{group_id}", web::get().to(get_group::<S>))
                .service(
                    web::resource("/groups/{group_id}/transactions")
                        .route(web::get().to(list_transactions::<S>))
                        .route(web::post().to(create_transaction::<S>)),
                )
                .service(
                    web::resource("/transactions/{transaction_id}")
                        .route(web::get().to(get_transaction::<S>))
                        .route(web::put().to(update_transaction::<S>))
                        .route(web::delete().to(delete_transaction::<S>)),
                ),
        );
}

/// Fallback for unknown routes
pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorBody {
        detail: "Not found".to_string(),
    })
}

async fn create_member<S: SplitStorage + Clone + 'static>(
    state: web::Data<AppState<S>>,
    payload: web::Json<MemberPayload>,
) -> Handled {
    let payload = payload.into_inner();
    let member = state
        .ledger
        .lock()
        .await
        .register_member(payload.username, payload.display_name)
        .await?;
    Ok(HttpResponse::Created().json(member))
}

async fn get_member<S: SplitStorage + Clone + 'static>(
    state: web::Data<AppState<S>>,
    member_id: web::Path<String>,
) -> Handled {
    let member_id = member_id.into_inner();
    match state.ledger.lock().await.get_member(&member_id).await? {
        Some(member) => Ok(HttpResponse::Ok().json(member)),
        None => Ok(HttpResponse::NotFound().json(ErrorBody {
            detail: format!("Member not found: {}", member_id),
        })),
    }
}

async fn list_groups<S: SplitStorage + Clone + 'static>(state: web::Data<AppState<S>>) -> Handled {
    let groups = state.ledger.lock().await.list_groups().await?;
    Ok(HttpResponse::Ok().json(groups))
}

async fn create_group<S: SplitStorage + Clone + 'static>(
    state: web::Data<AppState<S>>,
    payload: web::Json<GroupPayload>,
) -> Handled {
    let payload = payload.into_inner();
    let group = state
        .ledger
        .lock()
        .await
        .create_group(payload.name, payload.members)
        .await?;
    Ok(HttpResponse::Created().json(group))
}

async fn get_group<S: SplitStorage + Clone + 'static>(
    state: web::Data<AppState<S>>,
    group_id: web::Path<String>,
) -> Handled {
    let group_id = group_id.into_inner();
    let ledger = state.ledger.lock().await;
    let group = ledger
        .get_group(&group_id)
        .await?
        .ok_or_else(|| LedgerError::GroupNotFound(group_id.clone()))?;
    let balances = ledger.group_balances(&group_id).await?;
    Ok(HttpResponse::Ok().json(GroupView { group, balances }))
}

async fn list_transactions<S: SplitStorage + Clone + 'static>(
    state: web::Data<AppState<S>>,
    group_id: web::Path<String>,
) -> Handled {
    let transactions = state
        .ledger
        .lock()
        .await
        .list_transactions(&group_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(transactions))
}

async fn create_transaction<S: SplitStorage + Clone + 'static>(
    state: web::Data<AppState<S>>,
    group_id: web::Path<String>,
    payload: web::Json<TransactionPayload>,
) -> Handled {
    let group_id = group_id.into_inner();
    let payload = payload.into_inner();
    payload.check_group(&group_id)?;
    let draft = payload.into_draft()?;

    let outcome = state
        .ledger
        .lock()
        .await
        .record_transaction(&group_id, draft)
        .await?;
    Ok(HttpResponse::Created().json(outcome))
}

async fn get_transaction<S: SplitStorage + Clone + 'static>(
    state: web::Data<AppState<S>>,
    transaction_id: web::Path<String>,
) -> Handled {
    let transaction_id = transaction_id.into_inner();
    let transaction = state
        .ledger
        .lock()
        .await
        .get_transaction(&transaction_id)
        .await?
        .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.clone()))?;
    Ok(HttpResponse::Ok().json(TransactionView::from(transaction)))
}

async fn update_transaction<S: SplitStorage + Clone + 'static>(
    state: web::Data<AppState<S>>,
    transaction_id: web::Path<String>,
    payload: web::Json<TransactionPayload>,
) -> Handled {
    let transaction_id = transaction_id.into_inner();
    let payload = payload.into_inner();
    let mut ledger = state.ledger.lock().await;

    let existing = ledger
        .get_transaction(&transaction_id)
        .await?
        .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.clone()))?;
    payload.check_group(&existing.group_id)?;

    let expected_version = payload.version;
    let draft = payload.into_draft()?;
    let outcome = ledger
        .update_transaction(&transaction_id, draft, expected_version)
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

async fn delete_transaction<S: SplitStorage + Clone + 'static>(
    state: web::Data<AppState<S>>,
    transaction_id: web::Path<String>,
) -> Handled {
    let outcome = state
        .ledger
        .lock()
        .await
        .delete_transaction(&transaction_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}
