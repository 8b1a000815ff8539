use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use sqlx::PgConnection;

use crate::{
    AppState, auth, db,
    domain::{Category, CategoryKind, Currency, User},
    ledger::{self, Transfer},
    model::{
        CategoryCreate, CategoryPatch, CategoryView, Credentials, PeriodQuery, SettingsPatch,
        SettingsView, StateResponse, StateView, TokenResponse, TransactionCreate,
        TransactionPatch, TransactionView, UserView,
    },
    period::{self, Period},
    policy,
};

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    AlreadyExists(String),
    Unauthorized(String),
    PolicyViolation(String),
    Validation(String),
    Database,
    Internal,
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:#?}", err);
        AppError::Database
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::AlreadyExists(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            AppError::PolicyViolation(message) => {
                tracing::info!("Policy violation: {}", &message);
                (StatusCode::BAD_REQUEST, message)
            }
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Database => (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("database error"),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("internal server error"),
            ),
        };

        (
            status,
            Json(serde_json::json!({ "message": message })),
        )
            .into_response()
    }
}

fn not_found(entity: &str, id: i64) -> AppError {
    AppError::NotFound(format!("{} {} is not found", entity, id))
}

fn category_kind(category: &Category) -> Result<CategoryKind, AppError> {
    CategoryKind::from_tag(category.kind).ok_or_else(|| {
        tracing::error!(
            "Category {} carries unknown kind tag {}",
            category.id,
            category.kind
        );
        AppError::Internal
    })
}

fn known_currency(tag: i32) -> Result<(), AppError> {
    Currency::from_tag(tag)
        .map(|_| ())
        .ok_or_else(|| AppError::Validation(format!("unknown currency {}", tag)))
}

fn period_for(month_offset: Option<i32>) -> Result<Period, AppError> {
    period::current_period(month_offset.unwrap_or(0))
        .ok_or_else(|| AppError::Validation(String::from("month offset is out of range")))
}

/// Resolve the bearer token and make sure the user behind it still exists.
async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    conn: &mut PgConnection,
) -> Result<User, AppError> {
    let token = auth::bearer_token(headers)?;
    let user_id = auth::resolve_token(&state.token_keys, token)?;
    db::query_user(conn, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(String::from("unauthorized")))
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Form(credentials): Form<Credentials>,
) -> Result<Json<TokenResponse>, AppError> {
    let mut tx = state.pool.begin().await?;

    if db::query_user_by_login(&mut tx, &credentials.username)
        .await?
        .is_some()
    {
        return Err(AppError::AlreadyExists(format!(
            "user {} is already registered",
            credentials.username
        )));
    }

    let hashed = auth::hash_password(&credentials.password)?;
    let user = db::insert_user(&mut tx, &credentials.username, &hashed).await?;
    db::insert_settings(&mut tx, user.id, Utc::now().date_naive(), Currency::Eur.tag()).await?;
    tx.commit().await?;

    tracing::info!("Registered user {} with id={}", &credentials.username, user.id);

    let token = auth::issue_token(&state.token_keys, user.id, state.token_ttl)?;
    Ok(Json(TokenResponse::bearer(token)))
}

pub async fn signin(
    State(state): State<Arc<AppState>>,
    Form(credentials): Form<Credentials>,
) -> Result<Json<TokenResponse>, AppError> {
    let mut tx = state.pool.begin().await?;
    let user = db::query_user_by_login(&mut tx, &credentials.username)
        .await?
        .ok_or_else(|| AppError::Unauthorized(String::from("unauthorized")))?;
    tx.commit().await?;

    auth::verify_password(&credentials.password, &user.password)?;

    let token = auth::issue_token(&state.token_keys, user.id, state.token_ttl)?;
    Ok(Json(TokenResponse::bearer(token)))
}

pub async fn get_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserView>>, AppError> {
    let mut tx = state.pool.begin().await?;
    let users = db::query_users(&mut tx).await?;
    tx.commit().await?;

    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

#[axum::debug_handler]
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StateResponse>, AppError> {
    let mut tx = state.pool.begin().await?;
    let user = authorize(&state, &headers, &mut tx).await?;

    let settings = db::query_settings(&mut tx, user.id).await?;
    let incomes =
        db::query_categories_by_kind(&mut tx, user.id, CategoryKind::Income.tag()).await?;
    let accounts =
        db::query_categories_by_kind(&mut tx, user.id, CategoryKind::Account.tag()).await?;
    let expenses =
        db::query_categories_by_kind(&mut tx, user.id, CategoryKind::Expense.tag()).await?;
    let transactions = db::query_transactions(&mut tx, user.id).await?;
    tx.commit().await?;

    Ok(Json(StateResponse {
        state: StateView {
            user: user.into(),
            settings: settings.map(SettingsView::from),
            incomes: incomes.into_iter().map(CategoryView::stored).collect(),
            accounts: accounts.into_iter().map(CategoryView::stored).collect(),
            expenses: expenses.into_iter().map(CategoryView::stored).collect(),
            transactions: transactions.into_iter().map(TransactionView::from).collect(),
        },
    }))
}

pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SettingsView>, AppError> {
    let mut tx = state.pool.begin().await?;
    let user = authorize(&state, &headers, &mut tx).await?;
    let settings = db::query_settings(&mut tx, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(String::from("settings is not presented")))?;
    tx.commit().await?;

    Ok(Json(settings.into()))
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SettingsPatch>,
) -> Result<Json<SettingsView>, AppError> {
    if let Some(tag) = payload.base_currency {
        known_currency(tag)?;
    }

    let mut tx = state.pool.begin().await?;
    let user = authorize(&state, &headers, &mut tx).await?;
    let settings = db::update_settings(&mut tx, user.id, payload.start_date, payload.base_currency)
        .await?
        .ok_or_else(|| AppError::NotFound(String::from("settings is not presented")))?;
    tx.commit().await?;

    Ok(Json(settings.into()))
}

/// Income and expense lists carry the period turnover as their display
/// amount; the stored running balance stays untouched.
async fn list_period_categories(
    state: &AppState,
    headers: &HeaderMap,
    kind: CategoryKind,
    month_offset: Option<i32>,
) -> Result<Json<Vec<CategoryView>>, AppError> {
    let (from, until) = period_for(month_offset)?.utc_range();

    let mut tx = state.pool.begin().await?;
    let user = authorize(state, headers, &mut tx).await?;
    let categories = db::query_categories_by_kind(&mut tx, user.id, kind.tag()).await?;
    let period_transactions = db::query_transactions_in(&mut tx, user.id, from, until).await?;
    tx.commit().await?;

    Ok(Json(
        categories
            .into_iter()
            .map(|category| {
                let total = ledger::turnover(&period_transactions, category.id);
                CategoryView::with_display_amount(category, total)
            })
            .collect(),
    ))
}

pub async fn get_incomes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<CategoryView>>, AppError> {
    list_period_categories(&state, &headers, CategoryKind::Income, query.month_offset).await
}

pub async fn get_expenses(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<CategoryView>>, AppError> {
    list_period_categories(&state, &headers, CategoryKind::Expense, query.month_offset).await
}

pub async fn get_accounts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<CategoryView>>, AppError> {
    let mut tx = state.pool.begin().await?;
    let user = authorize(&state, &headers, &mut tx).await?;
    let accounts =
        db::query_categories_by_kind(&mut tx, user.id, CategoryKind::Account.tag()).await?;
    tx.commit().await?;

    Ok(Json(accounts.into_iter().map(CategoryView::stored).collect()))
}

pub async fn get_category(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(category_id): Path<i64>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<CategoryView>, AppError> {
    let mut tx = state.pool.begin().await?;
    let user = authorize(&state, &headers, &mut tx).await?;
    let category = db::query_category(&mut tx, user.id, category_id)
        .await?
        .ok_or_else(|| not_found("category", category_id))?;

    let view = match category_kind(&category)? {
        CategoryKind::Income | CategoryKind::Expense => {
            let (from, until) = period_for(query.month_offset)?.utc_range();
            let transactions =
                db::query_category_transactions_in(&mut tx, category_id, from, until).await?;
            let total = ledger::turnover(&transactions, category_id);
            CategoryView::with_display_amount(category, total)
        }
        CategoryKind::Account => CategoryView::stored(category),
    };
    tx.commit().await?;

    Ok(Json(view))
}

pub async fn add_category(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CategoryCreate>,
) -> Result<Json<CategoryView>, AppError> {
    CategoryKind::from_tag(payload.kind)
        .ok_or_else(|| AppError::Validation(format!("unknown category type {}", payload.kind)))?;
    known_currency(payload.currency)?;

    let mut tx = state.pool.begin().await?;
    let user = authorize(&state, &headers, &mut tx).await?;
    let category = db::insert_category(
        &mut tx,
        user.id,
        &payload.name,
        payload.kind,
        payload.amount,
        payload.currency,
    )
    .await?;
    tx.commit().await?;

    Ok(Json(CategoryView::stored(category)))
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(category_id): Path<i64>,
    Json(payload): Json<CategoryPatch>,
) -> Result<Json<CategoryView>, AppError> {
    if let Some(tag) = payload.currency {
        known_currency(tag)?;
    }

    let mut tx = state.pool.begin().await?;
    let user = authorize(&state, &headers, &mut tx).await?;
    let current = db::query_category(&mut tx, user.id, category_id)
        .await?
        .ok_or_else(|| not_found("category", category_id))?;

    policy::check_kind_unchanged(current.kind, payload.kind)?;

    let updated = db::update_category(
        &mut tx,
        user.id,
        category_id,
        payload.name.as_deref(),
        payload.kind,
        payload.amount,
        payload.currency,
    )
    .await?
    .ok_or_else(|| not_found("category", category_id))?;
    tx.commit().await?;

    Ok(Json(CategoryView::stored(updated)))
}

/// Cascading delete: every transaction touching the category is reversed
/// and removed first, so counterpart balances end up as if those
/// transactions never existed.
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(category_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let mut tx = state.pool.begin().await?;
    let user = authorize(&state, &headers, &mut tx).await?;
    let category = db::query_category(&mut tx, user.id, category_id)
        .await?
        .ok_or_else(|| not_found("category", category_id))?;

    let transactions = db::query_category_transactions(&mut tx, category.id).await?;
    for transaction in &transactions {
        db::apply_balance_changes(&mut tx, &ledger::reverse(Transfer::of(transaction))).await?;
        db::delete_transaction_row(&mut tx, transaction.id).await?;
    }
    db::delete_category_row(&mut tx, category.id).await?;
    tx.commit().await?;

    tracing::info!(
        "Deleted category id={} and {} dependent transactions",
        category.id,
        transactions.len()
    );

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_category_transactions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(category_id): Path<i64>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<TransactionView>>, AppError> {
    let mut tx = state.pool.begin().await?;
    let user = authorize(&state, &headers, &mut tx).await?;
    db::query_category(&mut tx, user.id, category_id)
        .await?
        .ok_or_else(|| not_found("category", category_id))?;

    let transactions = match query.month_offset {
        Some(offset) => {
            let (from, until) = period_for(Some(offset))?.utc_range();
            db::query_category_transactions_in(&mut tx, category_id, from, until).await?
        }
        None => db::query_category_transactions(&mut tx, category_id).await?,
    };
    tx.commit().await?;

    Ok(Json(
        transactions.into_iter().map(TransactionView::from).collect(),
    ))
}

/// Shared path of the two sanctioned creation flows: endpoint existence,
/// the flow-specific type rule, then insert + balance application as one
/// atomic unit.
async fn add_flow_transaction(
    state: &AppState,
    headers: &HeaderMap,
    payload: TransactionCreate,
    check_flow: fn(CategoryKind, CategoryKind) -> Result<(), AppError>,
) -> Result<Json<TransactionView>, AppError> {
    policy::check_transfer_fields(payload.amount, payload.source, payload.destination)?;

    let mut tx = state.pool.begin().await?;
    let user = authorize(state, headers, &mut tx).await?;

    let known: HashSet<i64> =
        db::query_category_ids(&mut tx, user.id, &[payload.source, payload.destination])
            .await?
            .into_iter()
            .collect();
    policy::require_known_endpoints(payload.source, payload.destination, &known)?;

    let source = db::query_category(&mut tx, user.id, payload.source)
        .await?
        .ok_or_else(|| not_found("category", payload.source))?;
    let destination = db::query_category(&mut tx, user.id, payload.destination)
        .await?
        .ok_or_else(|| not_found("category", payload.destination))?;
    check_flow(category_kind(&source)?, category_kind(&destination)?)?;

    let transaction = db::insert_transaction(
        &mut tx,
        user.id,
        payload.amount,
        payload.source,
        payload.destination,
        payload.timestamp,
    )
    .await?;
    db::apply_balance_changes(&mut tx, &ledger::apply(Transfer::of(&transaction))).await?;
    tx.commit().await?;

    Ok(Json(transaction.into()))
}

pub async fn add_income_account_transaction(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<TransactionCreate>,
) -> Result<Json<TransactionView>, AppError> {
    add_flow_transaction(&state, &headers, payload, policy::check_income_account_flow).await
}

pub async fn add_account_expense_transaction(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<TransactionCreate>,
) -> Result<Json<TransactionView>, AppError> {
    add_flow_transaction(&state, &headers, payload, policy::check_account_expense_flow).await
}

/// Partial update with reconciliation: reverse the stored transfer, apply
/// the merged one, then persist the merged fields — never only one side.
#[axum::debug_handler]
pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(transaction_id): Path<i64>,
    Json(payload): Json<TransactionPatch>,
) -> Result<Json<TransactionView>, AppError> {
    let mut tx = state.pool.begin().await?;
    let user = authorize(&state, &headers, &mut tx).await?;
    let current = db::query_transaction(&mut tx, user.id, transaction_id)
        .await?
        .ok_or_else(|| not_found("transaction", transaction_id))?;

    let (merged, timestamp) = ledger::merge(&current, payload.changes());
    policy::check_transfer_fields(merged.amount, merged.source, merged.destination)?;

    let known: HashSet<i64> =
        db::query_category_ids(&mut tx, user.id, &[merged.source, merged.destination])
            .await?
            .into_iter()
            .collect();
    policy::require_known_endpoints(merged.source, merged.destination, &known)?;

    db::apply_balance_changes(&mut tx, &ledger::reverse(Transfer::of(&current))).await?;
    db::apply_balance_changes(&mut tx, &ledger::apply(merged)).await?;
    let updated = db::update_transaction_row(
        &mut tx,
        transaction_id,
        merged.amount,
        merged.source,
        merged.destination,
        timestamp,
    )
    .await?;
    tx.commit().await?;

    Ok(Json(updated.into()))
}

pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(transaction_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let mut tx = state.pool.begin().await?;
    let user = authorize(&state, &headers, &mut tx).await?;
    let transaction = db::query_transaction(&mut tx, user.id, transaction_id)
        .await?
        .ok_or_else(|| not_found("transaction", transaction_id))?;

    db::apply_balance_changes(&mut tx, &ledger::reverse(Transfer::of(&transaction))).await?;
    db::delete_transaction_row(&mut tx, transaction.id).await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
