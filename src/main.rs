mod args;
mod auth;
mod db;
mod domain;
mod handlers;
mod ledger;
mod logging;
mod model;
mod period;
mod policy;

use std::sync::Arc;

use args::parse_args;
use auth::TokenKeys;
use axum::{
    Router,
    routing::{get, patch, post},
};
use chrono::Duration;
use db::create_pool;
use handlers::{
    add_account_expense_transaction, add_category, add_income_account_transaction,
    delete_category, delete_transaction, get_accounts, get_category, get_category_transactions,
    get_expenses, get_incomes, get_settings, get_state, get_users, signin, signup,
    update_category, update_settings, update_transaction,
};
use logging::setup_logging;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub pool: PgPool,
    pub token_keys: TokenKeys,
    pub token_ttl: Duration,
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    setup_logging(&args.base_log_dir);

    let pool = create_pool(&args.database_url)
        .await
        .expect("Failed to create PostgreSQL pool");

    db::create_schema(&pool)
        .await
        .expect("Failed to create database schema");

    let app_state = Arc::new(AppState {
        pool,
        token_keys: TokenKeys::from_secret(&args.secret_key),
        token_ttl: Duration::hours(args.token_ttl_hours),
    });

    let api = Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/state", get(get_state))
        .route("/users", get(get_users))
        .route("/settings", get(get_settings).patch(update_settings))
        .route("/incomes", get(get_incomes))
        .route("/accounts", get(get_accounts))
        .route("/expenses", get(get_expenses))
        .route("/categories", post(add_category))
        .route(
            "/categories/{category_id}",
            get(get_category)
                .patch(update_category)
                .delete(delete_category),
        )
        .route(
            "/categories/{category_id}/transactions",
            get(get_category_transactions),
        )
        .route(
            "/income-account-transactions",
            post(add_income_account_transaction),
        )
        .route(
            "/account-expense-transactions",
            post(add_account_expense_transaction),
        )
        .route(
            "/transactions/{transaction_id}",
            patch(update_transaction).delete(delete_transaction),
        );

    let app = Router::new()
        .nest("/api/v1", api)
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let bind_address = format! {"0.0.0.0:{}", args.port};
    tracing::info!("Server listening on {}...", bind_address);

    let listener = tokio::net::TcpListener::bind(bind_address).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
