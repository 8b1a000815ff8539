use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};

use crate::domain::{Category, Settings, Transaction, User};
use crate::ledger::BalanceChange;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPool::connect(database_url).await
}

pub async fn create_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(
        "
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                login TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                id BIGSERIAL PRIMARY KEY,
                start_date DATE NOT NULL,
                base_currency INT NOT NULL,
                user_id BIGINT NOT NULL UNIQUE REFERENCES users (id)
            );

            CREATE TABLE IF NOT EXISTS categories (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                kind INT NOT NULL,
                amount DOUBLE PRECISION NOT NULL,
                currency INT NOT NULL,
                user_id BIGINT NOT NULL REFERENCES users (id)
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id BIGSERIAL PRIMARY KEY,
                amount DOUBLE PRECISION NOT NULL,
                source BIGINT NOT NULL,
                destination BIGINT NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL,
                user_id BIGINT NOT NULL REFERENCES users (id)
            );

            CREATE INDEX IF NOT EXISTS transactions_source_idx
                ON transactions (source);
            CREATE INDEX IF NOT EXISTS transactions_destination_idx
                ON transactions (destination);
        ",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn query_users(conn: &mut PgConnection) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "
            SELECT * FROM users
            ORDER BY id
        ",
    )
    .fetch_all(conn)
    .await
}

pub async fn query_user(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "
            SELECT * FROM users
            WHERE id = $1
        ",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

pub async fn query_user_by_login(
    conn: &mut PgConnection,
    login: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "
            SELECT * FROM users
            WHERE login = $1
        ",
    )
    .bind(login)
    .fetch_optional(conn)
    .await
}

pub async fn insert_user(
    conn: &mut PgConnection,
    login: &str,
    password: &str,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "
            INSERT INTO users (login, password)
            VALUES ($1, $2)
            RETURNING *
        ",
    )
    .bind(login)
    .bind(password)
    .fetch_one(conn)
    .await
}

pub async fn insert_settings(
    conn: &mut PgConnection,
    user_id: i64,
    start_date: NaiveDate,
    base_currency: i32,
) -> Result<Settings, sqlx::Error> {
    sqlx::query_as::<_, Settings>(
        "
            INSERT INTO settings (start_date, base_currency, user_id)
            VALUES ($1, $2, $3)
            RETURNING *
        ",
    )
    .bind(start_date)
    .bind(base_currency)
    .bind(user_id)
    .fetch_one(conn)
    .await
}

pub async fn query_settings(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Option<Settings>, sqlx::Error> {
    sqlx::query_as::<_, Settings>(
        "
            SELECT * FROM settings
            WHERE user_id = $1
        ",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

pub async fn update_settings(
    conn: &mut PgConnection,
    user_id: i64,
    start_date: Option<NaiveDate>,
    base_currency: Option<i32>,
) -> Result<Option<Settings>, sqlx::Error> {
    sqlx::query_as::<_, Settings>(
        "
            UPDATE settings SET
                start_date = COALESCE($1, start_date),
                base_currency = COALESCE($2, base_currency)
            WHERE user_id = $3
            RETURNING *
        ",
    )
    .bind(start_date)
    .bind(base_currency)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

pub async fn query_categories_by_kind(
    conn: &mut PgConnection,
    user_id: i64,
    kind: i32,
) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "
            SELECT * FROM categories
            WHERE user_id = $1 AND kind = $2
            ORDER BY id
        ",
    )
    .bind(user_id)
    .bind(kind)
    .fetch_all(conn)
    .await
}

pub async fn query_category(
    conn: &mut PgConnection,
    user_id: i64,
    category_id: i64,
) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "
            SELECT * FROM categories
            WHERE id = $1 AND user_id = $2
        ",
    )
    .bind(category_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

/// Set-membership probe: which of `ids` exist as categories of this user.
pub async fn query_category_ids(
    conn: &mut PgConnection,
    user_id: i64,
    ids: &[i64],
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "
            SELECT id FROM categories
            WHERE user_id = $1 AND id = ANY($2)
        ",
    )
    .bind(user_id)
    .bind(ids)
    .fetch_all(conn)
    .await
}

pub async fn insert_category(
    conn: &mut PgConnection,
    user_id: i64,
    name: &str,
    kind: i32,
    amount: f64,
    currency: i32,
) -> Result<Category, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "
            INSERT INTO categories (name, kind, amount, currency, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
        ",
    )
    .bind(name)
    .bind(kind)
    .bind(amount)
    .bind(currency)
    .bind(user_id)
    .fetch_one(conn)
    .await
}

pub async fn update_category(
    conn: &mut PgConnection,
    user_id: i64,
    category_id: i64,
    name: Option<&str>,
    kind: Option<i32>,
    amount: Option<f64>,
    currency: Option<i32>,
) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "
            UPDATE categories SET
                name = COALESCE($1, name),
                kind = COALESCE($2, kind),
                amount = COALESCE($3, amount),
                currency = COALESCE($4, currency)
            WHERE id = $5 AND user_id = $6
            RETURNING *
        ",
    )
    .bind(name)
    .bind(kind)
    .bind(amount)
    .bind(currency)
    .bind(category_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

pub async fn delete_category_row(
    conn: &mut PgConnection,
    category_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "
            DELETE FROM categories
            WHERE id = $1
        ",
    )
    .bind(category_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn query_transactions(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Vec<Transaction>, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(
        "
            SELECT * FROM transactions
            WHERE user_id = $1
            ORDER BY timestamp DESC
        ",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
}

pub async fn query_transaction(
    conn: &mut PgConnection,
    user_id: i64,
    transaction_id: i64,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(
        "
            SELECT * FROM transactions
            WHERE id = $1 AND user_id = $2
        ",
    )
    .bind(transaction_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

/// All transactions touching a category as either endpoint, newest first.
pub async fn query_category_transactions(
    conn: &mut PgConnection,
    category_id: i64,
) -> Result<Vec<Transaction>, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(
        "
            SELECT * FROM transactions
            WHERE source = $1 OR destination = $1
            ORDER BY timestamp DESC
        ",
    )
    .bind(category_id)
    .fetch_all(conn)
    .await
}

pub async fn query_category_transactions_in(
    conn: &mut PgConnection,
    category_id: i64,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<Transaction>, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(
        "
            SELECT * FROM transactions
            WHERE (source = $1 OR destination = $1)
                AND timestamp >= $2 AND timestamp < $3
            ORDER BY timestamp DESC
        ",
    )
    .bind(category_id)
    .bind(from)
    .bind(until)
    .fetch_all(conn)
    .await
}

pub async fn query_transactions_in(
    conn: &mut PgConnection,
    user_id: i64,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<Transaction>, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(
        "
            SELECT * FROM transactions
            WHERE user_id = $1 AND timestamp >= $2 AND timestamp < $3
        ",
    )
    .bind(user_id)
    .bind(from)
    .bind(until)
    .fetch_all(conn)
    .await
}

pub async fn insert_transaction(
    conn: &mut PgConnection,
    user_id: i64,
    amount: f64,
    source: i64,
    destination: i64,
    timestamp: DateTime<Utc>,
) -> Result<Transaction, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(
        "
            INSERT INTO transactions (amount, source, destination, timestamp, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
        ",
    )
    .bind(amount)
    .bind(source)
    .bind(destination)
    .bind(timestamp)
    .bind(user_id)
    .fetch_one(conn)
    .await
}

pub async fn update_transaction_row(
    conn: &mut PgConnection,
    transaction_id: i64,
    amount: f64,
    source: i64,
    destination: i64,
    timestamp: DateTime<Utc>,
) -> Result<Transaction, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(
        "
            UPDATE transactions SET
                amount = $1,
                source = $2,
                destination = $3,
                timestamp = $4
            WHERE id = $5
            RETURNING *
        ",
    )
    .bind(amount)
    .bind(source)
    .bind(destination)
    .bind(timestamp)
    .bind(transaction_id)
    .fetch_one(conn)
    .await
}

pub async fn delete_transaction_row(
    conn: &mut PgConnection,
    transaction_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "
            DELETE FROM transactions
            WHERE id = $1
        ",
    )
    .bind(transaction_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Apply reconciliation deltas to the category running balances. Must run
/// on the same connection as the transaction mutation it belongs to.
pub async fn apply_balance_changes(
    conn: &mut PgConnection,
    changes: &[BalanceChange],
) -> Result<(), sqlx::Error> {
    for change in changes {
        sqlx::query(
            "
                UPDATE categories
                SET amount = amount + $1
                WHERE id = $2
            ",
        )
        .bind(change.delta)
        .bind(change.category)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
