use chrono::{DateTime, NaiveDate, Utc};

#[derive(sqlx::FromRow, Clone)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub password: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct Settings {
    pub id: i64,
    pub start_date: NaiveDate,
    pub base_currency: i32,
    pub user_id: i64,
}

#[derive(sqlx::FromRow, Clone)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub kind: i32,
    pub amount: f64,
    pub currency: i32,
    pub user_id: i64,
}

#[derive(sqlx::FromRow, Clone)]
pub struct Transaction {
    pub id: i64,
    pub amount: f64,
    pub source: i64,
    pub destination: i64,
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
}

/// Category kinds, stored as integer tags. The tag values are part of the
/// wire format (the `type` field) and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryKind {
    Income = 1,
    Account = 2,
    Expense = 3,
}

impl CategoryKind {
    pub fn from_tag(tag: i32) -> Option<CategoryKind> {
        match tag {
            1 => Some(CategoryKind::Income),
            2 => Some(CategoryKind::Account),
            3 => Some(CategoryKind::Expense),
            _ => None,
        }
    }

    pub fn tag(self) -> i32 {
        self as i32
    }
}

/// Currency tags. Currency is a label only, no conversion happens anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    Eur = 0,
    Usd = 1,
    Rub = 2,
}

impl Currency {
    pub fn from_tag(tag: i32) -> Option<Currency> {
        match tag {
            0 => Some(Currency::Eur),
            1 => Some(Currency::Usd),
            2 => Some(Currency::Rub),
            _ => None,
        }
    }

    pub fn tag(self) -> i32 {
        self as i32
    }
}
