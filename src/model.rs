//! Wire-format types. Storage rows never leave the service directly: every
//! response goes through one of the view mappings here, and monetary
//! amounts are rounded to cents at this boundary only.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Category, Currency, Settings, Transaction, User};
use crate::ledger::TransferPatch;

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> TokenResponse {
        TokenResponse {
            access_token,
            token_type: "bearer",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub login: String,
}

impl From<User> for UserView {
    fn from(user: User) -> UserView {
        UserView {
            id: user.id,
            login: user.login,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SettingsView {
    pub id: i64,
    pub start_date: NaiveDate,
    pub base_currency: i32,
    pub user_id: i64,
}

impl From<Settings> for SettingsView {
    fn from(settings: Settings) -> SettingsView {
        SettingsView {
            id: settings.id,
            start_date: settings.start_date,
            base_currency: settings.base_currency,
            user_id: settings.user_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryView {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: i32,
    pub amount: f64,
    pub currency: i32,
    pub user_id: i64,
}

impl CategoryView {
    /// View carrying the stored running balance (accounts, and any place
    /// where no period aggregation applies).
    pub fn stored(category: Category) -> CategoryView {
        let amount = category.amount;
        CategoryView::with_display_amount(category, amount)
    }

    /// View whose amount is replaced by a derived value, e.g. the period
    /// turnover of an income or expense category.
    pub fn with_display_amount(category: Category, amount: f64) -> CategoryView {
        CategoryView {
            id: category.id,
            name: category.name,
            kind: category.kind,
            amount: round_cents(amount),
            currency: category.currency,
            user_id: category.user_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: i64,
    pub amount: f64,
    pub source: i64,
    pub destination: i64,
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
}

impl From<Transaction> for TransactionView {
    fn from(transaction: Transaction) -> TransactionView {
        TransactionView {
            id: transaction.id,
            amount: round_cents(transaction.amount),
            source: transaction.source,
            destination: transaction.destination,
            timestamp: transaction.timestamp,
            user_id: transaction.user_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StateView {
    pub user: UserView,
    pub settings: Option<SettingsView>,
    pub incomes: Vec<CategoryView>,
    pub accounts: Vec<CategoryView>,
    pub expenses: Vec<CategoryView>,
    pub transactions: Vec<TransactionView>,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub state: StateView,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SettingsPatch {
    pub start_date: Option<NaiveDate>,
    pub base_currency: Option<i32>,
}

fn default_currency() -> i32 {
    Currency::Eur.tag()
}

#[derive(Debug, Deserialize)]
pub struct CategoryCreate {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: i32,
    #[serde(default)]
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: i32,
}

#[derive(Debug, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<i32>,
    pub amount: Option<f64>,
    pub currency: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionCreate {
    pub amount: f64,
    pub source: i64,
    pub destination: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionPatch {
    pub amount: Option<f64>,
    pub source: Option<i64>,
    pub destination: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl TransactionPatch {
    pub fn changes(&self) -> TransferPatch {
        TransferPatch {
            amount: self.amount,
            source: self.source,
            destination: self.destination,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub month_offset: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_cents_rounds_to_two_decimals() {
        assert_eq!(round_cents(1.23456), 1.23);
        assert_eq!(round_cents(-1.237), -1.24);
        assert_eq!(round_cents(10.0), 10.0);
    }

    #[test]
    fn category_view_serializes_kind_as_type() {
        let view = CategoryView::stored(Category {
            id: 1,
            name: String::from("Salary"),
            kind: 1,
            amount: 10.239,
            currency: 0,
            user_id: 7,
        });

        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["type"], 1);
        assert_eq!(value["amount"], 10.24);
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn category_create_defaults() {
        let create: CategoryCreate =
            serde_json::from_str(r#"{"name": "Food", "type": 3}"#).unwrap();
        assert_eq!(create.amount, 0.0);
        assert_eq!(create.currency, Currency::Eur.tag());
    }

    #[test]
    fn transaction_patch_with_absent_fields_keeps_nothing_set() {
        let patch: TransactionPatch = serde_json::from_str(r#"{"amount": 5.0}"#).unwrap();
        let changes = patch.changes();
        assert_eq!(changes.amount, Some(5.0));
        assert_eq!(changes.source, None);
        assert_eq!(changes.destination, None);
        assert_eq!(changes.timestamp, None);
    }
}
