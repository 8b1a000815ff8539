//! Transaction-flow rules. Only two transaction shapes are sanctioned:
//! income -> account and account -> account/expense. All checks run before
//! any balance reconciliation happens.

use std::collections::HashSet;

use crate::domain::CategoryKind;
use crate::handlers::AppError;

/// Both endpoints of a transfer must resolve against the caller's own
/// categories before any type check runs.
pub fn require_known_endpoints(
    source: i64,
    destination: i64,
    known: &HashSet<i64>,
) -> Result<(), AppError> {
    for id in [source, destination] {
        if !known.contains(&id) {
            return Err(AppError::NotFound(format!("category {} is not found", id)));
        }
    }
    Ok(())
}

pub fn check_income_account_flow(
    source: CategoryKind,
    destination: CategoryKind,
) -> Result<(), AppError> {
    if source != CategoryKind::Income {
        return Err(AppError::PolicyViolation(String::from(
            "source should be income",
        )));
    }
    if destination != CategoryKind::Account {
        return Err(AppError::PolicyViolation(String::from(
            "destination should be account",
        )));
    }
    Ok(())
}

pub fn check_account_expense_flow(
    source: CategoryKind,
    destination: CategoryKind,
) -> Result<(), AppError> {
    if source != CategoryKind::Account {
        return Err(AppError::PolicyViolation(String::from(
            "source should be account",
        )));
    }
    if destination != CategoryKind::Account && destination != CategoryKind::Expense {
        return Err(AppError::PolicyViolation(String::from(
            "destination should be account or expense",
        )));
    }
    Ok(())
}

/// A category's kind is immutable. Sending the current kind back unchanged
/// is allowed; anything else is rejected.
pub fn check_kind_unchanged(current: i32, requested: Option<i32>) -> Result<(), AppError> {
    match requested {
        Some(kind) if kind != current => Err(AppError::PolicyViolation(String::from(
            "category type can not be changed",
        ))),
        _ => Ok(()),
    }
}

/// Field constraints shared by transaction create and update (checked
/// against merged values for updates).
pub fn check_transfer_fields(amount: f64, source: i64, destination: i64) -> Result<(), AppError> {
    if amount < 0.0 {
        return Err(AppError::PolicyViolation(String::from(
            "amount should not be negative",
        )));
    }
    if source == destination {
        return Err(AppError::PolicyViolation(String::from(
            "destination should not be equal to source",
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn income_account_flow_accepts_only_income_to_account() {
        assert!(check_income_account_flow(CategoryKind::Income, CategoryKind::Account).is_ok());
        assert!(matches!(
            check_income_account_flow(CategoryKind::Expense, CategoryKind::Account),
            Err(AppError::PolicyViolation(_))
        ));
        assert!(matches!(
            check_income_account_flow(CategoryKind::Income, CategoryKind::Expense),
            Err(AppError::PolicyViolation(_))
        ));
    }

    #[test]
    fn account_expense_flow_accepts_account_and_expense_destinations() {
        assert!(check_account_expense_flow(CategoryKind::Account, CategoryKind::Expense).is_ok());
        assert!(check_account_expense_flow(CategoryKind::Account, CategoryKind::Account).is_ok());
        assert!(matches!(
            check_account_expense_flow(CategoryKind::Income, CategoryKind::Expense),
            Err(AppError::PolicyViolation(_))
        ));
        assert!(matches!(
            check_account_expense_flow(CategoryKind::Account, CategoryKind::Income),
            Err(AppError::PolicyViolation(_))
        ));
    }

    #[test]
    fn unknown_endpoints_are_not_found() {
        let known = HashSet::from([1, 2]);
        assert!(require_known_endpoints(1, 2, &known).is_ok());
        assert!(matches!(
            require_known_endpoints(1, 3, &known),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            require_known_endpoints(9, 2, &known),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn kind_change_is_rejected_resending_current_is_not() {
        assert!(check_kind_unchanged(2, None).is_ok());
        assert!(check_kind_unchanged(2, Some(2)).is_ok());
        assert!(matches!(
            check_kind_unchanged(2, Some(3)),
            Err(AppError::PolicyViolation(_))
        ));
    }

    #[test]
    fn transfer_field_constraints() {
        assert!(check_transfer_fields(0.0, 1, 2).is_ok());
        assert!(matches!(
            check_transfer_fields(-1.0, 1, 2),
            Err(AppError::PolicyViolation(_))
        ));
        assert!(matches!(
            check_transfer_fields(10.0, 1, 1),
            Err(AppError::PolicyViolation(_))
        ));
    }
}
