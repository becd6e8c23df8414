//! Free functions that mutate a supplied [`TenderAccount`].
//!
//! Kept apart from the account's data model to emphasize the separation between
//! the account container and the business operations that mutate it. The same
//! functions back both live operations and the replay of a persisted log, so
//! balance arithmetic has a single home.
//!
//! These functions intentionally accept `&mut TenderAccount` so that the caller
//! must make mutability explicit at the call site.

use rust_decimal::Decimal;

use crate::account::TenderAccount;
use crate::account::model::TenderStatus;
use crate::record::Milestone;
use crate::record::QualityScore;
use crate::record::TokenAmount;

#[derive(thiserror::Error, Debug)]
pub enum AccountError {
    #[error("category not in the tender's allowed scope category={category}, account={account:?}")]
    CategoryNotAllowed { account: Box<TenderAccount>, category: String },
    #[error("token balance too low, need {amount} in account={account:?}")]
    InsufficientBalance { account: Box<TenderAccount>, amount: TokenAmount },
}

/// Subtracts `amount` from the account's balance and marks the tender active.
///
/// # Errors
///
/// Returns an error if:
/// - `category` is outside the tender's allowed scope ([`AccountError::CategoryNotAllowed`]).
/// - The balance is less than `amount` ([`AccountError::InsufficientBalance`]).
pub fn spend(account: &mut TenderAccount, amount: TokenAmount, category: &str) -> Result<(), AccountError> {
    if !account.allowed_categories.contains(category) {
        return Err(AccountError::CategoryNotAllowed {
            account: Box::new(account.clone()),
            category: category.to_owned(),
        });
    }
    if account.balance < amount.as_inner() {
        return Err(AccountError::InsufficientBalance {
            account: Box::new(account.clone()),
            amount,
        });
    }
    account.balance -= amount.as_inner();
    if account.status == TenderStatus::Issued {
        account.status = TenderStatus::Active;
    }
    Ok(())
}

/// Records the latest quality score for `milestone`, replacing any prior score.
///
/// Superseded scores stay visible in the transaction log; only the latest one
/// feeds the aggregate used at resolution.
pub fn record_score(account: &mut TenderAccount, milestone: Milestone, score: QualityScore) {
    account.milestone_scores.insert(milestone, score);
}

/// Zeroes the balance and marks the tender resolved, returning the
/// pre-resolution balance. Terminal: no further mutation is accepted by the
/// engine afterwards.
pub fn drain(account: &mut TenderAccount) -> Decimal {
    let drained = account.balance;
    account.balance = Decimal::ZERO;
    account.status = TenderStatus::Resolved;
    drained
}
