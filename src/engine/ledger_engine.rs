use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::account::AccountError;
use crate::account::TenderAccount;
use crate::account::TenderStatus;
use crate::record::ContractorId;
use crate::record::Forfeit;
use crate::record::Issue;
use crate::record::Milestone;
use crate::record::QualityScore;
use crate::record::RecordKind;
use crate::record::Redeem;
use crate::record::Spend;
use crate::record::TenderId;
use crate::record::TokenAmount;
use crate::record::TransactionRecord;
use crate::record::Verify;
use crate::scoring;
use crate::store::LogStore;
use crate::store::StoreError;

#[cfg(test)]
#[path = "tests/ledger_engine_tests.rs"]
mod ledger_engine_tests;

/// Single authoritative ledger instance.
///
/// Mutating operations serialize per tender: each account sits behind its own
/// mutex, held for the whole validate-append-apply step, while operations on
/// different tenders proceed independently. Log appends serialize behind the
/// store mutex so sequence ids stay gap-free. Lock order is always
/// accounts map, then account, then store.
pub struct LedgerEngine {
    accounts: RwLock<HashMap<TenderId, Arc<Mutex<TenderAccount>>>>,
    store: Mutex<LogStore>,
}

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("tender already issued tender_id={tender_id}")]
    DuplicateTender { tender_id: TenderId },
    #[error("no tender found tender_id={tender_id}")]
    UnknownTender { tender_id: TenderId },
    #[error("contractor does not hold the tender tender_id={tender_id}, contractor_id={contractor_id}")]
    ContractorMismatch {
        tender_id: TenderId,
        contractor_id: ContractorId,
    },
    #[error("no allowed spending categories supplied tender_id={tender_id}")]
    EmptyScope { tender_id: TenderId },
    #[error("tender already resolved, no further operations accepted tender_id={tender_id}")]
    AlreadyResolved { tender_id: TenderId },
    #[error("cannot resolve with no verified milestones tender_id={tender_id}")]
    NoVerifiedMilestones { tender_id: TenderId },
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error("persistence failure, transaction log write did not complete")]
    PersistenceFailure(#[from] StoreError),
}

impl LedgerEngine {
    /// Rebuilds every account by folding the store's records in sequence
    /// order, then takes ownership of the store for subsequent appends.
    ///
    /// # Errors
    ///
    /// Returns an error if the log contains a record that does not apply
    /// cleanly to the folded state (e.g. a spend past the balance), which means
    /// the log was not produced by this engine.
    pub fn open(store: LogStore) -> Result<Self, LedgerError> {
        let mut accounts = HashMap::new();
        for record in store.records() {
            replay(&mut accounts, record)?;
        }
        tracing::info!(tenders = accounts.len(), "ledger rebuilt from transaction log");

        let accounts = accounts
            .into_iter()
            .map(|(tender_id, account)| (tender_id, Arc::new(Mutex::new(account))))
            .collect();
        Ok(Self {
            accounts: RwLock::new(accounts),
            store: Mutex::new(store),
        })
    }

    /// Issues `total_value` tokens to `contractor_id` against a new tender.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No allowed category is supplied ([`LedgerError::EmptyScope`]).
    /// - The tender id already exists ([`LedgerError::DuplicateTender`]).
    /// - The log append does not complete ([`LedgerError::PersistenceFailure`]).
    pub fn issue(
        &self,
        tender_id: TenderId,
        contractor_id: ContractorId,
        total_value: TokenAmount,
        allowed_categories: BTreeSet<String>,
        description: String,
    ) -> Result<TransactionRecord, LedgerError> {
        if allowed_categories.is_empty() {
            return Err(LedgerError::EmptyScope { tender_id });
        }

        let mut accounts = self.accounts.write();
        if accounts.contains_key(&tender_id) {
            return Err(LedgerError::DuplicateTender { tender_id });
        }

        let record = self.store.lock().append(RecordKind::Issue(Issue {
            tender_id: tender_id.clone(),
            contractor_id: contractor_id.clone(),
            total_value,
            allowed_categories: allowed_categories.clone(),
            description,
        }))?;

        let account = TenderAccount::new(tender_id.clone(), contractor_id, total_value, allowed_categories);
        accounts.insert(tender_id, Arc::new(Mutex::new(account)));
        Ok(record)
    }

    /// Spends `amount` tokens within `category` against a milestone.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The tender does not exist ([`LedgerError::UnknownTender`]).
    /// - The tender is resolved ([`LedgerError::AlreadyResolved`]).
    /// - `contractor_id` does not hold the tender ([`LedgerError::ContractorMismatch`]).
    /// - The category is out of scope or the balance is too low ([`LedgerError::Account`]).
    /// - The log append does not complete ([`LedgerError::PersistenceFailure`]).
    pub fn spend(
        &self,
        tender_id: TenderId,
        contractor_id: ContractorId,
        amount: TokenAmount,
        category: String,
        milestone: Milestone,
        description: String,
    ) -> Result<TransactionRecord, LedgerError> {
        let cell = self.account_cell(&tender_id)?;
        let mut account = cell.lock();
        check_open(&account)?;
        check_contractor(&account, contractor_id)?;

        let mut updated = account.clone();
        crate::account::spend(&mut updated, amount, &category)?;

        let record = self.store.lock().append(RecordKind::Spend(Spend {
            tender_id,
            contractor_id: account.contractor_id().clone(),
            amount,
            category,
            milestone,
            description,
        }))?;

        *account = updated;
        Ok(record)
    }

    /// Records the latest quality score for a milestone. Re-verifying the same
    /// milestone replaces the score used for the aggregate; the superseded
    /// record stays in the log.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The tender does not exist ([`LedgerError::UnknownTender`]).
    /// - The tender is resolved ([`LedgerError::AlreadyResolved`]).
    /// - The log append does not complete ([`LedgerError::PersistenceFailure`]).
    pub fn verify_milestone(
        &self,
        tender_id: TenderId,
        milestone: Milestone,
        score: QualityScore,
    ) -> Result<TransactionRecord, LedgerError> {
        let cell = self.account_cell(&tender_id)?;
        let mut account = cell.lock();
        check_open(&account)?;

        let record = self.store.lock().append(RecordKind::Verify(Verify {
            tender_id,
            milestone: milestone.clone(),
            quality_score: score,
            passed: scoring::passes(score.as_inner()),
        }))?;

        crate::account::record_score(&mut account, milestone, score);
        Ok(record)
    }

    /// Resolves the tender: the remaining balance is redeemed when the
    /// aggregate of the current milestone scores is at or above the redemption
    /// threshold, forfeited to treasury otherwise. Terminal either way.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The tender does not exist ([`LedgerError::UnknownTender`]).
    /// - The tender is resolved ([`LedgerError::AlreadyResolved`]).
    /// - `contractor_id` does not hold the tender ([`LedgerError::ContractorMismatch`]).
    /// - No milestone has been verified ([`LedgerError::NoVerifiedMilestones`]).
    /// - The log append does not complete ([`LedgerError::PersistenceFailure`]).
    pub fn resolve(&self, tender_id: TenderId, contractor_id: ContractorId) -> Result<TransactionRecord, LedgerError> {
        let cell = self.account_cell(&tender_id)?;
        let mut account = cell.lock();
        check_open(&account)?;
        check_contractor(&account, contractor_id)?;

        let Some(aggregate_score) = current_aggregate(&account) else {
            return Err(LedgerError::NoVerifiedMilestones { tender_id });
        };

        let balance = account.balance();
        let contractor_id = account.contractor_id().clone();
        let kind = if scoring::passes(aggregate_score) {
            RecordKind::Redeem(Redeem {
                tender_id,
                contractor_id,
                amount: scoring::payout(balance, aggregate_score),
                aggregate_score,
                bonus_multiplier: scoring::bonus_multiplier(aggregate_score),
            })
        } else {
            RecordKind::Forfeit(Forfeit {
                tender_id,
                contractor_id,
                amount: balance,
                aggregate_score,
            })
        };

        let record = self.store.lock().append(kind)?;
        crate::account::drain(&mut account);
        Ok(record)
    }

    /// Snapshot of a single account.
    pub fn get_account(&self, tender_id: &TenderId) -> Option<TenderAccount> {
        self.accounts.read().get(tender_id).map(|cell| cell.lock().clone())
    }

    /// Full audit trail of a tender, in sequence order.
    pub fn get_history(&self, tender_id: &TenderId) -> Vec<TransactionRecord> {
        self.store.lock().for_tender(tender_id)
    }

    /// Mean of the tender's current milestone scores, `None` while nothing has
    /// been verified. Identical to the value applied at resolution.
    pub fn get_aggregate_score(&self, tender_id: &TenderId) -> Option<Decimal> {
        let cell = self.accounts.read().get(tender_id).cloned()?;
        let account = cell.lock();
        current_aggregate(&account)
    }

    /// Sum of every forfeited balance, the treasury's side of the ledger.
    pub fn treasury_total(&self) -> Decimal {
        self.store
            .lock()
            .records()
            .iter()
            .filter_map(|record| match &record.kind {
                RecordKind::Forfeit(forfeit) => Some(forfeit.amount),
                _ => None,
            })
            .sum()
    }

    /// Per-category spend totals for a tender.
    pub fn spending_by_category(&self, tender_id: &TenderId) -> BTreeMap<String, Decimal> {
        let mut totals = BTreeMap::new();
        for record in self.get_history(tender_id) {
            if let RecordKind::Spend(spend) = record.kind {
                *totals.entry(spend.category).or_insert(Decimal::ZERO) += spend.amount.as_inner();
            }
        }
        totals
    }

    /// Read-side rollup of a tender's account and history. The account lock is
    /// held while the history is read so the two cannot interleave with a
    /// mutation on the same tender.
    pub fn summary(&self, tender_id: &TenderId) -> Option<TenderSummary> {
        let cell = self.accounts.read().get(tender_id).cloned()?;
        let account = cell.lock();
        let history = self.store.lock().for_tender(tender_id);

        let mut total_spent = Decimal::ZERO;
        let mut outcome = Outcome::InProgress;
        for record in &history {
            match &record.kind {
                RecordKind::Spend(spend) => total_spent += spend.amount.as_inner(),
                RecordKind::Redeem(_) => outcome = Outcome::Redeemed,
                RecordKind::Forfeit(_) => outcome = Outcome::Forfeited,
                RecordKind::Issue(_) | RecordKind::Verify(_) => {}
            }
        }

        Some(TenderSummary {
            tender_id: tender_id.clone(),
            contractor_id: account.contractor_id().clone(),
            total_value: account.total_value().as_inner(),
            total_spent,
            balance: account.balance(),
            status: account.status(),
            milestones_verified: account.milestone_scores().len(),
            aggregate_score: current_aggregate(&account),
            outcome,
        })
    }

    /// Snapshots of every account, ordered by tender id.
    pub fn accounts(&self) -> Vec<TenderAccount> {
        let mut accounts = self
            .accounts
            .read()
            .values()
            .map(|cell| cell.lock().clone())
            .collect::<Vec<_>>();
        accounts.sort_by(|a, b| a.tender_id().cmp(b.tender_id()));
        accounts
    }

    fn account_cell(&self, tender_id: &TenderId) -> Result<Arc<Mutex<TenderAccount>>, LedgerError> {
        self.accounts
            .read()
            .get(tender_id)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownTender {
                tender_id: tender_id.clone(),
            })
    }
}

/// Read-side rollup of one tender.
#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub struct TenderSummary {
    pub tender_id: TenderId,
    pub contractor_id: ContractorId,
    pub total_value: Decimal,
    pub total_spent: Decimal,
    pub balance: Decimal,
    pub status: TenderStatus,
    pub milestones_verified: usize,
    pub aggregate_score: Option<Decimal>,
    pub outcome: Outcome,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, parse_display::Display)]
pub enum Outcome {
    InProgress,
    Redeemed,
    Forfeited,
}

fn current_aggregate(account: &TenderAccount) -> Option<Decimal> {
    scoring::aggregate(account.milestone_scores().values().map(|score| score.as_inner()))
}

fn check_open(account: &TenderAccount) -> Result<(), LedgerError> {
    if account.is_resolved() {
        return Err(LedgerError::AlreadyResolved {
            tender_id: account.tender_id().clone(),
        });
    }
    Ok(())
}

fn check_contractor(account: &TenderAccount, contractor_id: ContractorId) -> Result<(), LedgerError> {
    if account.contractor_id() != &contractor_id {
        return Err(LedgerError::ContractorMismatch {
            tender_id: account.tender_id().clone(),
            contractor_id,
        });
    }
    Ok(())
}

fn replay(accounts: &mut HashMap<TenderId, TenderAccount>, record: &TransactionRecord) -> Result<(), LedgerError> {
    match &record.kind {
        RecordKind::Issue(issue) => {
            if accounts.contains_key(&issue.tender_id) {
                return Err(LedgerError::DuplicateTender {
                    tender_id: issue.tender_id.clone(),
                });
            }
            accounts.insert(
                issue.tender_id.clone(),
                TenderAccount::new(
                    issue.tender_id.clone(),
                    issue.contractor_id.clone(),
                    issue.total_value,
                    issue.allowed_categories.clone(),
                ),
            );
        }
        RecordKind::Spend(spend) => {
            let account = replayed_account(accounts, &spend.tender_id)?;
            check_open(account)?;
            crate::account::spend(account, spend.amount, &spend.category)?;
        }
        RecordKind::Verify(verify) => {
            let account = replayed_account(accounts, &verify.tender_id)?;
            check_open(account)?;
            crate::account::record_score(account, verify.milestone.clone(), verify.quality_score);
        }
        RecordKind::Redeem(Redeem { tender_id, .. }) | RecordKind::Forfeit(Forfeit { tender_id, .. }) => {
            let account = replayed_account(accounts, tender_id)?;
            check_open(account)?;
            crate::account::drain(account);
        }
    }
    Ok(())
}

fn replayed_account<'a>(
    accounts: &'a mut HashMap<TenderId, TenderAccount>,
    tender_id: &TenderId,
) -> Result<&'a mut TenderAccount, LedgerError> {
    accounts.get_mut(tender_id).ok_or_else(|| LedgerError::UnknownTender {
        tender_id: tender_id.clone(),
    })
}
