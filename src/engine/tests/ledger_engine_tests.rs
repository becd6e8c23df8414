use std::collections::BTreeSet;
use std::str::FromStr;

use assert2::let_assert;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

use crate::account::AccountError;
use crate::account::TenderStatus;
use crate::engine::LedgerEngine;
use crate::engine::Outcome;
use crate::engine::ledger_engine::LedgerError;
use crate::record::ContractorId;
use crate::record::Milestone;
use crate::record::QualityScore;
use crate::record::RecordKind;
use crate::record::SequenceId;
use crate::record::TenderId;
use crate::record::TokenAmount;
use crate::store::LogStore;

const TEST_TENDER: &str = "T001";
const TEST_CONTRACTOR: &str = "C001";

#[test]
fn issue_creates_an_account_with_the_full_balance() {
    let (_dir, ledger) = setup_ledger();
    let record = issue(&ledger, TEST_TENDER).unwrap();
    assert_eq!(SequenceId(1), record.sequence_id);

    let account = ledger.get_account(&tender(TEST_TENDER)).unwrap();
    assert_eq!(dec("100000000"), account.balance());
    assert_eq!(TenderStatus::Issued, account.status());
    assert_eq!(&contractor(TEST_CONTRACTOR), account.contractor_id());
}

#[test]
fn issue_with_a_duplicate_tender_id_errors() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    let res = issue(&ledger, TEST_TENDER);
    let_assert!(Err(LedgerError::DuplicateTender { tender_id }) = res);
    assert_eq!(tender(TEST_TENDER), tender_id);
}

#[test]
fn issue_without_categories_errors() {
    let (_dir, ledger) = setup_ledger();
    let res = ledger.issue(
        tender(TEST_TENDER),
        contractor(TEST_CONTRACTOR),
        amount("100000000"),
        BTreeSet::new(),
        String::new(),
    );
    let_assert!(Err(LedgerError::EmptyScope { .. }) = res);
    assert!(ledger.get_account(&tender(TEST_TENDER)).is_none());
}

#[test]
fn spend_reduces_the_balance_and_activates_the_tender() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    spend(&ledger, TEST_TENDER, "15000000", "Materials").unwrap();

    let account = ledger.get_account(&tender(TEST_TENDER)).unwrap();
    assert_eq!(dec("85000000"), account.balance());
    assert_eq!(TenderStatus::Active, account.status());
}

#[test]
fn spend_on_an_unknown_tender_errors() {
    let (_dir, ledger) = setup_ledger();
    let res = spend(&ledger, "T404", "1", "Materials");
    let_assert!(Err(LedgerError::UnknownTender { tender_id }) = res);
    assert_eq!(tender("T404"), tender_id);
}

#[test]
fn spend_by_the_wrong_contractor_errors_and_leaves_the_balance_unchanged() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    let res = ledger.spend(
        tender(TEST_TENDER),
        contractor("C999"),
        amount("1"),
        "Materials".to_owned(),
        milestone("Foundation"),
        String::new(),
    );
    let_assert!(Err(LedgerError::ContractorMismatch { contractor_id, .. }) = res);
    assert_eq!(contractor("C999"), contractor_id);
    assert_eq!(dec("100000000"), ledger.get_account(&tender(TEST_TENDER)).unwrap().balance());
}

#[test]
fn spend_outside_the_allowed_categories_errors_and_leaves_the_balance_unchanged() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    let res = spend(&ledger, TEST_TENDER, "1000", "Catering");
    let_assert!(Err(LedgerError::Account(AccountError::CategoryNotAllowed { category, .. })) = res);
    assert_eq!("Catering", category);
    assert_eq!(dec("100000000"), ledger.get_account(&tender(TEST_TENDER)).unwrap().balance());
}

#[test]
fn spend_above_the_balance_errors_and_leaves_the_balance_unchanged() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    let res = spend(&ledger, TEST_TENDER, "100000001", "Materials");
    let_assert!(Err(LedgerError::Account(AccountError::InsufficientBalance { .. })) = res);
    assert_eq!(dec("100000000"), ledger.get_account(&tender(TEST_TENDER)).unwrap().balance());
}

#[test]
fn balance_never_exceeds_the_total_and_never_goes_negative() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    for _ in 0..3 {
        let _ = spend(&ledger, TEST_TENDER, "40000000", "Labour");
    }
    let account = ledger.get_account(&tender(TEST_TENDER)).unwrap();
    assert_eq!(dec("20000000"), account.balance());
    assert!(account.balance() >= Decimal::ZERO);
    assert!(account.balance() <= account.total_value().as_inner());
}

#[test]
fn verify_milestone_stores_the_score() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    verify(&ledger, TEST_TENDER, "Foundation", "85").unwrap();
    assert_eq!(Some(dec("85")), ledger.get_aggregate_score(&tender(TEST_TENDER)));
}

#[test]
fn verify_milestone_on_an_unknown_tender_errors() {
    let (_dir, ledger) = setup_ledger();
    let res = verify(&ledger, "T404", "Foundation", "85");
    let_assert!(Err(LedgerError::UnknownTender { .. }) = res);
}

#[test]
fn reverifying_a_milestone_replaces_the_aggregate_but_keeps_both_records() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    verify(&ledger, TEST_TENDER, "Foundation", "60").unwrap();
    verify(&ledger, TEST_TENDER, "Foundation", "85").unwrap();

    assert_eq!(Some(dec("85")), ledger.get_aggregate_score(&tender(TEST_TENDER)));
    let verifies = ledger
        .get_history(&tender(TEST_TENDER))
        .into_iter()
        .filter(|record| matches!(record.kind, RecordKind::Verify(_)))
        .count();
    assert_eq!(2, verifies);
}

#[test]
fn aggregate_score_is_the_mean_of_the_current_milestone_scores() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    verify(&ledger, TEST_TENDER, "Foundation", "80").unwrap();
    verify(&ledger, TEST_TENDER, "Roofing", "85").unwrap();
    assert_eq!(Some(dec("82.5")), ledger.get_aggregate_score(&tender(TEST_TENDER)));
}

#[test]
fn resolve_with_a_high_aggregate_redeems_the_remaining_balance() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    spend(&ledger, TEST_TENDER, "15000000", "Materials").unwrap();
    verify(&ledger, TEST_TENDER, "Foundation", "85").unwrap();

    let record = resolve(&ledger, TEST_TENDER).unwrap();
    let_assert!(RecordKind::Redeem(redeem) = record.kind);
    assert_eq!(dec("85000000"), redeem.amount);
    assert_eq!(dec("85"), redeem.aggregate_score);
    assert_eq!(dec("0.10"), redeem.bonus_multiplier);

    let account = ledger.get_account(&tender(TEST_TENDER)).unwrap();
    assert_eq!(Decimal::ZERO, account.balance());
    assert_eq!(TenderStatus::Resolved, account.status());
    assert_eq!(Decimal::ZERO, ledger.treasury_total());
}

#[test]
fn resolve_with_a_low_aggregate_forfeits_the_remaining_balance_to_treasury() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    spend(&ledger, TEST_TENDER, "15000000", "Materials").unwrap();
    verify(&ledger, TEST_TENDER, "Foundation", "60").unwrap();

    let record = resolve(&ledger, TEST_TENDER).unwrap();
    let_assert!(RecordKind::Forfeit(forfeit) = record.kind);
    assert_eq!(dec("85000000"), forfeit.amount);
    assert_eq!(dec("60"), forfeit.aggregate_score);

    let account = ledger.get_account(&tender(TEST_TENDER)).unwrap();
    assert_eq!(Decimal::ZERO, account.balance());
    assert_eq!(TenderStatus::Resolved, account.status());
    assert_eq!(dec("85000000"), ledger.treasury_total());
}

#[test]
fn resolve_without_verified_milestones_errors() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    let res = resolve(&ledger, TEST_TENDER);
    let_assert!(Err(LedgerError::NoVerifiedMilestones { .. }) = res);
    assert_eq!(dec("100000000"), ledger.get_account(&tender(TEST_TENDER)).unwrap().balance());
}

#[test]
fn resolve_by_the_wrong_contractor_errors() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    verify(&ledger, TEST_TENDER, "Foundation", "85").unwrap();
    let res = ledger.resolve(tender(TEST_TENDER), contractor("C999"));
    let_assert!(Err(LedgerError::ContractorMismatch { .. }) = res);
}

#[test]
fn resolve_twice_errors_with_already_resolved() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    verify(&ledger, TEST_TENDER, "Foundation", "85").unwrap();
    resolve(&ledger, TEST_TENDER).unwrap();

    let res = resolve(&ledger, TEST_TENDER);
    let_assert!(Err(LedgerError::AlreadyResolved { .. }) = res);
}

#[test]
fn no_operation_is_accepted_on_a_resolved_tender() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    verify(&ledger, TEST_TENDER, "Foundation", "85").unwrap();
    resolve(&ledger, TEST_TENDER).unwrap();

    let res = spend(&ledger, TEST_TENDER, "1", "Materials");
    let_assert!(Err(LedgerError::AlreadyResolved { .. }) = res);
    let res = verify(&ledger, TEST_TENDER, "Roofing", "90");
    let_assert!(Err(LedgerError::AlreadyResolved { .. }) = res);
}

#[test]
fn replaying_the_log_reproduces_the_exact_final_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transactions.jsonl");

    let ledger = LedgerEngine::open(LogStore::open(&path).unwrap()).unwrap();
    issue(&ledger, TEST_TENDER).unwrap();
    spend(&ledger, TEST_TENDER, "15000000", "Materials").unwrap();
    verify(&ledger, TEST_TENDER, "Foundation", "85").unwrap();
    issue(&ledger, "T002").unwrap();
    spend(&ledger, "T002", "5000000", "Labour").unwrap();
    resolve(&ledger, TEST_TENDER).unwrap();
    let before = (
        ledger.get_account(&tender(TEST_TENDER)).unwrap(),
        ledger.get_account(&tender("T002")).unwrap(),
        ledger.get_history(&tender(TEST_TENDER)),
        ledger.treasury_total(),
    );
    drop(ledger);

    let reloaded = LedgerEngine::open(LogStore::open(&path).unwrap()).unwrap();
    assert_eq!(before.0, reloaded.get_account(&tender(TEST_TENDER)).unwrap());
    assert_eq!(before.1, reloaded.get_account(&tender("T002")).unwrap());
    assert_eq!(before.2, reloaded.get_history(&tender(TEST_TENDER)));
    assert_eq!(before.3, reloaded.treasury_total());
}

#[test]
fn concurrent_spends_on_the_same_tender_never_overspend() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..5 {
                    let _ = spend(&ledger, TEST_TENDER, "10000000", "Labour");
                }
            });
        }
    });

    let account = ledger.get_account(&tender(TEST_TENDER)).unwrap();
    assert_eq!(Decimal::ZERO, account.balance());
    let spends = ledger
        .get_history(&tender(TEST_TENDER))
        .into_iter()
        .filter(|record| matches!(record.kind, RecordKind::Spend(_)))
        .count();
    assert_eq!(10, spends);
}

#[test]
fn summary_rolls_up_the_account_and_its_history() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    spend(&ledger, TEST_TENDER, "15000000", "Materials").unwrap();
    spend(&ledger, TEST_TENDER, "5000000", "Labour").unwrap();
    verify(&ledger, TEST_TENDER, "Foundation", "60").unwrap();
    resolve(&ledger, TEST_TENDER).unwrap();

    let summary = ledger.summary(&tender(TEST_TENDER)).unwrap();
    assert_eq!(dec("100000000"), summary.total_value);
    assert_eq!(dec("20000000"), summary.total_spent);
    assert_eq!(Decimal::ZERO, summary.balance);
    assert_eq!(TenderStatus::Resolved, summary.status);
    assert_eq!(1, summary.milestones_verified);
    assert_eq!(Some(dec("60")), summary.aggregate_score);
    assert_eq!(Outcome::Forfeited, summary.outcome);
}

#[test]
fn spending_by_category_totals_each_category() {
    let (_dir, ledger) = setup_ledger();
    issue(&ledger, TEST_TENDER).unwrap();
    spend(&ledger, TEST_TENDER, "15000000", "Materials").unwrap();
    spend(&ledger, TEST_TENDER, "5000000", "Materials").unwrap();
    spend(&ledger, TEST_TENDER, "2000000", "Labour").unwrap();

    let totals = ledger.spending_by_category(&tender(TEST_TENDER));
    assert_eq!(dec("20000000"), totals["Materials"]);
    assert_eq!(dec("2000000"), totals["Labour"]);
}

fn setup_ledger() -> (tempfile::TempDir, LedgerEngine) {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::open(dir.path().join("transactions.jsonl")).unwrap();
    (dir, LedgerEngine::open(store).unwrap())
}

fn issue(ledger: &LedgerEngine, tender_id: &str) -> Result<crate::record::TransactionRecord, LedgerError> {
    ledger.issue(
        tender(tender_id),
        contractor(TEST_CONTRACTOR),
        amount("100000000"),
        BTreeSet::from(["Materials".to_owned(), "Labour".to_owned()]),
        "road upgrade".to_owned(),
    )
}

fn spend(
    ledger: &LedgerEngine,
    tender_id: &str,
    raw_amount: &str,
    category: &str,
) -> Result<crate::record::TransactionRecord, LedgerError> {
    ledger.spend(
        tender(tender_id),
        contractor(TEST_CONTRACTOR),
        amount(raw_amount),
        category.to_owned(),
        milestone("Foundation"),
        "site works".to_owned(),
    )
}

fn verify(
    ledger: &LedgerEngine,
    tender_id: &str,
    raw_milestone: &str,
    raw_score: &str,
) -> Result<crate::record::TransactionRecord, LedgerError> {
    ledger.verify_milestone(tender(tender_id), milestone(raw_milestone), score(raw_score))
}

fn resolve(ledger: &LedgerEngine, tender_id: &str) -> Result<crate::record::TransactionRecord, LedgerError> {
    ledger.resolve(tender(tender_id), contractor(TEST_CONTRACTOR))
}

fn tender(raw: &str) -> TenderId {
    TenderId(raw.to_owned())
}

fn contractor(raw: &str) -> ContractorId {
    ContractorId(raw.to_owned())
}

fn milestone(raw: &str) -> Milestone {
    Milestone(raw.to_owned())
}

fn amount(raw: &str) -> TokenAmount {
    TokenAmount::try_from(dec(raw)).unwrap()
}

fn score(raw: &str) -> QualityScore {
    QualityScore::try_from(dec(raw)).unwrap()
}

fn dec(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}
