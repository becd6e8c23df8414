use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::account::TenderStatus;
use crate::engine::LedgerEngine;
use crate::engine::Outcome;
use crate::engine::TenderSummary;
use crate::record::ContractorId;
use crate::record::TenderId;

/// Writes one CSV row per tender account to stdout, ordered by tender id.
pub fn write_csv_to_stdout(ledger: &LedgerEngine) -> color_eyre::Result<()> {
    let mut writer = Writer::from_writer(std::io::stdout());
    for account in ledger.accounts() {
        if let Some(summary) = ledger.summary(account.tender_id()) {
            writer.serialize(TenderReport::from(summary))?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct TenderReport {
    tender_id: TenderId,
    contractor_id: ContractorId,
    total_value: Decimal,
    spent: Decimal,
    balance: Decimal,
    status: TenderStatus,
    milestones_verified: usize,
    aggregate_score: Option<Decimal>,
    outcome: Outcome,
}

impl From<TenderSummary> for TenderReport {
    fn from(summary: TenderSummary) -> Self {
        Self {
            tender_id: summary.tender_id,
            contractor_id: summary.contractor_id,
            total_value: summary.total_value,
            spent: summary.total_spent,
            balance: summary.balance,
            status: summary.status,
            milestones_verified: summary.milestones_verified,
            aggregate_score: summary.aggregate_score,
            outcome: summary.outcome,
        }
    }
}
