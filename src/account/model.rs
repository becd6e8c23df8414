use std::collections::BTreeMap;
use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::record::ContractorId;
use crate::record::Milestone;
use crate::record::QualityScore;
use crate::record::TenderId;
use crate::record::TokenAmount;

#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub struct TenderAccount {
    pub(in crate::account) tender_id: TenderId,
    pub(in crate::account) contractor_id: ContractorId,
    pub(in crate::account) total_value: TokenAmount,
    pub(in crate::account) allowed_categories: BTreeSet<String>,
    pub(in crate::account) balance: Decimal,
    pub(in crate::account) status: TenderStatus,
    pub(in crate::account) milestone_scores: BTreeMap<Milestone, QualityScore>,
}

impl TenderAccount {
    pub fn new(
        tender_id: TenderId,
        contractor_id: ContractorId,
        total_value: TokenAmount,
        allowed_categories: BTreeSet<String>,
    ) -> Self {
        Self {
            tender_id,
            contractor_id,
            total_value,
            allowed_categories,
            balance: total_value.as_inner(),
            status: TenderStatus::Issued,
            milestone_scores: BTreeMap::new(),
        }
    }

    pub const fn tender_id(&self) -> &TenderId {
        &self.tender_id
    }

    pub const fn contractor_id(&self) -> &ContractorId {
        &self.contractor_id
    }

    pub const fn total_value(&self) -> TokenAmount {
        self.total_value
    }

    pub const fn allowed_categories(&self) -> &BTreeSet<String> {
        &self.allowed_categories
    }

    pub const fn balance(&self) -> Decimal {
        self.balance
    }

    pub const fn status(&self) -> TenderStatus {
        self.status
    }

    pub const fn is_resolved(&self) -> bool {
        matches!(self.status, TenderStatus::Resolved)
    }

    pub const fn milestone_scores(&self) -> &BTreeMap<Milestone, QualityScore> {
        &self.milestone_scores
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, parse_display::Display)]
pub enum TenderStatus {
    Issued,
    Active,
    Resolved,
}
