use std::collections::BTreeSet;

use chrono::DateTime;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

#[derive(
    Debug, Serialize, Deserialize, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, parse_display::Display,
)]
pub struct TenderId(pub String);

#[derive(
    Debug, Serialize, Deserialize, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, parse_display::Display,
)]
pub struct ContractorId(pub String);

#[derive(
    Debug, Serialize, Deserialize, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, parse_display::Display,
)]
pub struct Milestone(pub String);

/// Assigned exclusively by the transaction log store, strictly monotonic.
#[derive(
    Debug, Serialize, Deserialize, Copy, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, parse_display::Display,
)]
pub struct SequenceId(pub u64);

/// One entry of the append-only audit trail. Immutable once sealed by the store.
#[derive(Debug, Clone, Serialize, Deserialize, parse_display::Display)]
#[display("record=(sequence_id={sequence_id} {kind})")]
#[cfg_attr(test, derive(PartialEq))]
pub struct TransactionRecord {
    pub sequence_id: SequenceId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: RecordKind,
}

impl TransactionRecord {
    pub fn tender_id(&self) -> &TenderId {
        self.kind.tender_id()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, parse_display::Display)]
#[serde(tag = "kind")]
#[cfg_attr(test, derive(PartialEq))]
pub enum RecordKind {
    #[display("{0}")]
    Issue(Issue),
    #[display("{0}")]
    Spend(Spend),
    #[display("{0}")]
    Verify(Verify),
    #[display("{0}")]
    Redeem(Redeem),
    #[display("{0}")]
    Forfeit(Forfeit),
}

impl RecordKind {
    pub fn tender_id(&self) -> &TenderId {
        match self {
            Self::Issue(Issue { tender_id, .. })
            | Self::Spend(Spend { tender_id, .. })
            | Self::Verify(Verify { tender_id, .. })
            | Self::Redeem(Redeem { tender_id, .. })
            | Self::Forfeit(Forfeit { tender_id, .. }) => tender_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, parse_display::Display)]
#[display("issue=(tender_id={tender_id} contractor_id={contractor_id} total_value={total_value})")]
#[cfg_attr(test, derive(PartialEq))]
pub struct Issue {
    pub tender_id: TenderId,
    pub contractor_id: ContractorId,
    pub total_value: TokenAmount,
    pub allowed_categories: BTreeSet<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, parse_display::Display)]
#[display("spend=(tender_id={tender_id} contractor_id={contractor_id} amount={amount} category={category} milestone={milestone})")]
#[cfg_attr(test, derive(PartialEq))]
pub struct Spend {
    pub tender_id: TenderId,
    pub contractor_id: ContractorId,
    pub amount: TokenAmount,
    pub category: String,
    pub milestone: Milestone,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, parse_display::Display)]
#[display("verify=(tender_id={tender_id} milestone={milestone} quality_score={quality_score} passed={passed})")]
#[cfg_attr(test, derive(PartialEq))]
pub struct Verify {
    pub tender_id: TenderId,
    pub milestone: Milestone,
    pub quality_score: QualityScore,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, parse_display::Display)]
#[display("redeem=(tender_id={tender_id} contractor_id={contractor_id} amount={amount} aggregate_score={aggregate_score} bonus_multiplier={bonus_multiplier})")]
#[cfg_attr(test, derive(PartialEq))]
pub struct Redeem {
    pub tender_id: TenderId,
    pub contractor_id: ContractorId,
    /// Payout, never above the pre-resolution balance.
    pub amount: Decimal,
    pub aggregate_score: Decimal,
    pub bonus_multiplier: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, parse_display::Display)]
#[display("forfeit=(tender_id={tender_id} contractor_id={contractor_id} amount={amount} aggregate_score={aggregate_score})")]
#[cfg_attr(test, derive(PartialEq))]
pub struct Forfeit {
    pub tender_id: TenderId,
    pub contractor_id: ContractorId,
    /// Pre-resolution balance returned to treasury.
    pub amount: Decimal,
    pub aggregate_score: Decimal,
}

/// This permits to avoid checks on non-positive amounts while handling operations.
#[derive(Debug, Copy, Clone, Serialize, parse_display::Display)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct TokenAmount(Decimal);

#[derive(thiserror::Error, Debug)]
#[error("invalid token amount, must be greater than zero value={0:?}")]
pub struct InvalidAmount(pub Decimal);

impl TryFrom<Decimal> for TokenAmount {
    type Error = InvalidAmount;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value <= Decimal::ZERO {
            return Err(InvalidAmount(value));
        }
        Ok(Self(value))
    }
}

impl TokenAmount {
    pub const fn as_inner(&self) -> Decimal {
        self.0
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let decimal = <Decimal as serde::Deserialize>::deserialize(deserializer)?;
        Self::try_from(decimal).map_err(|error| serde::de::Error::custom(error.to_string()))
    }
}

/// This permits to avoid range checks on quality scores while handling operations.
#[derive(Debug, Copy, Clone, Serialize, parse_display::Display)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct QualityScore(Decimal);

#[derive(thiserror::Error, Debug)]
#[error("invalid quality score, must be between 0 and 100 value={0:?}")]
pub struct InvalidScore(pub Decimal);

impl TryFrom<Decimal> for QualityScore {
    type Error = InvalidScore;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(InvalidScore(value));
        }
        Ok(Self(value))
    }
}

impl QualityScore {
    pub const fn as_inner(&self) -> Decimal {
        self.0
    }
}

impl<'de> Deserialize<'de> for QualityScore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let decimal = <Decimal as serde::Deserialize>::deserialize(deserializer)?;
        Self::try_from(decimal).map_err(|error| serde::de::Error::custom(error.to_string()))
    }
}
