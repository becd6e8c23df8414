use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Deserializer;

use crate::record::ContractorId;
use crate::record::Milestone;
use crate::record::QualityScore;
use crate::record::TenderId;
use crate::record::TokenAmount;

/// One CSV row of the operations batch fed to the ledger by the CLI.
#[derive(Debug, Clone, parse_display::Display)]
#[cfg_attr(test, derive(PartialEq))]
pub enum Op {
    #[display("{0}")]
    Issue(IssueOp),
    #[display("{0}")]
    Spend(SpendOp),
    #[display("{0}")]
    Verify(VerifyOp),
    #[display("{0}")]
    Resolve(ResolveOp),
}

impl<'de> Deserialize<'de> for Op {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct CsvRow {
            op: String,
            tender: TenderId,
            contractor: Option<ContractorId>,
            amount: Option<TokenAmount>,
            category: Option<String>,
            milestone: Option<Milestone>,
            score: Option<QualityScore>,
            description: Option<String>,
        }

        let row = CsvRow::deserialize(deserializer)?;
        let description = row.description.unwrap_or_default();

        let op = match row.op.as_str() {
            "issue" => Self::Issue(IssueOp {
                tender_id: row.tender,
                contractor_id: required(row.contractor, "contractor")?,
                total_value: required(row.amount, "amount")?,
                categories: split_categories(row.category.as_deref().unwrap_or_default()),
                description,
            }),
            "spend" => Self::Spend(SpendOp {
                tender_id: row.tender,
                contractor_id: required(row.contractor, "contractor")?,
                amount: required(row.amount, "amount")?,
                category: required(row.category, "category")?,
                milestone: required(row.milestone, "milestone")?,
                description,
            }),
            "verify" => Self::Verify(VerifyOp {
                tender_id: row.tender,
                milestone: required(row.milestone, "milestone")?,
                score: required(row.score, "score")?,
            }),
            "resolve" => Self::Resolve(ResolveOp {
                tender_id: row.tender,
                contractor_id: required(row.contractor, "contractor")?,
            }),
            other => {
                return Err(serde::de::Error::unknown_variant(
                    other,
                    &["issue", "spend", "verify", "resolve"],
                ));
            }
        };

        Ok(op)
    }
}

fn required<T, E: serde::de::Error>(field: Option<T>, name: &'static str) -> Result<T, E> {
    field.ok_or_else(|| serde::de::Error::missing_field(name))
}

/// The `category` column of an issue row holds the whole allowed scope,
/// `;`-separated.
fn split_categories(raw: &str) -> BTreeSet<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|category| !category.is_empty())
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, Clone, parse_display::Display)]
#[display("op=(issue tender={tender_id} contractor={contractor_id} total_value={total_value})")]
#[cfg_attr(test, derive(PartialEq))]
pub struct IssueOp {
    pub tender_id: TenderId,
    pub contractor_id: ContractorId,
    pub total_value: TokenAmount,
    pub categories: BTreeSet<String>,
    pub description: String,
}

#[derive(Debug, Clone, parse_display::Display)]
#[display("op=(spend tender={tender_id} contractor={contractor_id} amount={amount} category={category} milestone={milestone})")]
#[cfg_attr(test, derive(PartialEq))]
pub struct SpendOp {
    pub tender_id: TenderId,
    pub contractor_id: ContractorId,
    pub amount: TokenAmount,
    pub category: String,
    pub milestone: Milestone,
    pub description: String,
}

#[derive(Debug, Clone, parse_display::Display)]
#[display("op=(verify tender={tender_id} milestone={milestone} score={score})")]
#[cfg_attr(test, derive(PartialEq))]
pub struct VerifyOp {
    pub tender_id: TenderId,
    pub milestone: Milestone,
    pub score: QualityScore,
}

#[derive(Debug, Clone, parse_display::Display)]
#[display("op=(resolve tender={tender_id} contractor={contractor_id})")]
#[cfg_attr(test, derive(PartialEq))]
pub struct ResolveOp {
    pub tender_id: TenderId,
    pub contractor_id: ContractorId,
}
