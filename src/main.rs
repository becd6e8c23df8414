use color_eyre::eyre::OptionExt as _;
use color_eyre::eyre::eyre;
use csv::ReaderBuilder;
use csv::Trim;
use tenderledger::engine::LedgerEngine;
use tenderledger::engine::LedgerError;
use tenderledger::op::Op;
use tenderledger::record::TransactionRecord;
use tenderledger::report;
use tenderledger::store::LogStore;
use tracing_subscriber::EnvFilter;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let log_path = args.next().ok_or_eyre("no transaction log path supplied")?;
    let ops_path = args.next().ok_or_eyre("no operations CSV supplied")?;

    let ledger = LedgerEngine::open(LogStore::open(log_path)?)?;

    let mut ops_reader = ReaderBuilder::new().trim(Trim::All).from_path(ops_path)?;
    let mut rejected = 0usize;
    for op_res in ops_reader.deserialize::<Op>() {
        let op = match op_res {
            Ok(op) => op,
            Err(error) => {
                tracing::warn!(%error, "failed to deserialize operation");
                rejected += 1;
                continue;
            }
        };

        if let Err(error) = apply(&ledger, op.clone()) {
            tracing::warn!(%op, %error, "operation rejected");
            rejected += 1;
        }
    }

    report::write_csv_to_stdout(&ledger)?;

    if rejected > 0 {
        return Err(eyre!("{rejected} operation(s) rejected"));
    }
    Ok(())
}

fn apply(ledger: &LedgerEngine, op: Op) -> Result<TransactionRecord, LedgerError> {
    match op {
        Op::Issue(issue) => ledger.issue(
            issue.tender_id,
            issue.contractor_id,
            issue.total_value,
            issue.categories,
            issue.description,
        ),
        Op::Spend(spend) => ledger.spend(
            spend.tender_id,
            spend.contractor_id,
            spend.amount,
            spend.category,
            spend.milestone,
            spend.description,
        ),
        Op::Verify(verify) => ledger.verify_milestone(verify.tender_id, verify.milestone, verify.score),
        Op::Resolve(resolve) => ledger.resolve(resolve.tender_id, resolve.contractor_id),
    }
}
