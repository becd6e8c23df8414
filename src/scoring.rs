//! Pure quality-scoring functions.
//!
//! Shared by [`crate::engine::LedgerEngine::resolve`] and the read-only
//! aggregate queries so that the score reported before resolution is exactly
//! the score applied at resolution.

use rust_decimal::Decimal;

/// Aggregate score at or above which the remaining balance is redeemed.
pub const REDEMPTION_THRESHOLD: Decimal = Decimal::from_parts(80, 0, 0, false, 0);

/// Aggregate score at which the bonus multiplier reaches its cap.
const FULL_BONUS_SCORE: Decimal = Decimal::from_parts(90, 0, 0, false, 0);

/// Maximum bonus multiplier, 20%.
const MAX_BONUS: Decimal = Decimal::from_parts(2, 0, 0, false, 1);

/// Arithmetic mean of the supplied scores, `None` when there are none.
pub fn aggregate(scores: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    let mut sum = Decimal::ZERO;
    let mut count = 0u32;
    for score in scores {
        sum += score;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(sum / Decimal::from(count))
}

pub fn passes(score: Decimal) -> bool {
    score >= REDEMPTION_THRESHOLD
}

/// Bonus multiplier scaling linearly from 0% at the redemption threshold to
/// 20% at [`FULL_BONUS_SCORE`] and above.
pub fn bonus_multiplier(aggregate_score: Decimal) -> Decimal {
    let over = (aggregate_score - REDEMPTION_THRESHOLD).max(Decimal::ZERO);
    let fraction = (over / (FULL_BONUS_SCORE - REDEMPTION_THRESHOLD)).min(Decimal::ONE);
    fraction * MAX_BONUS
}

/// Bonus-adjusted payout for the remaining `balance`, capped at `balance`: the
/// multiplier never creates tokens beyond what is left on the tender.
pub fn payout(balance: Decimal, aggregate_score: Decimal) -> Decimal {
    (balance * (Decimal::ONE + bonus_multiplier(aggregate_score))).min(balance)
}
