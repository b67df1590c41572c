//! Constant-product swap math
//!
//! Pure integer arithmetic, shared by the local quoting path and the
//! transaction builder. All amounts are u64 base units widened to u128
//! for intermediates; every division truncates toward zero. Floating
//! point appears only in the displayed price-impact figure.

use crate::errors::{Result, RouterError};

/// Portion of the input retained after the swap fee (0.3% taken from
/// the input before the product computation).
pub const FEE_NUMERATOR: u128 = 997;
pub const FEE_DENOMINATOR: u128 = 1000;

/// Outcome of swapping against a single shard's reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    pub amount_out: u64,
    pub fee: u64,
    pub price_impact_bps: u32,
}

/// Input remaining after the proportional fee, rounded down.
pub fn effective_input(amount_in: u64) -> u64 {
    (amount_in as u128 * FEE_NUMERATOR / FEE_DENOMINATOR) as u64
}

/// Compute the constant-product output for `amount_in` against
/// `(reserve_in, reserve_out)`.
///
/// Rejects non-positive inputs and empty reserves; a zero *output* is
/// not an error here (the routing layer decides whether any shard can
/// absorb the trade).
pub fn swap_outcome(amount_in: u64, reserve_in: u64, reserve_out: u64) -> Result<SwapOutcome> {
    if amount_in == 0 {
        return Err(RouterError::validation("swap amount must be positive"));
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(RouterError::validation("swap against empty reserves"));
    }

    let effective = effective_input(amount_in);
    let fee = amount_in - effective;

    let amount_out =
        (effective as u128 * reserve_out as u128 / (reserve_in as u128 + effective as u128)) as u64;

    Ok(SwapOutcome {
        amount_out,
        fee,
        price_impact_bps: price_impact_bps(amount_in, amount_out, reserve_in, reserve_out),
    })
}

/// Relative deviation of the realized execution price from the
/// pre-trade spot price, in basis points. Display-only figure.
pub fn price_impact_bps(amount_in: u64, amount_out: u64, reserve_in: u64, reserve_out: u64) -> u32 {
    if amount_in == 0 || reserve_in == 0 || reserve_out == 0 {
        return 0;
    }
    let spot = reserve_out as f64 / reserve_in as f64;
    let executed = amount_out as f64 / amount_in as f64;
    let impact = (1.0 - executed / spot) * 10_000.0;
    impact.clamp(0.0, 10_000.0) as u32
}

/// Minimum acceptable output after applying a slippage tolerance,
/// rounded down.
pub fn apply_slippage(amount_out: u64, slippage_bps: u32) -> Result<u64> {
    if slippage_bps > 10_000 {
        return Err(RouterError::validation(format!(
            "slippage {slippage_bps} bps exceeds 10000"
        )));
    }
    Ok((amount_out as u128 * (10_000 - slippage_bps as u128) / 10_000) as u64)
}
