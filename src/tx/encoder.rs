//! Binary instruction encoding for the on-chain pool program
//!
//! Pure, deterministic functions: operation parameters in, byte-exact
//! `Instruction` out. The data layout is little-endian with a one-byte
//! operation discriminator followed by 8-byte unsigned amounts; the
//! account ordering is a fixed contract with the on-chain program and
//! any permutation is rejected on-chain, so both are pinned by
//! constants and asserted at construction time.
//!
//! Layouts:
//! - swap:             `[1][amount_in:8][min_amount_out:8]`        (17 bytes, 13 accounts)
//! - add liquidity:    `[2][desired_lp:8][max_a:8][max_b:8]`       (25 bytes, 14 accounts)
//! - remove liquidity: `[3][lp_to_burn:8][min_a:8][min_b:8]`       (25 bytes, 15 accounts)

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::errors::{Result, RouterError};
use crate::types::PoolShard;

pub const SWAP_DISCRIMINATOR: u8 = 1;
pub const ADD_LIQUIDITY_DISCRIMINATOR: u8 = 2;
pub const REMOVE_LIQUIDITY_DISCRIMINATOR: u8 = 3;

pub const SWAP_DATA_LEN: usize = 17;
pub const LIQUIDITY_DATA_LEN: usize = 25;

pub const SWAP_ACCOUNT_COUNT: usize = 13;
pub const ADD_LIQUIDITY_ACCOUNT_COUNT: usize = 14;
pub const REMOVE_LIQUIDITY_ACCOUNT_COUNT: usize = 15;

/// The closed set of pool operations this client can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolOperation {
    Swap {
        amount_in: u64,
        min_amount_out: u64,
    },
    AddLiquidity {
        desired_lp_amount: u64,
        max_token_a: u64,
        max_token_b: u64,
    },
    RemoveLiquidity {
        lp_amount_to_burn: u64,
        /// Minimums may be zero: "no slippage protection"
        min_token_a: u64,
        min_token_b: u64,
    },
}

impl PoolOperation {
    pub fn discriminator(&self) -> u8 {
        match self {
            Self::Swap { .. } => SWAP_DISCRIMINATOR,
            Self::AddLiquidity { .. } => ADD_LIQUIDITY_DISCRIMINATOR,
            Self::RemoveLiquidity { .. } => REMOVE_LIQUIDITY_DISCRIMINATOR,
        }
    }

    /// Reject non-positive required amounts before any bytes are
    /// produced. Only liquidity-removal minimums may be zero.
    fn validate(&self) -> Result<()> {
        match *self {
            Self::Swap {
                amount_in,
                min_amount_out,
            } => {
                require_positive("amount_in", amount_in)?;
                require_positive("min_amount_out", min_amount_out)
            }
            Self::AddLiquidity {
                desired_lp_amount,
                max_token_a,
                max_token_b,
            } => {
                require_positive("desired_lp_amount", desired_lp_amount)?;
                require_positive("max_token_a", max_token_a)?;
                require_positive("max_token_b", max_token_b)
            }
            Self::RemoveLiquidity {
                lp_amount_to_burn, ..
            } => require_positive("lp_amount_to_burn", lp_amount_to_burn),
        }
    }

    /// Serialize the fixed-layout data buffer.
    fn encode_data(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut data = Vec::with_capacity(LIQUIDITY_DATA_LEN);
        data.push(self.discriminator());
        match *self {
            Self::Swap {
                amount_in,
                min_amount_out,
            } => {
                data.extend_from_slice(&amount_in.to_le_bytes());
                data.extend_from_slice(&min_amount_out.to_le_bytes());
            }
            Self::AddLiquidity {
                desired_lp_amount,
                max_token_a,
                max_token_b,
            } => {
                data.extend_from_slice(&desired_lp_amount.to_le_bytes());
                data.extend_from_slice(&max_token_a.to_le_bytes());
                data.extend_from_slice(&max_token_b.to_le_bytes());
            }
            Self::RemoveLiquidity {
                lp_amount_to_burn,
                min_token_a,
                min_token_b,
            } => {
                data.extend_from_slice(&lp_amount_to_burn.to_le_bytes());
                data.extend_from_slice(&min_token_a.to_le_bytes());
                data.extend_from_slice(&min_token_b.to_le_bytes());
            }
        }

        let expected = self.expected_data_len();
        if data.len() != expected {
            return Err(RouterError::instruction(format!(
                "encoded {} bytes, layout requires {expected}",
                data.len()
            )));
        }
        Ok(data)
    }

    fn expected_data_len(&self) -> usize {
        match self {
            Self::Swap { .. } => SWAP_DATA_LEN,
            Self::AddLiquidity { .. } | Self::RemoveLiquidity { .. } => LIQUIDITY_DATA_LEN,
        }
    }
}

fn require_positive(name: &str, value: u64) -> Result<()> {
    if value == 0 {
        Err(RouterError::instruction(format!("{name} must be positive")))
    } else {
        Ok(())
    }
}

/// User-side accounts for a swap, already resolved by the caller.
#[derive(Debug, Clone, Copy)]
pub struct SwapAccounts {
    pub user: Pubkey,
    pub user_input_account: Pubkey,
    pub user_output_account: Pubkey,
    /// Whether the input side of the trade is the shard's token A
    pub input_is_token_a: bool,
}

/// User-side accounts for add/remove liquidity.
#[derive(Debug, Clone, Copy)]
pub struct LiquidityAccounts {
    pub user: Pubkey,
    pub user_token_a_account: Pubkey,
    pub user_token_b_account: Pubkey,
    pub user_lp_account: Pubkey,
}

/// Encode a swap against one shard.
///
/// Account order (13): pool, authority, user (signer), user input,
/// pool input reserve, pool output reserve, user output, LP mint, fee
/// account, mint A, mint B, input-side token program, output-side
/// token program.
pub fn encode_swap(
    program_id: &Pubkey,
    shard: &PoolShard,
    accounts: &SwapAccounts,
    amount_in: u64,
    min_amount_out: u64,
) -> Result<Instruction> {
    let data = PoolOperation::Swap {
        amount_in,
        min_amount_out,
    }
    .encode_data()?;

    let (pool_input_reserve, pool_output_reserve) = if accounts.input_is_token_a {
        (shard.token_a_account, shard.token_b_account)
    } else {
        (shard.token_b_account, shard.token_a_account)
    };

    let metas = vec![
        AccountMeta::new_readonly(shard.pool_address, false),
        AccountMeta::new_readonly(shard.authority, false),
        AccountMeta::new_readonly(accounts.user, true),
        AccountMeta::new(accounts.user_input_account, false),
        AccountMeta::new(pool_input_reserve, false),
        AccountMeta::new(pool_output_reserve, false),
        AccountMeta::new(accounts.user_output_account, false),
        AccountMeta::new(shard.lp_mint, false),
        AccountMeta::new(shard.fee_account, false),
        AccountMeta::new_readonly(shard.token_a_mint, false),
        AccountMeta::new_readonly(shard.token_b_mint, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ];
    finish(program_id, metas, data, SWAP_ACCOUNT_COUNT)
}

/// Encode an add-liquidity deposit into one shard.
///
/// Account order (14): pool, authority, user (signer), user token A,
/// user token B, pool reserve A, pool reserve B, LP mint, user LP
/// account, mint A, mint B, token-A program, token-B program, pool
/// token program.
pub fn encode_add_liquidity(
    program_id: &Pubkey,
    shard: &PoolShard,
    accounts: &LiquidityAccounts,
    desired_lp_amount: u64,
    max_token_a: u64,
    max_token_b: u64,
) -> Result<Instruction> {
    let data = PoolOperation::AddLiquidity {
        desired_lp_amount,
        max_token_a,
        max_token_b,
    }
    .encode_data()?;

    let metas = vec![
        AccountMeta::new_readonly(shard.pool_address, false),
        AccountMeta::new_readonly(shard.authority, false),
        AccountMeta::new_readonly(accounts.user, true),
        AccountMeta::new(accounts.user_token_a_account, false),
        AccountMeta::new(accounts.user_token_b_account, false),
        AccountMeta::new(shard.token_a_account, false),
        AccountMeta::new(shard.token_b_account, false),
        AccountMeta::new(shard.lp_mint, false),
        AccountMeta::new(accounts.user_lp_account, false),
        AccountMeta::new_readonly(shard.token_a_mint, false),
        AccountMeta::new_readonly(shard.token_b_mint, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ];
    finish(program_id, metas, data, ADD_LIQUIDITY_ACCOUNT_COUNT)
}

/// Encode a remove-liquidity withdrawal from one shard.
///
/// Account order (15): pool, authority, user (signer), LP mint, user LP
/// account, pool reserve A, pool reserve B, user token A, user token B,
/// fee account, mint A, mint B, pool token program, token-A program,
/// token-B program.
pub fn encode_remove_liquidity(
    program_id: &Pubkey,
    shard: &PoolShard,
    accounts: &LiquidityAccounts,
    lp_amount_to_burn: u64,
    min_token_a: u64,
    min_token_b: u64,
) -> Result<Instruction> {
    let data = PoolOperation::RemoveLiquidity {
        lp_amount_to_burn,
        min_token_a,
        min_token_b,
    }
    .encode_data()?;

    let metas = vec![
        AccountMeta::new_readonly(shard.pool_address, false),
        AccountMeta::new_readonly(shard.authority, false),
        AccountMeta::new_readonly(accounts.user, true),
        AccountMeta::new(shard.lp_mint, false),
        AccountMeta::new(accounts.user_lp_account, false),
        AccountMeta::new(shard.token_a_account, false),
        AccountMeta::new(shard.token_b_account, false),
        AccountMeta::new(accounts.user_token_a_account, false),
        AccountMeta::new(accounts.user_token_b_account, false),
        AccountMeta::new(shard.fee_account, false),
        AccountMeta::new_readonly(shard.token_a_mint, false),
        AccountMeta::new_readonly(shard.token_b_mint, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ];
    finish(program_id, metas, data, REMOVE_LIQUIDITY_ACCOUNT_COUNT)
}

fn finish(
    program_id: &Pubkey,
    metas: Vec<AccountMeta>,
    data: Vec<u8>,
    expected_accounts: usize,
) -> Result<Instruction> {
    if metas.len() != expected_accounts {
        return Err(RouterError::instruction(format!(
            "assembled {} accounts, layout requires {expected_accounts}",
            metas.len()
        )));
    }
    Ok(Instruction {
        program_id: *program_id,
        accounts: metas,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_shard() -> PoolShard {
        PoolShard {
            id: "test-1".to_string(),
            pool_address: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            token_a_mint: Pubkey::new_unique(),
            token_b_mint: Pubkey::new_unique(),
            token_a_account: Pubkey::new_unique(),
            token_b_account: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            fee_account: Pubkey::new_unique(),
            shard_number: 1,
            reserve_a: 1,
            reserve_b: 1,
        }
    }

    fn swap_accounts() -> SwapAccounts {
        SwapAccounts {
            user: Pubkey::new_unique(),
            user_input_account: Pubkey::new_unique(),
            user_output_account: Pubkey::new_unique(),
            input_is_token_a: true,
        }
    }

    fn liquidity_accounts() -> LiquidityAccounts {
        LiquidityAccounts {
            user: Pubkey::new_unique(),
            user_token_a_account: Pubkey::new_unique(),
            user_token_b_account: Pubkey::new_unique(),
            user_lp_account: Pubkey::new_unique(),
        }
    }

    /// Recover the discriminator and amounts from an encoded buffer.
    fn decode_amounts(data: &[u8]) -> (u8, Vec<u64>) {
        let disc = data[0];
        let amounts = data[1..]
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        (disc, amounts)
    }

    #[test]
    fn swap_data_layout_is_byte_exact() {
        let program = Pubkey::new_unique();
        let ix = encode_swap(&program, &test_shard(), &swap_accounts(), 123_456_789, 98_765).unwrap();

        assert_eq!(ix.data.len(), SWAP_DATA_LEN);
        let mut expected = vec![SWAP_DISCRIMINATOR];
        expected.extend_from_slice(&123_456_789u64.to_le_bytes());
        expected.extend_from_slice(&98_765u64.to_le_bytes());
        assert_eq!(ix.data, expected);
        assert_eq!(ix.accounts.len(), SWAP_ACCOUNT_COUNT);
    }

    #[test]
    fn swap_round_trip_recovers_amounts() {
        let ix = encode_swap(
            &Pubkey::new_unique(),
            &test_shard(),
            &swap_accounts(),
            u64::MAX,
            1,
        )
        .unwrap();
        let (disc, amounts) = decode_amounts(&ix.data);
        assert_eq!(disc, SWAP_DISCRIMINATOR);
        assert_eq!(amounts, vec![u64::MAX, 1]);
    }

    #[test]
    fn encoding_is_idempotent() {
        let program = Pubkey::new_unique();
        let shard = test_shard();
        let accounts = swap_accounts();
        let a = encode_swap(&program, &shard, &accounts, 1_000, 990).unwrap();
        let b = encode_swap(&program, &shard, &accounts, 1_000, 990).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn swap_account_order_pins_signer_and_writables() {
        let shard = test_shard();
        let accounts = swap_accounts();
        let ix = encode_swap(&Pubkey::new_unique(), &shard, &accounts, 100, 99).unwrap();

        assert_eq!(ix.accounts[0].pubkey, shard.pool_address);
        assert_eq!(ix.accounts[1].pubkey, shard.authority);
        assert_eq!(ix.accounts[2].pubkey, accounts.user);
        assert!(ix.accounts[2].is_signer);
        assert_eq!(ix.accounts[3].pubkey, accounts.user_input_account);
        // input is token A: reserves oriented A then B
        assert_eq!(ix.accounts[4].pubkey, shard.token_a_account);
        assert_eq!(ix.accounts[5].pubkey, shard.token_b_account);
        assert_eq!(ix.accounts[6].pubkey, accounts.user_output_account);
        assert!(ix.accounts[3].is_writable);
        assert!(ix.accounts[4].is_writable);
        assert!(!ix.accounts[9].is_writable);
        assert_eq!(ix.accounts[11].pubkey, spl_token::id());
        assert_eq!(ix.accounts[12].pubkey, spl_token::id());
    }

    #[test]
    fn swap_reverse_direction_flips_reserves() {
        let shard = test_shard();
        let mut accounts = swap_accounts();
        accounts.input_is_token_a = false;
        let ix = encode_swap(&Pubkey::new_unique(), &shard, &accounts, 100, 99).unwrap();
        assert_eq!(ix.accounts[4].pubkey, shard.token_b_account);
        assert_eq!(ix.accounts[5].pubkey, shard.token_a_account);
    }

    #[test]
    fn add_liquidity_layout() {
        let ix = encode_add_liquidity(
            &Pubkey::new_unique(),
            &test_shard(),
            &liquidity_accounts(),
            1_000,
            500,
            700,
        )
        .unwrap();

        assert_eq!(ix.data.len(), LIQUIDITY_DATA_LEN);
        assert_eq!(ix.accounts.len(), ADD_LIQUIDITY_ACCOUNT_COUNT);
        let (disc, amounts) = decode_amounts(&ix.data);
        assert_eq!(disc, ADD_LIQUIDITY_DISCRIMINATOR);
        assert_eq!(amounts, vec![1_000, 500, 700]);
    }

    #[test]
    fn remove_liquidity_layout_allows_zero_minimums() {
        let ix = encode_remove_liquidity(
            &Pubkey::new_unique(),
            &test_shard(),
            &liquidity_accounts(),
            1_000,
            0,
            0,
        )
        .unwrap();

        assert_eq!(ix.data.len(), LIQUIDITY_DATA_LEN);
        assert_eq!(ix.accounts.len(), REMOVE_LIQUIDITY_ACCOUNT_COUNT);
        let (disc, amounts) = decode_amounts(&ix.data);
        assert_eq!(disc, REMOVE_LIQUIDITY_DISCRIMINATOR);
        assert_eq!(amounts, vec![1_000, 0, 0]);
    }

    #[test]
    fn zero_required_amounts_fail_before_encoding() {
        let program = Pubkey::new_unique();
        let shard = test_shard();

        let err = encode_swap(&program, &shard, &swap_accounts(), 0, 1).unwrap_err();
        assert!(matches!(err, RouterError::InstructionBuild(_)));

        // A zero desired LP amount must fail before any bytes are produced
        let err = encode_add_liquidity(&program, &shard, &liquidity_accounts(), 0, 500, 700)
            .unwrap_err();
        assert!(matches!(err, RouterError::InstructionBuild(_)));

        let err = encode_remove_liquidity(&program, &shard, &liquidity_accounts(), 0, 0, 0)
            .unwrap_err();
        assert!(matches!(err, RouterError::InstructionBuild(_)));
    }
}
