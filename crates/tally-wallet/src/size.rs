//! Transaction size and fee estimation.
//!
//! Sizes are tracked in weight units so fractional virtual bytes (a P2WPKH
//! input is 67.75 vB) stay exact until the final fee is rounded up.

use tally_core::address::ScriptType;
use tally_core::constants::WITNESS_SCALE_FACTOR;

/// Version, locktime and input/output counts: 10 vB.
const BASE_OVERHEAD_WEIGHT: u64 = 40;

/// Segwit marker and flag: 0.75 vB.
const SEGWIT_OVERHEAD_WEIGHT: u64 = 3;

/// Weight of spending one input of `script_type`.
pub const fn input_weight(script_type: ScriptType) -> u64 {
    match script_type {
        ScriptType::P2PKH => 592,
        ScriptType::P2SH => 364,
        ScriptType::P2WPKH => 271,
        ScriptType::P2WSH => 418,
        ScriptType::P2TR => 230,
    }
}

/// Weight of one output of `script_type`.
pub const fn output_weight(script_type: ScriptType) -> u64 {
    match script_type {
        ScriptType::P2PKH => 136,
        ScriptType::P2SH => 128,
        ScriptType::P2WPKH => 124,
        ScriptType::P2WSH => 172,
        ScriptType::P2TR => 172,
    }
}

/// `ceil(weight * fee_per_byte / 4)`, saturating at `u64::MAX`.
fn weight_fee(weight: u64, fee_per_byte: u64) -> u64 {
    let scaled = u128::from(weight) * u128::from(fee_per_byte);
    let fee = scaled.div_ceil(u128::from(WITNESS_SCALE_FACTOR));
    u64::try_from(fee).unwrap_or(u64::MAX)
}

/// Size model for standard transactions.
pub struct TransactionSizeCalculator;

impl TransactionSizeCalculator {
    /// Total weight of a transaction with the given input and output types.
    pub fn weight(inputs: &[ScriptType], outputs: &[ScriptType]) -> u64 {
        let segwit = if inputs.iter().any(ScriptType::is_segwit) {
            SEGWIT_OVERHEAD_WEIGHT
        } else {
            0
        };
        let ins: u64 = inputs.iter().map(|&t| input_weight(t)).sum();
        let outs: u64 = outputs.iter().map(|&t| output_weight(t)).sum();
        BASE_OVERHEAD_WEIGHT + segwit + ins + outs
    }

    /// Virtual size, rounded up.
    pub fn vbytes(inputs: &[ScriptType], outputs: &[ScriptType]) -> u64 {
        Self::weight(inputs, outputs).div_ceil(WITNESS_SCALE_FACTOR)
    }

    /// Absolute fee in satoshi.
    pub fn fee(inputs: &[ScriptType], outputs: &[ScriptType], fee_per_byte: u64) -> u64 {
        weight_fee(Self::weight(inputs, outputs), fee_per_byte)
    }

    /// Cost of adding one input of `script_type`.
    pub fn input_fee(script_type: ScriptType, fee_per_byte: u64) -> u64 {
        weight_fee(input_weight(script_type), fee_per_byte)
    }

    /// Value left after paying for the input that spends it. Positive only if
    /// the coin is worth spending at this rate.
    pub fn effective_value(value: u64, script_type: ScriptType, fee_per_byte: u64) -> i128 {
        i128::from(value) - i128::from(Self::input_fee(script_type, fee_per_byte))
    }

    /// Smallest change worth creating: the cost of later spending it.
    pub fn dust_threshold(change_type: ScriptType, fee_per_byte: u64) -> u64 {
        Self::input_fee(change_type, fee_per_byte)
    }
}
