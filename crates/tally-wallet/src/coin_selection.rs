//! Greedy, fee-aware coin selection.
//!
//! Coins are drawn in value order (smallest first by default) until they
//! cover the target plus the fee of a transaction without change. A change
//! output is added only when what is left after paying for it would be worth
//! spending later; otherwise the remainder goes to the miner. Coins that cost
//! more to spend than they are worth are never drawn.

use std::cmp::Ordering;

use tally_core::address::ScriptType;
use tally_core::types::UnspentOutput;
use tracing::{debug, warn};

use crate::error::CoinSelectionError;
use crate::size::TransactionSizeCalculator;

/// Order in which coins are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortingStrategy {
    /// Smallest coins first. Consolidates dust over time.
    #[default]
    AscentDraw,
    /// Largest coins first. Fewer inputs, lower fee now.
    DescentDraw,
}

/// What is being paid: an amount in satoshi to an output of a given type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinSelectionTarget {
    /// Satoshi to pay.
    pub value: u64,
    /// Type of the paying output, for the size model.
    pub script_type: ScriptType,
}

/// Everything the selector needs.
#[derive(Debug, Clone)]
pub struct CoinSelectionInputs {
    /// Amount and output type being paid.
    pub target: CoinSelectionTarget,
    /// Satoshi per virtual byte.
    pub fee_per_byte: u64,
    /// Candidate coins. Unclassifiable and uneconomic ones are skipped.
    pub unspent_outputs: Vec<UnspentOutput>,
    /// Draw order.
    pub sorting_strategy: SortingStrategy,
    /// Type of the change output, for its size and dust threshold.
    pub change_output_type: ScriptType,
}

/// Result of coin selection: which outputs to spend and the fee/change
/// breakdown, all in satoshi.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpendableUnspentOutputs {
    /// Coins to spend, in draw order.
    pub spendable_outputs: Vec<UnspentOutput>,
    /// Total fee, including any leftover too small for change.
    pub absolute_fee: u64,
    /// Value paid to the destination.
    pub amount: u64,
    pub change: u64,
}

impl SpendableUnspentOutputs {
    /// Sum of the selected outputs, saturating like the selector's running
    /// total.
    pub fn total_value(&self) -> u64 {
        self.spendable_outputs
            .iter()
            .fold(0u64, |acc, u| acc.saturating_add(u.value))
    }

    pub fn is_empty(&self) -> bool {
        self.spendable_outputs.is_empty()
    }
}

/// A coin paired with its classified script.
type Coin<'a> = (&'a UnspentOutput, ScriptType);

/// Coins worth spending at `fee_per_byte`, in input order.
fn effective_coins(outputs: &[UnspentOutput], fee_per_byte: u64) -> Vec<Coin<'_>> {
    outputs
        .iter()
        .filter_map(|utxo| match utxo.script_type() {
            Ok(script_type) => Some((utxo, script_type)),
            Err(e) => {
                warn!(tx = %utxo.tx_hash, index = utxo.output_index, error = %e, "coin_selection: skipping unspendable output");
                None
            }
        })
        .filter(|(utxo, script_type)| {
            TransactionSizeCalculator::effective_value(utxo.value, *script_type, fee_per_byte) > 0
        })
        .collect()
}

fn tie_break(a: &UnspentOutput, b: &UnspentOutput) -> Ordering {
    a.tx_hash
        .cmp(&b.tx_hash)
        .then(a.output_index.cmp(&b.output_index))
}

fn sort_coins(coins: &mut [Coin<'_>], strategy: SortingStrategy) {
    coins.sort_by(|(a, _), (b, _)| {
        let by_value = match strategy {
            SortingStrategy::AscentDraw => a.value.cmp(&b.value),
            SortingStrategy::DescentDraw => b.value.cmp(&a.value),
        };
        by_value.then_with(|| tie_break(a, b))
    });
}

/// Fee-aware coin selector.
pub struct CoinSelector;

impl CoinSelector {
    /// Select coins to pay `inputs.target`.
    pub fn select(inputs: &CoinSelectionInputs) -> Result<SpendableUnspentOutputs, CoinSelectionError> {
        if inputs.unspent_outputs.is_empty() {
            return Err(CoinSelectionError::NoCoinsToSelect);
        }

        let rate = inputs.fee_per_byte;
        let target = inputs.target;
        let payment = [target.script_type];
        let with_change = [target.script_type, inputs.change_output_type];

        let mut coins = effective_coins(&inputs.unspent_outputs, rate);
        sort_coins(&mut coins, inputs.sorting_strategy);

        let mut selected: Vec<&UnspentOutput> = Vec::new();
        let mut input_types: Vec<ScriptType> = Vec::new();
        let mut total: u64 = 0;
        let mut remaining = coins.into_iter();

        loop {
            let fee = TransactionSizeCalculator::fee(&input_types, &payment, rate);
            let required = target.value.saturating_add(fee);
            if total >= required {
                break;
            }
            match remaining.next() {
                Some((utxo, script_type)) => {
                    selected.push(utxo);
                    input_types.push(script_type);
                    total = total.saturating_add(utxo.value);
                }
                None => {
                    let available = inputs
                        .unspent_outputs
                        .iter()
                        .fold(0u64, |acc, u| acc.saturating_add(u.value));
                    debug!(available, required, fee, "coin_selection: insufficient funds");
                    return Err(CoinSelectionError::InsufficientFunds { available, required, fee });
                }
            }
        }

        if selected.is_empty() {
            return Err(CoinSelectionError::NoSelectedCoins);
        }

        let leftover = total - target.value;
        let fee_with_change = TransactionSizeCalculator::fee(&input_types, &with_change, rate);
        let dust = TransactionSizeCalculator::dust_threshold(inputs.change_output_type, rate);
        let (absolute_fee, change) = match leftover.checked_sub(fee_with_change) {
            Some(change) if change > dust => (fee_with_change, change),
            _ => (leftover, 0),
        };

        debug!(
            selected = selected.len(),
            total,
            fee = absolute_fee,
            change,
            "coin_selection: selected"
        );

        Ok(SpendableUnspentOutputs {
            spendable_outputs: selected.into_iter().cloned().collect(),
            absolute_fee,
            amount: target.value,
            change,
        })
    }

    /// Sweep every coin worth spending into a single output of
    /// `output_type`. Never produces change. Returns an empty result when
    /// nothing is worth spending or the coins cannot cover their own fee.
    pub fn select_all(
        unspent_outputs: &[UnspentOutput],
        fee_per_byte: u64,
        output_type: ScriptType,
    ) -> SpendableUnspentOutputs {
        let coins = effective_coins(unspent_outputs, fee_per_byte);
        if coins.is_empty() {
            return SpendableUnspentOutputs::default();
        }
        let input_types: Vec<ScriptType> = coins.iter().map(|(_, t)| *t).collect();
        let fee = TransactionSizeCalculator::fee(&input_types, &[output_type], fee_per_byte);
        let total = coins.iter().fold(0u64, |acc, (u, _)| acc.saturating_add(u.value));
        let Some(amount) = total.checked_sub(fee).filter(|a| *a > 0) else {
            return SpendableUnspentOutputs::default();
        };
        SpendableUnspentOutputs {
            spendable_outputs: coins.into_iter().map(|(u, _)| u.clone()).collect(),
            absolute_fee: fee,
            amount,
            change: 0,
        }
    }
}
