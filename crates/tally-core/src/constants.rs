//! Engine constants. Bitcoin values are in satoshi (1 BTC = 10^8 sat).

pub const COIN: u64 = 100_000_000;

/// Maximum bitcoin supply.
pub const MAX_SUPPLY: u64 = 21_000_000 * COIN;

/// Smallest output value the engine will create for a payment.
pub const DUST_THRESHOLD: u64 = 546;

/// Weight units per virtual byte.
pub const WITNESS_SCALE_FACTOR: u64 = 4;

/// Default lifetime of cached unspent-output and multi-address responses.
pub const DEFAULT_UTXO_CACHE_TTL_SECS: u64 = 60;

/// Default lifetime of cached fee quotes.
pub const DEFAULT_FEE_CACHE_TTL_SECS: u64 = 90;

/// Receive addresses handed out per sync request when the caller does not
/// specify a count.
pub const DEFAULT_SYNC_LOOKAHEAD: u32 = 10;

/// BIP-32 branch for receive addresses.
pub const RECEIVE_CHAIN: u32 = 0;

/// BIP-32 branch for change addresses.
pub const CHANGE_CHAIN: u32 = 1;

/// Gas used by a plain value transfer.
pub const ETHEREUM_TRANSFER_GAS: u64 = 21_000;
