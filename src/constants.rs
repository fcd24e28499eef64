//! Ledger and wire-format constants

/// Codec version written in front of every outermost encoded object
pub const CODEC_VERSION: u16 = 0;

/// Maximum number of elements a length-prefixed sequence may declare
pub const MAX_SLICE_LEN: u32 = 256 * 1024;

/// Maximum byte length of an encoded string
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// Maximum serialized transaction size: 1MB
pub const MAX_TX_SIZE: usize = 1_000_000;

/// Maximum asset name length in bytes
pub const MAX_NAME_LEN: usize = 128;

/// Maximum asset symbol length in bytes
pub const MAX_SYMBOL_LEN: usize = 4;

/// Maximum number of decimal places an asset may declare
pub const MAX_DENOMINATION: u8 = 32;

/// Recoverable secp256k1 signature length: r (32) || s (32) || v (1)
pub const SECP256K1_SIG_LEN: usize = 65;

/// Default time an issued transaction may wait before being exposed
pub const DEFAULT_BATCH_TIMEOUT_MS: u64 = 1_000;
