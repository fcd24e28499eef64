//! Core ledger identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::{CodecError, Decode, Encode, Reader, Writer};

/// Network identifier: scopes replay across networks
pub type NetworkId = u32;

/// Fixed-width identifier error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("Invalid hex: {0}")]
    Hex(String),

    #[error("Expected {expected} bytes, found {found}")]
    Length { expected: usize, found: usize },
}

macro_rules! fixed_id {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0 == [0u8; $len]
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = hex::decode(s).map_err(|e| IdParseError::Hex(e.to_string()))?;
                let array: [u8; $len] = bytes.as_slice().try_into().map_err(|_| {
                    IdParseError::Length {
                        expected: $len,
                        found: bytes.len(),
                    }
                })?;
                Ok(Self(array))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }

        impl Encode<TypeKind> for $name {
            fn encode(&self, w: &mut Writer<'_, TypeKind>) -> Result<(), CodecError> {
                w.write_fixed(&self.0);
                Ok(())
            }
        }

        impl Decode<TypeKind> for $name {
            fn decode(r: &mut Reader<'_, TypeKind>) -> Result<Self, CodecError> {
                Ok(Self(r.read_array()?))
            }
        }
    };
}

fixed_id!(
    /// Transaction identifier: SHA256 of the signed transaction bytes
    TxId,
    32
);
fixed_id!(
    /// Asset identifier: the id of the transaction that created the asset
    AssetId,
    32
);
fixed_id!(
    /// Chain identifier
    ChainId,
    32
);
fixed_id!(
    /// Feature extension registration identifier
    FxId,
    32
);
fixed_id!(
    /// Address: RIPEMD160(SHA256(compressed public key))
    Address,
    20
);

impl From<TxId> for AssetId {
    fn from(id: TxId) -> Self {
        Self(id.0)
    }
}

/// UTXOID: names one output of one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UtxoId {
    pub tx_id: TxId,
    pub output_index: u32,
}

/// Byte length of an encoded UTXOID
pub const UTXO_ID_LEN: usize = 32 + 4;

impl UtxoId {
    pub fn new(tx_id: TxId, output_index: u32) -> Self {
        Self { tx_id, output_index }
    }

    /// Stable byte form used in storage keys
    pub fn to_bytes(&self) -> [u8; UTXO_ID_LEN] {
        let mut out = [0u8; UTXO_ID_LEN];
        out[..TxId::LEN].copy_from_slice(&self.tx_id.0);
        out[TxId::LEN..].copy_from_slice(&self.output_index.to_be_bytes());
        out
    }
}

impl fmt::Display for UtxoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.output_index)
    }
}

impl Encode<TypeKind> for UtxoId {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> Result<(), CodecError> {
        self.tx_id.encode(w)?;
        w.write_u32(self.output_index);
        Ok(())
    }
}

impl Decode<TypeKind> for UtxoId {
    fn decode(r: &mut Reader<'_, TypeKind>) -> Result<Self, CodecError> {
        Ok(Self {
            tx_id: TxId::decode(r)?,
            output_index: r.read_u32()?,
        })
    }
}

/// Every polymorphic type the ledger can put on the wire
///
/// The codec assigns tags to these in registration order: the engine
/// registers the transaction kinds, then each Fx registers its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    BaseTx,
    CreateAssetTx,
    OperationTx,
    SecpMintOutput,
    SecpTransferOutput,
    SecpMintInput,
    SecpTransferInput,
    SecpCredential,
}

impl TypeKind {
    /// Transaction body kinds, in the order the engine registers them
    pub const TRANSACTIONS: [TypeKind; 3] = [
        TypeKind::BaseTx,
        TypeKind::CreateAssetTx,
        TypeKind::OperationTx,
    ];
}
