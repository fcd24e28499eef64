//! Feature extension (Fx) framework
//!
//! An Fx owns a set of output, input and credential variants and decides
//! when an output may be spent. The ledger engine never inspects Fx payloads
//! itself: it looks up the Fx that registered a variant and delegates.
//!
//! The variant set is closed. Every payload the wire can carry is a case of
//! [`FxOutput`], [`FxInput`] or [`FxCredential`], and a payload only decodes
//! once its Fx has registered the matching [`TypeKind`] with the codec.

use std::fmt;

use thiserror::Error;

use crate::codec::{Codec, CodecError, Decode, Encode, Reader, Writer};
use crate::secp256k1fx::{Credential, MintInput, MintOutput, TransferInput, TransferOutput};
use crate::transaction::Operation;
use crate::types::{Address, ChainId, FxId, NetworkId, TypeKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FxError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Wrong type: {0}")]
    WrongType(String),

    #[error("Output threshold {threshold} exceeds {addrs} addresses")]
    ThresholdTooHigh { threshold: u32, addrs: usize },

    #[error("Output has addresses but a zero threshold")]
    Unspendable,

    #[error("Output addresses are not sorted and unique")]
    AddrsNotSortedUnique,

    #[error("Signature indices are not sorted and unique")]
    SigIndicesNotSortedUnique,

    #[error("Output has no value")]
    NoValueOutput,

    #[error("Input has no value")]
    NoValueInput,

    #[error("Input amount {input} does not match output amount {output}")]
    AmountMismatch { input: u64, output: u64 },

    #[error("Output locked until {locktime}, current time {now}")]
    TimeLocked { locktime: u64, now: u64 },

    #[error("Expected {expected} signatures, found {found}")]
    WrongNumberOfSignatures { expected: usize, found: usize },

    #[error("Signature index {index} out of bounds for {len} addresses")]
    SigIndexOutOfBounds { index: u32, len: usize },

    #[error("Signature {0} does not match the expected address")]
    WrongSignature(usize),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Fx initialization failed: {0}")]
    Initialization(String),
}

/// The message every credential of a transaction signs
pub trait SignedMessage {
    fn unsigned_bytes(&self) -> &[u8];
}

fn unexpected(expected: &'static str, found: TypeKind) -> CodecError {
    CodecError::UnexpectedType {
        expected,
        found: format!("{:?}", found),
    }
}

/// Spending conditions attached to an output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FxOutput {
    SecpMint(MintOutput),
    SecpTransfer(TransferOutput),
}

impl FxOutput {
    pub fn kind(&self) -> TypeKind {
        match self {
            FxOutput::SecpMint(_) => TypeKind::SecpMintOutput,
            FxOutput::SecpTransfer(_) => TypeKind::SecpTransferOutput,
        }
    }

    /// Syntactic checks that need no ledger state
    pub fn verify(&self) -> Result<(), FxError> {
        match self {
            FxOutput::SecpMint(out) => out.verify(),
            FxOutput::SecpTransfer(out) => out.verify(),
        }
    }

    /// Addresses that can take part in spending this output
    pub fn addresses(&self) -> &[Address] {
        match self {
            FxOutput::SecpMint(out) => &out.owners.addrs,
            FxOutput::SecpTransfer(out) => &out.owners.addrs,
        }
    }

    /// Transferable value, if this output carries any
    pub fn amount(&self) -> Option<u64> {
        match self {
            FxOutput::SecpMint(_) => None,
            FxOutput::SecpTransfer(out) => Some(out.amount),
        }
    }
}

impl Encode<TypeKind> for FxOutput {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> Result<(), CodecError> {
        w.write_tag(self.kind())?;
        match self {
            FxOutput::SecpMint(out) => out.encode(w),
            FxOutput::SecpTransfer(out) => out.encode(w),
        }
    }
}

impl Decode<TypeKind> for FxOutput {
    fn decode(r: &mut Reader<'_, TypeKind>) -> Result<Self, CodecError> {
        match r.read_tag()? {
            TypeKind::SecpMintOutput => Ok(FxOutput::SecpMint(MintOutput::decode(r)?)),
            TypeKind::SecpTransferOutput => Ok(FxOutput::SecpTransfer(TransferOutput::decode(r)?)),
            other => Err(unexpected("output", other)),
        }
    }
}

/// Proof of the right to consume an output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FxInput {
    SecpMint(MintInput),
    SecpTransfer(TransferInput),
}

impl FxInput {
    pub fn kind(&self) -> TypeKind {
        match self {
            FxInput::SecpMint(_) => TypeKind::SecpMintInput,
            FxInput::SecpTransfer(_) => TypeKind::SecpTransferInput,
        }
    }

    pub fn verify(&self) -> Result<(), FxError> {
        match self {
            FxInput::SecpMint(input) => input.verify(),
            FxInput::SecpTransfer(input) => input.verify(),
        }
    }

    pub fn amount(&self) -> Option<u64> {
        match self {
            FxInput::SecpMint(_) => None,
            FxInput::SecpTransfer(input) => Some(input.amount),
        }
    }
}

impl Encode<TypeKind> for FxInput {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> Result<(), CodecError> {
        w.write_tag(self.kind())?;
        match self {
            FxInput::SecpMint(input) => input.encode(w),
            FxInput::SecpTransfer(input) => input.encode(w),
        }
    }
}

impl Decode<TypeKind> for FxInput {
    fn decode(r: &mut Reader<'_, TypeKind>) -> Result<Self, CodecError> {
        match r.read_tag()? {
            TypeKind::SecpMintInput => Ok(FxInput::SecpMint(MintInput::decode(r)?)),
            TypeKind::SecpTransferInput => Ok(FxInput::SecpTransfer(TransferInput::decode(r)?)),
            other => Err(unexpected("input", other)),
        }
    }
}

/// Signatures backing one input or operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FxCredential {
    Secp(Credential),
}

impl FxCredential {
    pub fn kind(&self) -> TypeKind {
        match self {
            FxCredential::Secp(_) => TypeKind::SecpCredential,
        }
    }
}

impl Encode<TypeKind> for FxCredential {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> Result<(), CodecError> {
        w.write_tag(self.kind())?;
        match self {
            FxCredential::Secp(cred) => cred.encode(w),
        }
    }
}

impl Decode<TypeKind> for FxCredential {
    fn decode(r: &mut Reader<'_, TypeKind>) -> Result<Self, CodecError> {
        match r.read_tag()? {
            TypeKind::SecpCredential => Ok(FxCredential::Secp(Credential::decode(r)?)),
            other => Err(unexpected("credential", other)),
        }
    }
}

/// Handle an Fx receives while the engine initializes it
pub struct FxContext<'a> {
    pub network_id: NetworkId,
    pub chain_id: ChainId,
    codec: &'a mut Codec<TypeKind>,
    registered: Vec<TypeKind>,
}

impl<'a> FxContext<'a> {
    pub fn new(network_id: NetworkId, chain_id: ChainId, codec: &'a mut Codec<TypeKind>) -> Self {
        Self {
            network_id,
            chain_id,
            codec,
            registered: Vec::new(),
        }
    }

    /// Claim a wire type for the Fx being initialized
    pub fn register_type(&mut self, kind: TypeKind) -> Result<u32, FxError> {
        let tag = self.codec.register_type(kind)?;
        self.registered.push(kind);
        Ok(tag)
    }

    /// Types claimed through this context, in registration order
    pub fn into_registered(self) -> Vec<TypeKind> {
        self.registered
    }
}

/// Pluggable spending rules
pub trait Fx: Send {
    /// Register wire types. Called once, before genesis is parsed.
    fn initialize(&mut self, ctx: &mut FxContext<'_>) -> Result<(), FxError>;

    /// VerifyTransfer: may `input` backed by `cred` consume `utxo` in `tx`?
    fn verify_transfer(
        &self,
        tx: &dyn SignedMessage,
        utxo: &FxOutput,
        input: &FxInput,
        cred: &FxCredential,
    ) -> Result<(), FxError>;

    /// VerifyOperation: `utxos` are the outputs `op` consumes, in input order
    fn verify_operation(
        &self,
        _tx: &dyn SignedMessage,
        _op: &Operation,
        _utxos: &[&FxOutput],
        _cred: &FxCredential,
    ) -> Result<(), FxError> {
        Err(FxError::InvalidOperation("operations are not supported".to_string()))
    }
}

/// An Fx together with the id it is registered under
pub struct FxEntry {
    pub id: FxId,
    pub fx: Box<dyn Fx>,
}

impl FxEntry {
    pub fn new(id: FxId, fx: impl Fx + 'static) -> Self {
        Self { id, fx: Box::new(fx) }
    }
}

impl fmt::Debug for FxEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FxEntry").field("id", &self.id).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secp256k1fx::{OutputOwners, SecpFx};
    use crate::transaction::tx_codec;

    fn codec() -> Codec<TypeKind> {
        let mut codec = tx_codec(0).unwrap();
        let mut ctx = FxContext::new(0, ChainId::default(), &mut codec);
        SecpFx::new().initialize(&mut ctx).unwrap();
        assert_eq!(ctx.into_registered().len(), 5);
        codec
    }

    #[test]
    fn test_output_dispatch() {
        let out = FxOutput::SecpTransfer(TransferOutput {
            amount: 7,
            locktime: 0,
            owners: OutputOwners {
                threshold: 1,
                addrs: vec![Address([1; 20])],
            },
        });
        assert_eq!(out.kind(), TypeKind::SecpTransferOutput);
        assert_eq!(out.amount(), Some(7));
        assert_eq!(out.addresses(), &[Address([1; 20])]);
        assert!(out.verify().is_ok());
    }

    #[test]
    fn test_output_tag_on_wire() {
        let codec = codec();
        let out = FxOutput::SecpMint(MintOutput {
            owners: OutputOwners {
                threshold: 0,
                addrs: vec![],
            },
        });
        let bytes = codec.marshal(&out).unwrap();
        assert_eq!(
            bytes,
            vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(codec.unmarshal::<FxOutput>(&bytes).unwrap(), out);
    }

    #[test]
    fn test_credential_in_output_slot_rejected() {
        let codec = codec();
        let cred = FxCredential::Secp(Credential { sigs: vec![] });
        let bytes = codec.marshal(&cred).unwrap();
        assert!(matches!(
            codec.unmarshal::<FxOutput>(&bytes),
            Err(CodecError::UnexpectedType { expected: "output", .. })
        ));
    }

    #[test]
    fn test_context_rejects_duplicate_registration() {
        let mut codec = tx_codec(0).unwrap();
        let mut ctx = FxContext::new(0, ChainId::default(), &mut codec);
        assert!(matches!(
            ctx.register_type(TypeKind::BaseTx),
            Err(FxError::Codec(CodecError::DuplicateType(_)))
        ));
    }
}
