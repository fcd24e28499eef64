//! Threshold ownership over secp256k1 recoverable signatures
//!
//! An output names a threshold T and a sorted set of addresses. A spender
//! supplies T strictly increasing indices into that set and one recoverable
//! signature per index; signature i must recover to addrs[indices[i]].
//! Because the address set is sorted the recovered addresses are strictly
//! increasing too, so a single key can never be counted twice.

use std::time::{SystemTime, UNIX_EPOCH};

use ripemd::Ripemd160;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, Signing, Verification, VerifyOnly};
use sha2::{Digest, Sha256};

use crate::codec::{CodecError, Decode, Encode, Reader, Writer};
use crate::constants::SECP256K1_SIG_LEN;
use crate::fx::{Fx, FxContext, FxCredential, FxError, FxInput, FxOutput, SignedMessage};
use crate::transaction::Operation;
use crate::types::{Address, TypeKind};

/// Recoverable signature: r || s || v
pub type Signature = [u8; SECP256K1_SIG_LEN];

/// Address: RIPEMD160(SHA256(compressed public key))
pub fn address_of(pubkey: &PublicKey) -> Address {
    let sha256_hash = Sha256::digest(pubkey.serialize());
    let ripemd160_hash = Ripemd160::digest(&sha256_hash);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd160_hash);
    Address(out)
}

/// Sign SHA256(msg) with a recoverable signature
pub fn sign<C: Signing>(secp: &Secp256k1<C>, key: &SecretKey, msg: &[u8]) -> Result<Signature, FxError> {
    let digest = Sha256::digest(msg);
    let message = Message::from_digest_slice(&digest)
        .map_err(|e| FxError::InvalidSignature(e.to_string()))?;
    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&message, key)
        .serialize_compact();
    let mut sig = [0u8; SECP256K1_SIG_LEN];
    sig[..64].copy_from_slice(&compact);
    sig[64] = recovery_id.to_i32() as u8;
    Ok(sig)
}

/// Recover the signer address of a signature over SHA256(msg)
pub fn recover_address<C: Verification>(
    secp: &Secp256k1<C>,
    msg: &[u8],
    sig: &Signature,
) -> Result<Address, FxError> {
    let digest = Sha256::digest(msg);
    let message = Message::from_digest_slice(&digest)
        .map_err(|e| FxError::InvalidSignature(e.to_string()))?;
    let recovery_id = RecoveryId::from_i32(i32::from(sig[64]))
        .map_err(|e| FxError::InvalidSignature(e.to_string()))?;
    let signature = RecoverableSignature::from_compact(&sig[..64], recovery_id)
        .map_err(|e| FxError::InvalidSignature(e.to_string()))?;
    let pubkey = secp
        .recover_ecdsa(&message, &signature)
        .map_err(|e| FxError::InvalidSignature(e.to_string()))?;
    Ok(address_of(&pubkey))
}

fn is_sorted_unique<T: Ord>(items: &[T]) -> bool {
    items.windows(2).all(|pair| pair[0] < pair[1])
}

/// Threshold-of-addresses ownership
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOwners {
    pub threshold: u32,
    pub addrs: Vec<Address>,
}

impl OutputOwners {
    /// Owners with their addresses put into canonical order
    pub fn new(threshold: u32, mut addrs: Vec<Address>) -> Self {
        addrs.sort();
        Self { threshold, addrs }
    }

    pub fn verify(&self) -> Result<(), FxError> {
        if self.threshold as usize > self.addrs.len() {
            return Err(FxError::ThresholdTooHigh {
                threshold: self.threshold,
                addrs: self.addrs.len(),
            });
        }
        if self.threshold == 0 && !self.addrs.is_empty() {
            return Err(FxError::Unspendable);
        }
        if !is_sorted_unique(&self.addrs) {
            return Err(FxError::AddrsNotSortedUnique);
        }
        Ok(())
    }
}

impl Encode<TypeKind> for OutputOwners {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> Result<(), CodecError> {
        w.write_u32(self.threshold);
        w.write_seq(&self.addrs)
    }
}

impl Decode<TypeKind> for OutputOwners {
    fn decode(r: &mut Reader<'_, TypeKind>) -> Result<Self, CodecError> {
        Ok(Self {
            threshold: r.read_u32()?,
            addrs: r.read_seq()?,
        })
    }
}

/// Value owned by a threshold of addresses, optionally time locked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutput {
    pub amount: u64,
    pub locktime: u64,
    pub owners: OutputOwners,
}

impl TransferOutput {
    pub fn verify(&self) -> Result<(), FxError> {
        if self.amount == 0 {
            return Err(FxError::NoValueOutput);
        }
        self.owners.verify()
    }
}

impl Encode<TypeKind> for TransferOutput {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> Result<(), CodecError> {
        w.write_u64(self.amount);
        w.write_u64(self.locktime);
        self.owners.encode(w)
    }
}

impl Decode<TypeKind> for TransferOutput {
    fn decode(r: &mut Reader<'_, TypeKind>) -> Result<Self, CodecError> {
        Ok(Self {
            amount: r.read_u64()?,
            locktime: r.read_u64()?,
            owners: OutputOwners::decode(r)?,
        })
    }
}

/// Authority to mint new units of an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintOutput {
    pub owners: OutputOwners,
}

impl MintOutput {
    pub fn verify(&self) -> Result<(), FxError> {
        self.owners.verify()
    }
}

impl Encode<TypeKind> for MintOutput {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> Result<(), CodecError> {
        self.owners.encode(w)
    }
}

impl Decode<TypeKind> for MintOutput {
    fn decode(r: &mut Reader<'_, TypeKind>) -> Result<Self, CodecError> {
        Ok(Self {
            owners: OutputOwners::decode(r)?,
        })
    }
}

/// Indices into the spent output's address list, one per signature
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Input {
    pub sig_indices: Vec<u32>,
}

impl Input {
    pub fn verify(&self) -> Result<(), FxError> {
        if !is_sorted_unique(&self.sig_indices) {
            return Err(FxError::SigIndicesNotSortedUnique);
        }
        Ok(())
    }
}

impl Encode<TypeKind> for Input {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> Result<(), CodecError> {
        w.write_seq(&self.sig_indices)
    }
}

impl Decode<TypeKind> for Input {
    fn decode(r: &mut Reader<'_, TypeKind>) -> Result<Self, CodecError> {
        Ok(Self {
            sig_indices: r.read_seq()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferInput {
    pub amount: u64,
    pub input: Input,
}

impl TransferInput {
    pub fn verify(&self) -> Result<(), FxError> {
        if self.amount == 0 {
            return Err(FxError::NoValueInput);
        }
        self.input.verify()
    }
}

impl Encode<TypeKind> for TransferInput {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> Result<(), CodecError> {
        w.write_u64(self.amount);
        self.input.encode(w)
    }
}

impl Decode<TypeKind> for TransferInput {
    fn decode(r: &mut Reader<'_, TypeKind>) -> Result<Self, CodecError> {
        Ok(Self {
            amount: r.read_u64()?,
            input: Input::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintInput {
    pub input: Input,
}

impl MintInput {
    pub fn verify(&self) -> Result<(), FxError> {
        self.input.verify()
    }
}

impl Encode<TypeKind> for MintInput {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> Result<(), CodecError> {
        self.input.encode(w)
    }
}

impl Decode<TypeKind> for MintInput {
    fn decode(r: &mut Reader<'_, TypeKind>) -> Result<Self, CodecError> {
        Ok(Self {
            input: Input::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credential {
    pub sigs: Vec<Signature>,
}

impl Encode<TypeKind> for Credential {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> Result<(), CodecError> {
        w.write_seq(&self.sigs)
    }
}

impl Decode<TypeKind> for Credential {
    fn decode(r: &mut Reader<'_, TypeKind>) -> Result<Self, CodecError> {
        Ok(Self { sigs: r.read_seq()? })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The built-in secp256k1 Fx
pub struct SecpFx {
    secp: Secp256k1<VerifyOnly>,
    clock: fn() -> u64,
}

impl Default for SecpFx {
    fn default() -> Self {
        Self::new()
    }
}

impl SecpFx {
    pub fn new() -> Self {
        Self::with_clock(unix_now)
    }

    /// Fx whose time locks are evaluated against `clock` (unix seconds)
    pub fn with_clock(clock: fn() -> u64) -> Self {
        Self {
            secp: Secp256k1::verification_only(),
            clock,
        }
    }

    /// VerifyCredentials: the credential satisfies `owners` over `msg`
    pub fn verify_credentials(
        &self,
        msg: &[u8],
        owners: &OutputOwners,
        input: &Input,
        cred: &Credential,
    ) -> Result<(), FxError> {
        input.verify()?;
        let threshold = owners.threshold as usize;
        if input.sig_indices.len() != threshold {
            return Err(FxError::WrongNumberOfSignatures {
                expected: threshold,
                found: input.sig_indices.len(),
            });
        }
        if cred.sigs.len() != input.sig_indices.len() {
            return Err(FxError::WrongNumberOfSignatures {
                expected: input.sig_indices.len(),
                found: cred.sigs.len(),
            });
        }

        for (i, (&index, sig)) in input.sig_indices.iter().zip(&cred.sigs).enumerate() {
            let expected = owners
                .addrs
                .get(index as usize)
                .ok_or(FxError::SigIndexOutOfBounds {
                    index,
                    len: owners.addrs.len(),
                })?;
            if recover_address(&self.secp, msg, sig)? != *expected {
                return Err(FxError::WrongSignature(i));
            }
        }
        Ok(())
    }

    fn credential<'c>(cred: &'c FxCredential) -> &'c Credential {
        match cred {
            FxCredential::Secp(cred) => cred,
        }
    }
}

impl Fx for SecpFx {
    fn initialize(&mut self, ctx: &mut FxContext<'_>) -> Result<(), FxError> {
        ctx.register_type(TypeKind::SecpMintOutput)?;
        ctx.register_type(TypeKind::SecpTransferOutput)?;
        ctx.register_type(TypeKind::SecpMintInput)?;
        ctx.register_type(TypeKind::SecpTransferInput)?;
        ctx.register_type(TypeKind::SecpCredential)?;
        Ok(())
    }

    fn verify_transfer(
        &self,
        tx: &dyn SignedMessage,
        utxo: &FxOutput,
        input: &FxInput,
        cred: &FxCredential,
    ) -> Result<(), FxError> {
        let (out, input) = match (utxo, input) {
            (FxOutput::SecpTransfer(out), FxInput::SecpTransfer(input)) => (out, input),
            (FxOutput::SecpMint(_), _) => {
                return Err(FxError::WrongType(
                    "mint outputs can only be consumed by operations".to_string(),
                ))
            }
            (_, other) => {
                return Err(FxError::WrongType(format!(
                    "transfer output spent by {:?}",
                    other.kind()
                )))
            }
        };
        out.verify()?;
        input.verify()?;
        if input.amount != out.amount {
            return Err(FxError::AmountMismatch {
                input: input.amount,
                output: out.amount,
            });
        }
        let now = (self.clock)();
        if out.locktime > now {
            return Err(FxError::TimeLocked {
                locktime: out.locktime,
                now,
            });
        }
        self.verify_credentials(tx.unsigned_bytes(), &out.owners, &input.input, Self::credential(cred))
    }

    /// A mint operation consumes exactly one mint output and may produce
    /// mint outputs and transfer outputs of the same asset.
    fn verify_operation(
        &self,
        tx: &dyn SignedMessage,
        op: &Operation,
        utxos: &[&FxOutput],
        cred: &FxCredential,
    ) -> Result<(), FxError> {
        if op.ins.len() != 1 || utxos.len() != 1 {
            return Err(FxError::InvalidOperation(format!(
                "mint consumes exactly one mint output, found {}",
                op.ins.len()
            )));
        }
        let (out, input) = match (utxos[0], &op.ins[0].input) {
            (FxOutput::SecpMint(out), FxInput::SecpMint(input)) => (out, input),
            _ => {
                return Err(FxError::WrongType(
                    "operation must spend a mint output with a mint input".to_string(),
                ))
            }
        };
        if op.outs.is_empty() {
            return Err(FxError::InvalidOperation("operation produces nothing".to_string()));
        }
        for produced in &op.outs {
            produced.verify()?;
        }
        out.verify()?;
        self.verify_credentials(tx.unsigned_bytes(), &out.owners, &input.input, Self::credential(cred))
    }
}
