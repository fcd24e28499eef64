//! Transaction data model and structural validation
//!
//! Wire layout of a signed transaction:
//!
//! ```text
//! version(2) | tag(4) | network_id(4) | chain_id(32) | outs | ins | [variant fields] | creds
//! ```
//!
//! The unsigned bytes are everything before `creds`, so a credential never
//! depends on any other credential.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::OnceCell;
use secp256k1::{Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::codec::{Codec, CodecError, Decode, Encode, Reader, Writer};
use crate::constants::*;
use crate::error::{LedgerError, Result};
use crate::fx::{FxCredential, FxError, FxInput, FxOutput, SignedMessage};
use crate::secp256k1fx::{self, Credential};
use crate::types::*;

/// A codec with the transaction kinds registered (tags 0, 1, 2)
pub fn tx_codec(version: u16) -> std::result::Result<Codec<TypeKind>, CodecError> {
    let mut codec = Codec::new(version);
    for kind in TypeKind::TRANSACTIONS {
        codec.register_type(kind)?;
    }
    Ok(codec)
}

pub(crate) fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// TransferableOutput: an asset bound to Fx spending conditions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableOutput {
    pub asset_id: AssetId,
    pub out: FxOutput,
}

/// TransferableInput: consumes one UTXO of one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableInput {
    pub utxo_id: UtxoId,
    pub asset_id: AssetId,
    pub input: FxInput,
}

/// Input consumed by an operation; the asset comes from the operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperableInput {
    pub utxo_id: UtxoId,
    pub input: FxInput,
}

/// State transition beyond a plain transfer, e.g. minting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub asset_id: AssetId,
    pub ins: Vec<OperableInput>,
    pub outs: Vec<FxOutput>,
}

/// BaseTx: a simple transfer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BaseTx {
    pub network_id: NetworkId,
    pub chain_id: ChainId,
    pub outs: Vec<TransferableOutput>,
    pub ins: Vec<TransferableInput>,
}

/// CreateAssetTx: defines a new asset and its initial state
///
/// The initial-state operations carry the empty asset id: the asset they
/// populate is the one this transaction creates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateAssetTx {
    pub base: BaseTx,
    pub name: String,
    pub symbol: String,
    pub denomination: u8,
    pub states: Vec<Operation>,
}

/// OperationTx: a transfer plus operations on existing assets
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationTx {
    pub base: BaseTx,
    pub ops: Vec<Operation>,
}

/// Unsigned transaction body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsignedTx {
    Base(BaseTx),
    CreateAsset(CreateAssetTx),
    Operation(OperationTx),
}

/// A live ledger output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub utxo_id: UtxoId,
    pub asset_id: AssetId,
    pub out: FxOutput,
}

fn invalid(msg: String) -> LedgerError {
    LedgerError::InvalidTx(msg)
}

impl BaseTx {
    fn verify_structure(&self) -> Result<()> {
        for (i, output) in self.outs.iter().enumerate() {
            output
                .out
                .verify()
                .map_err(|e| invalid(format!("output {}: {}", i, e)))?;
        }
        for (i, input) in self.ins.iter().enumerate() {
            input
                .input
                .verify()
                .map_err(|e| invalid(format!("input {}: {}", i, e)))?;
        }
        Ok(())
    }
}

impl Operation {
    fn verify_outputs(&self, index: usize) -> Result<()> {
        if self.outs.is_empty() {
            return Err(invalid(format!("operation {} produces no outputs", index)));
        }
        for (j, out) in self.outs.iter().enumerate() {
            out.verify()
                .map_err(|e| invalid(format!("operation {} output {}: {}", index, j, e)))?;
        }
        Ok(())
    }

    fn verify_inputs(&self, index: usize) -> Result<()> {
        if self.ins.is_empty() {
            return Err(invalid(format!("operation {} consumes no inputs", index)));
        }
        for (j, input) in self.ins.iter().enumerate() {
            input
                .input
                .verify()
                .map_err(|e| invalid(format!("operation {} input {}: {}", index, j, e)))?;
        }
        Ok(())
    }
}

impl CreateAssetTx {
    /// A genesis-defining transaction may neither consume nor transfer value
    pub fn verify_genesis(&self) -> Result<()> {
        if !self.base.ins.is_empty() {
            return Err(invalid(format!(
                "genesis asset {} consumes {} inputs",
                self.name,
                self.base.ins.len()
            )));
        }
        if !self.base.outs.is_empty() {
            return Err(invalid(format!(
                "genesis asset {} transfers existing assets",
                self.name
            )));
        }
        Ok(())
    }

    fn verify_structure(&self) -> Result<()> {
        if self.name.is_empty() || self.name.len() > MAX_NAME_LEN {
            return Err(invalid(format!("invalid asset name length {}", self.name.len())));
        }
        if self.symbol.len() > MAX_SYMBOL_LEN {
            return Err(invalid(format!("invalid asset symbol length {}", self.symbol.len())));
        }
        if self.denomination > MAX_DENOMINATION {
            return Err(invalid(format!("invalid denomination {}", self.denomination)));
        }
        for (i, state) in self.states.iter().enumerate() {
            if !state.asset_id.is_empty() {
                return Err(invalid(format!("initial state {} names asset {}", i, state.asset_id)));
            }
            if !state.ins.is_empty() {
                return Err(invalid(format!("initial state {} consumes inputs", i)));
            }
            state.verify_outputs(i)?;
        }
        Ok(())
    }
}

impl OperationTx {
    fn verify_structure(&self) -> Result<()> {
        if self.ops.is_empty() {
            return Err(invalid("operation tx has no operations".to_string()));
        }
        for (i, op) in self.ops.iter().enumerate() {
            op.verify_inputs(i)?;
            op.verify_outputs(i)?;
        }
        Ok(())
    }
}

impl UnsignedTx {
    pub fn kind(&self) -> TypeKind {
        match self {
            UnsignedTx::Base(_) => TypeKind::BaseTx,
            UnsignedTx::CreateAsset(_) => TypeKind::CreateAssetTx,
            UnsignedTx::Operation(_) => TypeKind::OperationTx,
        }
    }

    pub fn base(&self) -> &BaseTx {
        match self {
            UnsignedTx::Base(tx) => tx,
            UnsignedTx::CreateAsset(tx) => &tx.base,
            UnsignedTx::Operation(tx) => &tx.base,
        }
    }

    pub fn inputs(&self) -> &[TransferableInput] {
        &self.base().ins
    }

    pub fn outputs(&self) -> &[TransferableOutput] {
        &self.base().outs
    }

    /// Operations, including a CreateAssetTx's initial state
    pub fn operations(&self) -> &[Operation] {
        match self {
            UnsignedTx::Base(_) => &[],
            UnsignedTx::CreateAsset(tx) => &tx.states,
            UnsignedTx::Operation(tx) => &tx.ops,
        }
    }

    /// Operations that consume state and therefore need a credential
    pub fn spending_operations(&self) -> &[Operation] {
        match self {
            UnsignedTx::Operation(tx) => &tx.ops,
            _ => &[],
        }
    }

    /// One credential per input, then one per spending operation
    pub fn num_credentials(&self) -> usize {
        self.inputs().len() + self.spending_operations().len()
    }

    /// Every UTXO this transaction consumes, in encounter order
    pub fn consumed(&self) -> Vec<UtxoId> {
        self.inputs()
            .iter()
            .map(|input| input.utxo_id)
            .chain(
                self.spending_operations()
                    .iter()
                    .flat_map(|op| op.ins.iter().map(|input| input.utxo_id)),
            )
            .collect()
    }

    /// UTXOs this transaction produces: base outputs first, then operation
    /// outputs, numbered consecutively
    pub fn utxos(&self, tx_id: TxId) -> Vec<Utxo> {
        let mut utxos = Vec::new();
        let mut index = 0u32;
        for output in self.outputs() {
            utxos.push(Utxo {
                utxo_id: UtxoId::new(tx_id, index),
                asset_id: output.asset_id,
                out: output.out.clone(),
            });
            index += 1;
        }
        for op in self.operations() {
            let asset_id = match self {
                UnsignedTx::CreateAsset(_) => AssetId::from(tx_id),
                _ => op.asset_id,
            };
            for out in &op.outs {
                utxos.push(Utxo {
                    utxo_id: UtxoId::new(tx_id, index),
                    asset_id,
                    out: out.clone(),
                });
                index += 1;
            }
        }
        utxos
    }

    /// Checks that need no ledger state and no replay scope
    pub fn verify_structure(&self) -> Result<()> {
        self.base().verify_structure()?;
        match self {
            UnsignedTx::Base(_) => {}
            UnsignedTx::CreateAsset(tx) => tx.verify_structure()?,
            UnsignedTx::Operation(tx) => tx.verify_structure()?,
        }

        let consumed = self.consumed();
        let unique: BTreeSet<&UtxoId> = consumed.iter().collect();
        if unique.len() != consumed.len() {
            return Err(invalid("transaction consumes a UTXO twice".to_string()));
        }
        Ok(())
    }

    /// The body must be bound to this network and chain
    pub fn verify_scope(&self, network_id: NetworkId, chain_id: ChainId) -> Result<()> {
        let base = self.base();
        if base.network_id != network_id {
            return Err(invalid(format!(
                "wrong network id {}, expected {}",
                base.network_id, network_id
            )));
        }
        if base.chain_id != chain_id {
            return Err(invalid(format!(
                "wrong chain id {}, expected {}",
                base.chain_id, chain_id
            )));
        }
        Ok(())
    }

    /// Per-asset value moved by plain transfers
    ///
    /// Returns (consumed, produced) for every asset the base inputs and
    /// outputs mention. Operation outputs are new supply and not counted.
    pub fn transfer_flow(&self) -> Result<BTreeMap<AssetId, (u64, u64)>> {
        let mut flow: BTreeMap<AssetId, (u64, u64)> = BTreeMap::new();
        for input in self.inputs() {
            let entry = flow.entry(input.asset_id).or_default();
            entry.0 = entry
                .0
                .checked_add(input.input.amount().unwrap_or(0))
                .ok_or_else(|| invalid(format!("input overflow for asset {}", input.asset_id)))?;
        }
        for output in self.outputs() {
            let entry = flow.entry(output.asset_id).or_default();
            entry.1 = entry
                .1
                .checked_add(output.out.amount().unwrap_or(0))
                .ok_or_else(|| invalid(format!("output overflow for asset {}", output.asset_id)))?;
        }
        Ok(flow)
    }
}

#[derive(Debug, Clone)]
struct Signed {
    unsigned_bytes: Vec<u8>,
    bytes: Vec<u8>,
    id: TxId,
}

/// Transaction: unsigned body plus one credential per input/operation
#[derive(Debug, Clone)]
pub struct Tx {
    pub unsigned: UnsignedTx,
    pub creds: Vec<FxCredential>,
    signed: OnceCell<Signed>,
}

impl PartialEq for Tx {
    fn eq(&self, other: &Self) -> bool {
        self.unsigned == other.unsigned && self.creds == other.creds
    }
}

impl Eq for Tx {}

impl Tx {
    pub fn new(unsigned: UnsignedTx, creds: Vec<FxCredential>) -> Self {
        Self {
            unsigned,
            creds,
            signed: OnceCell::new(),
        }
    }

    /// Bind the transaction to its canonical bytes and derive its id
    ///
    /// Only the first call has an effect; the id never changes afterwards.
    pub fn initialize(&self, unsigned_bytes: Vec<u8>, bytes: Vec<u8>) -> TxId {
        self.signed
            .get_or_init(|| Signed {
                id: TxId(sha256(&bytes)),
                unsigned_bytes,
                bytes,
            })
            .id
    }

    pub fn is_initialized(&self) -> bool {
        self.signed.get().is_some()
    }

    pub fn id(&self) -> Option<TxId> {
        self.signed.get().map(|signed| signed.id)
    }

    /// Signed bytes, empty until initialized
    pub fn bytes(&self) -> &[u8] {
        self.signed.get().map(|s| s.bytes.as_slice()).unwrap_or(&[])
    }

    /// Decode and initialize a transaction received as bytes
    pub fn from_bytes(codec: &Codec<TypeKind>, bytes: &[u8]) -> std::result::Result<Self, CodecError> {
        let tx: Tx = codec.unmarshal(bytes)?;
        let unsigned_bytes = codec.marshal(&tx.unsigned)?;
        tx.initialize(unsigned_bytes, bytes.to_vec());
        Ok(tx)
    }

    /// Marshal and initialize a transaction assembled in memory
    pub fn seal(self, codec: &Codec<TypeKind>) -> std::result::Result<Self, CodecError> {
        let unsigned_bytes = codec.marshal(&self.unsigned)?;
        let bytes = codec.marshal(&self)?;
        self.initialize(unsigned_bytes, bytes);
        Ok(self)
    }

    /// Sign with one key list per credential, in input-then-operation order
    pub fn sign_secp256k1(
        codec: &Codec<TypeKind>,
        unsigned: UnsignedTx,
        signers: &[Vec<SecretKey>],
    ) -> std::result::Result<Self, FxError> {
        let secp = Secp256k1::signing_only();
        let unsigned_bytes = codec.marshal(&unsigned)?;
        let mut creds = Vec::with_capacity(signers.len());
        for keys in signers {
            let mut cred = Credential::default();
            for key in keys {
                cred.sigs.push(secp256k1fx::sign(&secp, key, &unsigned_bytes)?);
            }
            creds.push(FxCredential::Secp(cred));
        }
        let tx = Tx::new(unsigned, creds);
        let bytes = codec.marshal(&tx)?;
        tx.initialize(unsigned_bytes, bytes);
        Ok(tx)
    }
}

impl SignedMessage for Tx {
    fn unsigned_bytes(&self) -> &[u8] {
        self.signed
            .get()
            .map(|s| s.unsigned_bytes.as_slice())
            .unwrap_or(&[])
    }
}

impl Encode<TypeKind> for TransferableOutput {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> std::result::Result<(), CodecError> {
        self.asset_id.encode(w)?;
        self.out.encode(w)
    }
}

impl Decode<TypeKind> for TransferableOutput {
    fn decode(r: &mut Reader<'_, TypeKind>) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            asset_id: AssetId::decode(r)?,
            out: FxOutput::decode(r)?,
        })
    }
}

impl Encode<TypeKind> for TransferableInput {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> std::result::Result<(), CodecError> {
        self.utxo_id.encode(w)?;
        self.asset_id.encode(w)?;
        self.input.encode(w)
    }
}

impl Decode<TypeKind> for TransferableInput {
    fn decode(r: &mut Reader<'_, TypeKind>) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            utxo_id: UtxoId::decode(r)?,
            asset_id: AssetId::decode(r)?,
            input: FxInput::decode(r)?,
        })
    }
}

impl Encode<TypeKind> for OperableInput {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> std::result::Result<(), CodecError> {
        self.utxo_id.encode(w)?;
        self.input.encode(w)
    }
}

impl Decode<TypeKind> for OperableInput {
    fn decode(r: &mut Reader<'_, TypeKind>) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            utxo_id: UtxoId::decode(r)?,
            input: FxInput::decode(r)?,
        })
    }
}

impl Encode<TypeKind> for Operation {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> std::result::Result<(), CodecError> {
        self.asset_id.encode(w)?;
        w.write_seq(&self.ins)?;
        w.write_seq(&self.outs)
    }
}

impl Decode<TypeKind> for Operation {
    fn decode(r: &mut Reader<'_, TypeKind>) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            asset_id: AssetId::decode(r)?,
            ins: r.read_seq()?,
            outs: r.read_seq()?,
        })
    }
}

impl Encode<TypeKind> for BaseTx {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> std::result::Result<(), CodecError> {
        w.write_u32(self.network_id);
        self.chain_id.encode(w)?;
        w.write_seq(&self.outs)?;
        w.write_seq(&self.ins)
    }
}

impl Decode<TypeKind> for BaseTx {
    fn decode(r: &mut Reader<'_, TypeKind>) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            network_id: r.read_u32()?,
            chain_id: ChainId::decode(r)?,
            outs: r.read_seq()?,
            ins: r.read_seq()?,
        })
    }
}

impl Encode<TypeKind> for CreateAssetTx {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> std::result::Result<(), CodecError> {
        self.base.encode(w)?;
        w.write_str(&self.name)?;
        w.write_str(&self.symbol)?;
        w.write_u8(self.denomination);
        w.write_seq(&self.states)
    }
}

impl Decode<TypeKind> for CreateAssetTx {
    fn decode(r: &mut Reader<'_, TypeKind>) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            base: BaseTx::decode(r)?,
            name: r.read_str()?,
            symbol: r.read_str()?,
            denomination: r.read_u8()?,
            states: r.read_seq()?,
        })
    }
}

impl Encode<TypeKind> for OperationTx {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> std::result::Result<(), CodecError> {
        self.base.encode(w)?;
        w.write_seq(&self.ops)
    }
}

impl Decode<TypeKind> for OperationTx {
    fn decode(r: &mut Reader<'_, TypeKind>) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            base: BaseTx::decode(r)?,
            ops: r.read_seq()?,
        })
    }
}

impl Encode<TypeKind> for UnsignedTx {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> std::result::Result<(), CodecError> {
        w.write_tag(self.kind())?;
        match self {
            UnsignedTx::Base(tx) => tx.encode(w),
            UnsignedTx::CreateAsset(tx) => tx.encode(w),
            UnsignedTx::Operation(tx) => tx.encode(w),
        }
    }
}

impl Decode<TypeKind> for UnsignedTx {
    fn decode(r: &mut Reader<'_, TypeKind>) -> std::result::Result<Self, CodecError> {
        match r.read_tag()? {
            TypeKind::BaseTx => Ok(UnsignedTx::Base(BaseTx::decode(r)?)),
            TypeKind::CreateAssetTx => Ok(UnsignedTx::CreateAsset(CreateAssetTx::decode(r)?)),
            TypeKind::OperationTx => Ok(UnsignedTx::Operation(OperationTx::decode(r)?)),
            other => Err(CodecError::UnexpectedType {
                expected: "transaction",
                found: format!("{:?}", other),
            }),
        }
    }
}

impl Encode<TypeKind> for Tx {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> std::result::Result<(), CodecError> {
        self.unsigned.encode(w)?;
        w.write_seq(&self.creds)
    }
}

impl Decode<TypeKind> for Tx {
    fn decode(r: &mut Reader<'_, TypeKind>) -> std::result::Result<Self, CodecError> {
        let unsigned = UnsignedTx::decode(r)?;
        let creds = r.read_seq()?;
        Ok(Tx::new(unsigned, creds))
    }
}

impl Encode<TypeKind> for Utxo {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> std::result::Result<(), CodecError> {
        self.utxo_id.encode(w)?;
        self.asset_id.encode(w)?;
        self.out.encode(w)
    }
}

impl Decode<TypeKind> for Utxo {
    fn decode(r: &mut Reader<'_, TypeKind>) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            utxo_id: UtxoId::decode(r)?,
            asset_id: AssetId::decode(r)?,
            out: FxOutput::decode(r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::default_codec;
    use crate::secp256k1fx::{Input, MintInput, MintOutput, OutputOwners, TransferInput, TransferOutput};

    const NETWORK_ID: NetworkId = 43110;

    fn chain_id() -> ChainId {
        let mut id = [0u8; 32];
        id[..5].copy_from_slice(&[5, 4, 3, 2, 1]);
        ChainId(id)
    }

    fn asset() -> AssetId {
        let mut id = [0u8; 32];
        id[..3].copy_from_slice(&[1, 2, 3]);
        AssetId(id)
    }

    fn fixture_addrs() -> [Address; 3] {
        [
            Address([
                0xfc, 0xed, 0xa8, 0xf9, 0x0f, 0xcb, 0x5d, 0x30, 0x61, 0x4b, 0x99, 0xd7, 0x9f, 0xc4,
                0xba, 0xa2, 0x93, 0x07, 0x76, 0x26,
            ]),
            Address([
                0x6e, 0xad, 0x69, 0x3c, 0x17, 0xab, 0xb1, 0xbe, 0x42, 0x2b, 0xb5, 0x0b, 0x30, 0xb9,
                0x71, 0x1f, 0xf9, 0x8d, 0x66, 0x7e,
            ]),
            Address([
                0xf2, 0x42, 0x08, 0x46, 0x87, 0x6e, 0x69, 0xf4, 0x73, 0xdd, 0xa2, 0x56, 0x17, 0x29,
                0x67, 0xe9, 0x92, 0xf0, 0xee, 0x31,
            ]),
        ]
    }

    fn transfer(amount: u64, addr: Address) -> FxOutput {
        FxOutput::SecpTransfer(TransferOutput {
            amount,
            locktime: 0,
            owners: OutputOwners::new(1, vec![addr]),
        })
    }

    fn fixture_tx() -> Tx {
        let addrs = fixture_addrs();
        let unsigned = UnsignedTx::Operation(OperationTx {
            base: BaseTx {
                network_id: NETWORK_ID,
                chain_id: chain_id(),
                outs: addrs
                    .iter()
                    .map(|addr| TransferableOutput {
                        asset_id: asset(),
                        out: transfer(20_000_000_000_000, *addr),
                    })
                    .collect(),
                ins: vec![],
            },
            ops: vec![Operation {
                asset_id: asset(),
                ins: vec![],
                outs: vec![FxOutput::SecpMint(MintOutput {
                    owners: OutputOwners::new(1, vec![addrs[0]]),
                })],
            }],
        });
        Tx::new(unsigned, vec![])
    }

    fn spend(utxo_id: UtxoId, amount: u64) -> TransferableInput {
        TransferableInput {
            utxo_id,
            asset_id: asset(),
            input: FxInput::SecpTransfer(TransferInput {
                amount,
                input: Input { sig_indices: vec![0] },
            }),
        }
    }

    #[test]
    fn test_tx_serialization() {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            // codec version:
            0x00, 0x00,
            // tx type:
            0x00, 0x00, 0x00, 0x02,
            // networkID:
            0x00, 0x00, 0xa8, 0x66,
            // chainID:
            0x05, 0x04, 0x03, 0x02, 0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // number of outs:
            0x00, 0x00, 0x00, 0x03,
            // output[0] assetID:
            0x01, 0x02, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // fx type:
            0x00, 0x00, 0x00, 0x04,
            // amount:
            0x00, 0x00, 0x12, 0x30, 0x9c, 0xe5, 0x40, 0x00,
            // locktime:
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // threshold:
            0x00, 0x00, 0x00, 0x01,
            // number of addresses:
            0x00, 0x00, 0x00, 0x01,
            // address[0]:
            0xfc, 0xed, 0xa8, 0xf9, 0x0f, 0xcb, 0x5d, 0x30,
            0x61, 0x4b, 0x99, 0xd7, 0x9f, 0xc4, 0xba, 0xa2,
            0x93, 0x07, 0x76, 0x26,
            // output[1] assetID:
            0x01, 0x02, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // fx type:
            0x00, 0x00, 0x00, 0x04,
            // amount:
            0x00, 0x00, 0x12, 0x30, 0x9c, 0xe5, 0x40, 0x00,
            // locktime:
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // threshold:
            0x00, 0x00, 0x00, 0x01,
            // number of addresses:
            0x00, 0x00, 0x00, 0x01,
            // address[0]:
            0x6e, 0xad, 0x69, 0x3c, 0x17, 0xab, 0xb1, 0xbe,
            0x42, 0x2b, 0xb5, 0x0b, 0x30, 0xb9, 0x71, 0x1f,
            0xf9, 0x8d, 0x66, 0x7e,
            // output[2] assetID:
            0x01, 0x02, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // fx type:
            0x00, 0x00, 0x00, 0x04,
            // amount:
            0x00, 0x00, 0x12, 0x30, 0x9c, 0xe5, 0x40, 0x00,
            // locktime:
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // threshold:
            0x00, 0x00, 0x00, 0x01,
            // number of addresses:
            0x00, 0x00, 0x00, 0x01,
            // address[0]:
            0xf2, 0x42, 0x08, 0x46, 0x87, 0x6e, 0x69, 0xf4,
            0x73, 0xdd, 0xa2, 0x56, 0x17, 0x29, 0x67, 0xe9,
            0x92, 0xf0, 0xee, 0x31,
            // number of inputs:
            0x00, 0x00, 0x00, 0x00,
            // number of operations:
            0x00, 0x00, 0x00, 0x01,
            // operation[0] assetID:
            0x01, 0x02, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // number of inputs:
            0x00, 0x00, 0x00, 0x00,
            // number of outputs:
            0x00, 0x00, 0x00, 0x01,
            // fx type:
            0x00, 0x00, 0x00, 0x03,
            // threshold:
            0x00, 0x00, 0x00, 0x01,
            // number of addresses:
            0x00, 0x00, 0x00, 0x01,
            // address[0]:
            0xfc, 0xed, 0xa8, 0xf9, 0x0f, 0xcb, 0x5d, 0x30,
            0x61, 0x4b, 0x99, 0xd7, 0x9f, 0xc4, 0xba, 0xa2,
            0x93, 0x07, 0x76, 0x26,
            // number of credentials:
            0x00, 0x00, 0x00, 0x00,
        ];

        let codec = default_codec(CODEC_VERSION).unwrap();
        let tx = fixture_tx().seal(&codec).unwrap();
        assert_eq!(tx.bytes(), expected.as_slice());

        let decoded = Tx::from_bytes(&codec, &expected).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(codec.marshal(&decoded).unwrap(), expected);
    }

    #[test]
    fn test_unsigned_bytes_exclude_credentials() {
        let codec = default_codec(CODEC_VERSION).unwrap();
        let tx = fixture_tx().seal(&codec).unwrap();
        let unsigned = tx.unsigned_bytes().to_vec();
        assert_eq!(&tx.bytes()[..unsigned.len()], unsigned.as_slice());
        assert_eq!(tx.bytes().len(), unsigned.len() + 4);
    }

    #[test]
    fn test_tx_id_is_cached() {
        let codec = default_codec(CODEC_VERSION).unwrap();
        let tx = fixture_tx().seal(&codec).unwrap();
        let id = tx.id().unwrap();
        assert_eq!(id, TxId(sha256(tx.bytes())));

        let again = tx.initialize(vec![], vec![1, 2, 3]);
        assert_eq!(again, id);
        assert_eq!(tx.id(), Some(id));
    }

    #[test]
    fn test_identical_bytes_identical_ids() {
        let codec = default_codec(CODEC_VERSION).unwrap();
        let a = fixture_tx().seal(&codec).unwrap();
        let b = Tx::from_bytes(&codec, a.bytes()).unwrap();
        assert_eq!(a.id(), b.id());
        assert!(Tx::new(a.unsigned.clone(), vec![]).id().is_none());
    }

    #[test]
    fn test_truncated_tx_rejected() {
        let codec = default_codec(CODEC_VERSION).unwrap();
        let tx = fixture_tx().seal(&codec).unwrap();
        let bytes = &tx.bytes()[..tx.bytes().len() - 10];
        assert!(matches!(
            Tx::from_bytes(&codec, bytes),
            Err(CodecError::Truncated { .. }) | Err(CodecError::LengthExceedsInput { .. })
        ));
    }

    #[test]
    fn test_produced_utxo_indices() {
        let tx = fixture_tx();
        let id = TxId([9; 32]);
        let utxos = tx.unsigned.utxos(id);
        assert_eq!(utxos.len(), 4);
        for (i, utxo) in utxos.iter().enumerate() {
            assert_eq!(utxo.utxo_id, UtxoId::new(id, i as u32));
            assert_eq!(utxo.asset_id, asset());
        }
        assert!(matches!(utxos[3].out, FxOutput::SecpMint(_)));
    }

    #[test]
    fn test_create_asset_utxos_use_own_id() {
        let create = UnsignedTx::CreateAsset(CreateAssetTx {
            name: "asset".to_string(),
            states: vec![Operation {
                asset_id: AssetId::default(),
                ins: vec![],
                outs: vec![transfer(5, fixture_addrs()[0])],
            }],
            ..Default::default()
        });
        let id = TxId([7; 32]);
        let utxos = create.utxos(id);
        assert_eq!(utxos[0].asset_id, AssetId::from(id));
        assert!(create.verify_structure().is_ok());
        assert_eq!(create.num_credentials(), 0);
    }

    #[test]
    fn test_genesis_tx_with_inputs_rejected() {
        let create = CreateAssetTx {
            base: BaseTx {
                ins: vec![spend(UtxoId::new(TxId([1; 32]), 0), 10)],
                ..Default::default()
            },
            name: "asset".to_string(),
            ..Default::default()
        };
        assert!(matches!(create.verify_genesis(), Err(LedgerError::InvalidTx(_))));
    }

    #[test]
    fn test_create_asset_field_limits() {
        let mut create = CreateAssetTx {
            name: String::new(),
            ..Default::default()
        };
        assert!(UnsignedTx::CreateAsset(create.clone()).verify_structure().is_err());
        create.name = "n".repeat(MAX_NAME_LEN + 1);
        assert!(UnsignedTx::CreateAsset(create.clone()).verify_structure().is_err());
        create.name = "name".to_string();
        create.symbol = "TOOLONG".to_string();
        assert!(UnsignedTx::CreateAsset(create.clone()).verify_structure().is_err());
        create.symbol = "SYM".to_string();
        create.denomination = MAX_DENOMINATION + 1;
        assert!(UnsignedTx::CreateAsset(create.clone()).verify_structure().is_err());
        create.denomination = 9;
        assert!(UnsignedTx::CreateAsset(create).verify_structure().is_ok());
    }

    #[test]
    fn test_duplicate_consumption_rejected() {
        let utxo_id = UtxoId::new(TxId([1; 32]), 0);
        let tx = UnsignedTx::Operation(OperationTx {
            base: BaseTx {
                ins: vec![spend(utxo_id, 10)],
                ..Default::default()
            },
            ops: vec![Operation {
                asset_id: asset(),
                ins: vec![OperableInput {
                    utxo_id,
                    input: FxInput::SecpMint(MintInput {
                        input: Input { sig_indices: vec![0] },
                    }),
                }],
                outs: vec![transfer(1, fixture_addrs()[0])],
            }],
        });
        assert_eq!(tx.consumed(), vec![utxo_id, utxo_id]);
        assert_eq!(tx.num_credentials(), 2);
        assert!(matches!(tx.verify_structure(), Err(LedgerError::InvalidTx(_))));
    }

    #[test]
    fn test_scope_mismatch_rejected() {
        let tx = fixture_tx();
        assert!(tx.unsigned.verify_scope(NETWORK_ID, chain_id()).is_ok());
        assert!(tx.unsigned.verify_scope(1, chain_id()).is_err());
        assert!(tx.unsigned.verify_scope(NETWORK_ID, ChainId::default()).is_err());
    }

    #[test]
    fn test_transfer_flow() {
        let tx = UnsignedTx::Base(BaseTx {
            outs: vec![TransferableOutput {
                asset_id: asset(),
                out: transfer(30, fixture_addrs()[1]),
            }],
            ins: vec![
                spend(UtxoId::new(TxId([1; 32]), 0), 10),
                spend(UtxoId::new(TxId([1; 32]), 1), 25),
            ],
            ..Default::default()
        });
        let flow = tx.transfer_flow().unwrap();
        assert_eq!(flow.get(&asset()), Some(&(35, 30)));
    }
}
