//! UTXO set and address index over a [`Database`]
//!
//! Layout:
//!
//! ```text
//! "utxo" | tx_id(32) | index(4)              -> codec-encoded Utxo
//! "addr" | address(20) | tx_id(32) | index(4) -> empty
//! "tx"   | tx_id(32)                         -> empty
//! ```
//!
//! The `"tx"` marker records every accepted transaction, genesis included.
//! Outputs are keyed by their creating tx id, so a transaction is applied
//! at most once or its spent outputs would come back.
//!
//! Writes are only ever staged into a [`Batch`]; the caller commits.

use std::collections::BTreeSet;

use crate::codec::Codec;
use crate::error::Result;
use crate::storage::{Batch, Database, StorageError};
use crate::transaction::Utxo;
use crate::types::{Address, TxId, TypeKind, UtxoId, UTXO_ID_LEN};

pub const UTXO_PREFIX: &[u8] = b"utxo";
pub const ADDR_PREFIX: &[u8] = b"addr";
pub const TX_PREFIX: &[u8] = b"tx";

pub fn tx_key(tx_id: &TxId) -> Vec<u8> {
    let mut key = Vec::with_capacity(TX_PREFIX.len() + TxId::LEN);
    key.extend_from_slice(TX_PREFIX);
    key.extend_from_slice(tx_id.as_bytes());
    key
}

pub fn utxo_key(utxo_id: &UtxoId) -> Vec<u8> {
    let mut key = Vec::with_capacity(UTXO_PREFIX.len() + UTXO_ID_LEN);
    key.extend_from_slice(UTXO_PREFIX);
    key.extend_from_slice(&utxo_id.to_bytes());
    key
}

fn addr_prefix(addr: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(ADDR_PREFIX.len() + Address::LEN + UTXO_ID_LEN);
    key.extend_from_slice(ADDR_PREFIX);
    key.extend_from_slice(addr.as_bytes());
    key
}

pub fn addr_key(addr: &Address, utxo_id: &UtxoId) -> Vec<u8> {
    let mut key = addr_prefix(addr);
    key.extend_from_slice(&utxo_id.to_bytes());
    key
}

fn parse_utxo_id(bytes: &[u8]) -> Option<UtxoId> {
    if bytes.len() != UTXO_ID_LEN {
        return None;
    }
    let tx_id: [u8; 32] = bytes[..TxId::LEN].try_into().ok()?;
    let index: [u8; 4] = bytes[TxId::LEN..].try_into().ok()?;
    Some(UtxoId::new(TxId(tx_id), u32::from_be_bytes(index)))
}

/// Read view of the ledger state
pub struct UtxoState<'a> {
    db: &'a dyn Database,
    codec: &'a Codec<TypeKind>,
}

impl<'a> UtxoState<'a> {
    pub fn new(db: &'a dyn Database, codec: &'a Codec<TypeKind>) -> Self {
        Self { db, codec }
    }

    /// Look up a live UTXO
    pub fn utxo(&self, utxo_id: &UtxoId) -> Result<Option<Utxo>> {
        match self.db.get(&utxo_key(utxo_id))? {
            Some(bytes) => Ok(Some(self.codec.unmarshal(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Whether `tx_id` has already been accepted
    pub fn has_tx(&self, tx_id: &TxId) -> Result<bool> {
        Ok(self.db.contains(&tx_key(tx_id))?)
    }

    /// Ids of live UTXOs `addr` takes part in, in id order
    pub fn utxo_ids(&self, addr: &Address) -> Result<Vec<UtxoId>> {
        let prefix = addr_prefix(addr);
        let mut ids = Vec::new();
        for (key, _) in self.db.scan_prefix(&prefix)? {
            let id = parse_utxo_id(&key[prefix.len()..]).ok_or_else(|| {
                StorageError::Backend(format!("malformed address index key {}", hex::encode(&key)))
            })?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Live UTXOs referencing any of `addrs`, each once, in id order
    pub fn utxos_for<'b>(&self, addrs: impl IntoIterator<Item = &'b Address>) -> Result<Vec<Utxo>> {
        let mut ids = BTreeSet::new();
        for addr in addrs {
            ids.extend(self.utxo_ids(addr)?);
        }
        let mut utxos = Vec::with_capacity(ids.len());
        for id in ids {
            let utxo = self.utxo(&id)?.ok_or_else(|| {
                StorageError::Backend(format!("address index names missing UTXO {}", id))
            })?;
            utxos.push(utxo);
        }
        Ok(utxos)
    }

    /// Stage a new UTXO and its address index entries
    pub fn stage_insert(&self, batch: &mut Batch, utxo: &Utxo) -> Result<()> {
        batch.put(utxo_key(&utxo.utxo_id), self.codec.marshal(utxo)?);
        for addr in utxo.out.addresses() {
            batch.put(addr_key(addr, &utxo.utxo_id), Vec::new());
        }
        Ok(())
    }

    /// Stage the acceptance marker of `tx_id`
    pub fn stage_tx(&self, batch: &mut Batch, tx_id: &TxId) {
        batch.put(tx_key(tx_id), Vec::new());
    }

    /// Stage removal of a consumed UTXO
    pub fn stage_remove(&self, batch: &mut Batch, utxo: &Utxo) {
        batch.delete(utxo_key(&utxo.utxo_id));
        for addr in utxo.out.addresses() {
            batch.delete(addr_key(addr, &utxo.utxo_id));
        }
    }
}
