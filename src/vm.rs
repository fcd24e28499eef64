//! Ledger engine
//!
//! State machine: `Uninitialized -> Ready -> ShutDown`.
//!
//! The engine performs no locking of its own; callers serialize access
//! (every mutating call takes `&mut self`). Each call either commits one
//! storage batch or leaves the ledger untouched.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::codec::Codec;
use crate::config::{Context, VmConfig};
use crate::constants::MAX_TX_SIZE;
use crate::error::{LedgerError, Result};
use crate::fx::{Fx, FxContext, FxEntry, FxError, FxOutput};
use crate::genesis::Genesis;
use crate::state::{tx_key, UtxoState};
use crate::storage::{Batch, Database};
use crate::transaction::{tx_codec, Tx, Utxo};
use crate::types::{Address, FxId, TxId, TypeKind};

/// Token sent to the consumer when transactions become pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    PendingTxs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Uninitialized,
    Ready,
    ShutDown,
}

struct RegisteredFx {
    id: FxId,
    fx: Box<dyn Fx>,
}

/// Asset ledger virtual machine
pub struct Vm {
    config: VmConfig,
    state: VmState,
    ctx: Context,
    codec: Codec<TypeKind>,
    db: Option<Box<dyn Database>>,
    fxs: Vec<RegisteredFx>,
    type_owners: HashMap<TypeKind, usize>,
    notify: Option<mpsc::Sender<Message>>,
    /// Verified and committed, not yet exposed
    batch: Vec<Tx>,
    batch_started: Option<Instant>,
    /// Exposed through `pending_txs`
    pending: Vec<Tx>,
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("ctx", &self.ctx)
            .field("fxs", &self.fxs.iter().map(|r| r.id).collect::<Vec<_>>())
            .field("batch", &self.batch.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        Self {
            codec: Codec::new(config.codec_version),
            config,
            state: VmState::Uninitialized,
            ctx: Context::default(),
            db: None,
            fxs: Vec::new(),
            type_owners: HashMap::new(),
            notify: None,
            batch: Vec::new(),
            batch_started: None,
            pending: Vec::new(),
        }
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn context(&self) -> Context {
        self.ctx
    }

    /// Codec with every transaction and Fx type registered
    pub fn codec(&self) -> &Codec<TypeKind> {
        &self.codec
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            VmState::Ready => Ok(()),
            VmState::Uninitialized => Err(LedgerError::NotInitialized),
            VmState::ShutDown => Err(LedgerError::EngineShutdown),
        }
    }

    fn db(&self) -> Result<&dyn Database> {
        self.db.as_deref().ok_or(LedgerError::NotInitialized)
    }

    /// Initialize: register Fxs, apply genesis, become `Ready`
    ///
    /// Rules, each fatal to the whole call:
    /// 1. Every Fx entry is present and its id unique (`InvalidExtension`)
    /// 2. Every Fx initializes (`FxInitialization`)
    /// 3. Genesis decodes, is non-empty, and no genesis transaction consumes
    ///    or transfers existing value (`InvalidGenesis`)
    ///
    /// Genesis UTXOs are written in a single batch, so a failure leaves the
    /// store exactly as it was handed in.
    pub fn initialize(
        &mut self,
        ctx: Context,
        mut db: Box<dyn Database>,
        genesis_bytes: &[u8],
        notify: mpsc::Sender<Message>,
        fxs: Vec<Option<FxEntry>>,
    ) -> Result<()> {
        match self.state {
            VmState::Uninitialized => {}
            VmState::Ready => return Err(LedgerError::AlreadyInitialized),
            VmState::ShutDown => return Err(LedgerError::EngineShutdown),
        }

        let mut codec = tx_codec(self.config.codec_version)?;
        let mut registered: Vec<RegisteredFx> = Vec::with_capacity(fxs.len());
        let mut type_owners = HashMap::new();

        for (index, entry) in fxs.into_iter().enumerate() {
            let FxEntry { id, mut fx } = entry
                .ok_or_else(|| LedgerError::InvalidExtension(format!("fx {} is nil", index)))?;
            if registered.iter().any(|r| r.id == id) {
                return Err(LedgerError::InvalidExtension(format!("duplicate fx id {}", id)));
            }

            let mut fx_ctx = FxContext::new(ctx.network_id, ctx.chain_id, &mut codec);
            fx.initialize(&mut fx_ctx)
                .map_err(|e| LedgerError::FxInitialization(format!("fx {}: {}", id, e)))?;
            for kind in fx_ctx.into_registered() {
                type_owners.insert(kind, registered.len());
            }
            debug!(fx_id = %id, "registered fx");
            registered.push(RegisteredFx { id, fx });
        }

        let batch = genesis_batch(&codec, &*db, genesis_bytes)?;
        db.write_batch(batch)?;

        self.ctx = ctx;
        self.codec = codec;
        self.db = Some(db);
        self.fxs = registered;
        self.type_owners = type_owners;
        self.notify = Some(notify);
        self.state = VmState::Ready;

        info!(
            network_id = ctx.network_id,
            chain_id = %ctx.chain_id,
            fxs = self.fxs.len(),
            "ledger initialized"
        );
        Ok(())
    }

    /// The Fx that owns `kinds[0]`, provided it owns every other kind too
    fn fx_for(&self, kinds: &[TypeKind]) -> Result<&dyn Fx> {
        let owner = |kind: &TypeKind| {
            self.type_owners.get(kind).copied().ok_or_else(|| {
                LedgerError::InvalidExtension(format!("no fx registered {:?}", kind))
            })
        };
        let first = kinds
            .first()
            .ok_or_else(|| LedgerError::InvalidTx("nothing to verify".to_string()))?;
        let index = owner(first)?;
        for kind in &kinds[1..] {
            if owner(kind)? != index {
                return Err(FxError::WrongType(format!(
                    "{:?} is not handled by the fx owning {:?}",
                    kind, first
                ))
                .into());
            }
        }
        Ok(&*self.fxs[index].fx)
    }

    /// Verify `tx` against the current UTXO set and stage its effects
    ///
    /// Rules:
    /// 1. Body is bound to this network and chain and is well formed
    /// 2. `tx_id` was never accepted before, genesis included (`DuplicateTx`)
    /// 3. One credential per input and per spending operation
    /// 4. Every consumed UTXO exists (`MissingUtxo` otherwise) and carries
    ///    the asset the input claims
    /// 5. The owning Fx accepts every transfer and operation
    /// 6. Plain transfers never create value: per asset, produced <= consumed
    fn verify_tx(&self, tx: &Tx, tx_id: TxId) -> Result<Batch> {
        let unsigned = &tx.unsigned;
        unsigned.verify_scope(self.ctx.network_id, self.ctx.chain_id)?;
        unsigned.verify_structure()?;

        let state = UtxoState::new(self.db()?, &self.codec);
        if state.has_tx(&tx_id)? {
            return Err(LedgerError::DuplicateTx(tx_id));
        }

        if tx.creds.len() != unsigned.num_credentials() {
            return Err(LedgerError::InvalidTx(format!(
                "expected {} credentials, found {}",
                unsigned.num_credentials(),
                tx.creds.len()
            )));
        }

        let mut batch = Batch::new();
        for (input, cred) in unsigned.inputs().iter().zip(&tx.creds) {
            let utxo = state
                .utxo(&input.utxo_id)?
                .ok_or(LedgerError::MissingUtxo(input.utxo_id))?;
            if utxo.asset_id != input.asset_id {
                return Err(LedgerError::InvalidTx(format!(
                    "input {} claims asset {}, UTXO holds {}",
                    input.utxo_id, input.asset_id, utxo.asset_id
                )));
            }
            let fx = self.fx_for(&[utxo.out.kind(), input.input.kind(), cred.kind()])?;
            fx.verify_transfer(tx, &utxo.out, &input.input, cred)?;
            state.stage_remove(&mut batch, &utxo);
        }

        let op_creds = &tx.creds[unsigned.inputs().len()..];
        for (op, cred) in unsigned.spending_operations().iter().zip(op_creds) {
            let mut consumed: Vec<Utxo> = Vec::with_capacity(op.ins.len());
            let mut kinds = Vec::with_capacity(op.ins.len() * 2 + op.outs.len() + 1);
            for input in &op.ins {
                let utxo = state
                    .utxo(&input.utxo_id)?
                    .ok_or(LedgerError::MissingUtxo(input.utxo_id))?;
                if utxo.asset_id != op.asset_id {
                    return Err(LedgerError::InvalidTx(format!(
                        "operation on asset {} consumes {} of asset {}",
                        op.asset_id, input.utxo_id, utxo.asset_id
                    )));
                }
                kinds.push(utxo.out.kind());
                kinds.push(input.input.kind());
                consumed.push(utxo);
            }
            kinds.extend(op.outs.iter().map(FxOutput::kind));
            kinds.push(cred.kind());

            let fx = self.fx_for(&kinds)?;
            let outs: Vec<&FxOutput> = consumed.iter().map(|u| &u.out).collect();
            fx.verify_operation(tx, op, &outs, cred)?;
            for utxo in &consumed {
                state.stage_remove(&mut batch, utxo);
            }
        }

        for (asset_id, (consumed, produced)) in unsigned.transfer_flow()? {
            if produced > consumed {
                return Err(LedgerError::InvalidTx(format!(
                    "asset {} produces {} from {}",
                    asset_id, produced, consumed
                )));
            }
        }

        for utxo in unsigned.utxos(tx_id) {
            state.stage_insert(&mut batch, &utxo)?;
        }
        state.stage_tx(&mut batch, &tx_id);
        Ok(batch)
    }

    /// IssueTx: verify, commit, and buffer a signed transaction
    pub fn issue_tx(&mut self, bytes: &[u8]) -> Result<TxId> {
        self.ensure_ready()?;
        let now = Instant::now();
        self.poll(now);

        if bytes.len() > MAX_TX_SIZE {
            return Err(LedgerError::InvalidTx(format!(
                "transaction size {} exceeds {}",
                bytes.len(),
                MAX_TX_SIZE
            )));
        }

        let tx = Tx::from_bytes(&self.codec, bytes).map_err(|e| {
            warn!(error = %e, "rejected undecodable transaction");
            LedgerError::from(e)
        })?;
        let tx_id = tx
            .id()
            .ok_or_else(|| LedgerError::InvalidTx("transaction has no id".to_string()))?;

        let batch = match self.verify_tx(&tx, tx_id) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(tx_id = %tx_id, error = %e, "rejected transaction");
                return Err(e);
            }
        };
        match self.db.as_deref_mut() {
            Some(db) => db.write_batch(batch)?,
            None => return Err(LedgerError::NotInitialized),
        }

        info!(tx_id = %tx_id, kind = ?tx.unsigned.kind(), "issued transaction");
        self.batch.push(tx);
        if self.batch_started.is_none() {
            self.batch_started = Some(now);
        }
        self.poll(now);
        Ok(tx_id)
    }

    /// Expose the buffered batch once its timeout has elapsed
    ///
    /// Returns how many transactions became pending.
    pub fn poll(&mut self, now: Instant) -> usize {
        if self.state != VmState::Ready {
            return 0;
        }
        let Some(started) = self.batch_started else {
            return 0;
        };
        if now.saturating_duration_since(started) >= self.config.batch_timeout() {
            self.flush()
        } else {
            0
        }
    }

    fn flush(&mut self) -> usize {
        let count = self.batch.len();
        if count == 0 {
            return 0;
        }
        let signal = self.pending.is_empty();
        self.pending.append(&mut self.batch);
        self.batch_started = None;
        debug!(count, pending = self.pending.len(), "flushed transaction batch");

        // A non-empty pending set means the last signal is still unconsumed.
        if signal {
            self.signal();
        }
        count
    }

    fn signal(&mut self) {
        let Some(notify) = &self.notify else {
            return;
        };
        match notify.try_send(Message::PendingTxs) {
            Ok(()) => debug!("signalled pending transactions"),
            Err(TrySendError::Full(_)) => debug!("pending signal already queued"),
            Err(TrySendError::Closed(_)) => {
                warn!("pending transaction consumer is gone");
                self.notify = None;
            }
        }
    }

    /// GetUTXOs: every live UTXO any of `addrs` takes part in, once each
    pub fn get_utxos(&self, addrs: &HashSet<Address>) -> Result<Vec<Utxo>> {
        self.ensure_ready()?;
        UtxoState::new(self.db()?, &self.codec).utxos_for(addrs)
    }

    /// PendingTxs: drain the transactions exposed since the last drain
    pub fn pending_txs(&mut self) -> Result<Vec<Tx>> {
        self.ensure_ready()?;
        self.poll(Instant::now());
        Ok(std::mem::take(&mut self.pending))
    }

    /// Shutdown: close storage and drop the notification sender
    pub fn shutdown(&mut self) -> Result<()> {
        match self.state {
            VmState::ShutDown => return Err(LedgerError::EngineShutdown),
            VmState::Uninitialized => {
                self.state = VmState::ShutDown;
                return Ok(());
            }
            VmState::Ready => {}
        }

        self.state = VmState::ShutDown;
        self.notify = None;
        let dropped = self.batch.len() + self.pending.len();
        self.batch.clear();
        self.batch_started = None;
        self.pending.clear();
        self.fxs.clear();
        self.type_owners.clear();
        if let Some(mut db) = self.db.take() {
            db.close()?;
        }
        info!(dropped, "ledger shut down");
        Ok(())
    }
}

/// Decode genesis and stage every UTXO it creates
fn genesis_batch(codec: &Codec<TypeKind>, db: &dyn Database, bytes: &[u8]) -> Result<Batch> {
    let invalid = |msg: String| LedgerError::InvalidGenesis(msg);

    if bytes.is_empty() {
        return Err(invalid("no genesis bytes".to_string()));
    }
    let genesis: Genesis = codec.unmarshal(bytes).map_err(|e| invalid(e.to_string()))?;
    if genesis.assets.is_empty() {
        return Err(invalid("genesis defines no assets".to_string()));
    }

    let state = UtxoState::new(db, codec);
    let mut batch = Batch::new();
    for asset in &genesis.assets {
        let context = |e: LedgerError| invalid(format!("asset {:?}: {}", asset.alias, e));
        asset.tx.verify_genesis().map_err(context)?;
        let tx = asset.to_tx(codec).map_err(|e| context(e.into()))?;
        tx.unsigned.verify_structure().map_err(context)?;
        let tx_id = tx
            .id()
            .ok_or_else(|| invalid(format!("asset {:?} has no id", asset.alias)))?;
        if batch.pending(&tx_key(&tx_id)).is_some() {
            return Err(invalid(format!("asset {:?} declared twice", asset.alias)));
        }
        for utxo in tx.unsigned.utxos(tx_id) {
            state.stage_insert(&mut batch, &utxo)?;
        }
        state.stage_tx(&mut batch, &tx_id);
        debug!(alias = %asset.alias, asset_id = %tx_id, "genesis asset");
    }
    Ok(batch)
}
