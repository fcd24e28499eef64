//! # Asset-Ledger
//!
//! Transaction-processing core of an asset ledger virtual machine.
//!
//! Signed transaction bytes go in; validated mutations of a UTXO set come
//! out. Spending rules live in pluggable feature extensions (Fx), so new
//! ownership models never touch the engine.
//!
//! ## Architecture
//!
//! Leaves first:
//! - `codec`: versioned binary codec with a closed, ordered type registry
//! - `transaction`: inputs, outputs, operations, unsigned bodies, `Tx`
//! - `fx` / `secp256k1fx`: verification framework and the threshold Fx
//! - `genesis`: deterministic initial state from asset definitions
//! - `vm`: the ledger engine (`Initialize`, `IssueTx`, `GetUTXOs`,
//!   `PendingTxs`, `Shutdown`)
//!
//! ## Design Principles
//!
//! 1. **Byte-exact encoding**: big-endian integers, order-preserving
//!    sequences, registration-order type tags
//! 2. **All-or-nothing state changes**: every call commits one batch or none
//! 3. **Closed polymorphism**: only registered variants cross the wire
//! 4. **Caller-owned concurrency**: the engine assumes serialized access
//!
//! ## Usage
//!
//! ```rust
//! use std::collections::HashSet;
//!
//! use asset_ledger::config::{Context, VmConfig};
//! use asset_ledger::fx::FxEntry;
//! use asset_ledger::genesis::{AssetDefinition, BuildGenesisArgs, Holder, InitialState, StaticService};
//! use asset_ledger::secp256k1fx::SecpFx;
//! use asset_ledger::storage::MemDb;
//! use asset_ledger::types::{Address, FxId};
//! use asset_ledger::vm::Vm;
//!
//! let owner = Address([7; 20]);
//! let mut args = BuildGenesisArgs::default();
//! args.genesis_data.insert(
//!     "gold".to_string(),
//!     AssetDefinition {
//!         name: "Gold".to_string(),
//!         symbol: "GLD".to_string(),
//!         denomination: 0,
//!         initial_state: InitialState {
//!             fixed_cap: vec![Holder { amount: 1000, address: owner.to_string() }],
//!             variable_cap: vec![],
//!         },
//!     },
//! );
//! let genesis = StaticService::default().build_genesis(&args).unwrap();
//!
//! let (notify, _pending) = tokio::sync::mpsc::channel(1);
//! let mut vm = Vm::new(VmConfig::immediate());
//! vm.initialize(
//!     Context::default(),
//!     Box::new(MemDb::new()),
//!     &genesis.bytes,
//!     notify,
//!     vec![Some(FxEntry::new(FxId::default(), SecpFx::new()))],
//! )
//! .unwrap();
//!
//! let utxos = vm.get_utxos(&HashSet::from([owner])).unwrap();
//! assert_eq!(utxos.len(), 1);
//! ```

pub mod types;
pub mod constants;
pub mod config;
pub mod codec;
pub mod transaction;
pub mod fx;
pub mod secp256k1fx;
pub mod genesis;
pub mod storage;
pub mod state;
pub mod vm;
pub mod error;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{LedgerError, Result};
pub use vm::{Message, Vm, VmState};
