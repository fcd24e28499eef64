//! Genesis construction
//!
//! A genesis is an ordered list of aliased `CreateAssetTx` bodies. Each
//! body becomes a credential-free transaction whose id names the asset and
//! whose initial-state operations seed the UTXO set.
//!
//! [`StaticService::build_genesis`] turns a declarative asset mapping into
//! genesis bytes. The mapping is an [`IndexMap`]: genesis bytes follow the
//! caller's insertion order and are never re-sorted.

use anyhow::{anyhow, bail, Context as _};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codec::{Codec, CodecError, Decode, Encode, Reader, Writer};
use crate::constants::CODEC_VERSION;
use crate::fx::{Fx, FxContext, FxError, FxOutput};
use crate::secp256k1fx::{MintOutput, OutputOwners, SecpFx, TransferOutput};
use crate::transaction::{tx_codec, BaseTx, CreateAssetTx, Operation, Tx, UnsignedTx};
use crate::types::{Address, AssetId, ChainId, NetworkId, TypeKind};

/// Codec with the transaction kinds and the built-in secp256k1 Fx registered
pub fn default_codec(version: u16) -> Result<Codec<TypeKind>, FxError> {
    let mut codec = tx_codec(version)?;
    let mut ctx = FxContext::new(0, ChainId::default(), &mut codec);
    SecpFx::new().initialize(&mut ctx)?;
    Ok(codec)
}

/// One asset declared at genesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisAsset {
    pub alias: String,
    pub tx: CreateAssetTx,
}

impl GenesisAsset {
    /// The credential-free transaction defining this asset
    pub fn to_tx(&self, codec: &Codec<TypeKind>) -> Result<Tx, CodecError> {
        Tx::new(UnsignedTx::CreateAsset(self.tx.clone()), Vec::new()).seal(codec)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Genesis {
    pub assets: Vec<GenesisAsset>,
}

impl Encode<TypeKind> for GenesisAsset {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> Result<(), CodecError> {
        w.write_str(&self.alias)?;
        self.tx.encode(w)
    }
}

impl Decode<TypeKind> for GenesisAsset {
    fn decode(r: &mut Reader<'_, TypeKind>) -> Result<Self, CodecError> {
        Ok(Self {
            alias: r.read_str()?,
            tx: CreateAssetTx::decode(r)?,
        })
    }
}

impl Encode<TypeKind> for Genesis {
    fn encode(&self, w: &mut Writer<'_, TypeKind>) -> Result<(), CodecError> {
        w.write_seq(&self.assets)
    }
}

impl Decode<TypeKind> for Genesis {
    fn decode(r: &mut Reader<'_, TypeKind>) -> Result<Self, CodecError> {
        Ok(Self { assets: r.read_seq()? })
    }
}

/// Fixed-supply allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub amount: u64,
    pub address: String,
}

/// Minter group of a variable-supply asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owners {
    pub threshold: u32,
    pub minters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitialState {
    pub fixed_cap: Vec<Holder>,
    pub variable_cap: Vec<Owners>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetDefinition {
    pub name: String,
    pub symbol: String,
    pub denomination: u8,
    pub initial_state: InitialState,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildGenesisArgs {
    pub network_id: NetworkId,
    pub chain_id: ChainId,
    pub genesis_data: IndexMap<String, AssetDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildGenesisReply {
    #[serde(with = "hex::serde")]
    pub bytes: Vec<u8>,
}

fn parse_address(text: &str) -> anyhow::Result<Address> {
    if text.is_empty() {
        bail!("missing address");
    }
    text.parse()
        .map_err(|e| anyhow!("invalid address {:?}: {}", text, e))
}

/// Genesis builder exposed independently of any engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticService {
    pub codec_version: u16,
}

impl Default for StaticService {
    fn default() -> Self {
        Self {
            codec_version: CODEC_VERSION,
        }
    }
}

impl StaticService {
    pub fn new(codec_version: u16) -> Self {
        Self { codec_version }
    }

    /// Build the genesis object, one `CreateAssetTx` per declared asset
    pub fn build(&self, args: &BuildGenesisArgs) -> anyhow::Result<Genesis> {
        let mut genesis = Genesis::default();
        for (alias, def) in &args.genesis_data {
            let state = build_initial_state(&def.initial_state)
                .with_context(|| format!("asset {:?}", alias))?;
            let tx = CreateAssetTx {
                base: BaseTx {
                    network_id: args.network_id,
                    chain_id: args.chain_id,
                    outs: Vec::new(),
                    ins: Vec::new(),
                },
                name: def.name.clone(),
                symbol: def.symbol.clone(),
                denomination: def.denomination,
                states: vec![state],
            };
            UnsignedTx::CreateAsset(tx.clone())
                .verify_structure()
                .with_context(|| format!("asset {:?}", alias))?;
            genesis.assets.push(GenesisAsset {
                alias: alias.clone(),
                tx,
            });
        }
        Ok(genesis)
    }

    /// BuildGenesis: encode the declared assets as genesis bytes
    pub fn build_genesis(&self, args: &BuildGenesisArgs) -> anyhow::Result<BuildGenesisReply> {
        let genesis = self.build(args)?;
        let codec = default_codec(self.codec_version)?;
        let bytes = codec.marshal(&genesis).context("encoding genesis")?;
        Ok(BuildGenesisReply { bytes })
    }
}

fn build_initial_state(state: &InitialState) -> anyhow::Result<Operation> {
    let mut outs = Vec::new();
    for holder in &state.fixed_cap {
        let address = parse_address(&holder.address)?;
        if holder.amount == 0 {
            bail!("zero allocation to {}", address);
        }
        outs.push(FxOutput::SecpTransfer(TransferOutput {
            amount: holder.amount,
            locktime: 0,
            owners: OutputOwners::new(1, vec![address]),
        }));
    }
    for group in &state.variable_cap {
        if group.threshold as usize > group.minters.len() {
            bail!(
                "minter threshold {} exceeds {} minters",
                group.threshold,
                group.minters.len()
            );
        }
        let minters = group
            .minters
            .iter()
            .map(|m| parse_address(m))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let owners = OutputOwners::new(group.threshold, minters);
        owners.verify().context("invalid minter group")?;
        outs.push(FxOutput::SecpMint(MintOutput { owners }));
    }
    if outs.is_empty() {
        bail!("empty initial state");
    }
    Ok(Operation {
        asset_id: AssetId::default(),
        ins: Vec::new(),
        outs,
    })
}
