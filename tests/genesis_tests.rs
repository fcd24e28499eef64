//! Genesis construction tests

use asset_ledger::fx::FxOutput;
use asset_ledger::genesis::{default_codec, BuildGenesisArgs, BuildGenesisReply, Genesis, StaticService};
use asset_ledger::{Address, AssetId, CODEC_VERSION};

fn owner() -> Address {
    Address([0x42; 20])
}

fn args_json(order: &[&str]) -> String {
    let defs: Vec<String> = order
        .iter()
        .map(|alias| match *alias {
            "fixed" => format!(
                r#""fixed": {{
                    "name": "myFixedCapAsset",
                    "symbol": "MFCA",
                    "initialState": {{
                        "fixedCap": [
                            {{"amount": 100000, "address": "{a}"}},
                            {{"amount": 100000, "address": "{a}"}},
                            {{"amount": 50000, "address": "{a}"}},
                            {{"amount": 50000, "address": "{a}"}}
                        ]
                    }}
                }}"#,
                a = owner()
            ),
            _ => format!(
                r#""{alias}": {{
                    "name": "myVarCapAsset",
                    "symbol": "MVCA",
                    "initialState": {{
                        "variableCap": [{{"threshold": 1, "minters": ["{a}"]}}]
                    }}
                }}"#,
                alias = alias,
                a = owner()
            ),
        })
        .collect();
    format!(
        r#"{{"networkId": 43110, "genesisData": {{ {} }} }}"#,
        defs.join(",")
    )
}

fn build(order: &[&str]) -> BuildGenesisReply {
    let args: BuildGenesisArgs = serde_json::from_str(&args_json(order)).unwrap();
    StaticService::default().build_genesis(&args).unwrap()
}

#[test]
fn test_fixed_cap_allocation() {
    let reply = build(&["fixed"]);
    let codec = default_codec(CODEC_VERSION).unwrap();
    let genesis: Genesis = codec.unmarshal(&reply.bytes).unwrap();
    assert_eq!(genesis.assets.len(), 1);

    let asset = &genesis.assets[0];
    assert_eq!(asset.alias, "fixed");
    assert_eq!(asset.tx.name, "myFixedCapAsset");

    let tx = asset.to_tx(&codec).unwrap();
    let tx_id = tx.id().unwrap();
    let utxos = tx.unsigned.utxos(tx_id);
    assert_eq!(utxos.len(), 4);
    assert!(utxos.iter().all(|u| u.asset_id == AssetId::from(tx_id)));
    assert!(utxos.iter().all(|u| u.out.addresses() == [owner()]));
    assert_eq!(utxos.iter().filter_map(|u| u.out.amount()).sum::<u64>(), 300000);
}

#[test]
fn test_variable_cap_yields_mint_outputs() {
    let reply = build(&["minted"]);
    let codec = default_codec(CODEC_VERSION).unwrap();
    let genesis: Genesis = codec.unmarshal(&reply.bytes).unwrap();
    let outs = &genesis.assets[0].tx.states[0].outs;
    assert_eq!(outs.len(), 1);
    assert!(matches!(outs[0], FxOutput::SecpMint(_)));
    assert!(genesis.assets[0].tx.states[0].asset_id.is_empty());
}

#[test]
fn test_genesis_bytes_follow_caller_order() {
    let a = build(&["fixed", "minted"]);
    let b = build(&["fixed", "minted"]);
    let c = build(&["minted", "fixed"]);
    assert_eq!(a, b);
    assert_ne!(a.bytes, c.bytes);
}

#[test]
fn test_reply_serializes_as_hex() {
    let reply = build(&["minted"]);
    let json = serde_json::to_value(&reply).unwrap();
    assert_eq!(json["bytes"], hex::encode(&reply.bytes));
}

#[test]
fn test_unparseable_address_rejected() {
    let json = args_json(&["fixed"]).replace(&owner().to_string(), "not-an-address");
    let args: BuildGenesisArgs = serde_json::from_str(&json).unwrap();
    let err = StaticService::default().build_genesis(&args).unwrap_err();
    assert!(format!("{:#}", err).contains("fixed"));
}

#[test]
fn test_invalid_asset_fields_rejected() {
    let empty_name = args_json(&["fixed"]).replace("myFixedCapAsset", "");
    let args: BuildGenesisArgs = serde_json::from_str(&empty_name).unwrap();
    let err = StaticService::default().build_genesis(&args).unwrap_err();
    assert!(format!("{:#}", err).contains("fixed"));

    let long_symbol = args_json(&["minted"]).replace("MVCA", "MVCAX");
    let args: BuildGenesisArgs = serde_json::from_str(&long_symbol).unwrap();
    let err = StaticService::default().build_genesis(&args).unwrap_err();
    assert!(format!("{:#}", err).contains("minted"));
}
