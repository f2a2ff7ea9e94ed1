use std::{fs, io, net::SocketAddr, path::Path};

use serde_json::{Map, Value};

use crate::topology::config::GenesisOverride;

const COLD_STORE_DIR: &str = "cold-data";

/// Read a JSON file, let `edit` change it in place and write it back pretty
/// printed.
pub fn rewrite_json_file<F>(path: &Path, edit: F) -> io::Result<()>
where
    F: FnOnce(&mut Value),
{
    let raw = fs::read_to_string(path)?;
    let mut value: Value = serde_json::from_str(&raw).map_err(io::Error::other)?;
    edit(&mut value);
    let rendered = serde_json::to_string_pretty(&value).map_err(io::Error::other)?;
    fs::write(path, rendered)
}

/// Deep-merge `patch` into `target`: objects merge key by key, anything else
/// replaces the existing value.
pub fn merge_overrides(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge_overrides(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Apply genesis overrides in order, creating intermediate objects.
pub fn apply_genesis_overrides(genesis: &mut Value, overrides: &[GenesisOverride]) {
    for genesis_override in overrides {
        let Some((last, parents)) = genesis_override.path.split_last() else {
            continue;
        };
        let mut cursor = &mut *genesis;
        for key in parents {
            cursor = ensure_object(cursor)
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        ensure_object(cursor).insert(last.clone(), genesis_override.value.clone());
    }
}

/// Point the node's RPC and network listeners at the allocated addresses.
pub fn inject_addresses(config: &mut Value, rpc_addr: SocketAddr, network_addr: SocketAddr) {
    let root = ensure_object(config);
    section(root, "rpc").insert("addr".into(), Value::String(rpc_addr.to_string()));
    section(root, "network").insert("addr".into(), Value::String(network_addr.to_string()));
}

/// Make the node dial `boot_node` (`<public key>@<addr>`) on startup.
pub fn inject_boot_node(config: &mut Value, boot_node: &str) {
    let root = ensure_object(config);
    section(root, "network").insert("boot_nodes".into(), Value::String(boot_node.to_owned()));
}

/// Give archival nodes a cold store when the overrides did not configure
/// one.
pub fn inject_cold_store_defaults(config: &mut Value) {
    let Some(root) = config.as_object_mut() else {
        return;
    };
    if !root.get("archive").and_then(Value::as_bool).unwrap_or(false) {
        return;
    }
    ensure_save_trie_changes(root);
    ensure_cold_store(root);
    ensure_split_storage(root);
}

fn ensure_save_trie_changes(root: &mut Map<String, Value>) {
    if root.get("save_trie_changes").is_some_and(|v| !v.is_null()) {
        return;
    }
    root.insert("save_trie_changes".into(), Value::Bool(true));
}

fn ensure_cold_store(root: &mut Map<String, Value>) {
    if root.get("cold_store").is_some_and(|v| !v.is_null()) {
        return;
    }
    let mut cold_store = Map::new();
    cold_store.insert("path".into(), Value::String(COLD_STORE_DIR.into()));
    root.insert("cold_store".into(), Value::Object(cold_store));
}

fn ensure_split_storage(root: &mut Map<String, Value>) {
    if root.get("split_storage").is_some_and(|v| !v.is_null()) {
        return;
    }
    let mut split_storage = Map::new();
    split_storage.insert("enable_split_storage_view_client".into(), Value::Bool(true));
    root.insert("split_storage".into(), Value::Object(split_storage));
}

/// Public key of a node, read from its `node_key.json`.
pub fn read_public_key(node_key: &Path) -> io::Result<String> {
    let raw = fs::read_to_string(node_key)?;
    let value: Value = serde_json::from_str(&raw).map_err(io::Error::other)?;
    value
        .get("public_key")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} has no public_key", node_key.display()),
            )
        })
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

fn section<'a>(root: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    ensure_object(
        root.entry(key.to_owned())
            .or_insert_with(|| Value::Object(Map::new())),
    )
}
