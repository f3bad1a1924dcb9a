use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use casper_client::rpcs::{DictionaryItemIdentifier, GlobalStateIdentifier};
use casper_client::types::DeployHash;
use casper_client::{JsonRpcId, Verbosity};
pub use casper_client::types::Deploy;
use casper_hashing::Digest;
use casper_types::{ContractHash, Key, PublicKey, URef};
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::utils;

/// Identity and named keys of a stored contract.
#[derive(Clone, Debug)]
pub struct ContractInfo {
    /// Raw hex, prefix stripped.
    pub contract_package_hash: String,
    /// Named key name to formatted key string (`uref-...`, `hash-...`).
    pub named_keys: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct AccountInfo {
    pub named_keys: BTreeMap<String, String>,
}

/// Terminal state of a processed deploy, as reported by `info_get_deploy`.
#[derive(Clone, Debug)]
pub struct DeployOutcome {
    pub success: bool,
    pub error_message: Option<String>,
}

/// The node-facing seam. Everything that crosses the wire goes through this
/// trait, so tests can substitute the whole transport.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn submit_deploy(&self, deploy: Deploy) -> Result<String, Error>;

    async fn state_root_hash(&self) -> Result<Digest, Error>;

    async fn contract_info(&self, contract_hash: ContractHash) -> Result<ContractInfo, Error>;

    async fn account_info(&self, public_key: PublicKey) -> Result<AccountInfo, Error>;

    /// CLValue bytes stored under a named-key path of the contract.
    async fn query_contract_value(
        &self,
        contract_hash: ContractHash,
        path: Vec<String>,
    ) -> Result<Vec<u8>, Error>;

    /// CLValue bytes of one dictionary item, addressed by seed URef.
    async fn query_dictionary_value(
        &self,
        seed_uref: String,
        item_key: String,
    ) -> Result<Vec<u8>, Error>;

    async fn deploy_status(&self, deploy_hash: String) -> Result<Option<DeployOutcome>, Error>;
}

/// `NodeClient` backed by the `casper-client` SDK. State queries fetch a
/// fresh state root hash per call, so reads always reflect the latest block.
pub struct CasperNodeClient {
    node_address: String,
    rpc_id: AtomicI64,
}

impl CasperNodeClient {
    pub fn new(node_address: &str) -> Self {
        CasperNodeClient {
            node_address: node_address.to_string(),
            rpc_id: AtomicI64::new(1),
        }
    }

    pub fn node_address(&self) -> &str {
        &self.node_address
    }

    fn next_id(&self) -> JsonRpcId {
        JsonRpcId::Number(self.rpc_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn query_global_state(&self, key: Key, path: Vec<String>) -> Result<Value, Error> {
        let state_root_hash = self.state_root_hash().await?;
        let response = casper_client::query_global_state(
            self.next_id(),
            &self.node_address,
            Verbosity::Low,
            GlobalStateIdentifier::StateRootHash(state_root_hash),
            key,
            path,
        )
        .await?;
        to_json(&response.result.stored_value)
    }
}

#[async_trait]
impl NodeClient for CasperNodeClient {
    async fn submit_deploy(&self, deploy: Deploy) -> Result<String, Error> {
        let response =
            casper_client::put_deploy(self.next_id(), &self.node_address, Verbosity::Low, deploy)
                .await?;
        let result = to_json(&response.result)?;
        result
            .get("deploy_hash")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(Error::InvalidStoredValue)
    }

    async fn state_root_hash(&self) -> Result<Digest, Error> {
        let response = casper_client::get_state_root_hash(
            self.next_id(),
            &self.node_address,
            Verbosity::Low,
            None,
        )
        .await?;
        response
            .result
            .state_root_hash
            .ok_or_else(|| Error::Rpc("state root hash unavailable".to_string()))
    }

    async fn contract_info(&self, contract_hash: ContractHash) -> Result<ContractInfo, Error> {
        let stored = self
            .query_global_state(Key::Hash(contract_hash.value()), Vec::new())
            .await?;
        let contract = stored.get("Contract").ok_or(Error::InvalidStoredValue)?;
        let contract_package_hash = contract
            .get("contract_package_hash")
            .and_then(Value::as_str)
            .map(|hash| utils::strip_hash_prefix(hash).to_string())
            .ok_or(Error::InvalidStoredValue)?;
        Ok(ContractInfo {
            contract_package_hash,
            named_keys: parse_named_keys(contract.get("named_keys"))?,
        })
    }

    async fn account_info(&self, public_key: PublicKey) -> Result<AccountInfo, Error> {
        let stored = self
            .query_global_state(Key::Account(public_key.to_account_hash()), Vec::new())
            .await?;
        let account = stored.get("Account").ok_or(Error::InvalidStoredValue)?;
        Ok(AccountInfo {
            named_keys: parse_named_keys(account.get("named_keys"))?,
        })
    }

    async fn query_contract_value(
        &self,
        contract_hash: ContractHash,
        path: Vec<String>,
    ) -> Result<Vec<u8>, Error> {
        let stored = self
            .query_global_state(Key::Hash(contract_hash.value()), path)
            .await?;
        cl_value_bytes(&stored)
    }

    async fn query_dictionary_value(
        &self,
        seed_uref: String,
        item_key: String,
    ) -> Result<Vec<u8>, Error> {
        let state_root_hash = self.state_root_hash().await?;
        let seed_uref = URef::from_formatted_str(&seed_uref)
            .map_err(|_| Error::InvalidKey(seed_uref.clone()))?;
        let identifier = DictionaryItemIdentifier::URef {
            seed_uref,
            dictionary_item_key: item_key,
        };
        let response = casper_client::get_dictionary_item(
            self.next_id(),
            &self.node_address,
            Verbosity::Low,
            state_root_hash,
            identifier,
        )
        .await?;
        cl_value_bytes(&to_json(&response.result.stored_value)?)
    }

    async fn deploy_status(&self, deploy_hash: String) -> Result<Option<DeployOutcome>, Error> {
        let digest =
            Digest::from_hex(&deploy_hash).map_err(|_| Error::InvalidKey(deploy_hash.clone()))?;
        let response = casper_client::get_deploy(
            self.next_id(),
            &self.node_address,
            Verbosity::Low,
            DeployHash::new(digest),
            false,
        )
        .await?;
        let result = to_json(&response.result)?;
        let execution_results = result
            .get("execution_results")
            .and_then(Value::as_array)
            .ok_or(Error::InvalidStoredValue)?;

        match execution_results.first() {
            None => Ok(None),
            Some(entry) => {
                let execution_result = entry.get("result").ok_or(Error::InvalidStoredValue)?;
                if let Some(failure) = execution_result.get("Failure") {
                    Ok(Some(DeployOutcome {
                        success: false,
                        error_message: failure
                            .get("error_message")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    }))
                } else if execution_result.get("Success").is_some() {
                    Ok(Some(DeployOutcome {
                        success: true,
                        error_message: None,
                    }))
                } else {
                    Err(Error::InvalidStoredValue)
                }
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|_| Error::InvalidStoredValue)
}

fn parse_named_keys(value: Option<&Value>) -> Result<BTreeMap<String, String>, Error> {
    let entries = value.and_then(Value::as_array).ok_or(Error::InvalidStoredValue)?;
    let mut named_keys = BTreeMap::new();
    for entry in entries {
        let name = entry.get("name").and_then(Value::as_str);
        let key = entry.get("key").and_then(Value::as_str);
        if let (Some(name), Some(key)) = (name, key) {
            named_keys.insert(name.to_string(), key.to_string());
        }
    }
    Ok(named_keys)
}

/// Pulls the raw CLValue bytes out of a JSON-shaped stored value. Anything
/// other than a CLValue is malformed from the client's point of view.
fn cl_value_bytes(stored: &Value) -> Result<Vec<u8>, Error> {
    stored
        .get("CLValue")
        .and_then(|cl_value| cl_value.get("bytes"))
        .and_then(Value::as_str)
        .and_then(|bytes| hex::decode(bytes).ok())
        .ok_or(Error::InvalidStoredValue)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn named_keys_parse_into_a_map() {
        let named_keys = parse_named_keys(Some(&json!([
            { "name": "balances", "key": "uref-01-007" },
            { "name": "events", "key": "uref-02-007" },
        ])))
        .unwrap();
        assert_eq!(named_keys.len(), 2);
        assert_eq!(named_keys.get("balances").unwrap(), "uref-01-007");
    }

    #[test]
    fn missing_named_keys_are_malformed() {
        assert!(matches!(
            parse_named_keys(None),
            Err(Error::InvalidStoredValue)
        ));
    }

    #[test]
    fn cl_value_bytes_rejects_non_cl_values() {
        let account = json!({ "Account": { "named_keys": [] } });
        assert!(matches!(
            cl_value_bytes(&account),
            Err(Error::InvalidStoredValue)
        ));

        let cl_value = json!({ "CLValue": { "cl_type": "U256", "bytes": "010a", "parsed": "10" } });
        assert_eq!(cl_value_bytes(&cl_value).unwrap(), vec![0x01, 0x0a]);
    }
}
