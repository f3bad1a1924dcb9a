use std::collections::BTreeMap;
use std::sync::Arc;

use casper_client::types::{
    Deploy, DeployBuilder, ExecutableDeployItem, TimeDiff as ClientTimeDiff,
    Timestamp as ClientTimestamp,
};
use casper_types::bytesrepr::{self, Bytes, FromBytes};
use casper_types::{CLTyped, ContractHash, RuntimeArgs, SecretKey, TimeDiff, U512};
use tracing::debug;

use crate::error::Error;
use crate::rpc::{CasperNodeClient, NodeClient};
use crate::utils;
use crate::watcher::{DeployWatcher, EventCallback, EventHandle, PendingDeploy};

/// 30 minutes, the node's default deploy time-to-live.
pub const DEFAULT_TTL_MS: u64 = 1_800_000;

/// Parameters of one stored-contract entry point call.
pub struct ContractCall<'a> {
    pub secret_key: &'a SecretKey,
    pub entry_point: &'a str,
    pub runtime_args: RuntimeArgs,
    pub payment_amount: U512,
    pub ttl: Option<TimeDiff>,
}

/// Base client the standard-specific clients build on: the node seam,
/// contract identity, tracked named keys, and the deploy watcher.
pub struct CasperContractClient {
    pub chain_name: String,
    pub contract_hash: Option<ContractHash>,
    /// Raw hex, as embedded by the contract in its event records.
    pub contract_package_hash: Option<String>,
    pub named_keys: BTreeMap<String, String>,
    event_stream_address: Option<String>,
    node: Arc<dyn NodeClient>,
    watcher: DeployWatcher,
}

impl CasperContractClient {
    pub fn new(node_address: &str, chain_name: &str, event_stream_address: Option<&str>) -> Self {
        Self::with_node_client(
            Arc::new(CasperNodeClient::new(node_address)),
            chain_name,
            event_stream_address,
        )
    }

    /// Builds a client on a custom transport; tests inject stubs through
    /// this.
    pub fn with_node_client(
        node: Arc<dyn NodeClient>,
        chain_name: &str,
        event_stream_address: Option<&str>,
    ) -> Self {
        CasperContractClient {
            chain_name: chain_name.to_string(),
            contract_hash: None,
            contract_package_hash: None,
            named_keys: BTreeMap::new(),
            event_stream_address: event_stream_address.map(str::to_string),
            node,
            watcher: DeployWatcher::new(),
        }
    }

    pub fn node(&self) -> &Arc<dyn NodeClient> {
        &self.node
    }

    /// Loads the contract's identity and the subset of its named keys the
    /// calling standard cares about. Accepts raw or `hash-` prefixed hex.
    pub async fn set_contract_hash(
        &mut self,
        contract_hash: &str,
        named_key_names: &[&str],
    ) -> Result<(), Error> {
        let contract_hash = utils::contract_hash_from_str(contract_hash)?;
        let info = self.node.contract_info(contract_hash).await?;
        self.contract_hash = Some(contract_hash);
        self.contract_package_hash = Some(info.contract_package_hash);
        self.named_keys = info
            .named_keys
            .into_iter()
            .filter(|(name, _)| named_key_names.contains(&name.as_str()))
            .collect();
        Ok(())
    }

    pub fn contract_hash(&self) -> Result<ContractHash, Error> {
        self.contract_hash.ok_or(Error::ContractHashNotSet)
    }

    pub fn named_key(&self, name: &str) -> Result<&str, Error> {
        self.named_keys
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::MissingNamedKey(name.to_string()))
    }

    /// Submits a stored-contract call and returns its deploy hash.
    pub async fn contract_call(&self, call: ContractCall<'_>) -> Result<String, Error> {
        let contract_hash = self.contract_hash()?;
        let session = ExecutableDeployItem::StoredContractByHash {
            hash: contract_hash,
            entry_point: call.entry_point.to_string(),
            args: call.runtime_args,
        };
        let deploy = self.build_deploy(session, call.secret_key, call.payment_amount, call.ttl)?;
        let deploy_hash = self.node.submit_deploy(deploy).await?;
        debug!(entry_point = %call.entry_point, %deploy_hash, "deploy submitted");
        Ok(deploy_hash)
    }

    /// Submits a module-bytes deploy installing a contract.
    pub async fn install(
        &self,
        secret_key: &SecretKey,
        module_bytes: Vec<u8>,
        runtime_args: RuntimeArgs,
        payment_amount: U512,
    ) -> Result<String, Error> {
        let session = ExecutableDeployItem::ModuleBytes {
            module_bytes: Bytes::from(module_bytes),
            args: runtime_args,
        };
        let deploy = self.build_deploy(session, secret_key, payment_amount, None)?;
        self.node.submit_deploy(deploy).await
    }

    fn build_deploy(
        &self,
        session: ExecutableDeployItem,
        secret_key: &SecretKey,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<Deploy, Error> {
        let ttl = ttl.unwrap_or_else(|| TimeDiff::from_millis(DEFAULT_TTL_MS));
        DeployBuilder::new(&self.chain_name, session, secret_key)
            .with_standard_payment(payment_amount)
            .with_timestamp(ClientTimestamp::now())
            .with_ttl(ClientTimeDiff::from_millis(ttl.millis()))
            .build()
            .map_err(|err| Error::DeployBuild(err.to_string()))
    }

    /// Reads and decodes a value stored directly under the contract's named
    /// keys.
    pub async fn query_contract_value<T: CLTyped + FromBytes>(
        &self,
        path: &[&str],
    ) -> Result<T, Error> {
        let contract_hash = self.contract_hash()?;
        let path = path.iter().map(|segment| (*segment).to_string()).collect();
        let bytes = self.node.query_contract_value(contract_hash, path).await?;
        deserialize_value(bytes)
    }

    /// Reads and decodes one item of the dictionary seeded by the given
    /// named key.
    pub async fn query_dictionary_value<T: CLTyped + FromBytes>(
        &self,
        dictionary_name: &str,
        item_key: &str,
    ) -> Result<T, Error> {
        let seed_uref = self.named_key(dictionary_name)?.to_string();
        let bytes = self
            .node
            .query_dictionary_value(seed_uref, item_key.to_string())
            .await?;
        deserialize_value(bytes)
    }

    /// Registers a submitted deploy for outcome correlation.
    pub fn record_pending(&self, deploy_type: &str, deploy_hash: &str) {
        self.watcher.record_pending(deploy_type, deploy_hash);
    }

    pub fn pending_deploys(&self) -> Vec<PendingDeploy> {
        self.watcher.pending()
    }

    /// Opens the single allowed event subscription for this client. Fails
    /// fast when no event stream address was configured, when the contract
    /// identity is not yet known, or when a listener is already active.
    pub fn handle_events(
        &self,
        event_names: Vec<String>,
        callback: EventCallback,
    ) -> Result<EventHandle, Error> {
        let stream_url = self
            .event_stream_address
            .clone()
            .ok_or(Error::EventStreamNotConfigured)?;
        let contract_package_hash = self
            .contract_package_hash
            .clone()
            .ok_or(Error::ContractHashNotSet)?;
        self.watcher
            .listen(stream_url, contract_package_hash, event_names, callback)
    }
}

fn deserialize_value<T: FromBytes>(bytes: Vec<u8>) -> Result<T, Error> {
    bytesrepr::deserialize(bytes).map_err(|_| Error::InvalidStoredValue)
}

#[cfg(test)]
mod tests {
    use casper_types::bytesrepr::ToBytes;
    use casper_types::U256;
    use mockall::predicate::eq;

    use super::*;
    use crate::rpc::MockNodeClient;

    fn client_with(mock: MockNodeClient) -> CasperContractClient {
        let mut client = CasperContractClient::with_node_client(
            Arc::new(mock),
            "casper-test",
            Some("http://localhost:9999/events/main"),
        );
        client.contract_hash = Some(ContractHash::new([1u8; 32]));
        client.contract_package_hash = Some("ab".repeat(32));
        client
            .named_keys
            .insert("balances".to_string(), "uref-seed".to_string());
        client
    }

    #[tokio::test]
    async fn dictionary_queries_resolve_the_seed_uref_and_decode() {
        let mut mock = MockNodeClient::new();
        mock.expect_query_dictionary_value()
            .with(eq("uref-seed".to_string()), eq("itemkey".to_string()))
            .times(1)
            .returning(|_, _| Ok(U256::from(7u64).to_bytes().unwrap()));

        let client = client_with(mock);
        let balance: U256 = client
            .query_dictionary_value("balances", "itemkey")
            .await
            .unwrap();
        assert_eq!(balance, U256::from(7u64));
    }

    #[tokio::test]
    async fn unknown_named_keys_fail_fast() {
        let client = client_with(MockNodeClient::new());
        let err = client
            .query_dictionary_value::<U256>("allowances", "itemkey")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::MissingNamedKey(name) if name == "allowances"));
    }

    #[tokio::test]
    async fn mismatched_value_bytes_surface_as_invalid_stored_value() {
        let mut mock = MockNodeClient::new();
        mock.expect_query_contract_value()
            .returning(|_, _| Ok("not a u256".to_bytes().unwrap()));

        let client = client_with(mock);
        let err = client
            .query_contract_value::<U256>(&["total_supply"])
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidStoredValue));
    }

    #[tokio::test]
    async fn queries_without_a_contract_hash_fail_fast() {
        let mut client = client_with(MockNodeClient::new());
        client.contract_hash = None;
        let err = client
            .query_contract_value::<U256>(&["total_supply"])
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::ContractHashNotSet));
    }

    #[tokio::test]
    async fn handle_events_requires_a_stream_address() {
        let mut client = CasperContractClient::with_node_client(
            Arc::new(MockNodeClient::new()),
            "casper-test",
            None,
        );
        client.contract_package_hash = Some("ab".repeat(32));
        let err = client
            .handle_events(vec![], Box::new(|_| {}))
            .err()
            .unwrap();
        assert!(matches!(err, Error::EventStreamNotConfigured));
    }

    #[tokio::test]
    async fn handle_events_requires_contract_identity() {
        let client = CasperContractClient::with_node_client(
            Arc::new(MockNodeClient::new()),
            "casper-test",
            Some("http://localhost:9999/events/main"),
        );
        let err = client
            .handle_events(vec![], Box::new(|_| {}))
            .err()
            .unwrap();
        assert!(matches!(err, Error::ContractHashNotSet));
    }

    #[tokio::test]
    async fn contract_call_submits_and_returns_the_deploy_hash() {
        let mut mock = MockNodeClient::new();
        mock.expect_submit_deploy()
            .times(1)
            .returning(|_| Ok("feed".repeat(16)));

        let client = client_with(mock);
        let secret_key = SecretKey::secp256k1_from_bytes(&[221u8; 32]).unwrap();
        let deploy_hash = client
            .contract_call(ContractCall {
                secret_key: &secret_key,
                entry_point: "transfer",
                runtime_args: RuntimeArgs::new(),
                payment_amount: U512::from(1_000_000_000u64),
                ttl: None,
            })
            .await
            .unwrap();
        assert_eq!(deploy_hash, "feed".repeat(16));

        client.record_pending("erc20_transfer", &deploy_hash);
        assert_eq!(client.pending_deploys().len(), 1);
    }
}
