//! Client for contracts implementing the ERC20 token standard.

use casper_client_helper::client::{CasperContractClient, ContractCall};
use casper_client_helper::error::Error;
use casper_client_helper::rpc::NodeClient;
use casper_client_helper::watcher::{EventCallback, EventHandle};
use casper_client_helper::{utils, Recipient};
use casper_types::{runtime_args, RuntimeArgs, SecretKey, TimeDiff, U256, U512};

const NAMED_KEYS: [&str; 2] = ["balances", "allowances"];

/// Events the ERC20 contract emits, by their on-chain `event_type` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ERC20Event {
    Transfer,
    Approve,
}

impl ERC20Event {
    pub fn name(&self) -> &'static str {
        match self {
            ERC20Event::Transfer => "erc20_transfer",
            ERC20Event::Approve => "erc20_approve",
        }
    }
}

pub struct ERC20Client {
    pub client: CasperContractClient,
}

impl ERC20Client {
    pub fn new(node_address: &str, chain_name: &str, event_stream_address: Option<&str>) -> Self {
        ERC20Client {
            client: CasperContractClient::new(node_address, chain_name, event_stream_address),
        }
    }

    pub fn with_node_client(
        node: std::sync::Arc<dyn NodeClient>,
        chain_name: &str,
        event_stream_address: Option<&str>,
    ) -> Self {
        ERC20Client {
            client: CasperContractClient::with_node_client(node, chain_name, event_stream_address),
        }
    }

    pub async fn install(
        &self,
        secret_key: &SecretKey,
        module_bytes: Vec<u8>,
        token_name: &str,
        token_symbol: &str,
        token_decimals: u8,
        token_total_supply: U256,
        payment_amount: U512,
    ) -> Result<String, Error> {
        let args = runtime_args! {
            "name" => token_name,
            "symbol" => token_symbol,
            "decimals" => token_decimals,
            "total_supply" => token_total_supply,
        };
        self.client
            .install(secret_key, module_bytes, args, payment_amount)
            .await
    }

    pub async fn set_contract_hash(&mut self, contract_hash: &str) -> Result<(), Error> {
        self.client
            .set_contract_hash(contract_hash, &NAMED_KEYS)
            .await
    }

    pub async fn name(&self) -> Result<String, Error> {
        self.client.query_contract_value(&["name"]).await
    }

    pub async fn symbol(&self) -> Result<String, Error> {
        self.client.query_contract_value(&["symbol"]).await
    }

    pub async fn decimals(&self) -> Result<u8, Error> {
        self.client.query_contract_value(&["decimals"]).await
    }

    pub async fn total_supply(&self) -> Result<U256, Error> {
        self.client.query_contract_value(&["total_supply"]).await
    }

    /// Balance of any recipient form. The balances dictionary is addressed
    /// by the base64 form of the recipient's canonical key bytes.
    pub async fn balance_of(&self, account: &Recipient) -> Result<U256, Error> {
        let item_key = utils::base64_item_key(&account.to_key())?;
        self.client.query_dictionary_value("balances", &item_key).await
    }

    /// Amount of the owner's tokens the spender may transfer. The allowances
    /// dictionary is addressed by the hash of both keys' canonical bytes.
    pub async fn allowances(&self, owner: &Recipient, spender: &Recipient) -> Result<U256, Error> {
        let item_key = utils::keys_to_str(&owner.to_key(), &spender.to_key())?;
        self.client
            .query_dictionary_value("allowances", &item_key)
            .await
    }

    /// Transfers tokens from the signing account to the recipient.
    pub async fn transfer(
        &self,
        secret_key: &SecretKey,
        recipient: &Recipient,
        amount: U256,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        let args = runtime_args! {
            "recipient" => recipient.to_key(),
            "amount" => amount,
        };
        self.tracked_call(secret_key, "transfer", args, payment_amount, ttl, ERC20Event::Transfer)
            .await
    }

    /// Transfers tokens from the owner to the recipient, on the strength of
    /// a prior approval for the signing account.
    pub async fn transfer_from(
        &self,
        secret_key: &SecretKey,
        owner: &Recipient,
        recipient: &Recipient,
        amount: U256,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        let args = runtime_args! {
            "recipient" => recipient.to_key(),
            "owner" => owner.to_key(),
            "amount" => amount,
        };
        self.tracked_call(
            secret_key,
            "transfer_from",
            args,
            payment_amount,
            ttl,
            ERC20Event::Transfer,
        )
        .await
    }

    /// Allows the spender to transfer up to `amount` of the signing
    /// account's tokens.
    pub async fn approve(
        &self,
        secret_key: &SecretKey,
        spender: &Recipient,
        amount: U256,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        let args = runtime_args! {
            "spender" => spender.to_key(),
            "amount" => amount,
        };
        self.tracked_call(secret_key, "approve", args, payment_amount, ttl, ERC20Event::Approve)
            .await
    }

    pub fn on_event(
        &self,
        events: &[ERC20Event],
        callback: EventCallback,
    ) -> Result<EventHandle, Error> {
        let names = events.iter().map(|event| event.name().to_string()).collect();
        self.client.handle_events(names, callback)
    }

    async fn tracked_call(
        &self,
        secret_key: &SecretKey,
        entry_point: &str,
        runtime_args: RuntimeArgs,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
        event: ERC20Event,
    ) -> Result<String, Error> {
        let deploy_hash = self
            .client
            .contract_call(ContractCall {
                secret_key,
                entry_point,
                runtime_args,
                payment_amount,
                ttl,
            })
            .await?;
        self.client.record_pending(event.name(), &deploy_hash);
        Ok(deploy_hash)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use casper_client_helper::rpc::{AccountInfo, ContractInfo, Deploy, DeployOutcome};
    use casper_hashing::Digest;
    use casper_types::bytesrepr::ToBytes;
    use casper_types::{ContractHash, PublicKey};

    use super::*;

    #[derive(Default)]
    struct StubNode {
        dictionary: HashMap<(String, String), Vec<u8>>,
        requests: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl NodeClient for StubNode {
        async fn submit_deploy(&self, _deploy: Deploy) -> Result<String, Error> {
            Ok("bb".repeat(32))
        }

        async fn state_root_hash(&self) -> Result<Digest, Error> {
            Ok(Digest::hash(b"root"))
        }

        async fn contract_info(&self, _contract_hash: ContractHash) -> Result<ContractInfo, Error> {
            Err(Error::Rpc("not used in tests".to_string()))
        }

        async fn account_info(&self, _public_key: PublicKey) -> Result<AccountInfo, Error> {
            Err(Error::Rpc("not used in tests".to_string()))
        }

        async fn query_contract_value(
            &self,
            _contract_hash: ContractHash,
            _path: Vec<String>,
        ) -> Result<Vec<u8>, Error> {
            Err(Error::Rpc("not used in tests".to_string()))
        }

        async fn query_dictionary_value(
            &self,
            seed_uref: String,
            item_key: String,
        ) -> Result<Vec<u8>, Error> {
            self.requests
                .lock()
                .unwrap()
                .push((seed_uref.clone(), item_key.clone()));
            self.dictionary
                .get(&(seed_uref, item_key))
                .cloned()
                .ok_or(Error::InvalidStoredValue)
        }

        async fn deploy_status(&self, _deploy_hash: String) -> Result<Option<DeployOutcome>, Error> {
            Ok(None)
        }
    }

    fn recipient(seed: u8) -> Recipient {
        let secret_key = SecretKey::secp256k1_from_bytes(&[seed; 32]).unwrap();
        Recipient::PublicKey(PublicKey::from(&secret_key))
    }

    fn client_with(stub: Arc<StubNode>) -> ERC20Client {
        let mut erc20 = ERC20Client::with_node_client(stub, "casper-test", None);
        for name in &NAMED_KEYS {
            erc20
                .client
                .named_keys
                .insert((*name).to_string(), format!("uref-{}", name));
        }
        erc20
    }

    #[tokio::test]
    async fn balances_are_addressed_by_base64_key_bytes() {
        let account = recipient(1);
        let item_key = utils::base64_item_key(&account.to_key()).unwrap();

        let mut stub = StubNode::default();
        stub.dictionary.insert(
            ("uref-balances".to_string(), item_key.clone()),
            U256::from(1000u64).to_bytes().unwrap(),
        );
        let stub = Arc::new(stub);
        let erc20 = client_with(Arc::clone(&stub));

        let balance = erc20.balance_of(&account).await.unwrap();
        assert_eq!(balance, U256::from(1000u64));
        assert_eq!(
            stub.requests.lock().unwrap()[0],
            ("uref-balances".to_string(), item_key)
        );
    }

    #[tokio::test]
    async fn allowances_are_addressed_by_the_derived_pair_key() {
        let owner = recipient(1);
        let spender = recipient(2);
        let item_key = utils::keys_to_str(&owner.to_key(), &spender.to_key()).unwrap();

        let mut stub = StubNode::default();
        stub.dictionary.insert(
            ("uref-allowances".to_string(), item_key.clone()),
            U256::from(500u64).to_bytes().unwrap(),
        );
        let stub = Arc::new(stub);
        let erc20 = client_with(Arc::clone(&stub));

        let allowance = erc20.allowances(&owner, &spender).await.unwrap();
        assert_eq!(allowance, U256::from(500u64));
        assert_eq!(
            stub.requests.lock().unwrap()[0],
            ("uref-allowances".to_string(), item_key)
        );
    }

    #[tokio::test]
    async fn public_key_and_account_hash_owners_address_the_same_allowance() {
        let secret_key = SecretKey::secp256k1_from_bytes(&[9u8; 32]).unwrap();
        let public_key = PublicKey::from(&secret_key);
        let as_public_key = Recipient::PublicKey(public_key.clone());
        let as_account_hash = Recipient::AccountHash(public_key.to_account_hash());
        let spender = recipient(2);

        assert_eq!(
            utils::keys_to_str(&as_public_key.to_key(), &spender.to_key()).unwrap(),
            utils::keys_to_str(&as_account_hash.to_key(), &spender.to_key()).unwrap()
        );
    }

    #[tokio::test]
    async fn transfers_record_a_pending_deploy() {
        let mut erc20 = client_with(Arc::new(StubNode::default()));
        erc20.client.contract_hash = Some(ContractHash::new([2u8; 32]));

        let secret_key = SecretKey::secp256k1_from_bytes(&[221u8; 32]).unwrap();
        let deploy_hash = erc20
            .transfer(
                &secret_key,
                &recipient(3),
                U256::from(10u64),
                U512::from(1_000_000_000u64),
                None,
            )
            .await
            .unwrap();

        let pending = erc20.client.pending_deploys();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].deploy_hash, deploy_hash);
        assert_eq!(pending[0].deploy_type, ERC20Event::Transfer.name());
    }
}
