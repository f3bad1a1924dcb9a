//! Client for contracts implementing the CEP47 NFT standard.

use std::collections::BTreeMap;

use casper_client_helper::client::{CasperContractClient, ContractCall};
use casper_client_helper::error::Error;
use casper_client_helper::rpc::NodeClient;
use casper_client_helper::watcher::{EventCallback, EventHandle};
use casper_client_helper::{utils, Recipient};
use casper_types::{runtime_args, Key, PublicKey, RuntimeArgs, SecretKey, TimeDiff, U256, U512};

const NAMED_KEYS: [&str; 7] = [
    "balances",
    "metadata",
    "owned_tokens_by_index",
    "owners",
    "issuers",
    "paused",
    "events",
];

/// Events the CEP47 contract emits, by their on-chain `event_type` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CEP47Event {
    MintOne,
    BurnOne,
    TransferToken,
    MetadataUpdate,
}

impl CEP47Event {
    pub fn name(&self) -> &'static str {
        match self {
            CEP47Event::MintOne => "cep47_mint_one",
            CEP47Event::BurnOne => "cep47_burn_one",
            CEP47Event::TransferToken => "cep47_transfer_token",
            CEP47Event::MetadataUpdate => "cep47_metadata_update",
        }
    }
}

pub type Meta = BTreeMap<String, String>;

pub struct CEP47Client {
    pub client: CasperContractClient,
}

impl CEP47Client {
    pub fn new(node_address: &str, chain_name: &str, event_stream_address: Option<&str>) -> Self {
        CEP47Client {
            client: CasperContractClient::new(node_address, chain_name, event_stream_address),
        }
    }

    pub fn with_node_client(
        node: std::sync::Arc<dyn NodeClient>,
        chain_name: &str,
        event_stream_address: Option<&str>,
    ) -> Self {
        CEP47Client {
            client: CasperContractClient::with_node_client(node, chain_name, event_stream_address),
        }
    }

    pub async fn install(
        &self,
        secret_key: &SecretKey,
        module_bytes: Vec<u8>,
        token_name: &str,
        contract_name: &str,
        token_symbol: &str,
        token_meta: Meta,
        admin: &Recipient,
        payment_amount: U512,
    ) -> Result<String, Error> {
        let args = runtime_args! {
            "name" => token_name,
            "contract_name" => contract_name,
            "symbol" => token_symbol,
            "meta" => token_meta,
            "admin" => admin.to_key(),
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

    pub async fn meta(&self) -> Result<Meta, Error> {
        self.client.query_contract_value(&["meta"]).await
    }

    pub async fn total_supply(&self) -> Result<U256, Error> {
        self.client.query_contract_value(&["total_supply"]).await
    }

    pub async fn is_paused(&self) -> Result<bool, Error> {
        self.client.query_contract_value(&["is_paused"]).await
    }

    pub async fn balance_of(&self, account: &PublicKey) -> Result<U256, Error> {
        let item_key = utils::account_hash_string(&account.to_account_hash());
        self.client.query_dictionary_value("balances", &item_key).await
    }

    /// Formatted key of the token's current owner (`account-hash-...`).
    pub async fn owner_of(&self, token_id: &str) -> Result<String, Error> {
        let owner: Key = self.client.query_dictionary_value("owners", token_id).await?;
        Ok(owner.to_formatted_string())
    }

    /// Formatted key of the account that minted the token.
    pub async fn issuer_of(&self, token_id: &str) -> Result<String, Error> {
        let issuer: Key = self.client.query_dictionary_value("issuers", token_id).await?;
        Ok(issuer.to_formatted_string())
    }

    pub async fn token_meta(&self, token_id: &str) -> Result<Meta, Error> {
        self.client.query_dictionary_value("metadata", token_id).await
    }

    /// Walks the owner's `owned_tokens_by_index` dictionary, one derived
    /// item key per index below the current balance.
    pub async fn tokens_of(&self, account: &PublicKey) -> Result<Vec<String>, Error> {
        let owner_key = Recipient::PublicKey(account.clone()).to_key();
        let balance = self.balance_of(account).await?;

        let mut token_ids = Vec::new();
        let mut index = U256::zero();
        while index < balance {
            let item_key = utils::key_and_value_to_str(&owner_key, &index)?;
            let token_id: String = self
                .client
                .query_dictionary_value("owned_tokens_by_index", &item_key)
                .await?;
            token_ids.push(token_id);
            index += U256::one();
        }
        Ok(token_ids)
    }

    pub async fn pause(
        &self,
        secret_key: &SecretKey,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        self.call(secret_key, "pause", RuntimeArgs::new(), payment_amount, ttl)
            .await
    }

    pub async fn unpause(
        &self,
        secret_key: &SecretKey,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        self.call(secret_key, "unpause", RuntimeArgs::new(), payment_amount, ttl)
            .await
    }

    pub async fn mint_one(
        &self,
        secret_key: &SecretKey,
        recipient: &Recipient,
        token_id: Option<String>,
        token_meta: Meta,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        let args = mint_one_args(recipient, token_id, token_meta);
        self.tracked_call(secret_key, "mint", args, payment_amount, ttl, CEP47Event::MintOne)
            .await
    }

    pub async fn mint_copies(
        &self,
        secret_key: &SecretKey,
        recipient: &Recipient,
        token_meta: Meta,
        token_ids: Option<Vec<String>>,
        count: u32,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        let args = runtime_args! {
            "count" => count,
            "recipient" => recipient.to_key(),
            "token_ids" => token_ids,
            "token_meta" => token_meta,
        };
        self.tracked_call(
            secret_key,
            "mint_copies",
            args,
            payment_amount,
            ttl,
            CEP47Event::MintOne,
        )
        .await
    }

    pub async fn mint_many(
        &self,
        secret_key: &SecretKey,
        recipient: &Recipient,
        token_metas: Vec<Meta>,
        token_ids: Option<Vec<String>>,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        let args = mint_many_args(recipient, token_metas, token_ids)?;
        self.tracked_call(
            secret_key,
            "mint_many",
            args,
            payment_amount,
            ttl,
            CEP47Event::MintOne,
        )
        .await
    }

    pub async fn update_token_metadata(
        &self,
        secret_key: &SecretKey,
        token_id: &str,
        token_meta: Meta,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        let args = runtime_args! {
            "token_id" => token_id,
            "token_meta" => token_meta,
        };
        self.tracked_call(
            secret_key,
            "update_token_metadata",
            args,
            payment_amount,
            ttl,
            CEP47Event::MetadataUpdate,
        )
        .await
    }

    pub async fn burn_one(
        &self,
        secret_key: &SecretKey,
        owner: &Recipient,
        token_id: &str,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        let args = runtime_args! {
            "owner" => owner.to_key(),
            "token_id" => token_id,
        };
        self.tracked_call(secret_key, "burn_one", args, payment_amount, ttl, CEP47Event::BurnOne)
            .await
    }

    pub async fn burn_many(
        &self,
        secret_key: &SecretKey,
        owner: &Recipient,
        token_ids: Vec<String>,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        let args = runtime_args! {
            "owner" => owner.to_key(),
            "token_ids" => token_ids,
        };
        self.tracked_call(secret_key, "burn_many", args, payment_amount, ttl, CEP47Event::BurnOne)
            .await
    }

    pub async fn transfer_token(
        &self,
        secret_key: &SecretKey,
        recipient: &Recipient,
        token_id: &str,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        let args = runtime_args! {
            "recipient" => recipient.to_key(),
            "token_id" => token_id,
        };
        self.tracked_call(
            secret_key,
            "transfer_token",
            args,
            payment_amount,
            ttl,
            CEP47Event::TransferToken,
        )
        .await
    }

    pub async fn transfer_many_tokens(
        &self,
        secret_key: &SecretKey,
        recipient: &Recipient,
        token_ids: Vec<String>,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        let args = runtime_args! {
            "recipient" => recipient.to_key(),
            "token_ids" => token_ids,
        };
        self.tracked_call(
            secret_key,
            "transfer_many_tokens",
            args,
            payment_amount,
            ttl,
            CEP47Event::TransferToken,
        )
        .await
    }

    pub async fn transfer_all_tokens(
        &self,
        secret_key: &SecretKey,
        recipient: &Recipient,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        let args = runtime_args! {
            "recipient" => recipient.to_key(),
        };
        self.tracked_call(
            secret_key,
            "transfer_all_tokens",
            args,
            payment_amount,
            ttl,
            CEP47Event::TransferToken,
        )
        .await
    }

    /// Subscribes the callback to the given event kinds of this contract.
    pub fn on_event(
        &self,
        events: &[CEP47Event],
        callback: EventCallback,
    ) -> Result<EventHandle, Error> {
        let names = events.iter().map(|event| event.name().to_string()).collect();
        self.client.handle_events(names, callback)
    }

    async fn call(
        &self,
        secret_key: &SecretKey,
        entry_point: &str,
        runtime_args: RuntimeArgs,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
    ) -> Result<String, Error> {
        self.client
            .contract_call(ContractCall {
                secret_key,
                entry_point,
                runtime_args,
                payment_amount,
                ttl,
            })
            .await
    }

    async fn tracked_call(
        &self,
        secret_key: &SecretKey,
        entry_point: &str,
        runtime_args: RuntimeArgs,
        payment_amount: U512,
        ttl: Option<TimeDiff>,
        event: CEP47Event,
    ) -> Result<String, Error> {
        let deploy_hash = self
            .call(secret_key, entry_point, runtime_args, payment_amount, ttl)
            .await?;
        self.client.record_pending(event.name(), &deploy_hash);
        Ok(deploy_hash)
    }
}

fn mint_one_args(recipient: &Recipient, token_id: Option<String>, token_meta: Meta) -> RuntimeArgs {
    runtime_args! {
        "recipient" => recipient.to_key(),
        "token_ids" => token_id.map(|id| vec![id]),
        "token_metas" => vec![token_meta],
    }
}

fn mint_many_args(
    recipient: &Recipient,
    token_metas: Vec<Meta>,
    token_ids: Option<Vec<String>>,
) -> Result<RuntimeArgs, Error> {
    if let Some(ids) = &token_ids {
        if ids.len() != token_metas.len() {
            return Err(Error::InvalidArgument(format!(
                "ids length ({}) not equal to metas length ({})",
                ids.len(),
                token_metas.len()
            )));
        }
    }
    Ok(runtime_args! {
        "recipient" => recipient.to_key(),
        "token_ids" => token_ids,
        "token_metas" => token_metas,
    })
}
