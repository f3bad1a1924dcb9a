use std::collections::BTreeMap;
use std::path::PathBuf;

use casper_cep47_client::{CEP47Client, CEP47Event};
use casper_client_helper::{Error, Recipient};
use casper_types::{AsymmetricType, PublicKey, U512};
use clap::Parser;
use tracing::info;

/// Drives a deployed CEP47 contract through a full mint / inspect /
/// transfer / burn round trip, with an event listener attached.
#[derive(Parser)]
struct Args {
    #[arg(long, env = "NODE_ADDRESS")]
    node_address: String,
    #[arg(long, env = "EVENT_STREAM_ADDRESS")]
    event_stream_address: String,
    #[arg(long, env = "CHAIN_NAME")]
    chain_name: String,
    #[arg(long, env = "SECRET_KEY_PATH")]
    secret_key_path: PathBuf,
    #[arg(long, env = "CONTRACT_NAME")]
    contract_name: String,
    /// Hex public key receiving the transferred token; defaults to the
    /// signing account.
    #[arg(long, env = "RECEIVER_PUBLIC_KEY")]
    receiver: Option<String>,
    #[arg(long, env = "PAYMENT_AMOUNT", default_value = "1000000000")]
    payment_amount: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let secret_key = e2e::load_secret_key(&args.secret_key_path)?;
    let public_key = PublicKey::from(&secret_key);
    let payment_amount = U512::from_dec_str(&args.payment_amount)
        .map_err(|_| Error::InvalidArgument(format!("bad payment amount {}", args.payment_amount)))?;
    let receiver = match &args.receiver {
        Some(hex) => PublicKey::from_hex(hex)
            .map_err(|_| Error::InvalidArgument(format!("bad receiver key {}", hex)))?,
        None => public_key.clone(),
    };

    let mut cep47 = CEP47Client::new(
        &args.node_address,
        &args.chain_name,
        Some(&args.event_stream_address),
    );

    let contract_hash = e2e::account_named_key(
        cep47.client.node(),
        &public_key,
        &format!("{}_contract_hash", args.contract_name),
    )
    .await?;
    info!(%contract_hash, "attaching to contract");
    cep47.set_contract_hash(&contract_hash).await?;

    let listener = cep47.on_event(
        &[
            CEP47Event::MintOne,
            CEP47Event::BurnOne,
            CEP47Event::TransferToken,
            CEP47Event::MetadataUpdate,
        ],
        Box::new(|notification| {
            if notification.success {
                info!(
                    event = %notification.event_name,
                    deploy_hash = %notification.deploy_hash,
                    data = ?notification.data,
                    "event",
                );
            } else {
                info!(
                    event = %notification.event_name,
                    deploy_hash = %notification.deploy_hash,
                    error = ?notification.error,
                    "deploy failed",
                );
            }
        }),
    )?;

    info!(name = %cep47.name().await?, symbol = %cep47.symbol().await?, "contract metadata");
    info!(meta = ?cep47.meta().await?, total_supply = %cep47.total_supply().await?, "state");
    info!(balance = %cep47.balance_of(&public_key).await?, "initial balance");

    let mut token_meta = BTreeMap::new();
    token_meta.insert("name".to_string(), "one".to_string());
    let deploy_hash = cep47
        .mint_one(
            &secret_key,
            &Recipient::PublicKey(public_key.clone()),
            None,
            token_meta,
            payment_amount,
            None,
        )
        .await?;
    info!(%deploy_hash, "mint submitted");
    e2e::await_deploy(cep47.client.node(), &deploy_hash).await?;

    let tokens = cep47.tokens_of(&public_key).await?;
    info!(?tokens, total_supply = %cep47.total_supply().await?, "after mint");

    let token_id = tokens
        .first()
        .cloned()
        .ok_or_else(|| Error::InvalidArgument("no token minted".to_string()))?;
    info!(owner = %cep47.owner_of(&token_id).await?, issuer = %cep47.issuer_of(&token_id).await?, "token ownership");
    info!(meta = ?cep47.token_meta(&token_id).await?, "token metadata");

    let mut new_meta = BTreeMap::new();
    new_meta.insert("color".to_string(), "red".to_string());
    new_meta.insert("flavour".to_string(), "vanilla".to_string());
    let deploy_hash = cep47
        .update_token_metadata(&secret_key, &token_id, new_meta, payment_amount, None)
        .await?;
    e2e::await_deploy(cep47.client.node(), &deploy_hash).await?;
    info!(meta = ?cep47.token_meta(&token_id).await?, "token metadata updated");

    let deploy_hash = cep47
        .transfer_token(
            &secret_key,
            &Recipient::PublicKey(receiver.clone()),
            &token_id,
            payment_amount,
            None,
        )
        .await?;
    e2e::await_deploy(cep47.client.node(), &deploy_hash).await?;
    info!(owner = %cep47.owner_of(&token_id).await?, "token transferred");

    let deploy_hash = cep47
        .burn_one(
            &secret_key,
            &Recipient::PublicKey(receiver),
            &token_id,
            payment_amount,
            None,
        )
        .await?;
    e2e::await_deploy(cep47.client.node(), &deploy_hash).await?;
    info!(total_supply = %cep47.total_supply().await?, "token burnt");

    listener.stop();
    Ok(())
}
