use std::path::PathBuf;

use casper_client_helper::{Error, Recipient};
use casper_erc20_client::{ERC20Client, ERC20Event};
use casper_types::{AsymmetricType, PublicKey, U256, U512};
use clap::Parser;
use tracing::info;

/// Drives a deployed ERC20 contract: metadata reads, a transfer, an
/// approval, and the corresponding balance and allowance lookups.
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
    /// Hex public key of the transfer recipient and allowance spender.
    #[arg(long, env = "RECEIVER_PUBLIC_KEY")]
    receiver: String,
    #[arg(long, env = "TRANSFER_AMOUNT", default_value = "100")]
    transfer_amount: String,
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
    let amount = U256::from_dec_str(&args.transfer_amount)
        .map_err(|_| Error::InvalidArgument(format!("bad transfer amount {}", args.transfer_amount)))?;
    let receiver = PublicKey::from_hex(&args.receiver)
        .map_err(|_| Error::InvalidArgument(format!("bad receiver key {}", args.receiver)))?;

    let mut erc20 = ERC20Client::new(
        &args.node_address,
        &args.chain_name,
        Some(&args.event_stream_address),
    );

    let contract_hash =
        e2e::account_named_key(erc20.client.node(), &public_key, "erc20_token_contract").await?;
    info!(%contract_hash, "attaching to contract");
    erc20.set_contract_hash(&contract_hash).await?;

    let listener = erc20.on_event(
        &[ERC20Event::Transfer, ERC20Event::Approve],
        Box::new(|notification| info!(?notification, "event")),
    )?;

    info!(
        name = %erc20.name().await?,
        symbol = %erc20.symbol().await?,
        decimals = erc20.decimals().await?,
        total_supply = %erc20.total_supply().await?,
        "contract metadata",
    );

    let owner = Recipient::PublicKey(public_key.clone());
    let recipient = Recipient::PublicKey(receiver.clone());
    info!(balance = %erc20.balance_of(&owner).await?, "owner balance");

    let deploy_hash = erc20
        .transfer(&secret_key, &recipient, amount, payment_amount, None)
        .await?;
    info!(%deploy_hash, "transfer submitted");
    e2e::await_deploy(erc20.client.node(), &deploy_hash).await?;
    info!(balance = %erc20.balance_of(&recipient).await?, "recipient balance");

    let deploy_hash = erc20
        .approve(&secret_key, &recipient, amount, payment_amount, None)
        .await?;
    info!(%deploy_hash, "approval submitted");
    e2e::await_deploy(erc20.client.node(), &deploy_hash).await?;
    info!(allowance = %erc20.allowances(&owner, &recipient).await?, "allowance");

    listener.stop();
    Ok(())
}
