use std::fs;
use std::path::PathBuf;

use casper_cep47_client::CEP47Client;
use casper_client_helper::{Error, Recipient};
use casper_types::{PublicKey, U512};
use clap::Parser;
use tracing::info;

/// Installs the CEP47 contract and prints its hash.
#[derive(Parser)]
struct Args {
    #[arg(long, env = "NODE_ADDRESS")]
    node_address: String,
    #[arg(long, env = "CHAIN_NAME")]
    chain_name: String,
    #[arg(long, env = "WASM_PATH")]
    wasm_path: PathBuf,
    #[arg(long, env = "SECRET_KEY_PATH")]
    secret_key_path: PathBuf,
    #[arg(long, env = "TOKEN_NAME")]
    token_name: String,
    #[arg(long, env = "CONTRACT_NAME")]
    contract_name: String,
    #[arg(long, env = "TOKEN_SYMBOL")]
    token_symbol: String,
    #[arg(long, env = "TOKEN_META", default_value = "")]
    token_meta: String,
    #[arg(long, env = "INSTALL_PAYMENT_AMOUNT", default_value = "200000000000")]
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
    let module_bytes = fs::read(&args.wasm_path)
        .map_err(|err| Error::InvalidArgument(format!("{}: {}", args.wasm_path.display(), err)))?;

    let cep47 = CEP47Client::new(&args.node_address, &args.chain_name, None);

    let deploy_hash = cep47
        .install(
            &secret_key,
            module_bytes,
            &args.token_name,
            &args.contract_name,
            &args.token_symbol,
            e2e::parse_token_meta(&args.token_meta),
            &Recipient::PublicKey(public_key.clone()),
            payment_amount,
        )
        .await?;
    info!(%deploy_hash, "contract installation submitted");

    e2e::await_deploy(cep47.client.node(), &deploy_hash).await?;

    let contract_hash = e2e::account_named_key(
        cep47.client.node(),
        &public_key,
        &format!("{}_contract_hash", args.contract_name),
    )
    .await?;
    info!(%contract_hash, "contract installed");

    Ok(())
}
