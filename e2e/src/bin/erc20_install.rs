use std::fs;
use std::path::PathBuf;

use casper_client_helper::Error;
use casper_erc20_client::ERC20Client;
use casper_types::{PublicKey, U256, U512};
use clap::Parser;
use tracing::info;

/// Installs the ERC20 contract and prints its hash.
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
    #[arg(long, env = "TOKEN_SYMBOL")]
    token_symbol: String,
    #[arg(long, env = "TOKEN_DECIMALS", default_value = "18")]
    token_decimals: u8,
    #[arg(long, env = "TOKEN_SUPPLY")]
    token_supply: String,
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
    let total_supply = U256::from_dec_str(&args.token_supply)
        .map_err(|_| Error::InvalidArgument(format!("bad token supply {}", args.token_supply)))?;
    let module_bytes = fs::read(&args.wasm_path)
        .map_err(|err| Error::InvalidArgument(format!("{}: {}", args.wasm_path.display(), err)))?;

    let erc20 = ERC20Client::new(&args.node_address, &args.chain_name, None);

    let deploy_hash = erc20
        .install(
            &secret_key,
            module_bytes,
            &args.token_name,
            &args.token_symbol,
            args.token_decimals,
            total_supply,
            payment_amount,
        )
        .await?;
    info!(%deploy_hash, "contract installation submitted");

    e2e::await_deploy(erc20.client.node(), &deploy_hash).await?;

    let contract_hash =
        e2e::account_named_key(erc20.client.node(), &public_key, "erc20_token_contract").await?;
    info!(%contract_hash, "contract installed");

    Ok(())
}
