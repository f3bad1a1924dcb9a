//! Shared helpers for the end-to-end binaries.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use casper_client_helper::error::Error;
use casper_client_helper::rpc::NodeClient;
use casper_types::{PublicKey, SecretKey};
use tracing::info;

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const POLL_ATTEMPTS: u32 = 150;

pub fn load_secret_key(path: &Path) -> Result<SecretKey, Error> {
    SecretKey::from_file(path)
        .map_err(|err| Error::InvalidKey(format!("{}: {}", path.display(), err)))
}

/// `key=value,key=value`, the shape the install scripts take token metadata
/// in. Malformed pairs are dropped.
pub fn parse_token_meta(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(name), Some(value)) if !name.trim().is_empty() => {
                    Some((name.trim().to_string(), value.trim().to_string()))
                }
                _ => None,
            }
        })
        .collect()
}

/// Polls the node until the deploy has been executed. Fails on an on-chain
/// failure, and gives up after a few minutes.
pub async fn await_deploy(node: &Arc<dyn NodeClient>, deploy_hash: &str) -> Result<(), Error> {
    for _ in 0..POLL_ATTEMPTS {
        if let Some(outcome) = node.deploy_status(deploy_hash.to_string()).await? {
            if outcome.success {
                info!(%deploy_hash, "deploy processed");
                return Ok(());
            }
            return Err(Error::Rpc(
                outcome
                    .error_message
                    .unwrap_or_else(|| "deploy failed".to_string()),
            ));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    Err(Error::Rpc(format!(
        "deploy {} not processed in time",
        deploy_hash
    )))
}

/// Resolves a named key of the account, the way installed contract hashes
/// are discovered.
pub async fn account_named_key(
    node: &Arc<dyn NodeClient>,
    public_key: &PublicKey,
    name: &str,
) -> Result<String, Error> {
    let account = node.account_info(public_key.clone()).await?;
    account
        .named_keys
        .get(name)
        .cloned()
        .ok_or_else(|| Error::MissingNamedKey(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_meta_pairs_parse_and_trim() {
        let meta = parse_token_meta("color=red, size = small,broken");
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.get("color").unwrap(), "red");
        assert_eq!(meta.get("size").unwrap(), "small");
    }

    #[test]
    fn empty_meta_input_yields_an_empty_map() {
        assert!(parse_token_meta("").is_empty());
    }
}
