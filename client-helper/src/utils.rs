use core::convert::TryInto;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use casper_hashing::Digest;
use casper_types::account::AccountHash;
use casper_types::bytesrepr::ToBytes;
use casper_types::{CLTyped, ContractHash, Key, URef};

use crate::error::Error;

/// Hex-encoded BLAKE2b-256 of `bytes(key_a) || bytes(key_b)`.
///
/// This is the item key the contracts derive internally for dictionaries
/// addressed by a pair of keys (allowances by owner and spender, and the
/// like). It must match the on-chain derivation byte for byte: a mismatch
/// surfaces as a missing dictionary item, not as an error.
pub fn keys_to_str(key_a: &Key, key_b: &Key) -> Result<String, Error> {
    let mut bytes = key_a.to_bytes()?;
    bytes.append(&mut key_b.to_bytes()?);
    Ok(hex::encode(Digest::hash(&bytes).value()))
}

/// Like [`keys_to_str`], with an arbitrary serializable value as the second
/// operand. Used for owner-plus-index lookups such as `owned_tokens_by_index`.
pub fn key_and_value_to_str<T: CLTyped + ToBytes>(key: &Key, value: &T) -> Result<String, Error> {
    let mut bytes = key.to_bytes()?;
    bytes.append(&mut value.to_bytes()?);
    Ok(hex::encode(Digest::hash(&bytes).value()))
}

/// Item key for a dictionary addressed by its seed URef and a string id,
/// in the `dictionary-` form accepted by `state_get_dictionary_item`.
pub fn seeded_dictionary_key(seed_uref: &str, id: &str) -> Result<String, Error> {
    let uref =
        URef::from_formatted_str(seed_uref).map_err(|_| Error::InvalidKey(seed_uref.to_string()))?;
    let mut bytes = uref.addr().to_vec();
    bytes.extend_from_slice(id.as_bytes());
    Ok(format!("dictionary-{}", hex::encode(Digest::hash(&bytes).value())))
}

/// Base64 form of a key's canonical bytes. The ERC20 contract addresses its
/// balances dictionary this way.
pub fn base64_item_key(key: &Key) -> Result<String, Error> {
    Ok(STANDARD.encode(key.to_bytes()?))
}

/// Plain hex of an account hash, the item key the CEP47 contract uses for
/// per-account dictionaries.
pub fn account_hash_string(account: &AccountHash) -> String {
    hex::encode(account.value())
}

/// Strips the textual prefixes the node attaches to hash-like named keys.
pub fn strip_hash_prefix(hash: &str) -> &str {
    hash.trim_start_matches("contract-package-wasm")
        .trim_start_matches("contract-package-")
        .trim_start_matches("contract-")
        .trim_start_matches("hash-")
}

pub fn contract_hash_from_str(hash: &str) -> Result<ContractHash, Error> {
    let raw = strip_hash_prefix(hash);
    let bytes = hex::decode(raw).map_err(|_| Error::InvalidKey(hash.to_string()))?;
    let addr: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::InvalidKey(hash.to_string()))?;
    Ok(ContractHash::new(addr))
}
