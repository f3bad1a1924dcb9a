use casper_types::account::AccountHash;
use casper_types::{HashAddr, Key, PublicKey};

/// The recipient of a token operation, in any of the three forms the
/// contracts accept.
///
/// A public key is normalized to its account hash, so the public-key form
/// and the account-hash form of the same account serialize to identical
/// bytes and derive identical dictionary item keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recipient {
    PublicKey(PublicKey),
    AccountHash(AccountHash),
    Hash(HashAddr),
}

impl Recipient {
    /// The canonical `Key` the contract stores and hashes.
    pub fn to_key(&self) -> Key {
        match self {
            Recipient::PublicKey(public_key) => Key::Account(public_key.to_account_hash()),
            Recipient::AccountHash(account_hash) => Key::Account(*account_hash),
            Recipient::Hash(addr) => Key::Hash(*addr),
        }
    }
}

impl From<PublicKey> for Recipient {
    fn from(public_key: PublicKey) -> Self {
        Recipient::PublicKey(public_key)
    }
}

impl From<AccountHash> for Recipient {
    fn from(account_hash: AccountHash) -> Self {
        Recipient::AccountHash(account_hash)
    }
}

impl From<&Recipient> for Key {
    fn from(recipient: &Recipient) -> Self {
        recipient.to_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casper_types::SecretKey;

    fn public_key() -> PublicKey {
        let secret_key = SecretKey::secp256k1_from_bytes(&[221u8; 32]).unwrap();
        PublicKey::from(&secret_key)
    }

    #[test]
    fn public_key_normalizes_to_account_hash() {
        let pk = public_key();
        let as_public_key = Recipient::PublicKey(pk.clone()).to_key();
        let as_account_hash = Recipient::AccountHash(pk.to_account_hash()).to_key();
        assert_eq!(as_public_key, as_account_hash);
    }

    #[test]
    fn raw_hash_maps_to_hash_key() {
        let addr = [7u8; 32];
        assert_eq!(Recipient::Hash(addr).to_key(), Key::Hash(addr));
    }
}
