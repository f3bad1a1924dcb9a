use casper_types::bytesrepr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("only one event listener can be active at a time; stop the previous one first")]
    AlreadyListening,

    #[error("event stream address is not configured")]
    EventStreamNotConfigured,

    #[error("contract hash is not set")]
    ContractHashNotSet,

    #[error("named key `{0}` is not tracked for this contract")]
    MissingNamedKey(String),

    #[error("failed to serialize value: {0:?}")]
    Serialization(bytesrepr::Error),

    #[error("queried value is absent or malformed")]
    InvalidStoredValue,

    #[error("invalid key string `{0}`")]
    InvalidKey(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("failed to build deploy: {0}")]
    DeployBuild(String),

    #[error("node rpc call failed: {0}")]
    Rpc(String),

    #[error("event stream failed: {0}")]
    EventStream(#[from] reqwest::Error),
}

impl From<bytesrepr::Error> for Error {
    fn from(err: bytesrepr::Error) -> Self {
        Error::Serialization(err)
    }
}

impl From<casper_client::Error> for Error {
    fn from(err: casper_client::Error) -> Self {
        Error::Rpc(err.to_string())
    }
}
