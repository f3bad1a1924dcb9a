//! Shared plumbing for Casper contract clients: the node RPC seam, deploy
//! submission, dictionary key derivation, and deploy/event correlation
//! against the node's event stream.

pub mod address;
pub mod client;
pub mod error;
pub mod events;
pub mod rpc;
pub mod utils;
pub mod watcher;

pub use address::Recipient;
pub use client::{CasperContractClient, ContractCall, DEFAULT_TTL_MS};
pub use error::Error;
pub use events::{ContractEvent, EventNotification};
pub use rpc::{AccountInfo, CasperNodeClient, ContractInfo, Deploy, DeployOutcome, NodeClient};
pub use watcher::{DeployWatcher, EventCallback, EventHandle, ListenerState, PendingDeploy};
