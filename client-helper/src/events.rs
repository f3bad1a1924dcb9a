use std::collections::BTreeMap;

use casper_types::bytesrepr;
use serde::Deserialize;
use serde_json::Value;

/// One message from the node's server-sent event stream. Anything that is
/// not a deploy outcome (api version, block added, step, ...) deserializes
/// with `deploy_processed` unset and is skipped by the listener.
#[derive(Debug, Deserialize)]
pub struct StreamMessage {
    #[serde(rename = "DeployProcessed")]
    pub deploy_processed: Option<DeployProcessed>,
}

/// The execution outcome of a single deploy, as delivered by the stream.
#[derive(Clone, Debug, Deserialize)]
pub struct DeployProcessed {
    pub deploy_hash: String,
    pub execution_result: ExecutionResult,
}

#[derive(Clone, Debug, Deserialize)]
pub enum ExecutionResult {
    Success { effect: ExecutionEffect },
    Failure { error_message: String },
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExecutionEffect {
    #[serde(default)]
    pub transforms: Vec<TransformEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TransformEntry {
    pub key: String,
    pub transform: Value,
}

/// A domain event recovered from a deploy's execution effects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractEvent {
    pub name: String,
    pub data: BTreeMap<String, String>,
}

/// What an event callback receives: either the failure of a tracked deploy,
/// or one matched event record of a successful one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventNotification {
    pub event_name: String,
    pub deploy_hash: String,
    pub success: bool,
    pub error: Option<String>,
    pub data: Option<BTreeMap<String, String>>,
}

const EVENT_TYPE: &str = "event_type";
const CONTRACT_PACKAGE_HASH: &str = "contract_package_hash";

fn is_string_map(cl_type: &Value) -> bool {
    cl_type.get("Map").map_or(false, |map| {
        map.get("key").and_then(Value::as_str) == Some("String")
            && map.get("value").and_then(Value::as_str) == Some("String")
    })
}

/// Decodes a `WriteCLValue` transform whose payload is a string-to-string
/// map. Any other transform shape yields `None`.
fn write_cl_value_map(transform: &Value) -> Option<BTreeMap<String, String>> {
    let write = transform.get("WriteCLValue")?;
    if !is_string_map(write.get("cl_type")?) {
        return None;
    }
    let bytes = hex::decode(write.get("bytes")?.as_str()?).ok()?;
    bytesrepr::deserialize::<BTreeMap<String, String>>(bytes).ok()
}

/// Filters a successful deploy's transforms down to the event records
/// emitted by the given contract package under one of the subscribed names.
/// Transform order is preserved.
pub fn collect_events(
    transforms: &[TransformEntry],
    contract_package_hash: &str,
    event_names: &[String],
) -> Vec<ContractEvent> {
    transforms
        .iter()
        .filter_map(|entry| {
            let data = write_cl_value_map(&entry.transform)?;
            // the node does not guarantee checksum casing on package hashes
            let package_matches = data
                .get(CONTRACT_PACKAGE_HASH)
                .map_or(false, |package| package.eq_ignore_ascii_case(contract_package_hash));
            if !package_matches {
                return None;
            }
            let name = data.get(EVENT_TYPE)?.clone();
            if !event_names.contains(&name) {
                return None;
            }
            Some(ContractEvent { name, data })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use casper_types::bytesrepr::ToBytes;
    use serde_json::json;

    const PACKAGE: &str = "a2e27b2ab7b8b96bd265597a0a6bdbdcbf303f42ce01ad0e93b355a6b90726b9";

    fn event_transform(package: &str, event_type: &str, extra: &[(&str, &str)]) -> Value {
        let mut map = BTreeMap::new();
        map.insert(CONTRACT_PACKAGE_HASH.to_string(), package.to_string());
        map.insert(EVENT_TYPE.to_string(), event_type.to_string());
        for (name, value) in extra {
            map.insert((*name).to_string(), (*value).to_string());
        }
        json!({
            "key": "uref-0000000000000000000000000000000000000000000000000000000000000000-007",
            "transform": {
                "WriteCLValue": {
                    "cl_type": { "Map": { "key": "String", "value": "String" } },
                    "bytes": hex::encode(map.to_bytes().unwrap()),
                    "parsed": null,
                }
            }
        })
    }

    fn entries(transforms: Vec<Value>) -> Vec<TransformEntry> {
        transforms
            .into_iter()
            .map(|t| serde_json::from_value(t).unwrap())
            .collect()
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn non_outcome_stream_messages_are_skipped() {
        let message: StreamMessage =
            serde_json::from_str(r#"{"ApiVersion":"1.5.6"}"#).unwrap();
        assert!(message.deploy_processed.is_none());
    }

    #[test]
    fn failure_outcomes_deserialize_with_error_message() {
        let processed: DeployProcessed = serde_json::from_value(json!({
            "deploy_hash": "dead",
            "execution_result": {
                "Failure": {
                    "effect": { "operations": [], "transforms": [] },
                    "transfers": [],
                    "cost": "100",
                    "error_message": "User error: 65027"
                }
            }
        }))
        .unwrap();
        match processed.execution_result {
            ExecutionResult::Failure { error_message } => {
                assert_eq!(error_message, "User error: 65027")
            }
            ExecutionResult::Success { .. } => panic!("expected failure"),
        }
    }

    #[test]
    fn collect_events_keeps_transform_order() {
        let transforms = entries(vec![
            event_transform(PACKAGE, "cep47_mint_one", &[("token_id", "1")]),
            event_transform(PACKAGE, "cep47_mint_one", &[("token_id", "2")]),
        ]);
        let events = collect_events(&transforms, PACKAGE, &names(&["cep47_mint_one"]));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data.get("token_id").unwrap(), "1");
        assert_eq!(events[1].data.get("token_id").unwrap(), "2");
    }

    #[test]
    fn collect_events_filters_foreign_packages_and_names() {
        let other_package = "b".repeat(64);
        let transforms = entries(vec![
            event_transform(&other_package, "cep47_mint_one", &[]),
            event_transform(PACKAGE, "cep47_burn_one", &[]),
            event_transform(PACKAGE, "cep47_mint_one", &[]),
        ]);
        let events = collect_events(&transforms, PACKAGE, &names(&["cep47_mint_one"]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "cep47_mint_one");
    }

    #[test]
    fn package_comparison_ignores_case() {
        let transforms = entries(vec![event_transform(
            &PACKAGE.to_uppercase(),
            "cep47_mint_one",
            &[],
        )]);
        let events = collect_events(&transforms, PACKAGE, &names(&["cep47_mint_one"]));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn non_map_writes_are_ignored() {
        let transforms = entries(vec![
            json!({
                "key": "uref-0000000000000000000000000000000000000000000000000000000000000000-007",
                "transform": "Identity",
            }),
            json!({
                "key": "uref-0000000000000000000000000000000000000000000000000000000000000000-007",
                "transform": {
                    "WriteCLValue": { "cl_type": "U256", "bytes": "00", "parsed": "0" }
                },
            }),
        ]);
        assert!(collect_events(&transforms, PACKAGE, &names(&["cep47_mint_one"])).is_empty());
    }
}
