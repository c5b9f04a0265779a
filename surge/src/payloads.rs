//! JSON-RPC tool-call bodies posted to the validation endpoint.

use serde_json::{Map, Value, json};

pub(crate) const VALIDATE_PATH: &str = "/validate";

const LARGE_DATA_LEN: usize = 10_000;
const LARGE_METADATA_FIELDS: usize = 100;

fn tool_call(name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "tools/call",
        "params": {
            "name": name,
            "arguments": arguments,
        },
    })
}

/// A benign file read.
pub(crate) fn safe_tool_call() -> Value {
    tool_call("read_file", json!({ "path": "/tmp/safe_file.txt" }))
}

/// A call a policy engine is expected to reject.
pub(crate) fn dangerous_tool_call() -> Value {
    tool_call("exec", json!({ "command": "rm -rf /" }))
}

/// Roughly 10 KiB of arguments.
pub(crate) fn large_tool_call() -> Value {
    let metadata: Map<String, Value> = (0..LARGE_METADATA_FIELDS)
        .map(|i| (format!("field_{i}"), Value::String(format!("value_{i}"))))
        .collect();

    tool_call(
        "process_data",
        json!({
            "data": "x".repeat(LARGE_DATA_LEN),
            "metadata": metadata,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_calls_are_json_rpc() {
        for v in [safe_tool_call(), dangerous_tool_call(), large_tool_call()] {
            assert_eq!(v["jsonrpc"], "2.0");
            assert_eq!(v["method"], "tools/call");
            assert!(v["params"]["arguments"].is_object());
        }
        assert_eq!(dangerous_tool_call()["params"]["name"], "exec");
    }

    #[test]
    fn large_payload_is_about_ten_kib() {
        let encoded = serde_json::to_vec(&large_tool_call()).unwrap_or_default();
        assert!(encoded.len() > LARGE_DATA_LEN);
        assert!(encoded.len() < 2 * LARGE_DATA_LEN);
        assert_eq!(
            large_tool_call()["params"]["arguments"]["metadata"]
                .as_object()
                .map(Map::len),
            Some(LARGE_METADATA_FIELDS)
        );
    }
}
