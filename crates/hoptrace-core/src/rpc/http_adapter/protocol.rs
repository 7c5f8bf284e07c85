use crate::error::{CoreError, RpcError};

/// One JSON-RPC call. Batches are serialized as a JSON array of these.
#[derive(serde::Serialize)]
pub(super) struct JsonRpcRequest<'a> {
    pub(super) jsonrpc: &'static str,
    pub(super) id: u64,
    pub(super) method: &'a str,
    pub(super) params: &'a [serde_json::Value],
}

/// One JSON-RPC reply. `id` is only inspected for batch replies, which
/// the server may return in any order.
#[derive(serde::Deserialize)]
pub(super) struct JsonRpcResponse {
    #[serde(default)]
    pub(super) id: serde_json::Value,
    pub(super) result: Option<serde_json::Value>,
    pub(super) error: Option<serde_json::Value>,
}

impl JsonRpcResponse {
    /// Turn the reply into its `result`, or the structured error it carries.
    /// A missing `result` is treated as JSON `null`.
    pub(super) fn into_result(self) -> Result<serde_json::Value, CoreError> {
        match self.error {
            Some(err) if !err.is_null() => Err(parse_jsonrpc_error(err)),
            _ => Ok(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}

/// Parse a JSON-RPC error value into a structured `CoreError`.
///
/// Errors shaped like `{"code": <int>, "message": <string>}` become
/// `ServerError`; anything else falls back to `InvalidResponse`.
pub(super) fn parse_jsonrpc_error(err: serde_json::Value) -> CoreError {
    #[derive(serde::Deserialize)]
    struct JsonRpcError {
        code: i64,
        message: String,
    }

    match serde_json::from_value::<JsonRpcError>(err.clone()) {
        Ok(parsed) => RpcError::ServerError {
            code: parsed.code,
            message: parsed.message,
        }
        .into(),
        Err(_) => RpcError::InvalidResponse(format!("non-standard JSON-RPC error: {err}")).into(),
    }
}

/// Batch reply ids come back as numbers from Bitcoin Core, but some
/// proxies stringify them.
pub(super) fn parse_batch_id(id: &serde_json::Value) -> Result<u64, CoreError> {
    if let Some(n) = id.as_u64() {
        return Ok(n);
    }

    if let Some(s) = id.as_str() {
        return s.parse::<u64>().map_err(|e| {
            RpcError::InvalidResponse(format!("invalid batch response id string: {e}")).into()
        });
    }

    Err(RpcError::InvalidResponse(format!("invalid batch response id: {id}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_batch_id_accepts_number_and_string() {
        assert_eq!(parse_batch_id(&serde_json::json!(42)).expect("number"), 42);
        assert_eq!(parse_batch_id(&serde_json::json!("123")).expect("string"), 123);
        assert!(parse_batch_id(&serde_json::json!(true)).is_err());
    }

    #[test]
    fn standard_error_becomes_server_error() {
        let err = parse_jsonrpc_error(serde_json::json!({
            "code": -5,
            "message": "No information available for address"
        }));
        assert!(matches!(
            err,
            CoreError::Rpc(RpcError::ServerError { code: -5, .. })
        ));
    }

    #[test]
    fn odd_error_shape_becomes_invalid_response() {
        let err = parse_jsonrpc_error(serde_json::json!("boom"));
        assert!(matches!(err, CoreError::Rpc(RpcError::InvalidResponse(_))));
    }

    #[test]
    fn null_error_field_yields_result() {
        let response: JsonRpcResponse =
            serde_json::from_str(r#"{"result": ["ab"], "error": null, "id": 1}"#)
                .expect("valid response");
        assert_eq!(
            response.into_result().expect("no error"),
            serde_json::json!(["ab"])
        );
    }
}
