use bitcoin::Txid;

/// Failures talking to the JSON-RPC endpoint.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("HTTP transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("RPC request timed out")]
    Timeout,

    #[error("JSON-RPC server error {code}: {message}")]
    ServerError { code: i64, message: String },

    #[error("invalid JSON-RPC response: {0}")]
    InvalidResponse(String),

    #[error("missing JSON-RPC batch item id={id}")]
    MissingBatchItem { id: u64 },
}

impl RpcError {
    /// Transport failures and timeouts may succeed on a later attempt;
    /// server errors and malformed responses will not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("RPC communication failure: {0}")]
    Rpc(#[from] RpcError),

    #[error("transaction not found: {0}")]
    TxNotFound(Txid),

    #[error("invalid transaction data: {0}")]
    InvalidTxData(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("seed file parse error at line {line}: {message}")]
    SeedParse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Rpc(rpc) if rpc.is_transient())
    }
}
