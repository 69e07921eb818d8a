//! JSON-RPC backed `ChainSource`, talking to a Bitcoin-Core-style node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bitcoin::consensus::encode::deserialize;
use bitcoin::{Block, BlockHash, Transaction, Txid};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChainSourceError;

use super::{ChainSource, ChainTip};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    id: Option<Value>,
    result: Option<Value>,
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

pub struct HttpChainSource {
    client: reqwest::Client,
    url: String,
    user: String,
    pass: String,
    next_id: AtomicU64,
}

impl HttpChainSource {
    pub fn new(url: impl Into<String>, user: impl Into<String>, pass: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(8)
            .build()
            .expect("reqwest client config is static and valid");

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1);

        Self {
            client,
            url: url.into(),
            user: user.into(),
            pass: pass.into(),
            next_id: AtomicU64::new(seed),
        }
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, ChainSourceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest { jsonrpc: "1.0", id, method, params };

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.pass))
            .json(&request)
            .send()
            .await
            .map_err(ChainSourceError::Transport)?;

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ChainSourceError::InvalidResponse(e.to_string()))?;

        if let Some(err) = body.error {
            return Err(ChainSourceError::ServerError { code: err.code, message: err.message });
        }

        body.result
            .ok_or_else(|| ChainSourceError::InvalidResponse("missing result field".into()))
    }

    async fn get_raw_block_hex(&self, hash: &BlockHash) -> Result<String, ChainSourceError> {
        let result = self
            .rpc_call("getblock", serde_json::json!([hash.to_string(), 0]))
            .await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ChainSourceError::InvalidResponse("getblock result not a string".into()))
    }
}

#[async_trait]
impl ChainSource for HttpChainSource {
    async fn get_tip(&self) -> Result<ChainTip, ChainSourceError> {
        let info = self.rpc_call("getblockchaininfo", serde_json::json!([])).await?;
        let height = info
            .get("blocks")
            .and_then(Value::as_u64)
            .ok_or_else(|| ChainSourceError::InvalidResponse("missing blocks field".into()))?
            as u32;
        let hash_str = info
            .get("bestblockhash")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainSourceError::InvalidResponse("missing bestblockhash field".into()))?;
        let hash: BlockHash = hash_str
            .parse()
            .map_err(|_| ChainSourceError::InvalidResponse("malformed bestblockhash".into()))?;
        Ok(ChainTip { height, hash })
    }

    async fn get_block_hash(&self, height: u32) -> Result<BlockHash, ChainSourceError> {
        let result = self.rpc_call("getblockhash", serde_json::json!([height])).await?;
        let hash_str = result
            .as_str()
            .ok_or_else(|| ChainSourceError::InvalidResponse("getblockhash result not a string".into()))?;
        hash_str
            .parse()
            .map_err(|_| ChainSourceError::InvalidResponse("malformed block hash".into()))
    }

    async fn get_block_by_height(&self, height: u32) -> Result<Block, ChainSourceError> {
        let hash = self.get_block_hash(height).await?;
        self.read_block(&hash).await
    }

    async fn read_block(&self, hash: &BlockHash) -> Result<Block, ChainSourceError> {
        let hex = self.get_raw_block_hex(hash).await?;
        let bytes = hex::decode(&hex)
            .map_err(|e| ChainSourceError::InvalidResponse(format!("bad block hex: {e}")))?;
        deserialize(&bytes).map_err(|e| ChainSourceError::InvalidResponse(format!("bad block bytes: {e}")))
    }

    async fn get_transaction(&self, txid: &Txid) -> Result<Transaction, ChainSourceError> {
        let result = self
            .rpc_call("getrawtransaction", serde_json::json!([txid.to_string(), 0]))
            .await?;
        let hex_str = result
            .as_str()
            .ok_or_else(|| ChainSourceError::InvalidResponse("getrawtransaction result not a string".into()))?;
        let bytes = hex::decode(hex_str)
            .map_err(|e| ChainSourceError::InvalidResponse(format!("bad tx hex: {e}")))?;
        deserialize(&bytes).map_err(|e| ChainSourceError::InvalidResponse(format!("bad tx bytes: {e}")))
    }
}
