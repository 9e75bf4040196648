// 区块链 JSON-RPC 客户端
// 每次调用：构建 {jsonrpc, method, params, id} → HTTP POST → 解析 result
// 不做自动重试，失败直接上抛给调用方

use std::time::Duration;

use ethers::types::U256;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{Result, WalletError},
    infrastructure::call_context::CallContext,
};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// 解析 `0x` 前缀的十六进制数量（最多 256 位）
pub fn parse_quantity(raw: &str) -> Result<U256> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| WalletError::Protocol(format!("quantity '{}' missing 0x prefix", raw)))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(WalletError::Protocol(format!("malformed quantity '{}'", raw)));
    }
    let significant = digits.trim_start_matches('0');
    if significant.len() > 64 {
        return Err(WalletError::Protocol(format!(
            "quantity '{}' exceeds 256 bits",
            raw
        )));
    }
    if significant.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(significant, 16)
        .map_err(|e| WalletError::Protocol(format!("quantity '{}': {:?}", raw, e)))
}

/// 数量编码为 RPC 参数
pub fn format_quantity(value: U256) -> String {
    format!("0x{:x}", value)
}

fn validate_tx_hash(raw: &str) -> Result<String> {
    let ok = raw.len() == 66
        && raw.starts_with("0x")
        && raw[2..].bytes().all(|b| b.is_ascii_hexdigit());
    if ok {
        Ok(raw.to_string())
    } else {
        Err(WalletError::Protocol(format!(
            "malformed transaction hash '{}'",
            raw
        )))
    }
}

pub struct BlockchainClient {
    http_client: reqwest::Client,
    rpc_url: String,
}

impl BlockchainClient {
    pub fn new(rpc_url: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| WalletError::Config(format!("http client: {}", e)))?;

        Ok(Self {
            http_client,
            rpc_url: rpc_url.into(),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// 发送一次 JSON-RPC 调用并返回 `result`
    async fn call(&self, ctx: &CallContext, method: &str, params: Value) -> Result<Value> {
        let id = Uuid::new_v4().to_string();
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: id.clone(),
        };

        tracing::debug!(method = %method, id = %id, "rpc request");

        ctx.run(method, async {
            let response = self
                .http_client
                .post(&self.rpc_url)
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;

            let parsed: RpcResponse = match serde_json::from_str(&body) {
                Ok(parsed) => parsed,
                Err(_) if !status.is_success() => {
                    return Err(WalletError::Transport(format!(
                        "{} returned HTTP {}",
                        method, status
                    )))
                }
                Err(e) => return Err(e.into()),
            };

            if let Some(error) = parsed.error {
                tracing::warn!(method = %method, code = error.code, message = %error.message, "rpc error");
                return Err(WalletError::Rpc {
                    code: error.code,
                    message: error.message,
                });
            }

            if !status.is_success() {
                return Err(WalletError::Transport(format!(
                    "{} returned HTTP {}",
                    method, status
                )));
            }

            if let Some(Value::String(echoed)) = &parsed.id {
                if *echoed != id {
                    return Err(WalletError::Protocol(format!(
                        "{}: response id mismatch",
                        method
                    )));
                }
            }

            parsed
                .result
                .ok_or_else(|| WalletError::Protocol(format!("{}: missing result", method)))
        })
        .await
    }

    async fn call_quantity(&self, ctx: &CallContext, method: &str, params: Value) -> Result<U256> {
        let result = self.call(ctx, method, params).await?;
        let raw = result.as_str().ok_or_else(|| {
            WalletError::Protocol(format!("{}: expected hex string, got {}", method, result))
        })?;
        parse_quantity(raw)
    }

    /// 节点存活探测；任何错误都视为不可用
    pub async fn is_node_listening(&self, ctx: &CallContext) -> bool {
        match self.call(ctx, "net_listening", json!([])).await {
            Ok(Value::Bool(listening)) => listening,
            Ok(other) => {
                tracing::debug!(result = %other, "unexpected net_listening result");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, url = %self.rpc_url, "node not reachable");
                false
            }
        }
    }

    pub async fn gas_price(&self, ctx: &CallContext) -> Result<U256> {
        self.call_quantity(ctx, "eth_gasPrice", json!([])).await
    }

    pub async fn nonce(&self, ctx: &CallContext, address: &str) -> Result<U256> {
        self.call_quantity(ctx, "eth_getTransactionCount", json!([address, "latest"]))
            .await
    }

    pub async fn estimate_gas(
        &self,
        ctx: &CallContext,
        from: &str,
        to: &str,
        value: U256,
    ) -> Result<U256> {
        self.call_quantity(
            ctx,
            "eth_estimateGas",
            json!([{ "from": from, "to": to, "value": format_quantity(value) }]),
        )
        .await
    }

    pub async fn chain_id(&self, ctx: &CallContext) -> Result<U256> {
        self.call_quantity(ctx, "eth_chainId", json!([])).await
    }

    pub async fn balance(&self, ctx: &CallContext, address: &str) -> Result<U256> {
        self.call_quantity(ctx, "eth_getBalance", json!([address, "latest"]))
            .await
    }

    /// 广播已签名交易，返回节点给出的交易哈希
    pub async fn submit_raw_transaction(&self, ctx: &CallContext, raw_hex: &str) -> Result<String> {
        if !raw_hex.starts_with("0x") || raw_hex.len() < 10 {
            return Err(WalletError::Encoding(
                "raw transaction must be 0x-prefixed hex".into(),
            ));
        }

        let result = self
            .call(ctx, "eth_sendRawTransaction", json!([raw_hex]))
            .await?;
        let tx_hash = result.as_str().ok_or_else(|| {
            WalletError::Protocol(format!("eth_sendRawTransaction: unexpected result {}", result))
        })?;
        let tx_hash = validate_tx_hash(tx_hash)?;

        tracing::info!(tx_hash = %tx_hash, "raw transaction submitted");
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), U256::zero());
        assert_eq!(parse_quantity("0x1a2b3c").unwrap(), U256::from(1_715_004u64));
        assert_eq!(parse_quantity("0x7a69").unwrap(), U256::from(31337u64));
        assert_eq!(
            parse_quantity("0x00000000000000000000000000000000000000000000000000000000000000ff")
                .unwrap(),
            U256::from(255u64)
        );
        // 超过 u128 仍然无损
        assert_eq!(
            parse_quantity("0x100000000000000000000000000000000").unwrap(),
            U256::from(u128::MAX) + U256::one()
        );
    }

    #[test]
    fn test_parse_quantity_rejects_malformed() {
        for bad in ["", "0x", "1a", "0xzz", "0x-1"] {
            assert!(
                matches!(parse_quantity(bad), Err(WalletError::Protocol(_))),
                "{}",
                bad
            );
        }
        let too_wide = format!("0x1{}", "0".repeat(64));
        assert!(parse_quantity(&too_wide).is_err());
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(U256::zero()), "0x0");
        assert_eq!(format_quantity(U256::exp10(18)), "0xde0b6b3a7640000");
    }

    #[test]
    fn test_validate_tx_hash() {
        let good = format!("0x{}", "ab".repeat(32));
        assert_eq!(validate_tx_hash(&good).unwrap(), good);
        assert!(validate_tx_hash("0x1234").is_err());
        assert!(validate_tx_hash(&"ab".repeat(33)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_node_is_not_listening() {
        // 端口 9 (discard) 通常无人监听
        let client = BlockchainClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let ctx = CallContext::with_timeout(Duration::from_secs(2));
        assert!(!client.is_node_listening(&ctx).await);

        let err = client.gas_price(&ctx).await.unwrap_err();
        assert!(matches!(
            err,
            WalletError::Transport(_) | WalletError::Timeout(_)
        ));
    }
}
