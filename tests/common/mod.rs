//! 测试辅助模块
//! 进程内假 JSON-RPC 节点 + 临时数据库上的钱包服务

#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{extract::State, routing::post, Json, Router};
use hdcore::{
    config::{Config, StorageConfig, VaultConfig},
    WalletService,
};
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// hardhat 账户 #0 / #1
pub const ACCOUNT_0: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const ACCOUNT_1: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

pub const ZERO_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Default)]
struct NodeState {
    calls: Mutex<Vec<String>>,
    raw_transactions: Mutex<Vec<String>>,
    zero_hash: AtomicBool,
    reject_send: AtomicBool,
    delay_ms: AtomicU64,
}

/// 假节点：按 hardhat 的默认值应答
pub struct FakeNode {
    pub url: String,
    state: Arc<NodeState>,
    _task: tokio::task::JoinHandle<()>,
}

impl FakeNode {
    pub async fn start() -> Self {
        let state = Arc::new(NodeState::default());
        let app = Router::new()
            .route("/", post(handle_rpc))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{}", addr),
            state,
            _task: task,
        }
    }

    /// 收到的方法名，按顺序
    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn raw_transactions(&self) -> Vec<String> {
        self.state.raw_transactions.lock().unwrap().clone()
    }

    pub fn answer_zero_hash(&self, on: bool) {
        self.state.zero_hash.store(on, Ordering::SeqCst);
    }

    pub fn reject_send(&self, on: bool) {
        self.state.reject_send.store(on, Ordering::SeqCst);
    }

    pub fn delay(&self, d: Duration) {
        self.state.delay_ms.store(d.as_millis() as u64, Ordering::SeqCst);
    }
}

async fn handle_rpc(State(state): State<Arc<NodeState>>, Json(req): Json<Value>) -> Json<Value> {
    let id = req["id"].clone();
    let method = req["method"].as_str().unwrap_or_default().to_string();
    state.calls.lock().unwrap().push(method.clone());

    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let result = match method.as_str() {
        "net_listening" => json!(true),
        // 20 gwei
        "eth_gasPrice" => json!("0x4a817c800"),
        "eth_getTransactionCount" => json!("0x0"),
        "eth_estimateGas" => json!("0x5208"),
        "eth_chainId" => json!("0x7a69"),
        // 10000 ETH
        "eth_getBalance" => json!("0x21e19e0c9bab2400000"),
        "eth_sendRawTransaction" => {
            if state.reject_send.load(Ordering::SeqCst) {
                return Json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32000, "message": "nonce too low" }
                }));
            }
            let raw = req["params"][0].as_str().unwrap_or_default().to_string();
            state.raw_transactions.lock().unwrap().push(raw.clone());
            if state.zero_hash.load(Ordering::SeqCst) {
                json!(ZERO_HASH)
            } else {
                let bytes = hex::decode(raw.trim_start_matches("0x")).unwrap_or_default();
                json!(format!("0x{}", hex::encode(Keccak256::digest(&bytes))))
            }
        }
        _ => {
            return Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": "method not found" }
            }))
        }
    };

    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

/// 临时文件数据库 + 低成本 KDF 的钱包服务
pub async fn wallet_service(rpc_url: &str) -> (WalletService, TempDir) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("wallet.db");

    let mut config = Config::default();
    config.storage = StorageConfig {
        database_url: format!("sqlite://{}?mode=rwc", db_path.display()),
        max_connections: 2,
    };
    config.vault = VaultConfig::insecure_fast();
    config.network.rpc_url = Some(rpc_url.to_string());
    config.accounts.pool_size = None;
    config.timeouts.call_timeout_secs = 5;

    let svc = WalletService::connect(config).await.unwrap();
    (svc, dir)
}

/// 用固定助记词恢复并初始化 ETH 地址池
pub async fn ready_wallet(rpc_url: &str, password: &str) -> (WalletService, TempDir) {
    let (svc, dir) = wallet_service(rpc_url).await;
    let ctx = svc.context();
    svc.restore(&ctx, password, TEST_MNEMONIC).await.unwrap();
    svc.initialize(&ctx, &["ETH"], password).await.unwrap();
    (svc, dir)
}
