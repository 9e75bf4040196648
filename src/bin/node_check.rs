use anyhow::{Context, Result};
use hdcore::{
    config::Config,
    infrastructure::logging,
    service::{blockchain_client::BlockchainClient, units},
    CallContext,
};

#[derive(Debug)]
struct CheckResult {
    name: &'static str,
    ok: bool,
    detail: String,
}

fn config_path_from_args() -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
    }
    None
}

fn network_from_args() -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--network" {
            return args.next();
        }
    }
    None
}

fn record<T, F>(name: &'static str, res: hdcore::Result<T>, fmt: F) -> CheckResult
where
    F: FnOnce(T) -> String,
{
    match res {
        Ok(v) => CheckResult {
            name,
            ok: true,
            detail: fmt(v),
        },
        Err(e) => CheckResult {
            name,
            ok: false,
            detail: format!("{} ({})", e, e.code()),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::from_env_and_file(config_path_from_args())?;
    if let Some(network) = network_from_args() {
        config.network.active = network;
        config.network.rpc_url = None;
    }
    config.validate()?;

    logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("init logging: {}", e))?;

    let url = config
        .network
        .rpc_url()
        .context("no RPC URL configured")?
        .to_string();
    let client = BlockchainClient::new(&url, config.timeouts.connect_timeout())
        .context("build rpc client")?;
    let timeout = config.timeouts.call_timeout();

    let mut results = Vec::new();

    let listening = client
        .is_node_listening(&CallContext::with_timeout(timeout))
        .await;
    results.push(CheckResult {
        name: "net_listening",
        ok: listening,
        detail: listening.to_string(),
    });

    results.push(record(
        "eth_chainId",
        client.chain_id(&CallContext::with_timeout(timeout)).await,
        |id| id.to_string(),
    ));

    results.push(record(
        "eth_gasPrice",
        client.gas_price(&CallContext::with_timeout(timeout)).await,
        |price| format!("{} wei ({} ETH)", price, units::wei_to_ether(price)),
    ));

    println!("Node check against {} ({})", url, config.network.active);
    let mut failures = 0usize;
    for r in &results {
        if r.ok {
            println!("[OK]   {:16} {}", r.name, r.detail);
        } else {
            failures += 1;
            println!("[FAIL] {:16} {}", r.name, r.detail);
        }
    }

    if failures > 0 {
        anyhow::bail!("{} checks failed", failures);
    }

    Ok(())
}
