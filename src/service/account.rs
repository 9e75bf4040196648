//! 账户抽象
//!
//! [`Account`] 按币种分变体；新增币种时增加变体，调用方代码不变。

use ethers::types::U256;
use serde::Serialize;

use crate::{
    domain::{chain_config, derivation::HdKey},
    error::{Result, WalletError},
    infrastructure::call_context::CallContext,
    service::{
        blockchain_client::BlockchainClient,
        transaction_builder::{self, SignedTransaction},
        units,
    },
    utils::address_validator::AddressValidator,
};

/// 以太坊风格账户
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EthAccount {
    index: u32,
    address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "currency", rename_all = "UPPERCASE")]
pub enum Account {
    Eth(EthAccount),
}

/// Gas 估算结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasEstimate {
    pub gas_units: U256,
    pub gas_price: U256,
}

impl GasEstimate {
    /// 手续费（ETH，18 位小数）
    pub fn fee_in_ether(&self) -> Result<String> {
        units::estimate_fee_in_ether(self.gas_units, self.gas_price)
    }
}

/// 已广播的交易
#[derive(Debug, Clone)]
pub struct Submission {
    /// 节点返回的哈希
    pub tx_hash: String,
    pub signed: SignedTransaction,
}

impl Account {
    /// 按币种构建账户
    pub fn new(currency: &str, index: u32, address: String) -> Result<Self> {
        match chain_config::lookup(currency)?.symbol {
            "ETH" => Ok(Account::Eth(EthAccount { index, address })),
            other => Err(WalletError::UnsupportedToken(other.to_string())),
        }
    }

    pub fn currency(&self) -> &'static str {
        match self {
            Account::Eth(_) => "ETH",
        }
    }

    pub fn address(&self) -> &str {
        match self {
            Account::Eth(acc) => &acc.address,
        }
    }

    pub fn index(&self) -> u32 {
        match self {
            Account::Eth(acc) => acc.index,
        }
    }

    /// 余额（最小单位）
    pub async fn retrieve_balance(
        &self,
        ctx: &CallContext,
        client: &BlockchainClient,
    ) -> Result<U256> {
        match self {
            Account::Eth(acc) => client.balance(ctx, &acc.address).await,
        }
    }

    pub async fn estimate_gas(
        &self,
        ctx: &CallContext,
        client: &BlockchainClient,
        to: &str,
        value: U256,
    ) -> Result<GasEstimate> {
        match self {
            Account::Eth(acc) => {
                ensure_destination(to, self.currency())?;
                let gas_units = client.estimate_gas(ctx, &acc.address, to, value).await?;
                let gas_price = client.gas_price(ctx).await?;
                Ok(GasEstimate {
                    gas_units,
                    gas_price,
                })
            }
        }
    }

    /// 构建、签名并广播交易
    ///
    /// `key` 必须是本账户索引对应的派生密钥，调用方负责在返回后丢弃。
    pub async fn send_transaction(
        &self,
        ctx: &CallContext,
        client: &BlockchainClient,
        key: &HdKey,
        to: &str,
        value: U256,
    ) -> Result<Submission> {
        match self {
            Account::Eth(acc) => {
                ensure_destination(to, self.currency())?;

                let derived = chain_config::lookup(self.currency())?
                    .address_codec
                    .encode(&key.verifying_key());
                if derived != acc.address {
                    return Err(WalletError::KeyDerivation(format!(
                        "key does not match account {}",
                        acc.index
                    )));
                }

                let nonce = client.nonce(ctx, &acc.address).await?;
                let gas_price = client.gas_price(ctx).await?;
                let gas_limit = client.estimate_gas(ctx, &acc.address, to, value).await?;
                let chain_id = client.chain_id(ctx).await?;

                let unsigned =
                    transaction_builder::build_unsigned(nonce, gas_price, gas_limit, to, value, None)?;
                let signed = transaction_builder::sign(&unsigned, key.signing_key(), chain_id)?;

                tracing::info!(
                    from = %acc.address,
                    to = %to,
                    nonce = %nonce,
                    chain_id = %chain_id,
                    local_hash = %signed.tx_hash(),
                    "submitting signed transaction"
                );

                let tx_hash = client.submit_raw_transaction(ctx, &signed.raw_hex()).await?;
                Ok(Submission { tx_hash, signed })
            }
        }
    }
}

fn ensure_destination(to: &str, currency: &str) -> Result<()> {
    if AddressValidator::validate(to, currency) {
        Ok(())
    } else {
        Err(WalletError::InvalidAddress(to.to_string()))
    }
}
