//! 币种能力表
//!
//! 静态映射：币种符号 → `{coin_type, address_codec, pool_size}`。
//! 新增币种只需在 [`CURRENCIES`] 中追加一项并为 [`AddressCodec`] 增加变体。

use k256::ecdsa::VerifyingKey;
use sha3::{Digest, Keccak256};

use crate::{
    error::{Result, WalletError},
    utils::address_validator::to_checksum_address,
};

/// 默认地址池大小
pub const DEFAULT_POOL_SIZE: u32 = 21;

/// 地址编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressCodec {
    /// Keccak256(未压缩公钥)[12..]，EIP-55 大小写校验
    Eip55Hex,
}

impl AddressCodec {
    pub fn encode(&self, key: &VerifyingKey) -> String {
        match self {
            AddressCodec::Eip55Hex => {
                let point = key.to_encoded_point(false);
                let hash = Keccak256::digest(&point.as_bytes()[1..]); // 去掉 0x04 前缀
                to_checksum_address(&hex::encode(&hash[12..]))
            }
        }
    }
}

/// 币种能力记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencySpec {
    pub symbol: &'static str,
    pub name: &'static str,
    /// BIP44 注册的 coin type
    pub coin_type: u32,
    pub address_codec: AddressCodec,
    pub pool_size: u32,
    /// 最小单位精度
    pub decimals: u32,
}

pub static CURRENCIES: &[CurrencySpec] = &[CurrencySpec {
    symbol: "ETH",
    name: "Ethereum",
    coin_type: 60,
    address_codec: AddressCodec::Eip55Hex,
    pool_size: DEFAULT_POOL_SIZE,
    decimals: 18,
}];

/// 按符号查找（大小写不敏感）
pub fn lookup(symbol: &str) -> Result<&'static CurrencySpec> {
    CURRENCIES
        .iter()
        .find(|c| c.symbol.eq_ignore_ascii_case(symbol.trim()))
        .ok_or_else(|| WalletError::UnsupportedToken(symbol.to_string()))
}

pub fn coin_type(symbol: &str) -> Result<u32> {
    lookup(symbol).map(|c| c.coin_type)
}

pub fn supported_symbols() -> impl Iterator<Item = &'static str> {
    CURRENCIES.iter().map(|c| c.symbol)
}
