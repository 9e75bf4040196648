//! 地址验证模块
//!
//! EVM 地址：`0x` + 40 位 hex；全小写或全大写视为无校验地址直接通过。
//! 大小写混合时按 EIP-55 逐字符检查：哈希半字节 ≥ 8 的字母必须大写，
//! 其余字母大小写不限。

use once_cell::sync::Lazy;
use regex::Regex;
use sha3::{Digest, Keccak256};

use crate::domain::chain_config::{self, AddressCodec};

static EVM_ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0[xX][0-9a-fA-F]{40}$").expect("static address pattern"));

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 按币种验证地址；不支持的币种返回 false
    pub fn validate(address: &str, token: &str) -> bool {
        match chain_config::lookup(token) {
            Ok(spec) => Self::validate_with(spec.address_codec, address),
            Err(_) => false,
        }
    }

    pub fn validate_with(codec: AddressCodec, address: &str) -> bool {
        match codec {
            AddressCodec::Eip55Hex => Self::validate_evm_address(address),
        }
    }

    /// 验证EVM地址（支持EIP-55 Checksum）
    pub fn validate_evm_address(address: &str) -> bool {
        if !EVM_ADDRESS_RE.is_match(address) {
            return false;
        }

        let hex_part = &address[2..];
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        if !(has_lower && has_upper) {
            return true;
        }

        Self::checksum_letters_upper(hex_part)
    }

    /// 校验和要求大写的位置上不得出现小写字母
    fn checksum_letters_upper(hex_part: &str) -> bool {
        let hash = Keccak256::digest(hex_part.to_ascii_lowercase().as_bytes());
        hex_part.chars().enumerate().all(|(i, ch)| {
            !ch.is_ascii_lowercase() || checksum_nibble(&hash, i) < 8
        })
    }
}

fn checksum_nibble(hash: &[u8], i: usize) -> u8 {
    if i % 2 == 0 {
        hash[i / 2] >> 4
    } else {
        hash[i / 2] & 0x0f
    }
}

/// EIP-55 校验和编码，输入可带或不带 `0x`
///
/// https://eips.ethereum.org/EIPS/eip-55
pub fn to_checksum_address(address: &str) -> String {
    let lower = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address)
        .to_ascii_lowercase();
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, ch) in lower.chars().enumerate() {
        if ch.is_ascii_alphabetic() && checksum_nibble(&hash, i) >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}
