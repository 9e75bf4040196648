//! ETH ↔ wei 定点换算（10^18）

use ethers::types::U256;

use crate::error::{Result, WalletError};

/// ETH 精度
pub const ETHER_DECIMALS: usize = 18;

fn wei_per_ether() -> U256 {
    U256::exp10(ETHER_DECIMALS)
}

/// 十进制 ETH 字符串 → wei
///
/// 超过 18 位的小数部分直接截断（向零取整），不做四舍五入。
pub fn ether_to_wei(amount: &str) -> Result<U256> {
    let invalid = || WalletError::InvalidAmount(amount.to_string());
    let s = amount.trim();

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole = if int_part.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(int_part).map_err(|_| invalid())?
    };

    let mut frac_digits: String = frac_part.chars().take(ETHER_DECIMALS).collect();
    while frac_digits.len() < ETHER_DECIMALS {
        frac_digits.push('0');
    }
    let frac = U256::from_dec_str(&frac_digits).map_err(|_| invalid())?;

    whole
        .checked_mul(wei_per_ether())
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(invalid)
}

/// wei → 最简十进制 ETH 字符串（无多余尾零，零为 `"0"`）
pub fn wei_to_ether(wei: U256) -> String {
    let (whole, frac) = wei.div_mod(wei_per_ether());
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac.to_string(), width = ETHER_DECIMALS);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// 固定 18 位小数
pub fn wei_to_ether_fixed(wei: U256) -> String {
    let (whole, frac) = wei.div_mod(wei_per_ether());
    format!(
        "{}.{:0>width$}",
        whole,
        frac.to_string(),
        width = ETHER_DECIMALS
    )
}

/// 手续费估算：`gas_units × gas_price`，以 ETH 表示（18 位小数）
pub fn estimate_fee_in_ether(gas_units: U256, gas_price_wei: U256) -> Result<String> {
    let fee = gas_units
        .checked_mul(gas_price_wei)
        .ok_or_else(|| WalletError::InvalidAmount("fee overflows 256 bits".into()))?;
    Ok(wei_to_ether_fixed(fee))
}
