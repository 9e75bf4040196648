//! BIP39 助记词服务

use bip39::{Language, Mnemonic};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::error::{Result, WalletError};

/// 规范化：去首尾空白、合并多余空白、小写
fn normalize(phrase: &str) -> Zeroizing<String> {
    Zeroizing::new(
        phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn parse(phrase: &str) -> Result<Mnemonic> {
    let normalized = normalize(phrase);
    Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|_| WalletError::InvalidMnemonic)
}

/// 生成助记词，`entropy_bits` 只允许 128（12 词）或 256（24 词）
pub fn generate(entropy_bits: usize) -> Result<Zeroizing<String>> {
    if entropy_bits != 128 && entropy_bits != 256 {
        return Err(WalletError::InvalidEntropyLength(entropy_bits));
    }

    let mut entropy = Zeroizing::new(vec![0u8; entropy_bits / 8]);
    OsRng
        .try_fill_bytes(&mut entropy)
        .map_err(|e| WalletError::Entropy(e.to_string()))?;

    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| WalletError::Entropy(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// 校验词表与校验和，从不报错
pub fn validate(phrase: &str) -> bool {
    parse(phrase).is_ok()
}

/// 助记词 + 口令 → 64 字节种子
pub fn to_seed(phrase: &str, passphrase: &str) -> Result<Zeroizing<[u8; 64]>> {
    let mnemonic = parse(phrase)?;
    Ok(Zeroizing::new(mnemonic.to_seed(passphrase)))
}
