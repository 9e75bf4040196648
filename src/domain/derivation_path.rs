//! BIP32 派生路径解析
//!
//! 格式：`m/44'/60'/0'/0/0`，`'` 后缀表示 hardened（索引 + 2^31）。

use std::{fmt, str::FromStr};

use crate::error::WalletError;

/// hardened 偏移量
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// 已解析的派生路径，元素为原始 32 位索引（hardened 已加偏移）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    /// BIP44 账户路径 `m/44'/<coin_type>'/0'/0/<index>`
    pub fn bip44(coin_type: u32, account_index: u32) -> Self {
        Self(vec![
            44 | HARDENED_OFFSET,
            coin_type | HARDENED_OFFSET,
            HARDENED_OFFSET,
            0,
            account_index,
        ])
    }

    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn parse_segment(segment: &str) -> Result<u32, WalletError> {
    let (digits, hardened) = match segment.strip_suffix('\'') {
        Some(rest) => (rest, true),
        None => match segment.strip_suffix(['h', 'H']) {
            Some(rest) => (rest, true),
            None => (segment, false),
        },
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WalletError::InvalidPath(format!("bad segment '{}'", segment)));
    }

    let index: u32 = digits
        .parse()
        .map_err(|_| WalletError::InvalidPath(format!("segment '{}' out of range", segment)))?;
    if index >= HARDENED_OFFSET {
        return Err(WalletError::InvalidPath(format!(
            "segment '{}' out of range",
            segment
        )));
    }

    Ok(if hardened { index | HARDENED_OFFSET } else { index })
}

impl FromStr for DerivationPath {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(WalletError::InvalidPath("empty path".into()));
        }

        let mut segments = s.split('/').peekable();
        if matches!(segments.peek(), Some(&"m") | Some(&"M")) {
            segments.next();
        }

        segments
            .map(|seg| parse_segment(seg.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for &index in &self.0 {
            if index >= HARDENED_OFFSET {
                write!(f, "/{}'", index - HARDENED_OFFSET)?;
            } else {
                write!(f, "/{}", index)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bip44_path() {
        let path: DerivationPath = "m/44'/60'/0'/0/7".parse().unwrap();
        assert_eq!(
            path.indices(),
            &[
                44 + HARDENED_OFFSET,
                60 + HARDENED_OFFSET,
                HARDENED_OFFSET,
                0,
                7
            ]
        );
        assert_eq!(path, DerivationPath::bip44(60, 7));
        assert_eq!(path.to_string(), "m/44'/60'/0'/0/7");
    }

    #[test]
    fn test_root_and_relative_paths() {
        assert!("m".parse::<DerivationPath>().unwrap().is_empty());
        let rel: DerivationPath = "0/1h".parse().unwrap();
        assert_eq!(rel.indices(), &[0, 1 | HARDENED_OFFSET]);
    }

    #[test]
    fn test_malformed_segments_rejected() {
        for bad in [
            "",
            "m/",
            "m//0",
            "m/44'/x/0",
            "m/-1",
            "m/2147483648",
            "m/44''",
            "m/0/m",
        ] {
            assert!(
                matches!(bad.parse::<DerivationPath>(), Err(WalletError::InvalidPath(_))),
                "{} should be rejected",
                bad
            );
        }
    }
}
