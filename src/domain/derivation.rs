//! BIP32 分层确定性密钥派生
//!
//! [`HdKey`] 包装 coins-bip32 的 `XPriv`，只在单次签名/派生操作内存活，
//! 私钥随 drop 清零。根密钥以标准 `xprv` base58check 字符串加密落盘，
//! 对应的 `xpub` 作为钱包的公开标识。

use std::fmt;

use coins_bip32::prelude::*;
use k256::ecdsa::{SigningKey, VerifyingKey};
use zeroize::Zeroizing;

use crate::{
    domain::derivation_path::{DerivationPath, HARDENED_OFFSET},
    error::{Result, WalletError},
};

const XPRV_VERSION: [u8; 4] = [0x04, 0x88, 0xAD, 0xE4];
const XPUB_VERSION: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];
const SERIALIZED_LEN: usize = 78;

/// 扩展私钥
#[derive(Clone)]
pub struct HdKey {
    inner: XPriv,
}

impl fmt::Debug for HdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdKey")
            .field("depth", &self.depth())
            .field("index", &self.index())
            .finish_non_exhaustive()
    }
}

impl HdKey {
    /// 由种子生成主密钥（种子长度 16..=64 字节）
    pub fn master_from_seed(seed: &[u8]) -> Result<Self> {
        if !(16..=64).contains(&seed.len()) {
            return Err(WalletError::KeyDerivation(format!(
                "seed length {} not in 16..=64",
                seed.len()
            )));
        }
        let inner = XPriv::root_from_seed(seed, None)
            .map_err(|e| WalletError::KeyDerivation(format!("master key: {}", e)))?;
        Ok(Self { inner })
    }

    /// 派生子密钥；`index` 为未加偏移的 31 位索引
    pub fn derive_child(&self, index: u32, hardened: bool) -> Result<Self> {
        if index >= HARDENED_OFFSET {
            return Err(WalletError::InvalidPath(format!(
                "child index {} out of range",
                index
            )));
        }
        let raw = if hardened { index | HARDENED_OFFSET } else { index };
        self.derive_raw(raw)
    }

    fn derive_raw(&self, raw_index: u32) -> Result<Self> {
        // 结果无效（概率约 2^-127）时上抛，由调用方决定是否换索引
        let inner = self.inner.derive_child(raw_index).map_err(|e| {
            WalletError::KeyDerivation(format!("child {}: {}", raw_index, e))
        })?;
        Ok(Self { inner })
    }

    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self> {
        let mut key = self.clone();
        for &raw in path.indices() {
            key = key.derive_raw(raw)?;
        }
        Ok(key)
    }

    /// 解析路径字符串后逐级派生
    pub fn derive_by_path(&self, path: &str) -> Result<Self> {
        let path: DerivationPath = path.parse()?;
        self.derive_path(&path)
    }

    /// `m/44'/<coin_type>'/0'/0/<account_index>`
    pub fn derive_account_key(&self, coin_type: u32, account_index: u32) -> Result<Self> {
        if coin_type >= HARDENED_OFFSET || account_index >= HARDENED_OFFSET {
            return Err(WalletError::InvalidPath(format!(
                "coin type {} / index {} out of range",
                coin_type, account_index
            )));
        }
        self.derive_path(&DerivationPath::bip44(coin_type, account_index))
    }

    pub fn signing_key(&self) -> &SigningKey {
        self.inner.as_ref()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key().verifying_key().clone()
    }

    pub fn private_key_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key().to_bytes().into())
    }

    pub fn public_key_compressed(&self) -> [u8; 33] {
        let point = self.verifying_key().to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(point.as_bytes());
        out
    }

    fn info(&self) -> &XKeyInfo {
        self.inner.as_ref()
    }

    pub fn depth(&self) -> u8 {
        self.info().depth
    }

    /// 原始索引（hardened 含偏移）
    pub fn index(&self) -> u32 {
        self.info().index
    }

    pub fn chain_code(&self) -> [u8; 32] {
        self.info().chain_code.0
    }

    fn header(&self, version: [u8; 4]) -> Vec<u8> {
        let info = self.info();
        let mut out = Vec::with_capacity(SERIALIZED_LEN);
        out.extend_from_slice(&version);
        out.push(info.depth);
        out.extend_from_slice(&info.parent.0);
        out.extend_from_slice(&info.index.to_be_bytes());
        out.extend_from_slice(&info.chain_code.0);
        out
    }

    /// BIP32 `xprv` 序列化
    pub fn to_xprv(&self) -> Zeroizing<String> {
        let mut raw = Zeroizing::new(self.header(XPRV_VERSION));
        raw.push(0);
        raw.extend_from_slice(&self.private_key_bytes()[..]);
        Zeroizing::new(bs58::encode(&raw[..]).with_check().into_string())
    }

    /// BIP32 `xpub` 序列化，用作钱包标识
    pub fn to_xpub(&self) -> String {
        let mut raw = self.header(XPUB_VERSION);
        raw.extend_from_slice(&self.public_key_compressed());
        bs58::encode(raw).with_check().into_string()
    }

    /// 从 `xprv` 字符串恢复
    pub fn from_xprv(encoded: &str) -> Result<Self> {
        let raw = Zeroizing::new(
            bs58::decode(encoded.trim())
                .with_check(None)
                .into_vec()
                .map_err(|e| WalletError::Corrupt(format!("xprv base58: {}", e)))?,
        );

        if raw.len() != SERIALIZED_LEN || raw[..4] != XPRV_VERSION || raw[45] != 0 {
            return Err(WalletError::Corrupt("not an xprv payload".into()));
        }

        let mut parent = [0u8; 4];
        parent.copy_from_slice(&raw[5..9]);
        let mut index = [0u8; 4];
        index.copy_from_slice(&raw[9..13]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&raw[13..45]);

        let key = SigningKey::from_slice(&raw[46..78])
            .map_err(|_| WalletError::Corrupt("xprv private key out of range".into()))?;

        let info = XKeyInfo {
            depth: raw[4],
            parent: KeyFingerprint(parent),
            index: u32::from_be_bytes(index),
            chain_code: ChainCode(chain_code),
            hint: Hint::Legacy,
        };

        Ok(Self {
            inner: XPriv::new(key, info),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mnemonic;

    const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

    fn root() -> HdKey {
        let seed = mnemonic::to_seed(TEST_MNEMONIC, "").unwrap();
        HdKey::master_from_seed(&seed[..]).unwrap()
    }

    #[test]
    fn test_account_zero_private_key() {
        let key = root().derive_by_path("m/44'/60'/0'/0/0").unwrap();
        assert_eq!(
            hex::encode(&key.private_key_bytes()[..]),
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
        );
        assert_eq!(key.depth(), 5);
        assert_eq!(key.index(), 0);
    }

    #[test]
    fn test_account_key_matches_path() {
        let root = root();
        let by_path = root.derive_by_path("m/44'/60'/0'/0/2").unwrap();
        let by_account = root.derive_account_key(60, 2).unwrap();
        assert_eq!(
            by_path.private_key_bytes()[..],
            by_account.private_key_bytes()[..]
        );
        assert_eq!(
            hex::encode(&by_account.private_key_bytes()[..]),
            "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a"
        );
    }

    #[test]
    fn test_step_by_step_equals_path() {
        let root = root();
        let stepped = root
            .derive_child(44, true)
            .and_then(|k| k.derive_child(60, true))
            .and_then(|k| k.derive_child(0, true))
            .and_then(|k| k.derive_child(0, false))
            .and_then(|k| k.derive_child(1, false))
            .unwrap();
        assert_eq!(
            hex::encode(&stepped.private_key_bytes()[..]),
            "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
        );
        assert_eq!(stepped.index(), 1);
        assert_eq!(stepped.depth(), 5);
        assert_ne!(stepped.chain_code(), root.chain_code());
        assert!(root.derive_child(HARDENED_OFFSET, false).is_err());
    }

    #[test]
    fn test_bip32_vector_one_master() {
        // BIP32 Test vector 1
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let master = HdKey::master_from_seed(&seed).unwrap();
        assert_eq!(
            master.to_xpub(),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );
        assert_eq!(
            master.to_xprv().as_str(),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
    }

    #[test]
    fn test_xprv_roundtrip_preserves_derivation() {
        let root = root();
        let restored = HdKey::from_xprv(&root.to_xprv()).unwrap();
        assert_eq!(restored.to_xpub(), root.to_xpub());
        assert_eq!(
            restored.derive_account_key(60, 0).unwrap().private_key_bytes()[..],
            root.derive_account_key(60, 0).unwrap().private_key_bytes()[..]
        );
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            HdKey::master_from_seed(&[0u8; 8]),
            Err(WalletError::KeyDerivation(_))
        ));
        assert!(matches!(
            root().derive_by_path("m/44'/abc"),
            Err(WalletError::InvalidPath(_))
        ));
        assert!(matches!(
            HdKey::from_xprv("xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"),
            Err(WalletError::Corrupt(_))
        ));
        assert!(HdKey::from_xprv("not-base58!").is_err());
    }
}
