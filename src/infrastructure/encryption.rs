//! 根密钥加密存储（Vault）
//!
//! 口令经 Argon2id 拉伸为 32 字节密钥，再用 AES-256-GCM 加密。
//! 输出布局：`nonce(12) ‖ ciphertext+tag ‖ salt(32)`

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{
    config::VaultConfig,
    error::{Result, WalletError},
};

pub const SALT_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;
const TAG_LEN: usize = 16;

/// 加密密钥（使用Zeroize保护）
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; KEY_LEN],
}

impl EncryptionKey {
    pub fn as_slice(&self) -> &[u8] {
        &self.key
    }
}

/// 口令加密器
#[derive(Debug, Clone)]
pub struct Vault {
    params: Params,
}

impl Vault {
    pub fn new(config: &VaultConfig) -> Result<Self> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| WalletError::Config(format!("argon2 params: {}", e)))?;
        Ok(Self { params })
    }

    /// 由口令派生加密密钥
    ///
    /// `salt` 为空时生成新的 32 字节随机盐，返回 `(key, salt)`。
    pub fn derive_encryption_key(
        &self,
        password: &str,
        salt: Option<&[u8]>,
    ) -> Result<(EncryptionKey, Vec<u8>)> {
        let salt = match salt {
            Some(s) => s.to_vec(),
            None => {
                let mut fresh = vec![0u8; SALT_LEN];
                OsRng
                    .try_fill_bytes(&mut fresh)
                    .map_err(|e| WalletError::Entropy(e.to_string()))?;
                fresh
            }
        };

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let mut key = EncryptionKey { key: [0u8; KEY_LEN] };
        argon2
            .hash_password_into(password.as_bytes(), &salt, &mut key.key)
            .map_err(|e| WalletError::KeyDerivation(format!("argon2: {}", e)))?;

        Ok((key, salt))
    }

    /// 加密（每次使用新的盐和 nonce）
    pub fn encrypt(&self, password: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let (key, salt) = self.derive_encryption_key(password, None)?;

        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|e| WalletError::Encryption(format!("invalid key: {}", e)))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| WalletError::Encryption(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len() + SALT_LEN);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        out.extend_from_slice(&salt);
        Ok(out)
    }

    /// 解密；口令错误与数据损坏统一返回 [`WalletError::Decryption`]
    pub fn decrypt(&self, password: &str, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if blob.len() < NONCE_LEN + TAG_LEN + SALT_LEN {
            // 与口令错误的耗时保持一致
            let _ = self.derive_encryption_key(password, Some(&[0u8; SALT_LEN]))?;
            return Err(WalletError::Decryption);
        }

        let (body, salt) = blob.split_at(blob.len() - SALT_LEN);
        let (nonce, ciphertext) = body.split_at(NONCE_LEN);

        let (key, _) = self.derive_encryption_key(password, Some(salt))?;
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|_| WalletError::Decryption)?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| WalletError::Decryption)?;

        Ok(Zeroizing::new(plaintext))
    }
}
