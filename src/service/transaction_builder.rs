//! EIP-155 交易构建与签名
//!
//! 流程：RLP(`[nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]`)
//! → Keccak256 → secp256k1 签名 → RLP(`[..., v, r, s]`)，
//! 其中 `v = recovery_id + 35 + 2 × chainId`。

use ethers::types::U256;
use k256::ecdsa::{RecoveryId, SigningKey};
use rlp::RlpStream;
use sha3::{Digest, Keccak256};

use crate::{
    error::{Result, WalletError},
    utils::address_validator::AddressValidator,
};

/// 未签名交易
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub to: [u8; 20],
    pub value: U256,
    pub data: Vec<u8>,
}

/// 已签名交易，字段不可再改
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    tx: UnsignedTransaction,
    v: U256,
    r: [u8; 32],
    s: [u8; 32],
    raw: Vec<u8>,
}

/// 最小大端字节（RLP 整数编码，零为空串）
fn be_trimmed(bytes: &[u8]) -> Vec<u8> {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

fn u256_bytes(value: &U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    be_trimmed(&buf)
}

fn finish(stream: RlpStream) -> Result<Vec<u8>> {
    if !stream.is_finished() {
        return Err(WalletError::Encoding("incomplete RLP list".into()));
    }
    Ok(stream.out().to_vec())
}

/// 构建未签名交易；`to` 必须是合法 EVM 地址
pub fn build_unsigned(
    nonce: U256,
    gas_price: U256,
    gas_limit: U256,
    to: &str,
    value: U256,
    data: Option<Vec<u8>>,
) -> Result<UnsignedTransaction> {
    if !AddressValidator::validate_evm_address(to) {
        return Err(WalletError::InvalidAddress(to.to_string()));
    }
    let decoded =
        hex::decode(&to[2..]).map_err(|_| WalletError::InvalidAddress(to.to_string()))?;
    let mut to_bytes = [0u8; 20];
    to_bytes.copy_from_slice(&decoded);

    Ok(UnsignedTransaction {
        nonce,
        gas_price,
        gas_limit,
        to: to_bytes,
        value,
        data: data.unwrap_or_default(),
    })
}

impl UnsignedTransaction {
    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&u256_bytes(&self.nonce));
        stream.append(&u256_bytes(&self.gas_price));
        stream.append(&u256_bytes(&self.gas_limit));
        stream.append(&self.to.to_vec());
        stream.append(&u256_bytes(&self.value));
        stream.append(&self.data);
    }

    /// 待签名的 RLP 编码（EIP-155：末尾追加 chainId, 0, 0）
    pub fn signing_payload(&self, chain_id: U256) -> Result<Vec<u8>> {
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&u256_bytes(&chain_id));
        stream.append(&Vec::<u8>::new());
        stream.append(&Vec::<u8>::new());
        finish(stream)
    }

    pub fn signing_hash(&self, chain_id: U256) -> Result<[u8; 32]> {
        let payload = self.signing_payload(chain_id)?;
        Ok(Keccak256::digest(&payload).into())
    }
}

/// 签名并编码为可广播的原始交易
pub fn sign(
    tx: &UnsignedTransaction,
    key: &SigningKey,
    chain_id: U256,
) -> Result<SignedTransaction> {
    let hash = tx.signing_hash(chain_id)?;

    let (signature, recovery_id) = key
        .sign_prehash_recoverable(&hash)
        .map_err(|e| WalletError::Signing(e.to_string()))?;

    // 统一为 low-S，翻转 s 时 y 奇偶同时翻转
    let (signature, recovery_id) = match signature.normalize_s() {
        Some(normalized) => (
            normalized,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (signature, recovery_id),
    };

    let v = chain_id
        .checked_mul(U256::from(2u8))
        .and_then(|x| x.checked_add(U256::from(35u8 + recovery_id.to_byte())))
        .ok_or_else(|| WalletError::Signing("chain id too large".into()))?;

    let sig_bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&sig_bytes[..32]);
    s.copy_from_slice(&sig_bytes[32..]);

    let mut stream = RlpStream::new_list(9);
    tx.append_fields(&mut stream);
    stream.append(&u256_bytes(&v));
    stream.append(&be_trimmed(&r));
    stream.append(&be_trimmed(&s));
    let raw = finish(stream)?;

    Ok(SignedTransaction {
        tx: tx.clone(),
        v,
        r,
        s,
        raw,
    })
}

impl SignedTransaction {
    pub fn transaction(&self) -> &UnsignedTransaction {
        &self.tx
    }

    pub fn v(&self) -> U256 {
        self.v
    }

    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// `0x` 前缀的原始交易 hex，用于 `eth_sendRawTransaction`
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    /// 本地计算的交易哈希
    pub fn tx_hash(&self) -> String {
        format!("0x{}", hex::encode(Keccak256::digest(&self.raw)))
    }
}
