//! 密码学热点基准
//! 使用criterion测量 Vault 加解密、地址池派生与交易签名

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ethers::types::U256;
use hdcore::{
    config::VaultConfig,
    domain::{chain_config, mnemonic, HdKey},
    infrastructure::encryption::Vault,
    repository::{AccountRecord, AccountRepository},
    service::{transaction_builder, AccountRegistry},
};

const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

fn root() -> HdKey {
    let seed = mnemonic::to_seed(TEST_MNEMONIC, "").unwrap();
    HdKey::master_from_seed(&seed[..]).unwrap()
}

fn bench_vault(c: &mut Criterion) {
    let vault = Vault::new(&VaultConfig::default()).unwrap();
    let xprv = root().to_xprv();
    let blob = vault.encrypt("bench-password", xprv.as_bytes()).unwrap();

    let mut group = c.benchmark_group("vault");
    group.sample_size(10);
    group.bench_function("encrypt_root_key", |b| {
        b.iter(|| vault.encrypt(black_box("bench-password"), xprv.as_bytes()).unwrap())
    });
    group.bench_function("decrypt_root_key", |b| {
        b.iter(|| vault.decrypt(black_box("bench-password"), &blob).unwrap())
    });
    group.finish();
}

struct NullRepo;

#[async_trait::async_trait]
impl AccountRepository for NullRepo {
    async fn count(&self, _: &str) -> hdcore::Result<u32> {
        Ok(0)
    }
    async fn find_address(&self, _: &str, _: u32) -> hdcore::Result<Option<String>> {
        Ok(None)
    }
    async fn list(&self, _: &str) -> hdcore::Result<Vec<AccountRecord>> {
        Ok(Vec::new())
    }
    async fn replace_pool(&self, _: &str, _: &[AccountRecord]) -> hdcore::Result<()> {
        Ok(())
    }
}

fn bench_pool_derivation(c: &mut Criterion) {
    let root = root();
    let eth = chain_config::lookup("ETH").unwrap();
    let registry = AccountRegistry::new(eth, None, Arc::new(NullRepo));

    c.bench_function("derive_eth_pool_21", |b| {
        b.iter(|| black_box(registry.derive_pool(&root).unwrap()))
    });
}

fn bench_sign(c: &mut Criterion) {
    let key = root().derive_account_key(60, 0).unwrap();
    let tx = transaction_builder::build_unsigned(
        U256::from(7u64),
        U256::from(20_000_000_000u64),
        U256::from(21_000u64),
        "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
        U256::exp10(18),
        None,
    )
    .unwrap();

    c.bench_function("sign_eip155_transaction", |b| {
        b.iter(|| {
            transaction_builder::sign(black_box(&tx), key.signing_key(), U256::from(31337u64))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_vault, bench_pool_derivation, bench_sign);
criterion_main!(benches);
