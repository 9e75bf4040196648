pub mod address_validator;

pub use address_validator::{to_checksum_address, AddressValidator};
