//! Ethereum addresses.
use std::fmt;

use error_stack::{Result, ResultExt};
use tiny_keccak::{Hasher, Keccak};

#[derive(Debug)]
pub struct AddressError;
impl error_stack::Context for AddressError {}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid address")
    }
}

/// A 20 bytes address, always stored in its EIP-55 checksum form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    /// Parse a `0x`-prefixed hex address, in any letter case.
    pub fn parse(value: &str) -> Result<Address, AddressError> {
        let Some(body) = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
        else {
            return Err(AddressError)
                .attach_printable("address must start with 0x")
                .attach_printable_lazy(|| format!("address: {value}"));
        };

        let bytes = hex::decode(body)
            .change_context(AddressError)
            .attach_printable_lazy(|| format!("address: {value}"))?;

        if bytes.len() != 20 {
            return Err(AddressError)
                .attach_printable(format!("expected 20 bytes, got {}", bytes.len()))
                .attach_printable_lazy(|| format!("address: {value}"));
        }

        Ok(Address(to_checksum(&body.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// `lower` is the lowercase hex body, without the `0x` prefix.
fn to_checksum(lower: &str) -> String {
    let mut hash = [0u8; 32];
    let mut hasher = Keccak::v256();
    hasher.update(lower.as_bytes());
    hasher.finalize(&mut hash);

    let mut checksummed = String::with_capacity(42);
    checksummed.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            checksummed.push(c.to_ascii_uppercase());
        } else {
            checksummed.push(c);
        }
    }
    checksummed
}

#[cfg(test)]
mod tests {
    use super::Address;

    #[test]
    fn test_checksum() {
        let cases = [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ];

        for expected in cases {
            let lower = Address::parse(&expected.to_lowercase()).unwrap();
            assert_eq!(lower.as_str(), expected);
            let upper = Address::parse(&format!("0x{}", &expected[2..].to_uppercase())).unwrap();
            assert_eq!(upper.as_str(), expected);
        }
    }

    #[test]
    fn test_reject_invalid() {
        assert!(Address::parse("").is_err());
        assert!(Address::parse("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_err());
        assert!(Address::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1bea").is_err());
        assert!(Address::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed00").is_err());
        assert!(Address::parse("0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_err());
        assert!(Address::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beae").is_err());
    }
}
