//! `$argon2id$v=19$m=..,t=..,p=..$salt$hash` strings

use super::params::{Argon2Variant, ARGON2_VERSION};
use crate::encoding::{decode_base64, encode_base64};
use crate::error::{HashError, Result};

const WHAT: &str = "Argon2 hash";

/// Parsed form of an encoded Argon2 hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedHash {
    /// Variant named in the identifier
    pub variant: Argon2Variant,
    /// Memory in KiB
    pub memory_size: u32,
    /// Number of passes
    pub iterations: u32,
    /// Number of lanes
    pub parallelism: u32,
    /// Decoded salt
    pub salt: Vec<u8>,
    /// Decoded tag
    pub hash: Vec<u8>,
}

impl EncodedHash {
    /// Canonical text form (`m`, `t`, `p` in that order, unpadded base64)
    pub fn encode(&self) -> String {
        format!(
            "${}$v={}$m={},t={},p={}${}${}",
            self.variant.name(),
            ARGON2_VERSION,
            self.memory_size,
            self.iterations,
            self.parallelism,
            encode_base64(&self.salt, false),
            encode_base64(&self.hash, false),
        )
    }

    /// Parse an encoded hash; `m`, `t` and `p` may come in any order
    pub fn parse(encoded: &str) -> Result<Self> {
        let fields: Vec<&str> = encoded.split('$').collect();
        let [empty, identifier, version, parameters, salt, hash] = fields.as_slice() else {
            return Err(HashError::format(WHAT, "expected six '$'-separated fields"));
        };
        if !empty.is_empty() {
            return Err(HashError::format(WHAT, "must start with '$'"));
        }

        let variant = match *identifier {
            "argon2d" => Argon2Variant::D,
            "argon2i" => Argon2Variant::I,
            "argon2id" => Argon2Variant::Id,
            other => return Err(HashError::format(WHAT, format!("unknown identifier '{}'", other))),
        };

        let version = version
            .strip_prefix("v=")
            .ok_or_else(|| HashError::format(WHAT, "missing version field"))?;
        if parse_number(version)? != ARGON2_VERSION {
            return Err(HashError::format(WHAT, format!("unsupported version {}", version)));
        }

        let (mut memory_size, mut iterations, mut parallelism) = (None, None, None);
        let pairs: Vec<&str> = parameters.split(',').collect();
        if pairs.len() != 3 {
            return Err(HashError::format(WHAT, "expected exactly m, t and p parameters"));
        }
        for pair in pairs {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| HashError::format(WHAT, format!("malformed parameter '{}'", pair)))?;
            let slot = match key {
                "m" => &mut memory_size,
                "t" => &mut iterations,
                "p" => &mut parallelism,
                _ => return Err(HashError::format(WHAT, format!("unknown parameter '{}'", key))),
            };
            if slot.replace(parse_number(value)?).is_some() {
                return Err(HashError::format(WHAT, format!("parameter '{}' repeated", key)));
            }
        }

        Ok(Self {
            variant,
            // Three distinct keys out of three pairs means all are present
            memory_size: memory_size.unwrap_or_default(),
            iterations: iterations.unwrap_or_default(),
            parallelism: parallelism.unwrap_or_default(),
            salt: decode_field(salt)?,
            hash: decode_field(hash)?,
        })
    }
}

fn parse_number(text: &str) -> Result<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(HashError::format(WHAT, format!("'{}' is not a decimal number", text)));
    }
    text.parse()
        .map_err(|_| HashError::format(WHAT, format!("{} is out of range", text)))
}

fn decode_field(text: &str) -> Result<Vec<u8>> {
    if text.is_empty() {
        return Err(HashError::format(WHAT, "empty base64 field"));
    }
    decode_base64(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const SAMPLE: &str = "$argon2i$v=19$m=64,t=1,p=1$c29tZXNhbHQ$ucQB0YRKZ9UOrjln3CiHCyLlCAkuhho3";

    #[test]
    fn test_parse_and_encode() {
        let parsed = EncodedHash::parse(SAMPLE).unwrap();
        assert_eq!(parsed.variant, Argon2Variant::I);
        assert_eq!((parsed.memory_size, parsed.iterations, parsed.parallelism), (64, 1, 1));
        assert_eq!(parsed.salt, b"somesalt");
        assert_eq!(parsed.hash.len(), 24);
        assert_eq!(parsed.encode(), SAMPLE);
    }

    #[test]
    fn test_parameter_order_is_free() {
        let shuffled = SAMPLE.replace("m=64,t=1,p=1", "p=1,m=64,t=1");
        let parsed = EncodedHash::parse(&shuffled).unwrap();
        assert_eq!(parsed, EncodedHash::parse(SAMPLE).unwrap());
        // Output is always canonical
        assert_eq!(parsed.encode(), SAMPLE);
    }

    #[test]
    fn test_rejects_malformed() {
        let cases = [
            "",
            "argon2i$v=19$m=64,t=1,p=1$c29tZXNhbHQ$ucQB",
            "$argon2x$v=19$m=64,t=1,p=1$c29tZXNhbHQ$ucQB0YRK",
            "$argon2i$v=16$m=64,t=1,p=1$c29tZXNhbHQ$ucQB0YRK",
            "$argon2i$19$m=64,t=1,p=1$c29tZXNhbHQ$ucQB0YRK",
            "$argon2i$v=19$m=64,t=1$c29tZXNhbHQ$ucQB0YRK",
            "$argon2i$v=19$m=64,m=1,p=1$c29tZXNhbHQ$ucQB0YRK",
            "$argon2i$v=19$m=64,t=1,x=1$c29tZXNhbHQ$ucQB0YRK",
            "$argon2i$v=19$m=-4,t=1,p=1$c29tZXNhbHQ$ucQB0YRK",
            "$argon2i$v=19$m=99999999999,t=1,p=1$c29tZXNhbHQ$ucQB0YRK",
            "$argon2i$v=19$m=64,t=1,p=1$c29tZXNhbHQ=$ucQB0YRK",
            "$argon2i$v=19$m=64,t=1,p=1$$ucQB0YRK",
            "$argon2i$v=19$m=64,t=1,p=1$c29tZXNhbHQ$ucQB0YRK$",
            "$argon2i$v=19$m=64,t=1,p=1$c29t!XNhbHQ$ucQB0YRK",
        ];
        for case in cases {
            let err = EncodedHash::parse(case).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "{:?}", case);
        }
    }
}
