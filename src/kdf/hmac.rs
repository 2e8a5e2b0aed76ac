//! HMAC over any streaming [`Hasher`]

use crate::config::HashAlgorithm;
use crate::encoding::to_hex;
use crate::engine::Registry;
use crate::error::{HashError, Result};
use crate::hash::{create_hasher, Hasher, HasherHandle};

const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5c;

/// Keyed MAC wrapping a hasher `H`.
///
/// `H` may be a borrowed `&mut HasherHandle`, so one engine can back many
/// successive MACs. Save/load is not offered: the pads live outside the
/// engine state.
pub struct Hmac<H: Hasher> {
    inner: H,
    ipad: Vec<u8>,
    opad: Vec<u8>,
}

impl<H: Hasher> Hmac<H> {
    /// Key `inner` and leave it ready for input
    pub fn new(mut inner: H, key: &[u8]) -> Result<Self> {
        let block_size = inner.block_size();
        if inner.digest_size() > block_size {
            return Err(HashError::validation(
                "hasher",
                format!(
                    "digest size {} exceeds block size {}",
                    inner.digest_size(),
                    block_size
                ),
            ));
        }

        let mut padded = if key.len() > block_size {
            inner.init()?;
            inner.update(key)?;
            inner.digest()?
        } else {
            key.to_vec()
        };
        padded.resize(block_size, 0);

        let ipad: Vec<u8> = padded.iter().map(|b| b ^ IPAD).collect();
        let opad: Vec<u8> = padded.iter().map(|b| b ^ OPAD).collect();

        inner.init()?;
        inner.update(&ipad)?;

        Ok(Self { inner, ipad, opad })
    }

    /// Release the wrapped hasher
    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: Hasher> Hasher for Hmac<H> {
    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn digest_size(&self) -> usize {
        self.inner.digest_size()
    }

    fn init(&mut self) -> Result<()> {
        self.inner.init()?;
        self.inner.update(&self.ipad)
    }

    fn update(&mut self, data: &[u8]) -> Result<()> {
        self.inner.update(data)
    }

    fn digest(&mut self) -> Result<Vec<u8>> {
        let inner_digest = self.inner.digest()?;
        self.inner.init()?;
        self.inner.update(&self.opad)?;
        self.inner.update(&inner_digest)?;
        self.inner.digest()
    }
}

impl<H: Hasher> std::fmt::Debug for Hmac<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hmac")
            .field("block_size", &self.ipad.len())
            .field("digest_size", &self.inner.digest_size())
            .finish_non_exhaustive()
    }
}

/// HMAC over a fresh hasher for `algorithm`
pub async fn create_hmac(
    registry: &Registry,
    algorithm: HashAlgorithm,
    key: &[u8],
) -> Result<Hmac<HasherHandle>> {
    let hasher = create_hasher(registry, algorithm).await?;
    Hmac::new(hasher, key)
}

/// HMAC of `data` under `key` as hex
pub async fn hmac(
    algorithm: HashAlgorithm,
    key: impl AsRef<[u8]>,
    data: impl AsRef<[u8]>,
) -> Result<String> {
    let mut mac = create_hmac(Registry::global()?, algorithm, key.as_ref()).await?;
    mac.update(data.as_ref())?;
    Ok(to_hex(&mac.digest()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::ErrorKind;
    use ::hmac::Mac;
    use blake2::digest::consts::U32;

    // Straddle both the 64-byte and the 128-byte pad widths
    const KEY_LENGTHS: [usize; 9] = [0, 1, 63, 64, 65, 127, 128, 129, 2000];
    const DATA_LENGTHS: [usize; 9] = [0, 1, 63, 64, 65, 127, 128, 129, 2000];

    fn bytes(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    fn reference(algorithm: HashAlgorithm, key: &[u8], data: &[u8]) -> Vec<u8> {
        macro_rules! mac {
            ($mac:ty) => {{
                let mut mac = <$mac as Mac>::new_from_slice(key).unwrap();
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }};
        }
        match algorithm {
            HashAlgorithm::Md5 => mac!(::hmac::Hmac<::md5::Md5>),
            HashAlgorithm::Sha1 => mac!(::hmac::Hmac<::sha1::Sha1>),
            HashAlgorithm::Sha224 => mac!(::hmac::Hmac<sha2::Sha224>),
            HashAlgorithm::Sha256 => mac!(::hmac::Hmac<sha2::Sha256>),
            HashAlgorithm::Sha384 => mac!(::hmac::Hmac<sha2::Sha384>),
            HashAlgorithm::Sha512 => mac!(::hmac::Hmac<sha2::Sha512>),
            HashAlgorithm::Blake2b256 => mac!(::hmac::SimpleHmac<blake2::Blake2b<U32>>),
            HashAlgorithm::Blake2b512 => mac!(::hmac::SimpleHmac<blake2::Blake2b512>),
            other => unreachable!("no reference for {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_rfc_vectors() {
        let registry = Registry::new(RuntimeConfig::default());

        let mut mac = create_hmac(&registry, HashAlgorithm::Sha256, b"Jefe").await.unwrap();
        mac.update(b"what do ya want for nothing?").unwrap();
        assert_eq!(
            mac.hex_digest().unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );

        let mut mac = create_hmac(&registry, HashAlgorithm::Md5, b"Jefe").await.unwrap();
        mac.update(b"what do ya want for nothing?").unwrap();
        assert_eq!(mac.hex_digest().unwrap(), "750c783e6ab0b503eaa86e310a5db738");
    }

    #[tokio::test]
    async fn test_matches_reference_across_lengths() {
        let registry = Registry::new(RuntimeConfig::default());

        let wrapped = HashAlgorithm::ALL
            .into_iter()
            .filter(|a| !matches!(a, HashAlgorithm::Crc32 | HashAlgorithm::Crc32c));
        for algorithm in wrapped {
            let mut hasher = create_hasher(&registry, algorithm).await.unwrap();
            for key_len in KEY_LENGTHS {
                let key = bytes(key_len, 7);
                for data_len in DATA_LENGTHS {
                    let data = bytes(data_len, 91);
                    let mut mac = Hmac::new(&mut hasher, &key).unwrap();
                    mac.update(&data).unwrap();
                    assert_eq!(
                        mac.digest().unwrap(),
                        reference(algorithm, &key, &data),
                        "{} key={} data={}",
                        algorithm.name(),
                        key_len,
                        data_len
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_reinit_and_reuse() {
        let registry = Registry::new(RuntimeConfig::default());
        let mut mac = create_hmac(&registry, HashAlgorithm::Sha1, b"key").await.unwrap();
        mac.update(b"message").unwrap();
        let first = mac.digest().unwrap();

        // Finished MACs refuse more input until re-initialized
        assert_eq!(mac.update(b"more").unwrap_err().kind(), ErrorKind::Usage);

        mac.init().unwrap();
        mac.update(b"mess").unwrap();
        mac.update(b"age").unwrap();
        assert_eq!(mac.digest().unwrap(), first);

        // The hasher serves a second key afterwards
        let hasher = mac.into_inner();
        let mut other = Hmac::new(hasher, b"other key").unwrap();
        other.update(b"message").unwrap();
        assert_eq!(
            other.digest().unwrap(),
            reference(HashAlgorithm::Sha1, b"other key", b"message")
        );
    }

    #[tokio::test]
    async fn test_independent_macs_interleave() {
        let registry = Registry::new(RuntimeConfig::default());
        let mut a = create_hmac(&registry, HashAlgorithm::Sha256, b"alpha").await.unwrap();
        let mut b = create_hmac(&registry, HashAlgorithm::Sha256, b"beta").await.unwrap();

        for chunk in [b"one".as_slice(), b"two", b"three"] {
            a.update(chunk).unwrap();
            b.update(chunk).unwrap();
        }

        assert_eq!(a.digest().unwrap(), reference(HashAlgorithm::Sha256, b"alpha", b"onetwothree"));
        assert_eq!(b.digest().unwrap(), reference(HashAlgorithm::Sha256, b"beta", b"onetwothree"));
    }

    #[tokio::test]
    async fn test_global_hmac() {
        let mac = hmac(HashAlgorithm::Sha512, "key", "data").await.unwrap();
        assert_eq!(mac, hex::encode(reference(HashAlgorithm::Sha512, b"key", b"data")));
    }
}
