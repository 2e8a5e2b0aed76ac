//! Algorithm catalogue: streaming constructors and one-shot helpers
//!
//! Streaming hashers own their engine and run without locking. One-shot
//! helpers borrow the registry's shared engine for the algorithm, queueing
//! behind other callers of the same algorithm.

use super::handle::{Hasher, HasherHandle, HasherParams};
use crate::config::HashAlgorithm;
use crate::encoding::to_hex;
use crate::engine::Registry;
use crate::error::{HashError, IoResultExt, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Read buffer for [`hash_file`]
const FILE_BUFFER_SIZE: usize = 1024 * 1024;

/// Largest BLAKE2b key in bytes
pub const BLAKE2B_MAX_KEY_LEN: usize = 64;

/// Hash result as hex string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashResult {
    /// The hash algorithm used
    pub algorithm: HashAlgorithm,
    /// Hash value as lowercase hex string
    pub hash: String,
    /// Number of bytes hashed
    pub size: u64,
}

impl std::fmt::Display for HashResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

fn params_for(algorithm: HashAlgorithm) -> HasherParams {
    HasherParams {
        block_size: algorithm.block_size(),
        init_param: algorithm.init_param(),
        ..Default::default()
    }
}

/// `init` parameter of the BLAKE2b module for a digest size and key length
pub fn blake2b_param(bits: u32, key_len: usize) -> Result<u32> {
    if bits == 0 || bits > 512 || bits % 8 != 0 {
        return Err(HashError::validation(
            "bits",
            format!("BLAKE2b digest size must be a multiple of 8 in 8..=512, got {}", bits),
        ));
    }
    if key_len > BLAKE2B_MAX_KEY_LEN {
        return Err(HashError::validation(
            "key",
            format!("BLAKE2b keys are at most {} bytes, got {}", BLAKE2B_MAX_KEY_LEN, key_len),
        ));
    }
    Ok(bits | ((key_len as u32 * 8) << 16))
}

/// Initialized streaming hasher for `algorithm`
pub async fn create_hasher(registry: &Registry, algorithm: HashAlgorithm) -> Result<HasherHandle> {
    let engine = registry
        .instantiate(algorithm.asset(), algorithm.output_size())
        .await?;
    let mut hasher = HasherHandle::new(engine, params_for(algorithm))?;
    hasher.init()?;
    Ok(hasher)
}

/// Initialized BLAKE2b hasher with a `bits`-bit digest and optional key
pub async fn create_blake2b(registry: &Registry, bits: u32, key: Option<&[u8]>) -> Result<HasherHandle> {
    let key = key.unwrap_or_default();
    let init_param = blake2b_param(bits, key.len())?;

    let engine = registry.instantiate("blake2b", bits as usize / 8).await?;
    let mut hasher = HasherHandle::new(
        engine,
        HasherParams {
            block_size: 128,
            init_param: Some(init_param),
            final_param: None,
            preload: key.to_vec(),
        },
    )?;
    hasher.init()?;
    Ok(hasher)
}

/// One-shot digest through the registry's shared engine
pub async fn digest(registry: &Registry, algorithm: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
    registry
        .with_shared(algorithm.asset(), algorithm.output_size(), |engine| {
            Ok(engine.hash(data, algorithm.init_param(), None)?.to_vec())
        })
        .await
}

/// One-shot BLAKE2b digest through the registry's shared engine
pub async fn digest_blake2b(registry: &Registry, data: &[u8], bits: u32, key: Option<&[u8]>) -> Result<Vec<u8>> {
    let key = key.unwrap_or_default();
    let init_param = blake2b_param(bits, key.len())?;

    registry
        .with_shared("blake2b", bits as usize / 8, |engine| {
            engine.write(key, 0)?;
            Ok(engine.hash(data, Some(init_param), None)?.to_vec())
        })
        .await
}

/// Stream a file through a fresh hasher
pub async fn hash_file(registry: &Registry, path: &Path, algorithm: HashAlgorithm) -> Result<HashResult> {
    let mut file = tokio::fs::File::open(path).await.with_path(path)?;
    let mut hasher = create_hasher(registry, algorithm).await?;
    let mut buffer = vec![0u8; FILE_BUFFER_SIZE];
    let mut size = 0u64;

    loop {
        let read = file.read(&mut buffer).await.with_path(path)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read])?;
        size += read as u64;
    }

    Ok(HashResult {
        algorithm,
        hash: hasher.hex_digest()?,
        size,
    })
}

async fn global_hex(algorithm: HashAlgorithm, data: &[u8]) -> Result<String> {
    Ok(to_hex(&digest(Registry::global()?, algorithm, data).await?))
}

/// MD5 of `data` as hex
pub async fn md5(data: impl AsRef<[u8]>) -> Result<String> {
    global_hex(HashAlgorithm::Md5, data.as_ref()).await
}

/// SHA-1 of `data` as hex
pub async fn sha1(data: impl AsRef<[u8]>) -> Result<String> {
    global_hex(HashAlgorithm::Sha1, data.as_ref()).await
}

/// SHA-224 of `data` as hex
pub async fn sha224(data: impl AsRef<[u8]>) -> Result<String> {
    global_hex(HashAlgorithm::Sha224, data.as_ref()).await
}

/// SHA-256 of `data` as hex
pub async fn sha256(data: impl AsRef<[u8]>) -> Result<String> {
    global_hex(HashAlgorithm::Sha256, data.as_ref()).await
}

/// SHA-384 of `data` as hex
pub async fn sha384(data: impl AsRef<[u8]>) -> Result<String> {
    global_hex(HashAlgorithm::Sha384, data.as_ref()).await
}

/// SHA-512 of `data` as hex
pub async fn sha512(data: impl AsRef<[u8]>) -> Result<String> {
    global_hex(HashAlgorithm::Sha512, data.as_ref()).await
}

/// CRC-32 of `data` as hex
pub async fn crc32(data: impl AsRef<[u8]>) -> Result<String> {
    global_hex(HashAlgorithm::Crc32, data.as_ref()).await
}

/// CRC-32C of `data` as hex
pub async fn crc32c(data: impl AsRef<[u8]>) -> Result<String> {
    global_hex(HashAlgorithm::Crc32c, data.as_ref()).await
}

/// BLAKE2b of `data` as hex, `bits`-bit digest, optionally keyed
pub async fn blake2b(data: impl AsRef<[u8]>, bits: u32, key: Option<&[u8]>) -> Result<String> {
    let digest = digest_blake2b(Registry::global()?, data.as_ref(), bits, key).await?;
    Ok(to_hex(&digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::ErrorKind;
    use proptest::prelude::*;
    use sha2::Digest as _;
    use std::io::Write;

    const CHUNK_SIZES: [usize; 10] = [1, 3, 27, 50, 57, 64, 91, 127, 256, 300];

    fn registry() -> Registry {
        Registry::new(RuntimeConfig::default())
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    fn reference(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
        match algorithm {
            HashAlgorithm::Md5 => ::md5::Md5::digest(data).to_vec(),
            HashAlgorithm::Sha1 => ::sha1::Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha224 => sha2::Sha224::digest(data).to_vec(),
            HashAlgorithm::Sha256 => sha2::Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => sha2::Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => sha2::Sha512::digest(data).to_vec(),
            HashAlgorithm::Blake2b256 => blake2::Blake2b::<blake2::digest::consts::U32>::digest(data).to_vec(),
            HashAlgorithm::Blake2b512 => blake2::Blake2b512::digest(data).to_vec(),
            HashAlgorithm::Crc32 | HashAlgorithm::Crc32c => unreachable!("no reference crate"),
        }
    }

    #[tokio::test]
    async fn test_known_vectors() {
        let registry = registry();
        let cases = [
            (HashAlgorithm::Md5, "", "d41d8cd98f00b204e9800998ecf8427e"),
            (HashAlgorithm::Md5, "abc", "900150983cd24fb0d6963f7d28e17f72"),
            (HashAlgorithm::Sha1, "abc", "a9993e364706816aba3e25717850c26c9cd0d89d"),
            (
                HashAlgorithm::Sha224,
                "abc",
                "23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7",
            ),
            (
                HashAlgorithm::Sha256,
                "",
                "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            ),
            (
                HashAlgorithm::Sha256,
                "abc",
                "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
            ),
            (
                HashAlgorithm::Blake2b512,
                "",
                "786a02f742015903c6c6fd852552d272912f4740e15847618a86e217f71f5419d25e1031afee585313896444934eb04b903a685b1448b755d56f701afe9be2ce",
            ),
            (HashAlgorithm::Crc32, "123456789", "cbf43926"),
            (HashAlgorithm::Crc32c, "123456789", "e3069283"),
            (HashAlgorithm::Crc32, "", "00000000"),
        ];

        for (algorithm, input, expected) in cases {
            let mut hasher = create_hasher(&registry, algorithm).await.unwrap();
            hasher.update(input.as_bytes()).unwrap();
            assert_eq!(hasher.hex_digest().unwrap(), expected, "{}", algorithm.name());

            let one_shot = digest(&registry, algorithm, input.as_bytes()).await.unwrap();
            assert_eq!(to_hex(&one_shot), expected, "{} one-shot", algorithm.name());
        }
    }

    #[tokio::test]
    async fn test_matches_reference_crates() {
        let registry = registry();
        for algorithm in HashAlgorithm::ALL {
            if matches!(algorithm, HashAlgorithm::Crc32 | HashAlgorithm::Crc32c) {
                continue;
            }
            for len in [0, 1, 55, 56, 63, 64, 65, 111, 112, 127, 128, 129, 1000, 20_000, 40_000] {
                let data = sample(len);
                let mut hasher = create_hasher(&registry, algorithm).await.unwrap();
                hasher.update(&data).unwrap();
                assert_eq!(
                    hasher.digest().unwrap(),
                    reference(algorithm, &data),
                    "{} over {} bytes",
                    algorithm.name(),
                    len
                );
            }
        }
    }

    #[tokio::test]
    async fn test_chunk_invariance() {
        let registry = registry();
        let data = sample(5000);

        for algorithm in HashAlgorithm::ALL {
            let whole = digest(&registry, algorithm, &data).await.unwrap();
            for size in CHUNK_SIZES {
                let mut hasher = create_hasher(&registry, algorithm).await.unwrap();
                for chunk in data.chunks(size) {
                    hasher.update(chunk).unwrap();
                }
                assert_eq!(hasher.digest().unwrap(), whole, "{} in {}-byte chunks", algorithm.name(), size);
            }
        }
    }

    #[tokio::test]
    async fn test_keyed_blake2b() {
        let registry = registry();
        let key: Vec<u8> = (0..64).collect();

        let mut hasher = create_blake2b(&registry, 512, Some(&key)).await.unwrap();
        assert_eq!(
            hasher.hex_digest().unwrap(),
            "10ebb67700b1868efb4417987acf4690ae9d972fb7a590c2f02871799aaa4786b5e996e8f0f4eb981fc214b005f42d2ff4233499391653df7aefcbc13fc51568"
        );

        let mut hasher = create_blake2b(&registry, 256, Some(b"key")).await.unwrap();
        hasher.update(b"abc").unwrap();
        let streamed = hasher.digest().unwrap();
        let one_shot = digest_blake2b(&registry, b"abc", 256, Some(b"key")).await.unwrap();
        assert_eq!(streamed, one_shot);
        assert_eq!(streamed.len(), 32);

        // Re-init replays the key
        hasher.init().unwrap();
        hasher.update(b"abc").unwrap();
        assert_eq!(hasher.digest().unwrap(), streamed);

        assert_eq!(
            create_blake2b(&registry, 100, None).await.unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            create_blake2b(&registry, 512, Some(&[0u8; 65])).await.unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[tokio::test]
    async fn test_hash_file() {
        let registry = registry();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data = sample(FILE_BUFFER_SIZE + 4321);
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let result = hash_file(&registry, file.path(), HashAlgorithm::Sha256).await.unwrap();
        assert_eq!(result.size, data.len() as u64);
        assert_eq!(result.hash, hex::encode(sha2::Sha256::digest(&data)));
        assert_eq!(result.to_string(), result.hash);

        let missing = hash_file(&registry, Path::new("/nonexistent/file"), HashAlgorithm::Md5).await;
        assert!(matches!(missing, Err(HashError::Io { .. })));
    }

    #[tokio::test]
    async fn test_global_helpers() {
        assert_eq!(md5("").await.unwrap(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(sha1(b"abc").await.unwrap(), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(crc32c("123456789").await.unwrap(), "e3069283");
        assert_eq!(
            sha384("abc").await.unwrap(),
            hex::encode(sha2::Sha384::digest(b"abc"))
        );
        assert_eq!(
            blake2b("abc", 512, None).await.unwrap(),
            "ba80a53f981c4d0d6a2797b69f12f6e94c212f14685ac4b74b12bb6fdbffa2d17d87c5392aab792dc252d5de4533cc9518d38aa8dbf1925ab92386edd4009923"
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_split_point_does_not_matter(
            data in proptest::collection::vec(any::<u8>(), 0..2048),
            split in any::<proptest::sample::Index>(),
        ) {
            let registry = registry();
            let at = split.index(data.len() + 1);
            let (split_digest, whole_digest) = tokio_test::block_on(async {
                let mut split_hasher = create_hasher(&registry, HashAlgorithm::Sha512).await.unwrap();
                split_hasher.update(&data[..at]).unwrap();
                split_hasher.update(&data[at..]).unwrap();
                let whole = digest(&registry, HashAlgorithm::Sha512, &data).await.unwrap();
                (split_hasher.digest().unwrap(), whole)
            });
            prop_assert_eq!(split_digest, whole_digest);
        }
    }
}
