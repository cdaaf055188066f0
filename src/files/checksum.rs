use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Default read buffer for [`file_checksum`], 8 MiB
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    Md5,
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
    #[serde(rename = "sha512_224")]
    #[value(name = "sha512_224")]
    Sha512_224,
    #[serde(rename = "sha512_256")]
    #[value(name = "sha512_256")]
    Sha512_256,
    Blake3,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 8] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha512_224,
        HashAlgorithm::Sha512_256,
        HashAlgorithm::Blake3,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Sha512_224 => "sha512_224",
            HashAlgorithm::Sha512_256 => "sha512_256",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    fn hasher(&self) -> Hasher {
        match self {
            HashAlgorithm::Md5 => Hasher::Md5(md5::Context::new()),
            HashAlgorithm::Sha224 => Hasher::Sha224(sha2::Sha224::new()),
            HashAlgorithm::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Sha384 => Hasher::Sha384(sha2::Sha384::new()),
            HashAlgorithm::Sha512 => Hasher::Sha512(sha2::Sha512::new()),
            HashAlgorithm::Sha512_224 => Hasher::Sha512_224(sha2::Sha512_224::new()),
            HashAlgorithm::Sha512_256 => Hasher::Sha512_256(sha2::Sha512_256::new()),
            HashAlgorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        HashAlgorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == normalized)
            .with_context(|| format!("Unsupported checksum algorithm: {s}"))
    }
}

/// Streaming state for one algorithm
enum Hasher {
    Md5(md5::Context),
    Sha224(sha2::Sha224),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
    Sha512_224(sha2::Sha512_224),
    Sha512_256(sha2::Sha512_256),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(ctx) => ctx.consume(data),
            Hasher::Sha224(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha384(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
            Hasher::Sha512_224(h) => h.update(data),
            Hasher::Sha512_256(h) => h.update(data),
            Hasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Hasher::Md5(ctx) => format!("{:x}", ctx.compute()),
            Hasher::Sha224(h) => hex::encode(h.finalize()),
            Hasher::Sha256(h) => hex::encode(h.finalize()),
            Hasher::Sha384(h) => hex::encode(h.finalize()),
            Hasher::Sha512(h) => hex::encode(h.finalize()),
            Hasher::Sha512_224(h) => hex::encode(h.finalize()),
            Hasher::Sha512_256(h) => hex::encode(h.finalize()),
            Hasher::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Hex digest of the bytes in `reader`, read `buffer_size` bytes at a time
pub fn checksum_reader<R: Read>(mut reader: R, algorithm: HashAlgorithm, buffer_size: usize) -> Result<String> {
    let mut hasher = algorithm.hasher();
    let mut buffer = vec![0_u8; buffer_size.max(1)];

    loop {
        let read = reader.read(&mut buffer).context("Failed to read input")?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.finalize_hex())
}

/// Lowercase hex checksum of a file.
///
/// The file is streamed, so memory use is bounded by `buffer_size`
/// ([`DEFAULT_BUFFER_SIZE`] is a good default) whatever the file size.
pub fn file_checksum<P: AsRef<Path>>(path: P, algorithm: HashAlgorithm, buffer_size: usize) -> Result<String> {
    let path = path.as_ref();
    if !path.exists() {
        bail!("File does not exist: {}", path.display());
    }
    if !path.is_file() {
        bail!("Not a regular file: {}", path.display());
    }

    let file = File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    checksum_reader(file, algorithm, buffer_size)
        .with_context(|| format!("Failed to compute {algorithm} checksum of {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HELLO: &[u8] = b"hello world";

    fn hello_file() -> (TempDir, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, HELLO).unwrap();
        (temp_dir, file_path)
    }

    #[test]
    fn test_file_checksum_known_digests() {
        let (_temp_dir, file_path) = hello_file();

        assert_eq!(
            file_checksum(&file_path, HashAlgorithm::Md5, DEFAULT_BUFFER_SIZE).unwrap(),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
        assert_eq!(
            file_checksum(&file_path, HashAlgorithm::Sha256, DEFAULT_BUFFER_SIZE).unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_small_buffer_gives_same_digest() {
        let (_temp_dir, file_path) = hello_file();
        for algorithm in HashAlgorithm::ALL {
            let whole = file_checksum(&file_path, algorithm, DEFAULT_BUFFER_SIZE).unwrap();
            let chunked = file_checksum(&file_path, algorithm, 3).unwrap();
            assert_eq!(whole, chunked, "{algorithm} differs with a small buffer");
        }
    }

    #[test]
    fn test_digest_lengths() {
        let expected = [
            (HashAlgorithm::Md5, 32),
            (HashAlgorithm::Sha224, 56),
            (HashAlgorithm::Sha256, 64),
            (HashAlgorithm::Sha384, 96),
            (HashAlgorithm::Sha512, 128),
            (HashAlgorithm::Sha512_224, 56),
            (HashAlgorithm::Sha512_256, 64),
            (HashAlgorithm::Blake3, 64),
        ];
        for (algorithm, len) in expected {
            let digest = checksum_reader(HELLO, algorithm, 16).unwrap();
            assert_eq!(digest.len(), len, "{algorithm}");
        }
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = file_checksum(temp_dir.path().join("not_exists.txt"), HashAlgorithm::Sha256, DEFAULT_BUFFER_SIZE);
        assert!(result.is_err());
    }

    #[test]
    fn test_directory_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(file_checksum(temp_dir.path(), HashAlgorithm::Sha256, DEFAULT_BUFFER_SIZE).is_err());
    }

    #[test]
    fn test_algorithm_names_round_trip() {
        for algorithm in HashAlgorithm::ALL {
            assert_eq!(algorithm.name().parse::<HashAlgorithm>().unwrap(), algorithm);
        }
        assert_eq!("SHA-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert!("crc32".parse::<HashAlgorithm>().is_err());

        let parsed: HashAlgorithm = serde_json::from_str("\"sha512_224\"").unwrap();
        assert_eq!(parsed, HashAlgorithm::Sha512_224);
    }
}
