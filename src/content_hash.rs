use anyhow::{Context, Result};
use sha2::{Digest, Sha256, Sha384};
use std::fmt;
use std::io::SeekFrom;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

const HASH_BUFFER_SIZE: usize = 256 * 1024;

/// SHA-256 of a resource's full byte content. Keys the upload-id cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hashes everything `reader` holds and seeks it back to byte zero, whether
/// or not the read succeeded.
pub async fn hash_and_rewind<R>(reader: &mut R) -> Result<ContentHash>
where
    R: AsyncRead + AsyncSeek + Unpin + ?Sized,
{
    let hashed = hash_from_start(reader).await;
    let rewound = reader.seek(SeekFrom::Start(0)).await;

    let hash = hashed.context("Failed to read resource content")?;
    rewound.context("Failed to rewind resource content")?;
    Ok(hash)
}

async fn hash_from_start<R>(reader: &mut R) -> std::io::Result<ContentHash>
where
    R: AsyncRead + AsyncSeek + Unpin + ?Sized,
{
    reader.seek(SeekFrom::Start(0)).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(ContentHash(hasher.finalize().into()))
}

/// Hex SHA-384, the hash the store uses for parts and whole resources.
pub fn sha384_hex(bytes: &[u8]) -> String {
    hex::encode(Sha384::digest(bytes))
}
