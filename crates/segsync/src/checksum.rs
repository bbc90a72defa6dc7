use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest, Md5};

const READ_BLOCK: usize = 64 * 1024;

/// Produces the digest used to address delta objects on the server.
///
/// Must be deterministic and match the server's naming scheme exactly.
pub trait ContentHasher: Send + Sync {
    fn hash_file(&self, path: &Path) -> io::Result<String>;
}

/// Lowercase hex MD5 over the whole file.
#[derive(Debug, Default, Clone, Copy)]
pub struct Md5Hasher;

impl ContentHasher for Md5Hasher {
    fn hash_file(&self, path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; READ_BLOCK];
        let mut total = 0u64;

        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            total += n as u64;
        }

        let digest = hex::encode(hasher.finalize());
        tracing::debug!(path = %path.display(), bytes = total, %digest, "hashed file");
        Ok(digest)
    }
}
