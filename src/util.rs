//! Content hashing and small shared helpers

use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncReadExt;

/// Read buffer size for streaming file hashes
const HASH_BUFFER_SIZE: usize = 65536;

/// Hash a byte slice with BLAKE3, hex-encoded
pub fn hash_bytes(buf: &[u8]) -> String {
	hex::encode(blake3::hash(buf).as_bytes())
}

/// Hash a file's contents with BLAKE3, hex-encoded
///
/// Streams the file in 64 KiB reads so large files never have to fit
/// in memory.
pub async fn hash_file(path: &Path) -> io::Result<String> {
	let mut file = tokio::fs::File::open(path).await?;
	let mut hasher = blake3::Hasher::new();
	let mut buf = vec![0u8; HASH_BUFFER_SIZE];

	loop {
		let n = file.read(&mut buf).await?;
		if n == 0 {
			break;
		}
		hasher.update(&buf[..n]);
	}

	Ok(hex::encode(hasher.finalize().as_bytes()))
}

/// Current unix time in milliseconds
pub fn now_millis() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Make a path absolute without touching the filesystem
///
/// Relative paths are resolved against the current working directory.
/// Symlinks are not resolved, so the result stays comparable with paths
/// reported by the OS notification layer.
pub fn absolutize(path: &Path) -> PathBuf {
	if path.is_absolute() {
		normalize(path)
	} else {
		match std::env::current_dir() {
			Ok(cwd) => normalize(&cwd.join(path)),
			Err(_) => normalize(path),
		}
	}
}

/// Remove `.` and `..` components lexically
fn normalize(path: &Path) -> PathBuf {
	use std::path::Component;

	let mut out = PathBuf::new();
	for comp in path.components() {
		match comp {
			Component::CurDir => {}
			Component::ParentDir => {
				out.pop();
			}
			other => out.push(other.as_os_str()),
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hash_bytes_stable() {
		let a = hash_bytes(b"hello");
		let b = hash_bytes(b"hello");
		assert_eq!(a, b);
		assert_eq!(a.len(), 64); // 32-byte BLAKE3 digest, hex-encoded
	}

	#[test]
	fn test_hash_bytes_differs() {
		assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
	}

	#[tokio::test]
	async fn test_hash_file_matches_bytes() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("f.txt");
		tokio::fs::write(&path, b"some content").await.unwrap();

		let from_file = hash_file(&path).await.unwrap();
		assert_eq!(from_file, hash_bytes(b"some content"));
	}

	#[test]
	fn test_absolutize_normalizes() {
		let p = absolutize(Path::new("/a/b/../c/./d"));
		assert_eq!(p, PathBuf::from("/a/c/d"));
	}
}

// vim: ts=4
