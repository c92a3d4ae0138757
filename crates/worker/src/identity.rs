use std::path::{Path, PathBuf};

const KEYPAIR_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub(crate) enum IdentityError {
    #[error("failed to read host identity {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("host identity {path} is not a JSON byte array: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("host identity {path} holds {len} bytes, expected {KEYPAIR_LEN}")]
    InvalidLength { path: PathBuf, len: usize },
}

/// Public half of the host keypair. The private half is read only to
/// validate the file shape and is not retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HostIdentity {
    public_key: [u8; 32],
}

impl HostIdentity {
    /// Reads a keypair stored as a JSON array of 64 bytes, secret key first.
    pub(crate) fn load(path: &Path) -> Result<Self, IdentityError> {
        let contents = std::fs::read_to_string(path).map_err(|source| IdentityError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let bytes: Vec<u8> =
            serde_json::from_str(&contents).map_err(|source| IdentityError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        let public_key: [u8; 32] = bytes
            .get(32..)
            .filter(|_| bytes.len() == KEYPAIR_LEN)
            .and_then(|tail| tail.try_into().ok())
            .ok_or(IdentityError::InvalidLength {
                path: path.to_path_buf(),
                len: bytes.len(),
            })?;

        Ok(Self { public_key })
    }

    pub(crate) fn public_key_hex(&self) -> String {
        hex::encode(self.public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_identity(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_loads_public_key_from_tail() {
        let bytes: Vec<u8> = (0..64).collect();
        let file = write_identity(&serde_json::to_string(&bytes).unwrap());

        let identity = HostIdentity::load(file.path()).unwrap();
        assert_eq!(identity.public_key_hex(), hex::encode(&bytes[32..]));
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        let file = write_identity("[1, 2, 3]");
        assert!(matches!(
            HostIdentity::load(file.path()),
            Err(IdentityError::InvalidLength { len: 3, .. })
        ));
    }

    #[test]
    fn test_non_array_is_malformed() {
        let file = write_identity("{\"secret\": \"abc\"}");
        assert!(matches!(
            HostIdentity::load(file.path()),
            Err(IdentityError::Malformed { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            HostIdentity::load(&dir.path().join("missing.json")),
            Err(IdentityError::Read { .. })
        ));
    }
}
