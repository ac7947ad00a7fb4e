//! Key-file persistence.
//!
//! Group scalars and elements are stored as their canonical decimal text,
//! ed25519 key material as raw bytes. The election key is assembled by
//! multiplying the per-arbiter public keys loaded from a list of files.

use ed25519_dalek::{SigningKey, VerifyingKey};

use std::{error::Error as StdError, fmt, fs, io, path::Path};

use crate::group::{Group, GroupElement, Scalar};
use crate::tally;

/// Error loading or saving a key file. Fatal at startup: a participant
/// without its keys cannot take part.
#[derive(Debug)]
pub enum KeyFileError {
    Io(io::Error),
    /// The file exists but does not hold a key of the expected shape.
    Malformed,
}

impl fmt::Display for KeyFileError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(formatter, "cannot access key file: {err}"),
            Self::Malformed => formatter.write_str("key file contents are malformed"),
        }
    }
}

impl StdError for KeyFileError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Malformed => None,
        }
    }
}

impl From<io::Error> for KeyFileError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

pub fn save_scalar(path: impl AsRef<Path>, scalar: &Scalar) -> Result<(), KeyFileError> {
    Ok(fs::write(path, scalar.to_string())?)
}

pub fn load_scalar(path: impl AsRef<Path>) -> Result<Scalar, KeyFileError> {
    let contents = fs::read_to_string(path)?;
    contents.trim().parse().map_err(|_| KeyFileError::Malformed)
}

pub fn save_element(path: impl AsRef<Path>, element: &GroupElement) -> Result<(), KeyFileError> {
    Ok(fs::write(path, element.to_string())?)
}

pub fn load_element(path: impl AsRef<Path>) -> Result<GroupElement, KeyFileError> {
    let contents = fs::read_to_string(path)?;
    contents.trim().parse().map_err(|_| KeyFileError::Malformed)
}

pub fn save_signing_key(path: impl AsRef<Path>, key: &SigningKey) -> Result<(), KeyFileError> {
    Ok(fs::write(path, key.to_bytes())?)
}

pub fn load_signing_key(path: impl AsRef<Path>) -> Result<SigningKey, KeyFileError> {
    let bytes = fs::read(path)?;
    let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| KeyFileError::Malformed)?;
    Ok(SigningKey::from_bytes(&bytes))
}

pub fn save_verifying_key(
    path: impl AsRef<Path>,
    key: &VerifyingKey,
) -> Result<(), KeyFileError> {
    Ok(fs::write(path, key.as_bytes())?)
}

pub fn load_verifying_key(path: impl AsRef<Path>) -> Result<VerifyingKey, KeyFileError> {
    let bytes = fs::read(path)?;
    let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| KeyFileError::Malformed)?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| KeyFileError::Malformed)
}

/// Loads the arbiters' public keys and multiplies them into the election
/// key. The arbiter set is fixed by the file list; a missing file aborts.
pub fn load_election_key<P: AsRef<Path>>(
    group: &Group,
    paths: &[P],
) -> Result<GroupElement, KeyFileError> {
    let mut keys = Vec::with_capacity(paths.len());
    for path in paths {
        keys.push(load_element(path)?);
    }
    Ok(tally::election_key(group, &keys))
}
