//! Misc utils: serde adapters for binary material.
//!
//! Stored records keep cryptographic payloads in their canonical wire form,
//! wrapped in base64url so they fit in JSON; identity keys and signatures are
//! base64url as well.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{de::Error, Deserialize, Deserializer, Serializer};

fn serialize_blob<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&Base64UrlUnpadded::encode_string(bytes))
}

fn deserialize_blob<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    Base64UrlUnpadded::decode_vec(&encoded).map_err(D::Error::custom)
}

pub(crate) mod verifying_key {
    use super::{deserialize_blob, serialize_blob, Error};
    use ed25519_dalek::VerifyingKey;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        key: &VerifyingKey,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serialize_blob(key.as_bytes(), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<VerifyingKey, D::Error> {
        let bytes = deserialize_blob(deserializer)?;
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| D::Error::custom("unexpected verification key length"))?;
        VerifyingKey::from_bytes(&bytes).map_err(D::Error::custom)
    }
}

pub(crate) mod signature {
    use super::{deserialize_blob, serialize_blob, Error};
    use ed25519_dalek::Signature;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        signature: &Signature,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serialize_blob(&signature.to_bytes(), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Signature, D::Error> {
        let bytes = deserialize_blob(deserializer)?;
        Signature::from_slice(&bytes).map_err(D::Error::custom)
    }
}

pub(crate) mod ballot_blob {
    use super::{deserialize_blob, serialize_blob, Error};
    use crate::ballot::EncryptedBallot;
    use crate::wire;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        ballot: &EncryptedBallot,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serialize_blob(&wire::encode_ballot(ballot), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<EncryptedBallot, D::Error> {
        let bytes = deserialize_blob(deserializer)?;
        wire::decode_ballot(&bytes).map_err(D::Error::custom)
    }
}

pub(crate) mod share_blob {
    use super::{deserialize_blob, serialize_blob, Error};
    use crate::tally::DecryptionShare;
    use crate::wire;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        shares: &[DecryptionShare],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serialize_blob(&wire::encode_decryption_shares(shares), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<DecryptionShare>, D::Error> {
        let bytes = deserialize_blob(deserializer)?;
        wire::decode_decryption_shares(&bytes).map_err(D::Error::custom)
    }
}

pub(crate) mod decryption_proof_blob {
    use super::{deserialize_blob, serialize_blob, Error};
    use crate::tally::DecryptionProof;
    use crate::wire;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        proofs: &[DecryptionProof],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serialize_blob(&wire::encode_decryption_proofs(proofs), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<DecryptionProof>, D::Error> {
        let bytes = deserialize_blob(deserializer)?;
        wire::decode_decryption_proofs(&bytes).map_err(D::Error::custom)
    }
}
