//! Election configuration and the records participants exchange.
//!
//! The cryptographic payloads inside records serialise through their
//! canonical wire form (see [`crate::wire`]); identities are ed25519 keys.

use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::ballot::{ChoiceCiphertext, EncryptedBallot};
use crate::group::{Group, GroupElement};
use crate::tally::{DecryptionProof, DecryptionShare};
use crate::wire;

pub mod keys;
pub mod roles;
pub mod store;

/// Ballot-counting parameters fixed before the election starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionParams {
    /// Number of candidates on every ballot.
    pub options: usize,
    /// Exact number of candidates each ballot must select.
    pub selections: usize,
}

/// Public election configuration shared by every participant.
///
/// Everything in here is public knowledge: the group, the counting
/// parameters, the joint election key and the long-lived verification keys
/// of the registrar and the tallyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Election {
    pub group: Group,
    pub params: ElectionParams,
    /// Product of the arbiters' public keys; ballots are encrypted to it.
    pub election_key: GroupElement,
    #[serde(with = "crate::utils::verifying_key")]
    pub registrar_key: VerifyingKey,
    #[serde(with = "crate::utils::verifying_key")]
    pub tallyer_key: VerifyingKey,
}

/// Registrar-issued binding between a voter id and a verification key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub voter_id: String,
    #[serde(with = "crate::utils::verifying_key")]
    pub verification_key: VerifyingKey,
    #[serde(with = "crate::utils::signature")]
    pub signature: Signature,
}

impl Certificate {
    pub fn verify(&self, registrar_key: &VerifyingKey) -> bool {
        let payload =
            wire::certificate_payload(&self.voter_id, self.verification_key.as_bytes());
        registrar_key.verify_strict(&payload, &self.signature).is_ok()
    }
}

/// A voter's complete submission to the tallyer: the certificate, the
/// encrypted ballot and the voter's signature over the ballot's wire form.
#[derive(Debug, Clone)]
pub struct BallotSubmission {
    pub certificate: Certificate,
    pub ballot: EncryptedBallot,
    pub signature: Signature,
}

/// A ballot the tallyer accepted and counter-signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotRecord {
    #[serde(with = "crate::utils::ballot_blob")]
    pub ballot: EncryptedBallot,
    #[serde(with = "crate::utils::signature")]
    pub signature: Signature,
}

impl BallotRecord {
    /// Checks the tallyer's counter-signature.
    pub fn verify(&self, tallyer_key: &VerifyingKey) -> bool {
        let payload = wire::encode_ballot(&self.ballot);
        tallyer_key.verify_strict(&payload, &self.signature).is_ok()
    }
}

/// One arbiter's published partial decryptions, one per candidate slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptionRecord {
    pub arbiter_id: String,
    /// The arbiter's share of the election key.
    pub arbiter_key: GroupElement,
    #[serde(with = "crate::utils::share_blob")]
    pub shares: Vec<DecryptionShare>,
    #[serde(with = "crate::utils::decryption_proof_blob")]
    pub proofs: Vec<DecryptionProof>,
}

impl DecryptionRecord {
    /// Index of the first share that fails against the expected aggregated
    /// ciphertexts, or `None` if the whole record is sound. A share over a
    /// ciphertext other than the expected slot counts as a failure; the
    /// arbiter must decrypt what was actually tallied.
    pub fn first_invalid_share(
        &self,
        group: &Group,
        expected_slots: &[ChoiceCiphertext],
    ) -> Option<usize> {
        if self.shares.len() != expected_slots.len() || self.proofs.len() != expected_slots.len()
        {
            return Some(0);
        }
        for (index, (share, proof)) in self.shares.iter().zip(&self.proofs).enumerate() {
            if share.ciphertext != expected_slots[index] {
                return Some(index);
            }
            if !proof.verify(group, &self.arbiter_key, share) {
                return Some(index);
            }
        }
        None
    }
}
