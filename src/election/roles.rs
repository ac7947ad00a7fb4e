//! Operations of the election participants.
//!
//! The registrar certifies voter keys, voters build signed ballot
//! submissions, the tallyer authenticates and persists them, arbiters
//! publish partial decryptions and any observer can verify the outcome.
//! All of these speak through the shared [`ElectionStore`].

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use log::{info, warn};
use rand_core::{CryptoRng, RngCore};

use std::{error::Error as StdError, fmt};

use super::store::{ElectionStore, StoreError};
use super::{BallotRecord, BallotSubmission, Certificate, DecryptionRecord, Election};
use crate::ballot::{BallotError, EncryptedBallot};
use crate::group::GroupElement;
use crate::tally::{self, DecryptionKeys, DecryptionShare};
use crate::wire;

/// Issues certificates binding voter ids to their verification keys.
pub struct Registrar {
    signing_key: SigningKey,
}

impl fmt::Debug for Registrar {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Registrar").finish_non_exhaustive()
    }
}

impl Registrar {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    pub fn verification_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Certifies a voter and records the certificate. Re-registering an id
    /// replaces the previous certificate.
    pub fn register(
        &self,
        store: &ElectionStore,
        voter_id: &str,
        verification_key: &VerifyingKey,
    ) -> Result<Certificate, StoreError> {
        let payload = wire::certificate_payload(voter_id, verification_key.as_bytes());
        let certificate = Certificate {
            voter_id: voter_id.to_owned(),
            verification_key: *verification_key,
            signature: self.signing_key.sign(&payload),
        };
        store.insert_voter(certificate.clone())?;
        info!("registered voter {voter_id}");
        Ok(certificate)
    }
}

/// Reason a voter-side ballot could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastError {
    ChoicesLength { expected: usize, actual: usize },
    SelectionCount { expected: usize, actual: usize },
}

impl fmt::Display for CastError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChoicesLength { expected, actual } => write!(
                formatter,
                "ballot must cover {expected} candidates, got {actual}"
            ),
            Self::SelectionCount { expected, actual } => write!(
                formatter,
                "ballot must select exactly {expected} candidates, got {actual}"
            ),
        }
    }
}

impl StdError for CastError {}

/// Builds a voter's signed submission: per-candidate encryptions with their
/// proofs, the count proof for the election's required selection count, and
/// the voter's signature over the canonical ballot bytes.
pub fn cast_ballot<R: RngCore + CryptoRng>(
    rng: &mut R,
    election: &Election,
    certificate: &Certificate,
    signing_key: &SigningKey,
    selections: &[bool],
) -> Result<BallotSubmission, CastError> {
    let params = election.params;
    if selections.len() != params.options {
        return Err(CastError::ChoicesLength {
            expected: params.options,
            actual: selections.len(),
        });
    }
    let selected = selections.iter().filter(|&&s| s).count();
    if selected != params.selections {
        return Err(CastError::SelectionCount {
            expected: params.selections,
            actual: selected,
        });
    }

    let ballot = EncryptedBallot::new(
        rng,
        &election.group,
        &election.election_key,
        selections,
        params.selections,
    );
    let signature = signing_key.sign(&wire::encode_ballot(&ballot));
    Ok(BallotSubmission {
        certificate: certificate.clone(),
        ballot,
        signature,
    })
}

/// Reason the tallyer rejected a submission.
#[derive(Debug)]
pub enum SubmissionError {
    /// The voter id is already in the voted set.
    AlreadyVoted,
    /// The certificate is not signed by the election's registrar.
    Certificate,
    /// The voter's signature does not cover the submitted ballot.
    VoterSignature,
    /// A ballot proof failed.
    Ballot(BallotError),
    Store(StoreError),
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyVoted => formatter.write_str("voter has already voted"),
            Self::Certificate => formatter.write_str("cannot verify voter certificate"),
            Self::VoterSignature => formatter.write_str("cannot verify voter signature"),
            Self::Ballot(err) => write!(formatter, "invalid ballot: {err}"),
            Self::Store(err) => write!(formatter, "cannot access store: {err}"),
        }
    }
}

impl StdError for SubmissionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Ballot(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for SubmissionError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Authenticates ballots and records the accepted ones.
pub struct Tallyer {
    signing_key: SigningKey,
}

impl fmt::Debug for Tallyer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Tallyer").finish_non_exhaustive()
    }
}

impl Tallyer {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    pub fn verification_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Accepts a submission: the voter must not have voted, the certificate
    /// and voter signature must check out and every proof must verify. The
    /// accepted ballot is counter-signed, persisted and the voter id added
    /// to the voted set.
    pub fn accept(
        &self,
        election: &Election,
        store: &ElectionStore,
        submission: &BallotSubmission,
    ) -> Result<BallotRecord, SubmissionError> {
        let voter_id = &submission.certificate.voter_id;
        if store.has_voted(voter_id)? {
            warn!("rejecting repeat vote from {voter_id}");
            return Err(SubmissionError::AlreadyVoted);
        }
        if !submission.certificate.verify(&election.registrar_key) {
            warn!("rejecting vote with a bad certificate");
            return Err(SubmissionError::Certificate);
        }

        let payload = wire::encode_ballot(&submission.ballot);
        let signed_ok = submission
            .certificate
            .verification_key
            .verify_strict(&payload, &submission.signature)
            .is_ok();
        if !signed_ok {
            warn!("rejecting vote with a bad voter signature from {voter_id}");
            return Err(SubmissionError::VoterSignature);
        }

        submission
            .ballot
            .verify(
                &election.group,
                &election.election_key,
                election.params.options,
            )
            .map_err(SubmissionError::Ballot)?;

        let record = BallotRecord {
            ballot: submission.ballot.clone(),
            signature: self.signing_key.sign(&payload),
        };
        store.insert_ballot(record.clone())?;
        store.mark_voted(voter_id)?;
        info!("accepted ballot from {voter_id}");
        Ok(record)
    }
}

/// Filters stored records down to the ballots that enter the tally. Invalid
/// ballots are dropped, never fatal: one bad voter must not halt an
/// election.
fn valid_ballots<'a>(
    election: &Election,
    records: &'a [BallotRecord],
) -> Vec<&'a EncryptedBallot> {
    records
        .iter()
        .filter_map(|record| {
            let checked = record.ballot.verify(
                &election.group,
                &election.election_key,
                election.params.options,
            );
            if let Err(err) = checked {
                warn!("dropping stored ballot: {err}");
                return None;
            }
            if !record.verify(&election.tallyer_key) {
                warn!("dropping stored ballot: bad tallyer signature");
                return None;
            }
            Some(&record.ballot)
        })
        .collect()
}

/// Holder of one share of the election key.
pub struct Arbiter {
    id: String,
    keys: DecryptionKeys,
}

impl fmt::Debug for Arbiter {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Arbiter")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Arbiter {
    pub fn new(id: impl Into<String>, keys: DecryptionKeys) -> Self {
        Self {
            id: id.into(),
            keys,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn public_key(&self) -> &GroupElement {
        self.keys.public()
    }

    /// Revalidates every stored ballot, combines the valid ones and
    /// publishes a partial decryption of each candidate slot, replacing any
    /// earlier record by this arbiter.
    pub fn adjudicate<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        election: &Election,
        store: &ElectionStore,
    ) -> Result<DecryptionRecord, StoreError> {
        let records = store.ballots()?;
        let ballots = valid_ballots(election, &records);
        info!(
            "arbiter {} adjudicating over {} of {} stored ballots",
            self.id,
            ballots.len(),
            records.len()
        );
        let slots = tally::combine_ballots(&election.group, election.params.options, &ballots);

        let mut shares = Vec::with_capacity(slots.len());
        let mut proofs = Vec::with_capacity(slots.len());
        for slot in &slots {
            let (share, proof) = DecryptionShare::new(rng, &election.group, &self.keys, slot);
            shares.push(share);
            proofs.push(proof);
        }

        let record = DecryptionRecord {
            arbiter_id: self.id.clone(),
            arbiter_key: self.keys.public().clone(),
            shares,
            proofs,
        };
        store.upsert_decryption(record.clone())?;
        Ok(record)
    }
}

/// Final per-candidate totals over the counted ballots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionResults {
    /// Number of counted ballots selecting each candidate.
    pub tallies: Vec<u64>,
    /// Number of ballots that entered the tally.
    pub counted_ballots: u64,
}

impl ElectionResults {
    /// Counted ballots that did not select the candidate.
    pub fn not_selected(&self, option: usize) -> u64 {
        self.counted_ballots - self.tallies[option]
    }
}

/// Reason election verification failed. Unlike a bad ballot, any of these is
/// fatal: the published outcome cannot be trusted and the arbiters must
/// re-run the decryption.
#[derive(Debug)]
pub enum VerificationError {
    /// The recorded arbiter keys do not multiply to the election key; a
    /// partial decryption is missing or comes from an impostor.
    ArbiterSet,
    /// A partial decryption proof failed or covers the wrong ciphertext.
    InvalidShare { arbiter_id: String, index: usize },
    /// No exponent within the ballot count matches a decrypted slot.
    Recovery { option: usize },
    Store(StoreError),
}

impl fmt::Display for VerificationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArbiterSet => {
                formatter.write_str("recorded arbiter keys do not form the election key")
            }
            Self::InvalidShare { arbiter_id, index } => write!(
                formatter,
                "cannot verify partial decryption #{index} of arbiter {arbiter_id}"
            ),
            Self::Recovery { option } => {
                write!(formatter, "cannot decrypt the total for option #{option}")
            }
            Self::Store(err) => write!(formatter, "cannot access store: {err}"),
        }
    }
}

impl StdError for VerificationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for VerificationError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Verifies the whole election from public records and recovers the totals.
///
/// Anyone can run this: it reconstructs the set of countable ballots, checks
/// every partial decryption against the reconstructed aggregates and
/// recovers each candidate's total by bounded discrete-log search.
pub fn verify_election(
    election: &Election,
    store: &ElectionStore,
) -> Result<ElectionResults, VerificationError> {
    let records = store.ballots()?;
    let ballots = valid_ballots(election, &records);
    let slots = tally::combine_ballots(&election.group, election.params.options, &ballots);

    let decryptions = store.decryptions()?;
    let arbiter_keys: Vec<_> = decryptions
        .iter()
        .map(|record| record.arbiter_key.clone())
        .collect();
    if tally::election_key(&election.group, &arbiter_keys) != election.election_key {
        return Err(VerificationError::ArbiterSet);
    }
    for record in &decryptions {
        if let Some(index) = record.first_invalid_share(&election.group, &slots) {
            warn!(
                "partial decryption #{index} of arbiter {} does not verify",
                record.arbiter_id
            );
            return Err(VerificationError::InvalidShare {
                arbiter_id: record.arbiter_id.clone(),
                index,
            });
        }
    }

    let counted_ballots = ballots.len() as u64;
    let mut tallies = Vec::with_capacity(slots.len());
    for (option, slot) in slots.iter().enumerate() {
        let shares: Vec<_> = decryptions
            .iter()
            .map(|record| &record.shares[option].d)
            .collect();
        let total = tally::recover_count(&election.group, slot, &shares, counted_ballots)
            .ok_or(VerificationError::Recovery { option })?;
        tallies.push(total);
    }
    info!("election verified over {counted_ballots} ballots");
    Ok(ElectionResults {
        tallies,
        counted_ballots,
    })
}
