//! Persistent store shared by the election participants.
//!
//! Four tables: certified voters, accepted ballots, per-arbiter decryption
//! records (upsert) and the set of voter ids that have already voted. A
//! single mutex-protected handle backs all of them; every mutation is
//! persisted before it is acknowledged.

use log::debug;
use serde::{Deserialize, Serialize};

use std::{
    collections::{BTreeMap, BTreeSet},
    error::Error as StdError,
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use super::{BallotRecord, Certificate, DecryptionRecord};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    voters: BTreeMap<String, Certificate>,
    ballots: Vec<BallotRecord>,
    decryptions: BTreeMap<String, DecryptionRecord>,
    voted: BTreeSet<String>,
}

/// Store access error.
#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Format(serde_json::Error),
    /// Another accessor panicked while holding the store lock.
    Poisoned,
}

impl fmt::Display for StoreError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(formatter, "cannot access store file: {err}"),
            Self::Format(err) => write!(formatter, "cannot read store contents: {err}"),
            Self::Poisoned => formatter.write_str("store lock is poisoned"),
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Format(err) => Some(err),
            Self::Poisoned => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(err)
    }
}

/// Mutex-protected handle over the election tables.
#[derive(Debug)]
pub struct ElectionStore {
    tables: Mutex<Tables>,
    path: Option<PathBuf>,
}

impl ElectionStore {
    /// Creates a store that lives only in memory; useful for tests and
    /// one-shot verification runs.
    pub fn in_memory() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            path: None,
        }
    }

    /// Opens the store file, creating it when missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_owned();
        let tables = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            debug!("creating election store at {}", path.display());
            Tables::default()
        };
        let store = Self {
            tables: Mutex::new(tables),
            path: Some(path),
        };
        let guard = store.lock()?;
        store.persist(&guard)?;
        drop(guard);
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    fn persist(&self, tables: &Tables) -> Result<(), StoreError> {
        if let Some(path) = &self.path {
            fs::write(path, serde_json::to_string(tables)?)?;
        }
        Ok(())
    }

    pub fn insert_voter(&self, certificate: Certificate) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        tables
            .voters
            .insert(certificate.voter_id.clone(), certificate);
        self.persist(&tables)
    }

    pub fn find_voter(&self, voter_id: &str) -> Result<Option<Certificate>, StoreError> {
        Ok(self.lock()?.voters.get(voter_id).cloned())
    }

    /// Appends a ballot record. Records are deduplicated by their tallyer
    /// signature; re-inserting an identical record is a no-op.
    pub fn insert_ballot(&self, record: BallotRecord) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        if tables.ballots.iter().any(|existing| existing.signature == record.signature) {
            debug!("skipping duplicate ballot record");
            return Ok(());
        }
        tables.ballots.push(record);
        self.persist(&tables)
    }

    pub fn ballots(&self) -> Result<Vec<BallotRecord>, StoreError> {
        Ok(self.lock()?.ballots.clone())
    }

    /// Inserts or replaces the record for the arbiter; the latest record
    /// wins.
    pub fn upsert_decryption(&self, record: DecryptionRecord) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        tables
            .decryptions
            .insert(record.arbiter_id.clone(), record);
        self.persist(&tables)
    }

    pub fn decryptions(&self) -> Result<Vec<DecryptionRecord>, StoreError> {
        Ok(self.lock()?.decryptions.values().cloned().collect())
    }

    pub fn has_voted(&self, voter_id: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.voted.contains(voter_id))
    }

    pub fn mark_voted(&self, voter_id: &str) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        tables.voted.insert(voter_id.to_owned());
        self.persist(&tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ballot::EncryptedBallot;
    use crate::group::tests::small_group;
    use crate::tally::DecryptionKeys;
    use ed25519_dalek::{Signer, SigningKey};
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn sample_record(rng: &mut ChaCha20Rng, signing_key: &SigningKey) -> BallotRecord {
        let group = small_group();
        let keys = DecryptionKeys::generate(rng, &group);
        let ballot = EncryptedBallot::new(rng, &group, keys.public(), &[true, false], 1);
        let signature = signing_key.sign(&crate::wire::encode_ballot(&ballot));
        BallotRecord { ballot, signature }
    }

    #[test]
    fn voted_set_round_trip() {
        let store = ElectionStore::in_memory();
        assert!(!store.has_voted("alice").unwrap());
        store.mark_voted("alice").unwrap();
        assert!(store.has_voted("alice").unwrap());
        assert!(!store.has_voted("bob").unwrap());
    }

    #[test]
    fn duplicate_ballots_are_dropped() {
        let mut rng = ChaCha20Rng::from_seed([40; 32]);
        let store = ElectionStore::in_memory();
        let signing_key = SigningKey::generate(&mut rng);

        let record = sample_record(&mut rng, &signing_key);
        store.insert_ballot(record.clone()).unwrap();
        store.insert_ballot(record).unwrap();
        assert_eq!(store.ballots().unwrap().len(), 1);

        let other = sample_record(&mut rng, &signing_key);
        store.insert_ballot(other).unwrap();
        assert_eq!(store.ballots().unwrap().len(), 2);
    }

    #[test]
    fn decryption_upsert_replaces() {
        let mut rng = ChaCha20Rng::from_seed([41; 32]);
        let group = small_group();
        let keys = DecryptionKeys::generate(&mut rng, &group);

        let store = ElectionStore::in_memory();
        let record = DecryptionRecord {
            arbiter_id: "arbiter-1".to_owned(),
            arbiter_key: keys.public().clone(),
            shares: vec![],
            proofs: vec![],
        };
        store.upsert_decryption(record.clone()).unwrap();

        let replacement = DecryptionRecord {
            arbiter_key: group.generator(),
            ..record
        };
        store.upsert_decryption(replacement).unwrap();

        let records = store.decryptions().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].arbiter_key, group.generator());
    }

    #[test]
    fn file_backed_store_round_trip() {
        let mut rng = ChaCha20Rng::from_seed([42; 32]);
        let signing_key = SigningKey::generate(&mut rng);
        let path = std::env::temp_dir().join(format!("ballot-store-{}.json", std::process::id()));
        let _ = fs::remove_file(&path);

        {
            let store = ElectionStore::open(&path).unwrap();
            store.insert_ballot(sample_record(&mut rng, &signing_key)).unwrap();
            store.mark_voted("alice").unwrap();
        }
        let reopened = ElectionStore::open(&path).unwrap();
        assert_eq!(reopened.ballots().unwrap().len(), 1);
        assert!(reopened.has_voted("alice").unwrap());

        fs::remove_file(&path).unwrap();
    }
}
