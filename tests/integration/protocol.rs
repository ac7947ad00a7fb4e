//! End-to-end protocol scenarios: registration, voting, adjudication and
//! public verification against a shared store.

use assert_matches::assert_matches;
use ed25519_dalek::{Signer, SigningKey};
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

use verivote::{
    cast_ballot,
    election::roles::{CastError, SubmissionError, VerificationError},
    tally::election_key,
    verify_election, wire, Arbiter, BallotRecord, DecryptionKeys, Election, ElectionParams,
    ElectionStore, EncryptedBallot, Group, Registrar, Tallyer,
};

/// 64-bit safe-prime group; keeps exponentiation cheap while leaving proof
/// forgery probabilities negligible for tests.
fn small_group() -> Group {
    Group::new("18446744073709550147", "9223372036854775073", "4").unwrap()
}

struct TestElection {
    election: Election,
    store: ElectionStore,
    registrar: Registrar,
    tallyer: Tallyer,
    // Retained so tests can forge records that carry a valid counter-signature.
    tallyer_key: SigningKey,
    arbiters: Vec<Arbiter>,
}

fn setup(
    rng: &mut ChaCha20Rng,
    group: Group,
    options: usize,
    selections: usize,
    arbiter_count: usize,
) -> TestElection {
    let arbiters: Vec<_> = (0..arbiter_count)
        .map(|i| {
            Arbiter::new(
                format!("arbiter-{i}"),
                DecryptionKeys::generate(rng, &group),
            )
        })
        .collect();
    let arbiter_keys: Vec<_> = arbiters
        .iter()
        .map(|arbiter| arbiter.public_key().clone())
        .collect();

    let registrar = Registrar::new(SigningKey::generate(rng));
    let tallyer_key = SigningKey::generate(rng);
    let tallyer = Tallyer::new(tallyer_key.clone());

    let election = Election {
        election_key: election_key(&group, &arbiter_keys),
        group,
        params: ElectionParams {
            options,
            selections,
        },
        registrar_key: registrar.verification_key(),
        tallyer_key: tallyer.verification_key(),
    };
    TestElection {
        election,
        store: ElectionStore::in_memory(),
        registrar,
        tallyer,
        tallyer_key,
        arbiters,
    }
}

impl TestElection {
    fn vote(
        &self,
        rng: &mut ChaCha20Rng,
        voter_id: &str,
        selections: &[bool],
    ) -> Result<BallotRecord, SubmissionError> {
        let voter_key = SigningKey::generate(rng);
        let certificate = self
            .registrar
            .register(&self.store, voter_id, &voter_key.verifying_key())
            .unwrap();
        let submission =
            cast_ballot(rng, &self.election, &certificate, &voter_key, selections).unwrap();
        self.tallyer.accept(&self.election, &self.store, &submission)
    }

    fn adjudicate_all(&self, rng: &mut ChaCha20Rng) {
        for arbiter in &self.arbiters {
            arbiter
                .adjudicate(rng, &self.election, &self.store)
                .unwrap();
        }
    }
}

#[test]
fn single_ballot_single_arbiter() {
    let mut rng = ChaCha20Rng::from_seed([101; 32]);
    let env = setup(&mut rng, small_group(), 2, 1, 1);

    env.vote(&mut rng, "alice", &[true, false]).unwrap();
    env.adjudicate_all(&mut rng);

    let results = verify_election(&env.election, &env.store).unwrap();
    assert_eq!(results.tallies, [1, 0]);
    assert_eq!(results.counted_ballots, 1);
    assert_eq!(results.not_selected(0), 0);
    assert_eq!(results.not_selected(1), 1);
}

#[test]
fn two_arbiters_two_ballots() {
    let mut rng = ChaCha20Rng::from_seed([102; 32]);
    let env = setup(&mut rng, small_group(), 2, 1, 2);

    env.vote(&mut rng, "alice", &[true, false]).unwrap();
    env.vote(&mut rng, "bob", &[false, true]).unwrap();
    env.adjudicate_all(&mut rng);

    let results = verify_election(&env.election, &env.store).unwrap();
    assert_eq!(results.tallies, [1, 1]);
    assert_eq!(results.counted_ballots, 2);
}

#[test]
fn corrupted_ballot_is_excluded_without_failing_the_election() {
    let mut rng = ChaCha20Rng::from_seed([103; 32]);
    let env = setup(&mut rng, small_group(), 2, 1, 1);

    env.vote(&mut rng, "alice", &[true, false]).unwrap();
    env.vote(&mut rng, "carol", &[true, false]).unwrap();

    // A ballot whose choice proof was corrupted after acceptance: the
    // tallyer signature covers the corrupted bytes, so only proof
    // verification can catch it.
    let mut ballot = EncryptedBallot::new(
        &mut rng,
        &env.election.group,
        &env.election.election_key,
        &[true, false],
        1,
    );
    ballot.proofs[0].r0 = env
        .election
        .group
        .add_scalars(&ballot.proofs[0].r0, &env.election.group.scalar_from_u64(1));
    let signature = env.tallyer_key.sign(&wire::encode_ballot(&ballot));
    env.store
        .insert_ballot(BallotRecord { ballot, signature })
        .unwrap();

    env.adjudicate_all(&mut rng);
    let results = verify_election(&env.election, &env.store).unwrap();
    assert_eq!(results.tallies, [2, 0]);
    assert_eq!(results.counted_ballots, 2);
}

#[test]
fn forged_counter_signature_is_excluded() {
    let mut rng = ChaCha20Rng::from_seed([104; 32]);
    let env = setup(&mut rng, small_group(), 2, 1, 1);

    env.vote(&mut rng, "alice", &[false, true]).unwrap();

    // Valid ballot, but recorded with a signature by someone other than the
    // election's tallyer.
    let ballot = EncryptedBallot::new(
        &mut rng,
        &env.election.group,
        &env.election.election_key,
        &[true, false],
        1,
    );
    let outsider = SigningKey::generate(&mut rng);
    let signature = outsider.sign(&wire::encode_ballot(&ballot));
    env.store
        .insert_ballot(BallotRecord { ballot, signature })
        .unwrap();

    env.adjudicate_all(&mut rng);
    let results = verify_election(&env.election, &env.store).unwrap();
    assert_eq!(results.tallies, [0, 1]);
    assert_eq!(results.counted_ballots, 1);
}

#[test]
fn miscounted_ballot_is_rejected_by_the_tallyer() {
    let mut rng = ChaCha20Rng::from_seed([105; 32]);
    let env = setup(&mut rng, small_group(), 2, 1, 1);

    let voter_key = SigningKey::generate(&mut rng);
    let certificate = env
        .registrar
        .register(&env.store, "mallory", &voter_key.verifying_key())
        .unwrap();

    // The honest casting path refuses outright.
    let err = cast_ballot(
        &mut rng,
        &env.election,
        &certificate,
        &voter_key,
        &[true, true],
    )
    .unwrap_err();
    assert_matches!(
        err,
        CastError::SelectionCount {
            expected: 1,
            actual: 2,
        }
    );

    // A hand-built two-selection ballot declared as one selection carries an
    // unsatisfiable count proof.
    let ballot = EncryptedBallot::new(
        &mut rng,
        &env.election.group,
        &env.election.election_key,
        &[true, true],
        1,
    );
    let signature = voter_key.sign(&wire::encode_ballot(&ballot));
    let submission = verivote::BallotSubmission {
        certificate,
        ballot,
        signature,
    };
    let err = env
        .tallyer
        .accept(&env.election, &env.store, &submission)
        .unwrap_err();
    assert_matches!(err, SubmissionError::Ballot(verivote::BallotError::CountProof));
}

#[test]
fn bad_partial_decryption_fails_verification() {
    let mut rng = ChaCha20Rng::from_seed([106; 32]);
    let env = setup(&mut rng, small_group(), 2, 1, 2);

    env.vote(&mut rng, "alice", &[true, false]).unwrap();
    env.adjudicate_all(&mut rng);

    // The second arbiter swaps in d * g; its equality-of-logs proof can no
    // longer hold.
    let mut record = env.arbiters[1]
        .adjudicate(&mut rng, &env.election, &env.store)
        .unwrap();
    record.shares[0].d = env
        .election
        .group
        .mul(&record.shares[0].d, &env.election.group.generator());
    env.store.upsert_decryption(record).unwrap();

    let err = verify_election(&env.election, &env.store).unwrap_err();
    assert_matches!(
        err,
        VerificationError::InvalidShare { ref arbiter_id, index: 0 } if arbiter_id.as_str() == "arbiter-1"
    );
}

#[test]
fn missing_arbiter_fails_verification() {
    let mut rng = ChaCha20Rng::from_seed([107; 32]);
    let env = setup(&mut rng, small_group(), 2, 1, 2);

    env.vote(&mut rng, "alice", &[true, false]).unwrap();
    // Only one of the two key holders adjudicates.
    env.arbiters[0]
        .adjudicate(&mut rng, &env.election, &env.store)
        .unwrap();

    let err = verify_election(&env.election, &env.store).unwrap_err();
    assert_matches!(err, VerificationError::ArbiterSet);
}

#[test]
fn double_vote_is_rejected() {
    let mut rng = ChaCha20Rng::from_seed([108; 32]);
    let env = setup(&mut rng, small_group(), 2, 1, 1);

    let voter_key = SigningKey::generate(&mut rng);
    let certificate = env
        .registrar
        .register(&env.store, "alice", &voter_key.verifying_key())
        .unwrap();

    let first = cast_ballot(
        &mut rng,
        &env.election,
        &certificate,
        &voter_key,
        &[true, false],
    )
    .unwrap();
    env.tallyer
        .accept(&env.election, &env.store, &first)
        .unwrap();

    let second = cast_ballot(
        &mut rng,
        &env.election,
        &certificate,
        &voter_key,
        &[false, true],
    )
    .unwrap();
    let err = env
        .tallyer
        .accept(&env.election, &env.store, &second)
        .unwrap_err();
    assert_matches!(err, SubmissionError::AlreadyVoted);

    env.adjudicate_all(&mut rng);
    let results = verify_election(&env.election, &env.store).unwrap();
    assert_eq!(results.tallies, [1, 0]);
    assert_eq!(results.counted_ballots, 1);
}

#[test]
fn uncertified_submission_is_rejected() {
    let mut rng = ChaCha20Rng::from_seed([109; 32]);
    let env = setup(&mut rng, small_group(), 2, 1, 1);

    let voter_key = SigningKey::generate(&mut rng);
    // Certificate "issued" by someone other than the election's registrar.
    let impostor = Registrar::new(SigningKey::generate(&mut rng));
    let certificate = impostor
        .register(&ElectionStore::in_memory(), "eve", &voter_key.verifying_key())
        .unwrap();

    let submission = cast_ballot(
        &mut rng,
        &env.election,
        &certificate,
        &voter_key,
        &[true, false],
    )
    .unwrap();
    let err = env
        .tallyer
        .accept(&env.election, &env.store, &submission)
        .unwrap_err();
    assert_matches!(err, SubmissionError::Certificate);
}

#[test]
fn empty_election_tallies_to_zero() {
    let mut rng = ChaCha20Rng::from_seed([110; 32]);
    let env = setup(&mut rng, small_group(), 3, 1, 2);

    env.adjudicate_all(&mut rng);
    let results = verify_election(&env.election, &env.store).unwrap();
    assert_eq!(results.tallies, [0, 0, 0]);
    assert_eq!(results.counted_ballots, 0);
}

#[test]
fn every_selection_count_is_provable() {
    let mut rng = ChaCha20Rng::from_seed([111; 32]);

    // Boundary selection counts: none of the candidates and all of them.
    for (selections, expected) in [
        (&[false, false][..], [0, 0]),
        (&[true, true][..], [1, 1]),
    ] {
        let env = setup(
            &mut rng,
            small_group(),
            2,
            selections.iter().filter(|&&s| s).count(),
            1,
        );
        env.vote(&mut rng, "alice", selections).unwrap();
        env.adjudicate_all(&mut rng);
        let results = verify_election(&env.election, &env.store).unwrap();
        assert_eq!(results.tallies, expected);
    }
}

#[test]
fn election_config_round_trips_through_json() {
    let mut rng = ChaCha20Rng::from_seed([112; 32]);
    let env = setup(&mut rng, small_group(), 2, 1, 2);

    let json = serde_json::to_string(&env.election).unwrap();
    let restored: Election = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.group, env.election.group);
    assert_eq!(restored.params, env.election.params);
    assert_eq!(restored.election_key, env.election.election_key);
    assert_eq!(restored.registrar_key, env.election.registrar_key);
    assert_eq!(restored.tallyer_key, env.election.tallyer_key);
}

#[test]
fn standard_group_end_to_end() {
    let mut rng = ChaCha20Rng::from_seed([113; 32]);
    let env = setup(&mut rng, Group::standard(), 2, 1, 1);

    env.vote(&mut rng, "alice", &[false, true]).unwrap();
    env.adjudicate_all(&mut rng);

    let results = verify_election(&env.election, &env.store).unwrap();
    assert_eq!(results.tallies, [0, 1]);
    assert_eq!(results.counted_ballots, 1);
}
