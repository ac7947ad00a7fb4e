//! Ballot encryption and per-choice validity proofs.
//!
//! Each candidate slot is encrypted separately: a selected candidate becomes
//! an ElGamal encryption of `g`, an unselected one an encryption of `1`. The
//! accompanying [`ChoiceProof`] is a disjunctive Chaum–Pedersen proof that
//! the plaintext is one of the two, without revealing which.

use rand_core::{CryptoRng, RngCore};

use std::{error::Error as StdError, fmt};

use crate::count::CountProof;
use crate::group::{Group, GroupElement, Scalar, Transcript};

/// ElGamal ciphertext `(a, b) = (g^r, Y^r g^v)` for one candidate slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceCiphertext {
    pub a: GroupElement,
    pub b: GroupElement,
}

/// Encrypts a single 0/1 choice under the election key, returning the
/// ciphertext together with the encryption randomness. The caller needs the
/// randomness to build proofs and must not retain it afterwards.
pub fn encrypt_choice<R: RngCore + CryptoRng>(
    rng: &mut R,
    group: &Group,
    election_key: &GroupElement,
    selected: bool,
) -> (ChoiceCiphertext, Scalar) {
    let randomness = group.rand_scalar(rng);
    let a = group.g_pow(&randomness);
    let mut b = group.pow(election_key, &randomness);
    if selected {
        b = group.mul(&b, &group.generator());
    }
    (ChoiceCiphertext { a, b }, randomness)
}

/// Proof that a [`ChoiceCiphertext`] encrypts 0 or 1.
///
/// Branch 0 states `(a, b) = (g^r, Y^r)`, branch 1 states
/// `(a, b / g) = (g^r, Y^r)`. The branch matching the actual plaintext is
/// proven; the other is simulated, and the two sub-challenges are forced to
/// add up to the transcript challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceProof {
    pub a0: GroupElement,
    pub a1: GroupElement,
    pub b0: GroupElement,
    pub b1: GroupElement,
    pub c0: Scalar,
    pub c1: Scalar,
    pub r0: Scalar,
    pub r1: Scalar,
}

impl ChoiceProof {
    pub fn new<R: RngCore + CryptoRng>(
        rng: &mut R,
        group: &Group,
        election_key: &GroupElement,
        ciphertext: &ChoiceCiphertext,
        selected: bool,
        randomness: &Scalar,
    ) -> Self {
        let fake_challenge = group.rand_scalar(rng);
        let fake_response = group.rand_scalar(rng);
        let witness = group.rand_scalar(rng);

        // Statement element for the simulated branch: `b` itself when
        // simulating branch 0, `b / g` when simulating branch 1.
        let fake_statement = if selected {
            ciphertext.b.clone()
        } else {
            group.mul(&ciphertext.b, &group.inv(&group.generator()))
        };
        let fake_a = group.mul(
            &group.g_pow(&fake_response),
            &group.inv(&group.pow(&ciphertext.a, &fake_challenge)),
        );
        let fake_b = group.mul(
            &group.pow(election_key, &fake_response),
            &group.inv(&group.pow(&fake_statement, &fake_challenge)),
        );
        let real_a = group.g_pow(&witness);
        let real_b = group.pow(election_key, &witness);

        let (a0, b0, a1, b1) = if selected {
            (fake_a, fake_b, real_a, real_b)
        } else {
            (real_a, real_b, fake_a, fake_b)
        };

        let total = Self::challenge(group, election_key, ciphertext, &a0, &b0, &a1, &b1);
        let real_challenge = group.sub_scalars(&total, &fake_challenge);
        let real_response = group.add_scalars(
            &witness,
            &group.mul_scalars(&real_challenge, randomness),
        );

        let (c0, r0, c1, r1) = if selected {
            (fake_challenge, fake_response, real_challenge, real_response)
        } else {
            (real_challenge, real_response, fake_challenge, fake_response)
        };
        Self {
            a0,
            a1,
            b0,
            b1,
            c0,
            c1,
            r0,
            r1,
        }
    }

    /// Checks the proof against the ciphertext, including subgroup membership
    /// of every element and range of every scalar.
    pub fn verify(
        &self,
        group: &Group,
        election_key: &GroupElement,
        ciphertext: &ChoiceCiphertext,
    ) -> bool {
        let elements = [
            &ciphertext.a,
            &ciphertext.b,
            &self.a0,
            &self.a1,
            &self.b0,
            &self.b1,
        ];
        if !elements.iter().all(|x| group.is_valid_element(x)) {
            return false;
        }
        let scalars = [&self.c0, &self.c1, &self.r0, &self.r1];
        if !scalars.iter().all(|s| group.is_valid_scalar(s)) {
            return false;
        }

        let shifted = group.mul(&ciphertext.b, &group.inv(&group.generator()));
        let checks = [
            (
                group.g_pow(&self.r0),
                group.mul(&self.a0, &group.pow(&ciphertext.a, &self.c0)),
            ),
            (
                group.g_pow(&self.r1),
                group.mul(&self.a1, &group.pow(&ciphertext.a, &self.c1)),
            ),
            (
                group.pow(election_key, &self.r0),
                group.mul(&self.b0, &group.pow(&ciphertext.b, &self.c0)),
            ),
            (
                group.pow(election_key, &self.r1),
                group.mul(&self.b1, &group.pow(&shifted, &self.c1)),
            ),
        ];
        if checks.iter().any(|(lhs, rhs)| lhs != rhs) {
            return false;
        }

        let total = Self::challenge(
            group,
            election_key,
            ciphertext,
            &self.a0,
            &self.b0,
            &self.a1,
            &self.b1,
        );
        group.add_scalars(&self.c0, &self.c1) == total
    }

    fn challenge(
        group: &Group,
        election_key: &GroupElement,
        ciphertext: &ChoiceCiphertext,
        a0: &GroupElement,
        b0: &GroupElement,
        a1: &GroupElement,
        b1: &GroupElement,
    ) -> Scalar {
        let mut transcript = Transcript::new();
        for element in [election_key, &ciphertext.a, &ciphertext.b, a0, b0, a1, b1] {
            transcript.append(element);
        }
        transcript.finalize(group)
    }
}

/// Multiplies ciphertexts slot-wise into a single encryption of the choice
/// sum, using the homomorphism `(a, b) * (a', b') = (aa', bb')`.
pub fn homomorphic_sum(group: &Group, choices: &[ChoiceCiphertext]) -> ChoiceCiphertext {
    let mut a = group.identity();
    let mut b = group.identity();
    for choice in choices {
        a = group.mul(&a, &choice.a);
        b = group.mul(&b, &choice.b);
    }
    ChoiceCiphertext { a, b }
}

/// A complete encrypted ballot: one ciphertext and validity proof per
/// candidate, plus the homomorphic sum of the ciphertexts and the proof that
/// the sum encrypts the declared number of selections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBallot {
    pub choices: Vec<ChoiceCiphertext>,
    pub proofs: Vec<ChoiceProof>,
    pub sum: ChoiceCiphertext,
    pub count_proof: CountProof,
}

impl EncryptedBallot {
    /// Encrypts `selections` and proves each slot valid. The count proof is
    /// built for `declared_count` selections; if the selections do not
    /// actually sum to it, the resulting ballot will fail verification.
    pub fn new<R: RngCore + CryptoRng>(
        rng: &mut R,
        group: &Group,
        election_key: &GroupElement,
        selections: &[bool],
        declared_count: usize,
    ) -> Self {
        let mut choices = Vec::with_capacity(selections.len());
        let mut proofs = Vec::with_capacity(selections.len());
        let mut total_randomness = Scalar::zero();

        for &selected in selections {
            let (ciphertext, randomness) = encrypt_choice(rng, group, election_key, selected);
            let proof =
                ChoiceProof::new(rng, group, election_key, &ciphertext, selected, &randomness);
            total_randomness = group.add_scalars(&total_randomness, &randomness);
            choices.push(ciphertext);
            proofs.push(proof);
        }

        let sum = homomorphic_sum(group, &choices);
        let count_proof = CountProof::new(
            rng,
            group,
            election_key,
            &sum,
            declared_count,
            selections.len(),
            &total_randomness,
        );
        Self {
            choices,
            proofs,
            sum,
            count_proof,
        }
    }

    /// Verifies the whole bundle for an election with `options` candidates.
    ///
    /// The homomorphic sum is recomputed from the per-slot ciphertexts; a
    /// bundle whose recorded sum differs is rejected, so the count proof is
    /// always checked against the ciphertexts that will actually be tallied.
    pub fn verify(
        &self,
        group: &Group,
        election_key: &GroupElement,
        options: usize,
    ) -> Result<(), BallotError> {
        if self.choices.len() != options {
            return Err(BallotError::ChoicesLength {
                expected: options,
                actual: self.choices.len(),
            });
        }
        if self.proofs.len() != options {
            return Err(BallotError::ProofsLength {
                expected: options,
                actual: self.proofs.len(),
            });
        }

        for (index, (ciphertext, proof)) in self.choices.iter().zip(&self.proofs).enumerate() {
            if !proof.verify(group, election_key, ciphertext) {
                return Err(BallotError::ChoiceProof { index });
            }
        }

        let sum = homomorphic_sum(group, &self.choices);
        if sum != self.sum {
            return Err(BallotError::SumMismatch);
        }
        if !self.count_proof.verify(group, election_key, &sum, options) {
            return Err(BallotError::CountProof);
        }
        Ok(())
    }
}

/// Reason an encrypted ballot was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallotError {
    ChoicesLength { expected: usize, actual: usize },
    ProofsLength { expected: usize, actual: usize },
    ChoiceProof { index: usize },
    SumMismatch,
    CountProof,
}

impl fmt::Display for BallotError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChoicesLength { expected, actual } => write!(
                formatter,
                "unexpected number of encrypted choices: expected {expected}, got {actual}"
            ),
            Self::ProofsLength { expected, actual } => write!(
                formatter,
                "unexpected number of choice proofs: expected {expected}, got {actual}"
            ),
            Self::ChoiceProof { index } => {
                write!(formatter, "cannot verify choice proof for option #{index}")
            }
            Self::SumMismatch => {
                formatter.write_str("recorded ciphertext sum differs from the product of choices")
            }
            Self::CountProof => formatter.write_str("cannot verify selection count proof"),
        }
    }
}

impl StdError for BallotError {}
