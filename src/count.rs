//! Proof that a ballot selects the declared number of candidates.
//!
//! The statement is over the homomorphic sum `(A, B)` of a ballot's
//! ciphertexts: for some branch `j` in `0..=C`, `(A, B * g^-j)` encrypts
//! zero. Every branch except the declared count is simulated, exactly as in
//! the per-choice proof, and the branch sub-challenges must add up to the
//! transcript challenge.

use rand_core::{CryptoRng, RngCore};

use crate::ballot::ChoiceCiphertext;
use crate::group::{Group, GroupElement, Scalar, Transcript};

/// One branch of a [`CountProof`]: commitments `(a, b)`, sub-challenge `c`
/// and response `r`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountProofTerm {
    pub a: GroupElement,
    pub b: GroupElement,
    pub c: Scalar,
    pub r: Scalar,
}

/// Disjunctive proof over the selection counts `0..=C`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountProof {
    pub terms: Vec<CountProofTerm>,
}

impl CountProof {
    /// Builds the proof for a ballot whose ciphertexts multiply to `sum`,
    /// claiming `declared_count` selections out of `options` candidates.
    /// `randomness` is the mod-`q` sum of the per-choice encryption nonces.
    ///
    /// # Panics
    ///
    /// Panics if `declared_count > options`; there is no branch to prove.
    pub fn new<R: RngCore + CryptoRng>(
        rng: &mut R,
        group: &Group,
        election_key: &GroupElement,
        sum: &ChoiceCiphertext,
        declared_count: usize,
        options: usize,
        randomness: &Scalar,
    ) -> Self {
        assert!(
            declared_count <= options,
            "declared count exceeds the number of candidates"
        );

        let witness = group.rand_scalar(rng);
        let mut terms = Vec::with_capacity(options + 1);
        let mut simulated_sum = Scalar::zero();
        for shift in 0..=options {
            if shift == declared_count {
                // Sub-challenge and response are filled in once the total
                // challenge is known.
                terms.push(CountProofTerm {
                    a: group.g_pow(&witness),
                    b: group.pow(election_key, &witness),
                    c: Scalar::zero(),
                    r: Scalar::zero(),
                });
                continue;
            }
            let challenge = group.rand_scalar(rng);
            let response = group.rand_scalar(rng);
            simulated_sum = group.add_scalars(&simulated_sum, &challenge);

            let shifted = shifted_statement(group, sum, shift);
            let a = group.mul(
                &group.g_pow(&response),
                &group.inv(&group.pow(&sum.a, &challenge)),
            );
            let b = group.mul(
                &group.pow(election_key, &response),
                &group.inv(&group.pow(&shifted, &challenge)),
            );
            terms.push(CountProofTerm {
                a,
                b,
                c: challenge,
                r: response,
            });
        }

        let total = Self::challenge(group, election_key, sum, &terms);
        let real_challenge = group.sub_scalars(&total, &simulated_sum);
        let real_response = group.add_scalars(
            &witness,
            &group.mul_scalars(&real_challenge, randomness),
        );
        terms[declared_count].c = real_challenge;
        terms[declared_count].r = real_response;
        Self { terms }
    }

    /// Verifies the proof against the ciphertext sum of a ballot with
    /// `options` candidates. All group elements are checked for subgroup
    /// membership and all scalars for range.
    pub fn verify(
        &self,
        group: &Group,
        election_key: &GroupElement,
        sum: &ChoiceCiphertext,
        options: usize,
    ) -> bool {
        if self.terms.len() != options + 1 {
            return false;
        }
        if !group.is_valid_element(&sum.a) || !group.is_valid_element(&sum.b) {
            return false;
        }

        let mut challenge_sum = Scalar::zero();
        for (shift, term) in self.terms.iter().enumerate() {
            if !group.is_valid_element(&term.a) || !group.is_valid_element(&term.b) {
                return false;
            }
            if !group.is_valid_scalar(&term.c) || !group.is_valid_scalar(&term.r) {
                return false;
            }

            let shifted = shifted_statement(group, sum, shift);
            let a_check = group.mul(&term.a, &group.pow(&sum.a, &term.c));
            if group.g_pow(&term.r) != a_check {
                return false;
            }
            let b_check = group.mul(&term.b, &group.pow(&shifted, &term.c));
            if group.pow(election_key, &term.r) != b_check {
                return false;
            }
            challenge_sum = group.add_scalars(&challenge_sum, &term.c);
        }

        challenge_sum == Self::challenge(group, election_key, sum, &self.terms)
    }

    fn challenge(
        group: &Group,
        election_key: &GroupElement,
        sum: &ChoiceCiphertext,
        terms: &[CountProofTerm],
    ) -> Scalar {
        let mut transcript = Transcript::new();
        transcript.append(election_key);
        transcript.append(&sum.a);
        transcript.append(&sum.b);
        for term in terms {
            transcript.append(&term.a);
        }
        for term in terms {
            transcript.append(&term.b);
        }
        transcript.finalize(group)
    }
}

/// `B * g^-shift`: the branch statement that the sum encrypts `shift`.
fn shifted_statement(group: &Group, sum: &ChoiceCiphertext, shift: usize) -> GroupElement {
    let shift = group.g_pow(&group.scalar_from_u64(shift as u64));
    group.mul(&sum.b, &group.inv(&shift))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ballot::{encrypt_choice, homomorphic_sum};
    use crate::group::tests::small_group;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn encrypted_selections(
        rng: &mut ChaCha20Rng,
        group: &Group,
        key: &GroupElement,
        selections: &[bool],
    ) -> (ChoiceCiphertext, Scalar) {
        let mut randomness = Scalar::zero();
        let mut choices = Vec::new();
        for &selected in selections {
            let (ciphertext, nonce) = encrypt_choice(rng, group, key, selected);
            randomness = group.add_scalars(&randomness, &nonce);
            choices.push(ciphertext);
        }
        (homomorphic_sum(group, &choices), randomness)
    }

    #[test]
    fn proof_verifies_for_every_count() {
        let mut rng = ChaCha20Rng::from_seed([10; 32]);
        let group = small_group();
        let secret = group.rand_scalar(&mut rng);
        let key = group.g_pow(&secret);

        // Includes the boundary counts 0 and C.
        let cases: [&[bool]; 4] = [
            &[false, false, false],
            &[true, false, false],
            &[true, false, true],
            &[true, true, true],
        ];
        for selections in cases {
            let count = selections.iter().filter(|&&s| s).count();
            let (sum, randomness) = encrypted_selections(&mut rng, &group, &key, selections);
            let proof = CountProof::new(
                &mut rng,
                &group,
                &key,
                &sum,
                count,
                selections.len(),
                &randomness,
            );
            assert!(proof.verify(&group, &key, &sum, selections.len()));
        }
    }

    #[test]
    fn misdeclared_count_fails() {
        let mut rng = ChaCha20Rng::from_seed([11; 32]);
        let group = small_group();
        let secret = group.rand_scalar(&mut rng);
        let key = group.g_pow(&secret);

        let selections = [true, true];
        let (sum, randomness) = encrypted_selections(&mut rng, &group, &key, &selections);
        // Two selections, declared as one.
        let proof = CountProof::new(&mut rng, &group, &key, &sum, 1, selections.len(), &randomness);
        assert!(!proof.verify(&group, &key, &sum, selections.len()));
    }

    #[test]
    fn branch_count_is_enforced() {
        let mut rng = ChaCha20Rng::from_seed([12; 32]);
        let group = small_group();
        let secret = group.rand_scalar(&mut rng);
        let key = group.g_pow(&secret);

        let selections = [true, false];
        let (sum, randomness) = encrypted_selections(&mut rng, &group, &key, &selections);
        let mut proof =
            CountProof::new(&mut rng, &group, &key, &sum, 1, selections.len(), &randomness);
        proof.terms.pop();
        assert!(!proof.verify(&group, &key, &sum, selections.len()));
    }

    #[test]
    fn tampered_term_fails() {
        let mut rng = ChaCha20Rng::from_seed([13; 32]);
        let group = small_group();
        let secret = group.rand_scalar(&mut rng);
        let key = group.g_pow(&secret);

        let selections = [false, true, false];
        let (sum, randomness) = encrypted_selections(&mut rng, &group, &key, &selections);
        let proof =
            CountProof::new(&mut rng, &group, &key, &sum, 1, selections.len(), &randomness);

        let mut mangled = proof.clone();
        mangled.terms[0].c = group.add_scalars(&mangled.terms[0].c, &group.scalar_from_u64(1));
        assert!(!mangled.verify(&group, &key, &sum, selections.len()));

        let mut mangled = proof;
        mangled.terms[2].b = group.mul(&mangled.terms[2].b, &group.generator());
        assert!(!mangled.verify(&group, &key, &sum, selections.len()));
    }
}
