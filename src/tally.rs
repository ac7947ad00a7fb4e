//! Partial decryption and homomorphic tallying.
//!
//! Decryption is cooperative: every key holder raises the aggregated `a`
//! component to its secret exponent and proves it did so correctly. Dividing
//! the aggregated `b` component by the product of all shares leaves `g` to
//! the power of the candidate's total, which is recovered by bounded search.

use rand_core::{CryptoRng, RngCore};

use std::fmt;

use crate::ballot::{ChoiceCiphertext, EncryptedBallot};
use crate::group::{Group, GroupElement, Scalar, Transcript};

/// One key holder's share of the election key: `public = g^secret`.
///
/// The election key is the product of all holders' public parts; decrypting
/// a tally requires a share from every one of them.
#[derive(Clone)]
pub struct DecryptionKeys {
    public: GroupElement,
    secret: Scalar,
}

impl fmt::Debug for DecryptionKeys {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DecryptionKeys")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl DecryptionKeys {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R, group: &Group) -> Self {
        Self::from_secret(group, group.rand_scalar(rng))
    }

    pub fn from_secret(group: &Group, secret: Scalar) -> Self {
        Self {
            public: group.g_pow(&secret),
            secret,
        }
    }

    pub fn public(&self) -> &GroupElement {
        &self.public
    }

    pub fn secret(&self) -> &Scalar {
        &self.secret
    }
}

/// Multiplies per-holder public keys into the election key.
pub fn election_key(group: &Group, holder_keys: &[GroupElement]) -> GroupElement {
    let mut key = group.identity();
    for holder_key in holder_keys {
        key = group.mul(&key, holder_key);
    }
    key
}

/// One holder's contribution `d = a^secret` to decrypting `ciphertext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionShare {
    pub d: GroupElement,
    pub ciphertext: ChoiceCiphertext,
}

/// Chaum–Pedersen proof that a [`DecryptionShare`] uses the same exponent as
/// the holder's public key: `log_g(public) = log_a(d)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionProof {
    pub u: GroupElement,
    pub v: GroupElement,
    pub s: Scalar,
}

impl DecryptionShare {
    pub fn new<R: RngCore + CryptoRng>(
        rng: &mut R,
        group: &Group,
        keys: &DecryptionKeys,
        ciphertext: &ChoiceCiphertext,
    ) -> (Self, DecryptionProof) {
        let d = group.pow(&ciphertext.a, keys.secret());

        let witness = group.rand_scalar(rng);
        let v = group.g_pow(&witness);
        let u = group.pow(&ciphertext.a, &witness);
        let sigma = DecryptionProof::challenge(group, keys.public(), ciphertext, &u, &v);
        let s = group.add_scalars(&witness, &group.mul_scalars(&sigma, keys.secret()));

        let share = Self {
            d,
            ciphertext: ciphertext.clone(),
        };
        (share, DecryptionProof { u, v, s })
    }
}

impl DecryptionProof {
    /// Checks the share against the holder's public key. A failure here is
    /// fatal to the election: it means the holder misbehaved, not that some
    /// voter submitted garbage.
    pub fn verify(
        &self,
        group: &Group,
        holder_key: &GroupElement,
        share: &DecryptionShare,
    ) -> bool {
        let elements = [
            holder_key,
            &share.d,
            &share.ciphertext.a,
            &share.ciphertext.b,
            &self.u,
            &self.v,
        ];
        if !elements.iter().all(|x| group.is_valid_element(x)) {
            return false;
        }
        if !group.is_valid_scalar(&self.s) {
            return false;
        }

        let sigma = Self::challenge(group, holder_key, &share.ciphertext, &self.u, &self.v);
        let g_check = group.mul(&self.v, &group.pow(holder_key, &sigma));
        if group.g_pow(&self.s) != g_check {
            return false;
        }
        let a_check = group.mul(&self.u, &group.pow(&share.d, &sigma));
        group.pow(&share.ciphertext.a, &self.s) == a_check
    }

    fn challenge(
        group: &Group,
        holder_key: &GroupElement,
        ciphertext: &ChoiceCiphertext,
        u: &GroupElement,
        v: &GroupElement,
    ) -> Scalar {
        let mut transcript = Transcript::new();
        for element in [holder_key, &ciphertext.a, &ciphertext.b, u, v] {
            transcript.append(element);
        }
        transcript.finalize(group)
    }
}

/// Multiplies ballots slot-wise into one aggregated ciphertext per candidate.
/// Multiplication is commutative, so ballot order does not matter.
///
/// # Panics
///
/// Panics if some ballot does not have exactly `options` choices; callers
/// are expected to have verified ballots first.
pub fn combine_ballots(
    group: &Group,
    options: usize,
    ballots: &[&EncryptedBallot],
) -> Vec<ChoiceCiphertext> {
    let mut slots = vec![
        ChoiceCiphertext {
            a: group.identity(),
            b: group.identity(),
        };
        options
    ];
    for ballot in ballots {
        assert_eq!(ballot.choices.len(), options);
        for (slot, choice) in slots.iter_mut().zip(&ballot.choices) {
            slot.a = group.mul(&slot.a, &choice.a);
            slot.b = group.mul(&slot.b, &choice.b);
        }
    }
    slots
}

/// Recovers a candidate's total from the aggregated ciphertext and a full
/// set of decryption shares, by searching `g^t` for `t` in `0..=max_count`.
///
/// Returns `None` if no exponent in the range matches, which indicates a bad
/// share slipped through or a holder is missing.
pub fn recover_count(
    group: &Group,
    slot: &ChoiceCiphertext,
    shares: &[&GroupElement],
    max_count: u64,
) -> Option<u64> {
    let mut denominator = group.identity();
    for share in shares {
        denominator = group.mul(&denominator, share);
    }
    let target = group.mul(&slot.b, &group.inv(&denominator));

    let mut power = group.identity();
    for count in 0..=max_count {
        if power == target {
            return Some(count);
        }
        power = group.mul(&power, &group.generator());
    }
    None
}
