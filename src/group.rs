//! Prime-order group arithmetic and transcript hashing.
//!
//! Every protocol value lives in the subgroup of `Z_p^*` of prime order `q`
//! generated by `g`, with exponents reduced modulo `q`. The [`Transcript`]
//! turns an ordered sequence of group elements into a challenge scalar; its
//! byte format is fixed (little-endian `u64` length prefix followed by the
//! canonical decimal rendering of the element) so that independently produced
//! proofs verify against each other.

use num_bigint::{BigUint, RandBigInt};
use num_traits::One;
use rand_core::{CryptoRng, RngCore};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use std::{error::Error as StdError, fmt, str::FromStr};

/// 2,048-bit safe prime from RFC 3526 (group 14).
const STANDARD_P: &str = "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
                          020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
                          4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
                          EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
                          98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
                          9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
                          E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
                          3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF";

/// `(STANDARD_P - 1) / 2`, also prime.
const STANDARD_Q: &str = "7FFFFFFFFFFFFFFFE487ED5110B4611A62633145C06E0E68948127044533E63A\
                          0105DF531D89CD9128A5043CC71A026EF7CA8CD9E69D218D98158536F92F8A1B\
                          A7F09AB6B6A8E122F242DABB312F3F637A262174D31BF6B585FFAE5B7A035BF6\
                          F71C35FDAD44CFD2D74F9208BE258FF324943328F6722D9EE1003E5C50B1DF82\
                          CC6D241B0E2AE9CD348B1FD47E9267AFC1B2AE91EE51D6CB0E3179AB1042A95D\
                          CF6A9483B84B4B36B3861AA7255E4C0278BA3604650C10BE19482F23171B671D\
                          F1CF3B960C074301CD93C1D17603D147DAE2AEF837A62964EF15E5FB4AAC0B8C\
                          1CCAA4BE754AB5728AE9130C4C7D02880AB9472D455655347FFFFFFFFFFFFFFF";

fn parse_decimal(s: &str) -> Option<BigUint> {
    // Only the canonical rendering is accepted; "007" and "" must not parse,
    // or the same value could hash to two different transcripts.
    if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
        return None;
    }
    if !s.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    BigUint::parse_bytes(s.as_bytes(), 10)
}

/// Error parsing a [`GroupElement`] or [`Scalar`] from its decimal form.
#[derive(Debug)]
pub struct InvalidDecimal(());

impl fmt::Display for InvalidDecimal {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("not a canonical decimal integer")
    }
}

impl StdError for InvalidDecimal {}

macro_rules! decimal_value {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(&self.0.to_str_radix(10))
            }
        }

        impl FromStr for $name {
            type Err = InvalidDecimal;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_decimal(s).map(Self).ok_or(InvalidDecimal(()))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(D::Error::custom)
            }
        }
    };
}

/// Element of the order-`q` subgroup of `Z_p^*`.
///
/// The type itself does not witness subgroup membership; any value crossing
/// a trust boundary must pass [`Group::is_valid_element`] before it is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupElement(BigUint);

decimal_value!(GroupElement);

/// Residue modulo the subgroup order `q`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar(BigUint);

decimal_value!(Scalar);

impl Scalar {
    pub(crate) fn zero() -> Self {
        Self(BigUint::default())
    }
}

/// Error validating group parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupError {
    /// The modulus is even or too small.
    Modulus,
    /// The subgroup order is not in `(1, p)`.
    SubgroupOrder,
    /// The generator is not in `(1, p)` or does not have order `q`.
    Generator,
}

impl fmt::Display for GroupError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modulus => formatter.write_str("modulus must be an odd prime greater than 3"),
            Self::SubgroupOrder => formatter.write_str("subgroup order must lie in (1, p)"),
            Self::Generator => {
                formatter.write_str("generator must lie in (1, p) and have order q")
            }
        }
    }
}

impl StdError for GroupError {}

/// Public parameters `(p, q, g)` shared by all participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    p: BigUint,
    q: BigUint,
    g: BigUint,
}

impl Group {
    /// Returns the standard election group: the RFC 3526 2,048-bit safe
    /// prime, `q = (p - 1) / 2` and the quadratic-residue generator `g = 4`.
    pub fn standard() -> Self {
        let p = BigUint::parse_bytes(STANDARD_P.as_bytes(), 16);
        let q = BigUint::parse_bytes(STANDARD_Q.as_bytes(), 16);
        Self {
            p: p.expect("statically known modulus"),
            q: q.expect("statically known subgroup order"),
            g: BigUint::from(4_u32),
        }
    }

    /// Creates a group from decimal-encoded parameters, checking that `g`
    /// generates an order-`q` subgroup. Primality of `p` and `q` is the
    /// caller's responsibility.
    pub fn new(p: &str, q: &str, g: &str) -> Result<Self, GroupError> {
        let p = parse_decimal(p).ok_or(GroupError::Modulus)?;
        let q = parse_decimal(q).ok_or(GroupError::SubgroupOrder)?;
        let g = parse_decimal(g).ok_or(GroupError::Generator)?;

        if p.bits() < 3 || !p.bit(0) {
            return Err(GroupError::Modulus);
        }
        if !(BigUint::one()..p.clone()).contains(&q) || q.is_one() {
            return Err(GroupError::SubgroupOrder);
        }
        if !(BigUint::one()..p.clone()).contains(&g) || g.is_one() {
            return Err(GroupError::Generator);
        }
        if !g.modpow(&q, &p).is_one() {
            return Err(GroupError::Generator);
        }
        Ok(Self { p, q, g })
    }

    pub fn generator(&self) -> GroupElement {
        GroupElement(self.g.clone())
    }

    pub fn identity(&self) -> GroupElement {
        GroupElement(BigUint::one())
    }

    /// `g^exp mod p`.
    pub fn g_pow(&self, exp: &Scalar) -> GroupElement {
        GroupElement(self.g.modpow(&exp.0, &self.p))
    }

    /// `base^exp mod p`.
    pub fn pow(&self, base: &GroupElement, exp: &Scalar) -> GroupElement {
        GroupElement(base.0.modpow(&exp.0, &self.p))
    }

    pub fn mul(&self, lhs: &GroupElement, rhs: &GroupElement) -> GroupElement {
        GroupElement(&lhs.0 * &rhs.0 % &self.p)
    }

    /// Multiplicative inverse mod `p`, computed as `x^(p - 2)`; `p` is prime,
    /// so this is total on `[1, p - 1]`.
    pub fn inv(&self, x: &GroupElement) -> GroupElement {
        let exp = &self.p - BigUint::from(2_u32);
        GroupElement(x.0.modpow(&exp, &self.p))
    }

    pub fn scalar_from_u64(&self, value: u64) -> Scalar {
        Scalar(BigUint::from(value) % &self.q)
    }

    /// Uniform scalar in `[1, q - 1]`.
    pub fn rand_scalar<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Scalar {
        loop {
            let value = rng.gen_biguint_below(&self.q);
            if value.bits() > 0 {
                return Scalar(value);
            }
        }
    }

    pub fn add_scalars(&self, lhs: &Scalar, rhs: &Scalar) -> Scalar {
        Scalar((&lhs.0 + &rhs.0) % &self.q)
    }

    /// `lhs - rhs mod q` with a non-negative result.
    pub fn sub_scalars(&self, lhs: &Scalar, rhs: &Scalar) -> Scalar {
        let lhs = &lhs.0 % &self.q;
        let rhs = &rhs.0 % &self.q;
        Scalar((lhs + &self.q - rhs) % &self.q)
    }

    pub fn mul_scalars(&self, lhs: &Scalar, rhs: &Scalar) -> Scalar {
        Scalar(&lhs.0 * &rhs.0 % &self.q)
    }

    /// Checks full subgroup membership: `1 <= x < p` and `x^q = 1 mod p`.
    pub fn is_valid_element(&self, x: &GroupElement) -> bool {
        x.0.bits() > 0 && x.0 < self.p && x.0.modpow(&self.q, &self.p).is_one()
    }

    pub fn is_valid_scalar(&self, s: &Scalar) -> bool {
        s.0 < self.q
    }
}

#[derive(Serialize, Deserialize)]
struct GroupRepr {
    p: String,
    q: String,
    g: String,
}

impl Serialize for Group {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = GroupRepr {
            p: self.p.to_str_radix(10),
            q: self.q.to_str_radix(10),
            g: self.g.to_str_radix(10),
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Group {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = GroupRepr::deserialize(deserializer)?;
        Self::new(&repr.p, &repr.q, &repr.g).map_err(D::Error::custom)
    }
}

/// Accumulator for the Fiat–Shamir challenge of a proof.
///
/// Each appended element contributes its canonical decimal rendering,
/// preceded by the rendering's byte length as a little-endian `u64`. The
/// accumulated SHA-256 digest is interpreted as a big-endian integer and
/// reduced mod `q`.
#[derive(Debug, Default)]
pub struct Transcript {
    hasher: Sha256,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, element: &GroupElement) {
        let rendered = element.to_string();
        self.hasher.update((rendered.len() as u64).to_le_bytes());
        self.hasher.update(rendered.as_bytes());
    }

    pub fn finalize(self, group: &Group) -> Scalar {
        let digest = self.hasher.finalize();
        Scalar(BigUint::from_bytes_be(&digest) % &group.q)
    }
}
