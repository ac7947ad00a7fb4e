//! Canonical binary serialisation of protocol messages.
//!
//! Every message is a one-byte type tag followed by length-prefixed fields:
//! byte strings carry a little-endian `u64` length, integers are encoded as
//! their canonical decimal rendering in a byte string, and sequences carry a
//! little-endian `u64` element count followed by the elements' own tagged
//! encodings. Signatures are computed over these bytes, so any deviation
//! breaks interoperability, not just storage.

use std::{error::Error as StdError, fmt};

use crate::ballot::{ChoiceCiphertext, ChoiceProof, EncryptedBallot};
use crate::count::{CountProof, CountProofTerm};
use crate::group::{GroupElement, Scalar};
use crate::tally::{DecryptionProof, DecryptionShare};

/// Message type tags. The registry covers every message exchanged by the
/// protocol, including the transport-level ones (1–3) produced and consumed
/// outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    SessionKeyRequest = 1,
    SessionKeyResponse = 2,
    SealedEnvelope = 3,
    RegistrationRequest = 4,
    Certificate = 5,
    ChoiceCiphertext = 6,
    ChoiceProof = 7,
    BallotCiphertexts = 8,
    BallotProofs = 9,
    CountProofTerm = 10,
    CountProof = 11,
    BallotSubmission = 12,
    BallotRecord = 13,
    DecryptionShare = 14,
    DecryptionProof = 15,
    DecryptionShareSet = 16,
    DecryptionProofSet = 17,
    DecryptionRecord = 18,
}

/// Error decoding a canonical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// The leading type tag differs from the expected message type.
    UnexpectedTag { expected: Tag, actual: u8 },
    /// The buffer ended in the middle of a field.
    UnexpectedEnd,
    /// The buffer continues past the end of the message.
    TrailingBytes,
    /// A byte string did not hold a canonical decimal integer.
    InvalidInteger,
}

impl fmt::Display for WireError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => write!(
                formatter,
                "unexpected message tag {actual}, expected {expected:?} ({})",
                *expected as u8
            ),
            Self::UnexpectedEnd => formatter.write_str("unexpected end of message"),
            Self::TrailingBytes => formatter.write_str("trailing bytes after message"),
            Self::InvalidInteger => formatter.write_str("malformed integer field"),
        }
    }
}

impl StdError for WireError {}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn put_count(buf: &mut Vec<u8>, count: usize) {
    buf.extend_from_slice(&(count as u64).to_le_bytes());
}

fn put_element(buf: &mut Vec<u8>, element: &GroupElement) {
    put_bytes(buf, element.to_string().as_bytes());
}

fn put_scalar(buf: &mut Vec<u8>, scalar: &Scalar) {
    put_bytes(buf, scalar.to_string().as_bytes());
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if self.buf.len() < len {
            return Err(WireError::UnexpectedEnd);
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn tag(&mut self, expected: Tag) -> Result<(), WireError> {
        let actual = self.take(1)?[0];
        if actual == expected as u8 {
            Ok(())
        } else {
            Err(WireError::UnexpectedTag { expected, actual })
        }
    }

    fn count(&mut self) -> Result<u64, WireError> {
        let bytes = self.take(8)?;
        let mut raw = [0_u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    fn bytes(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.count()?;
        let len = usize::try_from(len).map_err(|_| WireError::UnexpectedEnd)?;
        self.take(len)
    }

    fn element(&mut self) -> Result<GroupElement, WireError> {
        let bytes = self.bytes()?;
        let rendered = std::str::from_utf8(bytes).map_err(|_| WireError::InvalidInteger)?;
        rendered.parse().map_err(|_| WireError::InvalidInteger)
    }

    fn scalar(&mut self) -> Result<Scalar, WireError> {
        let bytes = self.bytes()?;
        let rendered = std::str::from_utf8(bytes).map_err(|_| WireError::InvalidInteger)?;
        rendered.parse().map_err(|_| WireError::InvalidInteger)
    }

    fn finish(self) -> Result<(), WireError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(WireError::TrailingBytes)
        }
    }
}

fn put_choice_ciphertext(buf: &mut Vec<u8>, ciphertext: &ChoiceCiphertext) {
    buf.push(Tag::ChoiceCiphertext as u8);
    put_element(buf, &ciphertext.a);
    put_element(buf, &ciphertext.b);
}

fn read_choice_ciphertext(reader: &mut Reader<'_>) -> Result<ChoiceCiphertext, WireError> {
    reader.tag(Tag::ChoiceCiphertext)?;
    Ok(ChoiceCiphertext {
        a: reader.element()?,
        b: reader.element()?,
    })
}

fn put_choice_proof(buf: &mut Vec<u8>, proof: &ChoiceProof) {
    buf.push(Tag::ChoiceProof as u8);
    put_element(buf, &proof.a0);
    put_element(buf, &proof.a1);
    put_element(buf, &proof.b0);
    put_element(buf, &proof.b1);
    put_scalar(buf, &proof.c0);
    put_scalar(buf, &proof.c1);
    put_scalar(buf, &proof.r0);
    put_scalar(buf, &proof.r1);
}

fn read_choice_proof(reader: &mut Reader<'_>) -> Result<ChoiceProof, WireError> {
    reader.tag(Tag::ChoiceProof)?;
    Ok(ChoiceProof {
        a0: reader.element()?,
        a1: reader.element()?,
        b0: reader.element()?,
        b1: reader.element()?,
        c0: reader.scalar()?,
        c1: reader.scalar()?,
        r0: reader.scalar()?,
        r1: reader.scalar()?,
    })
}

fn put_count_proof(buf: &mut Vec<u8>, proof: &CountProof) {
    buf.push(Tag::CountProof as u8);
    put_count(buf, proof.terms.len());
    for term in &proof.terms {
        buf.push(Tag::CountProofTerm as u8);
        put_element(buf, &term.a);
        put_element(buf, &term.b);
        put_scalar(buf, &term.c);
        put_scalar(buf, &term.r);
    }
}

fn read_count_proof(reader: &mut Reader<'_>) -> Result<CountProof, WireError> {
    reader.tag(Tag::CountProof)?;
    let count = reader.count()?;
    let mut terms = Vec::new();
    for _ in 0..count {
        reader.tag(Tag::CountProofTerm)?;
        terms.push(CountProofTerm {
            a: reader.element()?,
            b: reader.element()?,
            c: reader.scalar()?,
            r: reader.scalar()?,
        });
    }
    Ok(CountProof { terms })
}

/// Encodes a ballot as the fixed concatenation: the ciphertext sequence, the
/// choice-proof sequence, the sum ciphertext, the count proof. These are
/// exactly the bytes a voter signs and a tallyer counter-signs.
pub fn encode_ballot(ballot: &EncryptedBallot) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(Tag::BallotCiphertexts as u8);
    put_count(&mut buf, ballot.choices.len());
    for choice in &ballot.choices {
        put_choice_ciphertext(&mut buf, choice);
    }
    buf.push(Tag::BallotProofs as u8);
    put_count(&mut buf, ballot.proofs.len());
    for proof in &ballot.proofs {
        put_choice_proof(&mut buf, proof);
    }
    put_choice_ciphertext(&mut buf, &ballot.sum);
    put_count_proof(&mut buf, &ballot.count_proof);
    buf
}

pub fn decode_ballot(bytes: &[u8]) -> Result<EncryptedBallot, WireError> {
    let mut reader = Reader::new(bytes);

    reader.tag(Tag::BallotCiphertexts)?;
    let count = reader.count()?;
    let mut choices = Vec::new();
    for _ in 0..count {
        choices.push(read_choice_ciphertext(&mut reader)?);
    }

    reader.tag(Tag::BallotProofs)?;
    let count = reader.count()?;
    let mut proofs = Vec::new();
    for _ in 0..count {
        proofs.push(read_choice_proof(&mut reader)?);
    }

    let sum = read_choice_ciphertext(&mut reader)?;
    let count_proof = read_count_proof(&mut reader)?;
    reader.finish()?;
    Ok(EncryptedBallot {
        choices,
        proofs,
        sum,
        count_proof,
    })
}

pub fn encode_choice_ciphertext(ciphertext: &ChoiceCiphertext) -> Vec<u8> {
    let mut buf = Vec::new();
    put_choice_ciphertext(&mut buf, ciphertext);
    buf
}

pub fn decode_choice_ciphertext(bytes: &[u8]) -> Result<ChoiceCiphertext, WireError> {
    let mut reader = Reader::new(bytes);
    let ciphertext = read_choice_ciphertext(&mut reader)?;
    reader.finish()?;
    Ok(ciphertext)
}

pub fn encode_decryption_shares(shares: &[DecryptionShare]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(Tag::DecryptionShareSet as u8);
    put_count(&mut buf, shares.len());
    for share in shares {
        buf.push(Tag::DecryptionShare as u8);
        put_element(&mut buf, &share.d);
        put_choice_ciphertext(&mut buf, &share.ciphertext);
    }
    buf
}

pub fn decode_decryption_shares(bytes: &[u8]) -> Result<Vec<DecryptionShare>, WireError> {
    let mut reader = Reader::new(bytes);
    reader.tag(Tag::DecryptionShareSet)?;
    let count = reader.count()?;
    let mut shares = Vec::new();
    for _ in 0..count {
        reader.tag(Tag::DecryptionShare)?;
        shares.push(DecryptionShare {
            d: reader.element()?,
            ciphertext: read_choice_ciphertext(&mut reader)?,
        });
    }
    reader.finish()?;
    Ok(shares)
}

pub fn encode_decryption_proofs(proofs: &[DecryptionProof]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(Tag::DecryptionProofSet as u8);
    put_count(&mut buf, proofs.len());
    for proof in proofs {
        buf.push(Tag::DecryptionProof as u8);
        put_element(&mut buf, &proof.u);
        put_element(&mut buf, &proof.v);
        put_scalar(&mut buf, &proof.s);
    }
    buf
}

pub fn decode_decryption_proofs(bytes: &[u8]) -> Result<Vec<DecryptionProof>, WireError> {
    let mut reader = Reader::new(bytes);
    reader.tag(Tag::DecryptionProofSet)?;
    let count = reader.count()?;
    let mut proofs = Vec::new();
    for _ in 0..count {
        reader.tag(Tag::DecryptionProof)?;
        proofs.push(DecryptionProof {
            u: reader.element()?,
            v: reader.element()?,
            s: reader.scalar()?,
        });
    }
    reader.finish()?;
    Ok(proofs)
}

/// Bytes a registrar signs when certifying a voter.
pub fn certificate_payload(voter_id: &str, verification_key: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    put_bytes(&mut buf, voter_id.as_bytes());
    put_bytes(&mut buf, verification_key);
    buf
}

/// Bytes a server signs during the session handshake: its own ephemeral
/// public value followed by the client's.
pub fn session_payload(server_public: &[u8], client_public: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    put_bytes(&mut buf, server_public);
    put_bytes(&mut buf, client_public);
    buf
}
