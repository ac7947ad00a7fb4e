//! Verifiable electronic voting over ElGamal-encrypted ballots.
//!
//! Voters encrypt one 0/1 choice per candidate and prove each choice valid
//! with a disjunctive Chaum–Pedersen proof, plus one proof that the choices
//! sum to the election's required selection count. Mutually distrusting
//! arbiters jointly hold the decryption key: the tally only opens once every
//! arbiter publishes a proven partial decryption of the homomorphically
//! combined ballots, and any observer can recompute and check the outcome
//! from the public records without learning a single vote.

// Linter settings.
#![warn(missing_debug_implementations, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod ballot;
pub mod count;
pub mod election;
pub mod group;
pub mod tally;
mod utils;
pub mod wire;

pub use crate::ballot::{BallotError, ChoiceCiphertext, ChoiceProof, EncryptedBallot};
pub use crate::count::CountProof;
pub use crate::election::{
    roles::{cast_ballot, verify_election, Arbiter, ElectionResults, Registrar, Tallyer},
    store::ElectionStore,
    BallotRecord, BallotSubmission, Certificate, DecryptionRecord, Election, ElectionParams,
};
pub use crate::group::{Group, GroupElement, Scalar};
pub use crate::tally::{DecryptionKeys, DecryptionProof, DecryptionShare};
