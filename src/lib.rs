//! The crate contains the implementation of a multiparty threshold signature scheme
//! based on the work of Rosario Gennaro and Steven Goldfeder
//! ["Fast multiparty threshold ECDSA with Fast trustless setup"](https://eprint.iacr.org/2019/114.pdf).
//!
//! The scheme comprises
//!  * key generation performed in the distributed setup with `N` players, where each player
//! also publishes its Paillier key and bit commitment setup along with the proofs of their well-formedness
//!  * message signing carried out by subgroup of `(t+1, N)` players, which converts the products of secrets
//! into additive shares with the `MtA` protocol and checks the consistency of the partial signatures before combining them.
//! The scheme is based on ECDSA standard with the elliptic curve secp256k1.
//!
//! Cryptographic protocols are implemented by [`ecdsa`](./ecdsa/index.html) module.
//! Building blocks, such as Paillier encryption, `MtA` and zero-knowledge proofs, can be found in [`algorithms`](./algorithms/index.html) module.
//! The general purpose state machine is implemented in [`state_machine`](./state_machine/index.html) module.
//! Errors of the building blocks are enumerated in [`error`](./error/index.html),
//! canonical fixed width encodings of the values exchanged by parties are in [`encoding`](./encoding/index.html).
#![allow(
    clippy::must_use_candidate,
    clippy::items_after_statements,
    clippy::module_name_repetitions,
    clippy::unseparated_literal_suffix,
    //
    clippy::missing_errors_doc, // remove at some point
    clippy::used_underscore_binding // if turned on, seems to generate a lot of false positive
)]
pub mod algorithms;
pub mod ecdsa;
pub mod encoding;
pub mod error;
pub mod protocol;
pub mod state_machine;

#[macro_use]
extern crate strum_macros;

pub use ecdsa::{Parameters, Signature};
pub use error::{Error, ErrorKind};
