#![cfg_attr(docsrs, feature(doc_cfg))]
//! # vfl-core: building blocks for vertical federated learning
//!
//! In vertical federated learning several parties hold *different feature columns* of the same
//! samples. Only one of them, the **tag party**, holds the prediction label; every other party is
//! a **non-tag party**. This crate provides the protocol layer that lets those parties align and
//! train on their combined data without exchanging raw records:
//!
//! - [`crypto`]: the leaf primitives. A deterministic message to curve point mapper
//!   ([`crypto::HashToCurve`]) for the `P-256` and `SM2-P-256` curves, EC scalar masking keys and
//!   an additive homomorphic (Paillier) cryptosystem.
//! - [`psi`]: N-party private set intersection over sample identifiers by commutative EC
//!   Diffie-Hellman masking.
//! - [`aggregation`]: Paillier based secure aggregation of gradients and costs for vertical linear
//!   and logistic regression, with fixed-point scaling and additive noise masking.
//! - [`tree`]: a two-party decision tree whose model is split between the tag and the non-tag
//!   party. Training, pruning and prediction run as a message exchange behind a
//!   [`tree::Transport`].
//! - [`settings`]: loading and validation of the configuration used by the `vfl-demo` binary.
//!
//! ## A round of PSI
//! ```
//! # use vfl_core::{crypto::{EcCurve, EcdhSecretKey}, psi::{intersect, PsiSession}};
//! let alice_ids: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
//! let bob_ids: Vec<String> = vec!["c".into(), "d".into(), "a".into()];
//! let alice = PsiSession::new(EcdhSecretKey::generate(EcCurve::P256));
//! let bob = PsiSession::new(EcdhSecretKey::generate(EcCurve::P256));
//!
//! // each party masks its own set and the peer masks it a second time
//! let alice_full = bob.reencrypt(&alice.encrypt_ids(&alice_ids).unwrap()).unwrap();
//! let bob_full = alice.reencrypt(&bob.encrypt_ids(&bob_ids).unwrap()).unwrap();
//!
//! let common = intersect(&alice_ids, &alice_full, &[bob_full]).unwrap();
//! assert_eq!(common, vec!["a".to_string(), "c".to_string()]);
//! ```

#[macro_use]
extern crate tracing;

pub mod aggregation;
pub mod crypto;
pub mod psi;
pub mod settings;
pub mod tree;

use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// The role of a party in a vertical protocol.
pub enum Role {
    /// The party holding the prediction label.
    #[display(fmt = "tag")]
    Tag,
    /// A party holding only predictor features.
    #[display(fmt = "non-tag")]
    NonTag,
}

impl Role {
    /// Checks whether this is the label holding party.
    pub fn is_tag(self) -> bool {
        matches!(self, Role::Tag)
    }
}
