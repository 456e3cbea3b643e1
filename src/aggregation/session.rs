//! The per-party context of vertical regression training.

use std::collections::BTreeMap;

use num::bigint::{BigInt, BigUint};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    fixed_point::{decode, encode, to_plaintext, Accuracy},
    gradient::{check_train_set, cost_from_squares, features, raw_parts, regularize},
    masking::{self, unmask, DecryptedValues, MaskedValues, Masker, Noise},
    AggregationError,
    RegressionKind,
    Regularization,
};
use crate::{
    crypto::{HomomorphicEncryptKey, PaillierKeyPair, PaillierPublicKey},
    Role,
};

#[derive(Debug, Clone, PartialEq)]
/// The plaintext raw parts `u_i` of a party. Never leaves the party.
pub struct RawLocalPart {
    parts: Vec<f64>,
}

impl RawLocalPart {
    /// Gets the raw part of every sample.
    pub fn parts(&self) -> &[f64] {
        &self.parts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The encrypted raw parts of a party, sent to the peer.
///
/// Both vectors are encrypted under the sender's own key: `parts[i]` holds `u_i` at the session
/// accuracy and `squares[i]` holds `u_i²` at twice the accuracy.
pub struct EncLocalPart {
    pub accuracy: Accuracy,
    pub parts: Vec<BigUint>,
    pub squares: Vec<BigUint>,
}

/// The state of one party of a vertical regression.
///
/// Every protocol step is a method on the session; the session carries the role, the model, the
/// own key pair, the peer's public key, the model parameters and the training rows.
pub struct RegressionSession {
    role: Role,
    kind: RegressionKind,
    accuracy: Accuracy,
    keys: PaillierKeyPair,
    peer_key: PaillierPublicKey,
    regularization: Regularization,
    thetas: Vec<f64>,
    rows: Vec<Vec<f64>>,
}

impl RegressionSession {
    /// Creates a session with all parameters initialized to zero.
    ///
    /// # Errors
    /// Fails if the training rows are empty, ragged or not finite.
    pub fn new(
        role: Role,
        kind: RegressionKind,
        accuracy: Accuracy,
        keys: PaillierKeyPair,
        peer_key: PaillierPublicKey,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, AggregationError> {
        let width = rows.first().map(|row| features(row, role).len()).unwrap_or_default();
        let thetas = vec![0.0; width];
        check_train_set(&thetas, &rows, role)?;
        Ok(Self {
            role,
            kind,
            accuracy,
            keys,
            peer_key,
            regularization: Regularization::None,
            thetas,
            rows,
        })
    }

    /// Sets the regularization of the gradients.
    pub fn with_regularization(mut self, regularization: Regularization) -> Self {
        self.regularization = regularization;
        self
    }

    /// Sets the model parameters.
    ///
    /// # Errors
    /// Fails if the number of parameters does not match the feature columns.
    pub fn with_thetas(mut self, thetas: Vec<f64>) -> Result<Self, AggregationError> {
        check_train_set(&thetas, &self.rows, self.role)?;
        self.thetas = thetas;
        Ok(self)
    }

    /// Gets the role of this party.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Gets the own public key to hand to the peer.
    pub fn public_key(&self) -> &PaillierPublicKey {
        &self.keys.public
    }

    /// Gets the current model parameters.
    pub fn thetas(&self) -> &[f64] {
        &self.thetas
    }

    /// Gets the number of training samples.
    pub fn samples(&self) -> usize {
        self.rows.len()
    }

    /// Computes the raw parts and their encryption under the own key.
    ///
    /// # Errors
    /// Fails if a raw part is not finite.
    pub fn local_part(&self) -> Result<(RawLocalPart, EncLocalPart), AggregationError> {
        let parts = raw_parts(self.kind, self.role, &self.thetas, &self.rows);
        let own = &self.keys.public;
        let (enc_parts, enc_squares): (Vec<_>, Vec<_>) = parts
            .par_iter()
            .map(|u| {
                let encoded = encode(*u, self.accuracy)?;
                let square = &encoded * &encoded;
                Ok((
                    own.encrypt(&to_plaintext(&encoded, own.modulus()))?,
                    own.encrypt(&to_plaintext(&square, own.modulus()))?,
                ))
            })
            .collect::<Result<Vec<_>, AggregationError>>()?
            .into_iter()
            .unzip();
        debug!(
            "{} party encrypted {} raw parts at accuracy {}",
            self.role,
            parts.len(),
            self.accuracy
        );
        Ok((
            RawLocalPart { parts },
            EncLocalPart {
                accuracy: self.accuracy,
                parts: enc_parts,
                squares: enc_squares,
            },
        ))
    }

    fn check_exchange(
        &self,
        raw: &RawLocalPart,
        peer: &EncLocalPart,
    ) -> Result<(), AggregationError> {
        if peer.accuracy != self.accuracy {
            return Err(AggregationError::AccuracyMismatch {
                local: self.accuracy,
                peer: peer.accuracy,
            });
        }
        let m = self.samples();
        for actual in &[raw.parts.len(), peer.parts.len(), peer.squares.len()] {
            if *actual != m {
                return Err(AggregationError::ShapeMismatch {
                    expected: m,
                    actual: *actual,
                });
            }
        }
        Ok(())
    }

    fn encoded_parts(&self, raw: &RawLocalPart) -> Result<Vec<BigInt>, AggregationError> {
        raw.parts.iter().map(|u| encode(*u, self.accuracy)).collect()
    }

    /// Combines the peer's encrypted raw parts with the own ones into the encrypted gradient sums
    /// `Σ d_i x_ij` of every own feature `j` under the peer's key and masks them.
    ///
    /// The masked values go to the peer for decryption, the noise stays here.
    ///
    /// # Errors
    /// Fails on an accuracy or shape mismatch of the exchanged parts.
    pub fn masked_gradients(
        &self,
        raw: &RawLocalPart,
        peer: &EncLocalPart,
    ) -> Result<(MaskedValues, Noise), AggregationError> {
        self.check_exchange(raw, peer)?;
        let pk = &self.peer_key;
        let n = pk.modulus();
        let own = self.encoded_parts(raw)?;
        let encrypted = (0..self.thetas.len())
            .into_par_iter()
            .map(|j| {
                let column = self
                    .rows
                    .iter()
                    .map(|row| encode(features(row, self.role)[j], self.accuracy))
                    .collect::<Result<Vec<_>, _>>()?;
                let own_sum: BigInt = own.iter().zip(&column).map(|(u, x)| u * x).sum();
                let sum = peer
                    .parts
                    .iter()
                    .zip(&column)
                    .fold(pk.encrypt(&to_plaintext(&own_sum, n))?, |acc, (u, x)| {
                        pk.add(&acc, &pk.mul_plain(u, &to_plaintext(x, n)))
                    });
                Ok((j, sum))
            })
            .collect::<Result<BTreeMap<_, _>, AggregationError>>()?;
        debug!("{} party masked {} gradient sums", self.role, encrypted.len());
        Ok(Masker::new(pk).mask(encrypted))
    }

    /// Combines the peer's encrypted raw parts with the own ones into the encrypted sum of squared
    /// residuals `Σ d_i²` under the peer's key and masks it.
    ///
    /// # Errors
    /// Fails on an accuracy or shape mismatch of the exchanged parts.
    pub fn masked_cost(
        &self,
        raw: &RawLocalPart,
        peer: &EncLocalPart,
    ) -> Result<(MaskedValues, Noise), AggregationError> {
        self.check_exchange(raw, peer)?;
        let pk = &self.peer_key;
        let n = pk.modulus();
        let own = self.encoded_parts(raw)?;
        // d² = u_peer² + 2 u_peer u_own + u_own²
        let own_squares: BigInt = own.iter().map(|u| u * u).sum();
        let sum = own
            .iter()
            .zip(peer.parts.iter().zip(&peer.squares))
            .fold(pk.encrypt(&to_plaintext(&own_squares, n))?, |acc, (u, (peer_u, peer_square))| {
                let cross = pk.mul_plain(peer_u, &to_plaintext(&(u * 2_u32), n));
                pk.add(&pk.add(&acc, peer_square), &cross)
            });
        let encrypted = vec![(0, sum)].into_iter().collect();
        Ok(Masker::new(pk).mask(encrypted))
    }

    /// Decrypts masked values on behalf of the peer.
    ///
    /// # Errors
    /// Fails if a ciphertext is invalid under the own key.
    pub fn decrypt_masked(
        &self,
        masked: &MaskedValues,
    ) -> Result<DecryptedValues, AggregationError> {
        masking::decrypt_masked(&self.keys.secret, masked)
    }

    /// Removes the noise from the decrypted gradient sums and descales them to the gradients.
    ///
    /// # Errors
    /// Fails if a feature is missing from the decrypted values.
    pub fn retrieve_gradients(
        &self,
        decrypted: &DecryptedValues,
        noise: &Noise,
    ) -> Result<Vec<f64>, AggregationError> {
        let sums = unmask(decrypted, noise, self.peer_key.modulus())?;
        let m = self.samples() as f64;
        (0..self.thetas.len())
            .map(|j| {
                let sum = sums.get(&j).ok_or(AggregationError::MissingValue(j))?;
                Ok(decode(sum, self.accuracy.squared()) / m)
            })
            .collect()
    }

    /// Removes the noise from the decrypted sum of squared residuals and computes the cost.
    ///
    /// # Errors
    /// Fails if the decrypted value is missing.
    pub fn retrieve_cost(
        &self,
        decrypted: &DecryptedValues,
        noise: &Noise,
    ) -> Result<f64, AggregationError> {
        let sums = unmask(decrypted, noise, self.peer_key.modulus())?;
        let squares = sums.get(&0).ok_or(AggregationError::MissingValue(0))?;
        Ok(cost_from_squares(
            self.kind,
            decode(squares, self.accuracy.squared()),
            self.samples(),
        ))
    }

    /// Adds the regularization term of the own parameters to the gradients.
    ///
    /// # Errors
    /// Fails if the number of gradients does not match the parameters.
    pub fn gradient_with_reg(&self, gradients: &[f64]) -> Result<Vec<f64>, AggregationError> {
        self.check_gradients(gradients)?;
        Ok(gradients
            .iter()
            .zip(&self.thetas)
            .enumerate()
            .map(|(j, (gradient, theta))| {
                let is_intercept = self.role.is_tag() && j == 0;
                regularize(*gradient, *theta, self.regularization, self.samples(), is_intercept)
            })
            .collect())
    }

    /// Takes a gradient descent step `θ_j ← θ_j − α g_j`.
    ///
    /// # Errors
    /// Fails if the number of gradients does not match the parameters.
    pub fn update(&mut self, gradients: &[f64], alpha: f64) -> Result<(), AggregationError> {
        self.check_gradients(gradients)?;
        for (theta, gradient) in self.thetas.iter_mut().zip(gradients) {
            *theta -= alpha * gradient;
        }
        Ok(())
    }

    fn check_gradients(&self, gradients: &[f64]) -> Result<(), AggregationError> {
        if gradients.len() == self.thetas.len() {
            Ok(())
        } else {
            Err(AggregationError::ShapeMismatch {
                expected: self.thetas.len(),
                actual: gradients.len(),
            })
        }
    }
}

/// Runs one training round between two in-process sessions and returns the cost before the
/// update.
///
/// The message flow is the one of two remote parties: exchange of encrypted raw parts, masked
/// gradient sums and cost to the key owners, decrypted values back, local unmasking and update.
///
/// # Errors
/// Fails if any step of the round fails; no partial update is applied in that case.
pub fn train_round(
    tag: &mut RegressionSession,
    non_tag: &mut RegressionSession,
    alpha: f64,
) -> Result<f64, AggregationError> {
    let (tag_raw, tag_enc) = tag.local_part()?;
    let (non_tag_raw, non_tag_enc) = non_tag.local_part()?;

    let (tag_masked, tag_noise) = tag.masked_gradients(&tag_raw, &non_tag_enc)?;
    let (non_tag_masked, non_tag_noise) = non_tag.masked_gradients(&non_tag_raw, &tag_enc)?;
    let (cost_masked, cost_noise) = tag.masked_cost(&tag_raw, &non_tag_enc)?;

    let tag_decrypted = non_tag.decrypt_masked(&tag_masked)?;
    let cost_decrypted = non_tag.decrypt_masked(&cost_masked)?;
    let non_tag_decrypted = tag.decrypt_masked(&non_tag_masked)?;

    let tag_gradients = tag.retrieve_gradients(&tag_decrypted, &tag_noise)?;
    let tag_gradients = tag.gradient_with_reg(&tag_gradients)?;
    let non_tag_gradients = non_tag.retrieve_gradients(&non_tag_decrypted, &non_tag_noise)?;
    let non_tag_gradients = non_tag.gradient_with_reg(&non_tag_gradients)?;
    let cost = tag.retrieve_cost(&cost_decrypted, &cost_noise)?;

    tag.update(&tag_gradients, alpha)?;
    non_tag.update(&non_tag_gradients, alpha)?;
    info!("regression round finished with cost {:.6}", cost);
    Ok(cost)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(p: u64, q: u64) -> PaillierKeyPair {
        PaillierKeyPair::from_primes(BigUint::from(p), BigUint::from(q)).unwrap()
    }

    /// y = 2 x_a - 3 x_b + 1 over a vertical split: non-tag holds x_a, tag holds x_b and y.
    fn linear_sessions() -> (RegressionSession, RegressionSession) {
        let xs = [(0.5, -1.0), (-1.0, 0.5), (1.0, 1.0), (-0.5, -0.5), (0.0, 1.5), (1.5, 0.0)];
        let non_tag_rows = xs.iter().map(|(a, _)| vec![*a]).collect();
        let tag_rows = xs
            .iter()
            .map(|(a, b)| vec![1.0, *b, 2.0 * a - 3.0 * b + 1.0])
            .collect();
        let tag_keys = keys(4_294_967_291, 2_305_843_009_213_693_951);
        let non_tag_keys = keys(2_147_483_647, 2_305_843_009_213_693_951);
        let accuracy = Accuracy::new(6).unwrap();
        let tag = RegressionSession::new(
            Role::Tag,
            RegressionKind::Linear,
            accuracy,
            tag_keys.clone(),
            non_tag_keys.public.clone(),
            tag_rows,
        )
        .unwrap();
        let non_tag = RegressionSession::new(
            Role::NonTag,
            RegressionKind::Linear,
            accuracy,
            non_tag_keys,
            tag_keys.public,
            non_tag_rows,
        )
        .unwrap();
        (tag, non_tag)
    }

    #[test]
    fn test_round_matches_plaintext_gradients() {
        let (tag, non_tag) = linear_sessions();
        let tag = tag.with_thetas(vec![0.3, -0.2]).unwrap();
        let non_tag = non_tag.with_thetas(vec![0.7]).unwrap();

        let (tag_raw, tag_enc) = tag.local_part().unwrap();
        let (non_tag_raw, non_tag_enc) = non_tag.local_part().unwrap();
        let residuals: Vec<f64> = tag_raw
            .parts()
            .iter()
            .zip(non_tag_raw.parts())
            .map(|(a, b)| a + b)
            .collect();

        let (masked, noise) = non_tag.masked_gradients(&non_tag_raw, &tag_enc).unwrap();
        let gradients = non_tag
            .retrieve_gradients(&tag.decrypt_masked(&masked).unwrap(), &noise)
            .unwrap();
        let expected: f64 = residuals
            .iter()
            .zip(&non_tag.rows)
            .map(|(d, row)| d * row[0])
            .sum::<f64>()
            / 6.0;
        assert!((gradients[0] - expected).abs() < 1e-5);

        let (masked, noise) = tag.masked_cost(&tag_raw, &non_tag_enc).unwrap();
        let cost = tag
            .retrieve_cost(&non_tag.decrypt_masked(&masked).unwrap(), &noise)
            .unwrap();
        let expected = residuals.iter().map(|d| d * d).sum::<f64>() / 12.0;
        assert!((cost - expected).abs() < 1e-5);
    }

    #[test]
    fn test_training_reduces_cost() {
        let (mut tag, mut non_tag) = linear_sessions();
        let first = train_round(&mut tag, &mut non_tag, 0.3).unwrap();
        let mut last = first;
        for _ in 0..60 {
            last = train_round(&mut tag, &mut non_tag, 0.3).unwrap();
        }
        assert!(last < first / 10.0);
        assert!((non_tag.thetas()[0] - 2.0).abs() < 0.2);
        assert!((tag.thetas()[1] + 3.0).abs() < 0.2);
    }

    #[test]
    fn test_accuracy_mismatch() {
        let (tag, non_tag) = linear_sessions();
        let (tag_raw, _) = tag.local_part().unwrap();
        let (_, mut non_tag_enc) = non_tag.local_part().unwrap();
        non_tag_enc.accuracy = Accuracy::new(3).unwrap();
        assert_eq!(
            tag.masked_gradients(&tag_raw, &non_tag_enc).unwrap_err(),
            AggregationError::AccuracyMismatch {
                local: Accuracy::new(6).unwrap(),
                peer: Accuracy::new(3).unwrap(),
            },
        );
        non_tag_enc.accuracy = Accuracy::new(6).unwrap();
        non_tag_enc.parts.pop();
        assert!(matches!(
            tag.masked_cost(&tag_raw, &non_tag_enc),
            Err(AggregationError::ShapeMismatch { expected: 6, actual: 5 })
        ));
    }

    #[test]
    fn test_regularized_update() {
        let (tag, _) = linear_sessions();
        let mut tag = tag
            .with_thetas(vec![1.0, 1.0])
            .unwrap()
            .with_regularization(Regularization::L2(6.0));
        let gradients = tag.gradient_with_reg(&[0.5, 0.5]).unwrap();
        // the intercept is left alone, the feature gets λ/m · θ = 1
        assert_eq!(gradients, vec![0.5, 1.5]);
        tag.update(&gradients, 0.1).unwrap();
        assert!((tag.thetas()[0] - 0.95).abs() < 1e-12);
        assert!((tag.thetas()[1] - 0.85).abs() < 1e-12);
        assert!(tag.update(&[1.0], 0.1).is_err());
    }
}
