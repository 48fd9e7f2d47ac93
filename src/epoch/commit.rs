//! Canonical commit hashing and the per-vote randomness contribution
//!
//! The commit hash binds the submitting voter's identity together with the
//! indices, prices and nonce. A second account that copies an observed hash
//! cannot reveal under its own identity: its recomputed hash will differ.
//!
//! Indices must be strictly ascending on both submit and reveal so that a
//! given set of (index, price) pairs has exactly one hashable encoding.

use sha2::{Digest, Sha256};

use crate::types::{AssetIndex, Price, VoterId};

/// Commit hash over (indices, prices, nonce, voter identity)
pub fn commit_hash(
    voter: &VoterId,
    indices: &[AssetIndex],
    prices: &[Price],
    nonce: u128,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(voter.as_bytes());
    for idx in indices {
        hasher.update(idx.to_be_bytes());
    }
    for price in prices {
        hasher.update(price.to_be_bytes());
    }
    hasher.update(nonce.to_be_bytes());
    hasher.finalize().into()
}

/// One reveal's contribution to the epoch randomness accumulator
///
/// Hashes the nonce together with the revealed prices and folds the digest
/// to 128 bits. Contributions combine by wrapping addition, so the epoch
/// randomness is order-independent and depends on every reveal.
pub fn random_contribution(nonce: u128, prices: &[Price]) -> u128 {
    let mut hasher = Sha256::new();
    hasher.update(nonce.to_be_bytes());
    for price in prices {
        hasher.update(price.to_be_bytes());
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    u128::from_be_bytes(bytes)
}

/// Strictly ascending check, shared by submit and reveal
pub fn indices_strictly_increasing(indices: &[AssetIndex]) -> bool {
    indices.windows(2).all(|w| w[0] < w[1])
}
