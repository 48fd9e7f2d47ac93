//! Weighted-median price aggregation
//!
//! Tie-break policy: votes are sorted by price ascending (stable, so reveal
//! order breaks exact price ties) and the result is the first price at which
//! twice the cumulative weight reaches the total weight. For two votes of
//! equal weight this selects the smaller price. All division is integer
//! floor division.

use crate::types::Price;

/// One revealed vote entering aggregation, weight already blended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedVote {
    pub price: Price,
    pub weight: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MedianResult {
    pub price: Price,
    pub total_weight: u128,
    pub num_votes: usize,
}

/// Weighted median of the given votes, `None` when there are none
pub fn weighted_median(votes: &[WeightedVote]) -> Option<MedianResult> {
    if votes.is_empty() {
        return None;
    }

    let mut sorted = votes.to_vec();
    sorted.sort_by_key(|v| v.price);

    let total: u128 = sorted.iter().map(|v| v.weight).sum();
    if total == 0 {
        // Degenerate weights: fall back to the unweighted middle element
        let mid = (sorted.len() - 1) / 2;
        return Some(MedianResult {
            price: sorted[mid].price,
            total_weight: 0,
            num_votes: votes.len(),
        });
    }

    let mut cumulative: u128 = 0;
    for vote in &sorted {
        cumulative += vote.weight;
        if cumulative * 2 >= total {
            return Some(MedianResult {
                price: vote.price,
                total_weight: total,
                num_votes: votes.len(),
            });
        }
    }

    // Unreachable: cumulative reaches total
    Some(MedianResult {
        price: sorted[sorted.len() - 1].price,
        total_weight: total,
        num_votes: votes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(price: Price, weight: u128) -> WeightedVote {
        WeightedVote { price, weight }
    }

    #[test]
    fn test_single_vote() {
        let result = weighted_median(&[vote(500, 3)]).unwrap();
        assert_eq!(result.price, 500);
        assert_eq!(result.total_weight, 3);
    }

    #[test]
    fn test_equal_weight_pair_picks_smaller_price() {
        let result = weighted_median(&[vote(700, 1), vote(300, 1)]).unwrap();
        assert_eq!(result.price, 300);
    }

    #[test]
    fn test_weight_dominance() {
        // The heavy vote carries the median regardless of position
        let result = weighted_median(&[vote(100, 1), vote(900, 10), vote(200, 1)]).unwrap();
        assert_eq!(result.price, 900);
    }

    #[test]
    fn test_odd_count_equal_weights() {
        let result = weighted_median(&[vote(500, 1), vote(250, 1), vote(400, 1)]).unwrap();
        assert_eq!(result.price, 400);
    }

    #[test]
    fn test_zero_weights_fall_back_to_middle() {
        let result = weighted_median(&[vote(10, 0), vote(20, 0), vote(30, 0)]).unwrap();
        assert_eq!(result.price, 20);
        assert_eq!(result.total_weight, 0);
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(weighted_median(&[]), None);
    }
}
