//! Head reconciliation.
//!
//! When several peers report their head, the answers may disagree: some
//! peers lag, some may be on a different chain. [`best_head`] reduces the
//! reports to one header.
//!
//! The rule: the highest header reported by at least [`MIN_HEAD_RESPONSES`]
//! peers wins. A header only one peer vouches for can still win, but only
//! when no header reaches that count at all; then the highest one is taken.
//!
//! Examples (heights, one entry per report):
//!
//! - `{1, 2, 3}` → 3 (nothing repeated, highest wins)
//! - `{1, 1, 2, 3}` → 1 (only 1 is confirmed)
//! - `{1, 1, 1, 2, 2, 3}` → 2 (1 and 2 are confirmed, 2 is higher)
//!
//! Reports are counted by header hash, so two different headers at the same
//! height are different candidates. Remaining ties go to the higher count,
//! then to the greater hash, so the result depends only on the multiset of
//! reports and never on their order.

use std::collections::HashMap;

use headex_core::{ExtendedHeader, HeaderHash};

use crate::error::{ExchangeError, Result};

/// Reports needed for a head to count as confirmed.
pub const MIN_HEAD_RESPONSES: usize = 2;

/// Select the best head among peer reports.
///
/// Fails with [`ExchangeError::NotFound`] when there are no reports.
pub fn best_head(candidates: &[ExtendedHeader]) -> Result<ExtendedHeader> {
    let mut tally: HashMap<HeaderHash, (usize, &ExtendedHeader)> = HashMap::new();
    for header in candidates {
        tally.entry(header.hash()).or_insert((0, header)).0 += 1;
    }

    let rank = |(hash, (count, header)): &(&HeaderHash, &(usize, &ExtendedHeader))| {
        (header.height(), *count, **hash)
    };

    let confirmed = tally
        .iter()
        .filter(|(_, (count, _))| *count >= MIN_HEAD_RESPONSES)
        .max_by_key(rank);

    confirmed
        .or_else(|| tally.iter().max_by_key(rank))
        .map(|(_, (_, header))| (*header).clone())
        .ok_or(ExchangeError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use headex_testkit::generators::head_reports;
    use headex_testkit::TestSuite;
    use proptest::prelude::*;

    /// Reports for the given heights, drawn from one chain.
    fn reports(chain: &[ExtendedHeader], heights: &[u64]) -> Vec<ExtendedHeader> {
        heights
            .iter()
            .map(|&h| chain[(h - 1) as usize].clone())
            .collect()
    }

    #[test]
    fn test_empty_is_not_found() {
        assert!(best_head(&[]).unwrap_err().is_not_found());
    }

    #[test]
    fn test_single_report() {
        let chain = TestSuite::new().generate(3);
        assert_eq!(best_head(&reports(&chain, &[2])).unwrap().height(), 2);
    }

    #[test]
    fn test_distinct_reports_pick_highest() {
        let chain = TestSuite::new().generate(3);
        let best = best_head(&reports(&chain, &[1, 2, 3])).unwrap();
        assert_eq!(best.height(), 3);
    }

    #[test]
    fn test_confirmed_beats_higher_singletons() {
        let chain = TestSuite::new().generate(3);
        let best = best_head(&reports(&chain, &[1, 1, 2, 3])).unwrap();
        assert_eq!(best.height(), 1);
    }

    #[test]
    fn test_highest_confirmed_wins_over_most_reported() {
        // Counts 3/2/1: height 1 is the most reported, but height 2 is the
        // highest confirmed head.
        let chain = TestSuite::new().generate(3);
        let best = best_head(&reports(&chain, &[1, 1, 1, 2, 2, 3])).unwrap();
        assert_eq!(best.height(), 2);
    }

    #[test]
    fn test_competing_headers_at_same_height() {
        let ours = TestSuite::new().generate(4);
        let theirs = TestSuite::new_with_chain("fork").generate(4);

        // Two reports for our 4, one for theirs.
        let candidates = vec![ours[3].clone(), theirs[3].clone(), ours[3].clone()];
        assert_eq!(best_head(&candidates).unwrap(), ours[3]);
    }

    #[test]
    fn test_same_height_tie_is_order_independent() {
        let a = TestSuite::new().generate(2).pop().unwrap();
        let b = TestSuite::new_with_chain("fork").generate(2).pop().unwrap();

        let forward = best_head(&[a.clone(), b.clone()]).unwrap();
        let backward = best_head(&[b.clone(), a.clone()]).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward.hash(), a.hash().max(b.hash()));
    }

    proptest! {
        #[test]
        fn prop_order_independent(
            heights in head_reports(6, 12),
            seed in any::<u64>(),
        ) {
            use rand::{seq::SliceRandom, SeedableRng};

            let chain = TestSuite::new().generate(6);
            let mut candidates = reports(&chain, &heights);
            let expected = best_head(&candidates).unwrap();

            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            candidates.shuffle(&mut rng);
            prop_assert_eq!(best_head(&candidates).unwrap(), expected);
        }

        #[test]
        fn prop_result_is_a_candidate(heights in head_reports(6, 12)) {
            let chain = TestSuite::new().generate(6);
            let candidates = reports(&chain, &heights);
            let best = best_head(&candidates).unwrap();
            prop_assert!(candidates.contains(&best));
        }

        #[test]
        fn prop_confirmed_head_is_never_undercut(heights in head_reports(6, 12)) {
            let chain = TestSuite::new().generate(6);
            let best = best_head(&reports(&chain, &heights)).unwrap();

            let confirmed_max = (1..=6u64)
                .filter(|h| heights.iter().filter(|&&x| x == *h).count() >= MIN_HEAD_RESPONSES)
                .max();
            match confirmed_max {
                Some(h) => prop_assert_eq!(best.height(), h),
                None => prop_assert_eq!(best.height(), *heights.iter().max().unwrap()),
            }
        }
    }
}
