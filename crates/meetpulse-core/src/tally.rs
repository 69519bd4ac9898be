/// Whole-number percentages for a list of vote counts.
///
/// Each share is floored, then the points still missing from 100 go to the
/// largest remainders (earlier options win ties). The result sums to exactly
/// 100 whenever any vote exists, and to 0 otherwise.
pub fn percentages(votes: &[i64]) -> Vec<i64> {
    let total: i64 = votes.iter().sum();
    if total <= 0 {
        return vec![0; votes.len()];
    }

    let mut pct: Vec<i64> = votes.iter().map(|v| v * 100 / total).collect();
    let missing = 100 - pct.iter().sum::<i64>();

    let mut by_remainder: Vec<(usize, i64)> = votes
        .iter()
        .enumerate()
        .map(|(idx, v)| (idx, v * 100 % total))
        .collect();
    by_remainder.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    for (idx, _) in by_remainder.into_iter().take(missing.max(0) as usize) {
        if let Some(p) = pct.get_mut(idx) {
            *p += 1;
        }
    }
    pct
}
