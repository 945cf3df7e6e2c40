use crate::models::MatchIntent;

/// Find a subset of `weights` summing exactly to `target`.
///
/// Classic boolean dynamic program: `reachable[i][s]` is true when some
/// subset of the first `i` items sums to `s`. The witness is reconstructed
/// by walking `i` from `n` down to `1`, taking item `i - 1` only when the
/// remaining sum is unreachable without it. The walk therefore prefers
/// earlier items, which keeps the outcome reproducible for a given input
/// ordering.
///
/// Returns the chosen indices (descending) or `None` when no subset fits.
pub fn subset_indices(weights: &[u32], target: u32) -> Option<Vec<usize>> {
    let n = weights.len();
    let target = target as usize;

    let mut reachable = vec![vec![false; target + 1]; n + 1];
    for row in reachable.iter_mut() {
        // The empty subset always sums to zero
        row[0] = true;
    }

    for i in 1..=n {
        let w = weights[i - 1] as usize;
        for s in 1..=target {
            reachable[i][s] = reachable[i - 1][s] || (w <= s && reachable[i - 1][s - w]);
        }
    }

    if !reachable[n][target] {
        return None;
    }

    let mut chosen = Vec::new();
    let mut i = n;
    let mut s = target;
    while i > 0 && s > 0 {
        if !reachable[i - 1][s] {
            chosen.push(i - 1);
            s -= weights[i - 1] as usize;
        }
        i -= 1;
    }

    Some(chosen)
}

/// Split the candidate pool into one full team and the leftover intents.
///
/// Pure: the input slice is never mutated, so a failed second-team search
/// leaves no partial state behind. `remaining` preserves the input order.
pub fn team_partition(
    candidates: &[MatchIntent],
    roster_size: u32,
) -> Option<(Vec<MatchIntent>, Vec<MatchIntent>)> {
    let weights: Vec<u32> = candidates.iter().map(|c| c.user_count).collect();
    let chosen = subset_indices(&weights, roster_size)?;

    let team: Vec<MatchIntent> = chosen.iter().map(|&i| candidates[i].clone()).collect();
    let remaining: Vec<MatchIntent> = candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| !chosen.contains(i))
        .map(|(_, c)| c.clone())
        .collect();

    Some((team, remaining))
}
