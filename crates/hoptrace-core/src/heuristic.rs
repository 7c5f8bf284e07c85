use std::collections::HashMap;

use crate::types::ResolvedTransaction;

/// Minimum number of times a receiving address must appear, exclusive.
pub const DEFAULT_THRESHOLD: usize = 1;

/// The first receiving address, in order of first appearance, that occurs
/// more than `threshold` times across `records`.
///
/// This is a "first to qualify" rule, not an arg-max: with `[A, B, B, A, A]`
/// and a threshold of 1 the answer is `A`, although `B` crosses the
/// threshold earlier in the sequence.
pub fn find_dominant(records: &[ResolvedTransaction], threshold: usize) -> Option<&str> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for record in records {
        let count = counts.entry(record.receiving_wallet.as_str()).or_insert(0);
        if *count == 0 {
            first_seen.push(record.receiving_wallet.as_str());
        }
        *count += 1;
    }

    first_seen
        .into_iter()
        .find(|address| counts.get(address).is_some_and(|&count| count > threshold))
}
