//! # Root for utility functions in `haplothreader`
//!
//! Combinatorial helpers shared by the tuple enumerator and the threading
//! DP. These operate on plain id slices so they stay independent of the
//! coverage and consensus tensors.

/// Enumerate all multisets of size `k` drawn from `items` (combinations
/// with replacement), in lexicographic order. `items` must be sorted for
/// the output order to be meaningful.
///
/// # Examples
///
/// ```
/// let combs = haplothreader::utils::multiset_combinations(&[1, 2], 2);
/// assert_eq!(combs, vec![vec![1, 1], vec![1, 2], vec![2, 2]]);
/// ```
pub fn multiset_combinations(items: &[usize], k: usize) -> Vec<Vec<usize>> {
    if items.is_empty() || k == 0 {
        return Vec::new();
    }
    let n = items.len();
    let mut indices = vec![0usize; k];
    let mut result = Vec::new();
    loop {
        result.push(indices.iter().map(|&i| items[i]).collect());
        // advance the rightmost index that can still grow, reset the tail
        let Some(slot) = (0..k).rev().find(|&slot| indices[slot] < n - 1) else {
            break;
        };
        let next = indices[slot] + 1;
        for index in indices.iter_mut().skip(slot) {
            *index = next;
        }
    }
    result
}

/// Advance `items` to its next lexicographic permutation in place.
/// Returns false when `items` already is the last permutation.
pub fn next_permutation(items: &mut [usize]) -> bool {
    let n = items.len();
    if n < 2 {
        return false;
    }
    let Some(pivot) = (0..n - 1).rev().find(|&i| items[i] < items[i + 1]) else {
        return false;
    };
    // swap with the rightmost element greater than the pivot
    let successor = (pivot + 1..n).rev().find(|&j| items[j] > items[pivot]);
    items.swap(pivot, successor.unwrap());
    items[pivot + 1..].reverse();
    true
}

/// All distinct orderings of a multiset, in lexicographic order. Repeated
/// elements produce each ordering exactly once.
///
/// # Examples
///
/// ```
/// let perms = haplothreader::utils::distinct_permutations(&[0, 0, 1]);
/// assert_eq!(perms, vec![vec![0, 0, 1], vec![0, 1, 0], vec![1, 0, 0]]);
/// ```
pub fn distinct_permutations(multiset: &[usize]) -> Vec<Vec<usize>> {
    let mut current = multiset.to_vec();
    current.sort_unstable();
    let mut result = vec![current.clone()];
    while next_permutation(&mut current) {
        result.push(current.clone());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combinations_with_replacement_counts() {
        // C(n + k - 1, k) for n = 3, k = 2 is 6
        assert_eq!(multiset_combinations(&[0, 1, 2], 2).len(), 6);
        // and for n = 8, k = 4 it is 330
        let ids: Vec<usize> = (0..8).collect();
        assert_eq!(multiset_combinations(&ids, 4).len(), 330);
    }

    #[test]
    fn combinations_are_lexicographic() {
        let combs = multiset_combinations(&[0, 2, 5], 2);
        assert_eq!(
            combs,
            vec![
                vec![0, 0],
                vec![0, 2],
                vec![0, 5],
                vec![2, 2],
                vec![2, 5],
                vec![5, 5]
            ]
        );
    }

    #[test]
    fn permutations_of_distinct_elements() {
        assert_eq!(distinct_permutations(&[2, 1]).len(), 2);
        assert_eq!(distinct_permutations(&[0, 1, 2]).len(), 6);
    }

    #[test]
    fn permutations_dedup_repeats() {
        assert_eq!(distinct_permutations(&[4, 4, 4]), vec![vec![4, 4, 4]]);
        assert_eq!(distinct_permutations(&[1, 0, 1]).len(), 3);
    }
}
