use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Keeps the `k` greatest items pushed into it.
///
/// A min-heap of capacity `k`: the root is the weakest kept item and is
/// evicted when something better arrives. The ordering of `T` decides what
/// "better" means; for `SearchResult` that is score descending, then doc id
/// ascending.
#[derive(Debug)]
pub struct TopK<T: Ord> {
    k: usize,
    heap: BinaryHeap<Reverse<T>>,
}

impl<T: Ord> TopK<T> {
    pub fn new(k: usize) -> Self {
        Self { k, heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1 << 16)) }
    }

    pub fn push(&mut self, item: T) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(Reverse(item));
        } else if let Some(mut weakest) = self.heap.peek_mut() {
            if item > weakest.0 {
                weakest.0 = item;
            }
        }
    }

    /// Kept items, greatest first.
    pub fn into_sorted_vec(self) -> Vec<T> {
        // Ascending over Reverse<T> is descending over T.
        self.heap.into_sorted_vec().into_iter().map(|Reverse(item)| item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_the_largest() {
        let mut top = TopK::new(3);
        for x in [5, 1, 9, 3, 7, 2] {
            top.push(x);
        }
        assert_eq!(top.into_sorted_vec(), vec![9, 7, 5]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut top = TopK::new(0);
        top.push(1);
        assert!(top.into_sorted_vec().is_empty());
    }

    #[test]
    fn fewer_items_than_k() {
        let mut top = TopK::new(10);
        top.push(2);
        top.push(4);
        assert_eq!(top.into_sorted_vec(), vec![4, 2]);
    }
}
