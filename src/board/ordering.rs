//! Position bookkeeping shared by the server's write paths and the client's
//! drag-end handling.
//!
//! Lists are ordered by rank; after any mutation a list is renumbered so its
//! positions are exactly `0..n-1` in list order. Out-of-range target indexes
//! are clamped to the list bounds.

/// Anything with a zero-based rank inside its parent container.
pub trait Ranked {
    fn position(&self) -> i64;
    fn set_position(&mut self, position: i64);
}

/// Stable sort by current position.
pub fn sort_by_rank<T: Ranked>(items: &mut [T]) {
    items.sort_by_key(|item| item.position());
}

pub fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len)
}

/// Converts a (non-negative) wire position to a list index.
pub fn index_of(position: i64) -> usize {
    usize::try_from(position).unwrap_or(0)
}

/// Moves the item at `from` to `to` within one list.
///
/// Returns the index the item landed at, or `None` when `from` is out of range.
pub fn reorder<T>(items: &mut Vec<T>, from: usize, to: usize) -> Option<usize> {
    if from >= items.len() {
        return None;
    }
    let item = items.remove(from);
    let to = clamp_index(to, items.len());
    items.insert(to, item);
    Some(to)
}

/// Moves the item at `from` in `source` into `dest` at `to`.
///
/// Returns the index the item landed at, or `None` when `from` is out of range.
pub fn transfer<T>(source: &mut Vec<T>, from: usize, dest: &mut Vec<T>, to: usize) -> Option<usize> {
    if from >= source.len() {
        return None;
    }
    let item = source.remove(from);
    let to = clamp_index(to, dest.len());
    dest.insert(to, item);
    Some(to)
}

/// Inserts `item` at `to` (clamped).
pub fn insert_at<T>(items: &mut Vec<T>, to: usize, item: T) -> usize {
    let to = clamp_index(to, items.len());
    items.insert(to, item);
    to
}

/// Assigns every item its list index as position.
///
/// Returns the indexes whose position actually changed.
pub fn renumber<T: Ranked>(items: &mut [T]) -> Vec<usize> {
    let mut changed = Vec::new();
    for (index, item) in items.iter_mut().enumerate() {
        let position = index as i64;
        if item.position() != position {
            item.set_position(position);
            changed.push(index);
        }
    }
    changed
}

/// True when positions read exactly `0..n-1` in list order.
pub fn is_dense<T: Ranked>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.position() == index as i64)
}
