//! Swap-with-last removal for index-tracked collections
//!
//! Grid cells, the active-resource list and the probe collection all remove
//! entries this way. The element that used to be last lands in the freed
//! slot, and whoever holds a back-reference to it gets told about the move.

/// Remove `items[slot]` in O(1) by moving the last element into its place.
///
/// `relink(moved, from, to)` runs only when an element actually moved, with
/// its old and new slot. Returns the removed element.
#[inline]
pub fn swap_remove_relink<T>(
    items: &mut Vec<T>,
    slot: usize,
    mut relink: impl FnMut(&T, usize, usize),
) -> T {
    let last = items.len() - 1;
    let removed = items.swap_remove(slot);
    if slot != last {
        relink(&items[slot], last, slot);
    }
    removed
}
