//! K-closest selection
//!
//! Picking 10% of a population of 10^5+ must not sort the whole set, so
//! this is a quickselect: partition around the middle element and keep only
//! the side holding the (k-1)-th order statistic.

use serde::{Deserialize, Serialize};

/// A probe slot annotated with its squared distance to the query point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub slot: usize,
    pub dist_sq: f32,
}

/// Reorder `items` so `items[..k]` are the `k` smallest by `dist_sq`, in no
/// particular order. `k == 0` and `k >= len` leave the slice untouched.
pub fn select_k_closest(items: &mut [Candidate], k: usize) {
    let n = items.len();
    if k == 0 || k >= n {
        return;
    }
    let target = (k - 1) as isize;
    let mut lo = 0isize;
    let mut hi = n as isize - 1;

    while lo < hi {
        let pivot = items[(lo + (hi - lo) / 2) as usize].dist_sq;
        let mut i = lo;
        let mut j = hi;
        while i <= j {
            while items[i as usize].dist_sq < pivot {
                i += 1;
            }
            while items[j as usize].dist_sq > pivot {
                j -= 1;
            }
            if i <= j {
                items.swap(i as usize, j as usize);
                i += 1;
                j -= 1;
            }
        }
        // [lo, j] <= pivot, (j, i) == pivot, [i, hi] >= pivot
        if target <= j {
            hi = j;
        } else if target >= i {
            lo = i;
        } else {
            return;
        }
    }
}
