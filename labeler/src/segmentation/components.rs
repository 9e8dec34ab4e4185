//! Connected-component labeling and hole filling on boolean masks

use std::collections::VecDeque;

use ndarray::{Array2, ArrayView2};

/// Neighbor offsets for 8-connectivity
const NEIGHBORS_8: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Neighbor offsets for 4-connectivity
const NEIGHBORS_4: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];

/// Label 8-connected regions of `true` pixels
///
/// Background is 0; components are numbered `1..=count` in raster order of
/// their first pixel.
pub fn label_components(mask: ArrayView2<'_, bool>) -> (Array2<u32>, usize) {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut count = 0u32;
    let mut queue = VecDeque::new();

    for r in 0..rows {
        for c in 0..cols {
            if !mask[[r, c]] || labels[[r, c]] != 0 {
                continue;
            }

            count += 1;
            labels[[r, c]] = count;
            queue.push_back((r, c));
            while let Some((pr, pc)) = queue.pop_front() {
                for (nr, nc) in neighbors(pr, pc, rows, cols, &NEIGHBORS_8) {
                    if mask[[nr, nc]] && labels[[nr, nc]] == 0 {
                        labels[[nr, nc]] = count;
                        queue.push_back((nr, nc));
                    }
                }
            }
        }
    }

    (labels, count as usize)
}

/// Turn background regions not reachable from the border into foreground
///
/// Background connectivity is 4, so a diagonal gap in the foreground still
/// encloses a hole.
pub fn fill_holes(mask: ArrayView2<'_, bool>) -> Array2<bool> {
    let (rows, cols) = mask.dim();
    let mut outside = Array2::from_elem((rows, cols), false);
    let mut queue = VecDeque::new();

    let border = (0..rows)
        .flat_map(|r| [(r, 0), (r, cols.saturating_sub(1))])
        .chain((0..cols).flat_map(|c| [(0, c), (rows.saturating_sub(1), c)]));
    for (r, c) in border {
        if cols > 0 && rows > 0 && !mask[[r, c]] && !outside[[r, c]] {
            outside[[r, c]] = true;
            queue.push_back((r, c));
        }
    }

    while let Some((r, c)) = queue.pop_front() {
        for (nr, nc) in neighbors(r, c, rows, cols, &NEIGHBORS_4) {
            if !mask[[nr, nc]] && !outside[[nr, nc]] {
                outside[[nr, nc]] = true;
                queue.push_back((nr, nc));
            }
        }
    }

    outside.mapv(|o| !o)
}

fn neighbors<'a>(
    r: usize,
    c: usize,
    rows: usize,
    cols: usize,
    offsets: &'a [(isize, isize)],
) -> impl Iterator<Item = (usize, usize)> + 'a {
    offsets.iter().filter_map(move |&(dr, dc)| {
        let nr = r.checked_add_signed(dr)?;
        let nc = c.checked_add_signed(dc)?;
        (nr < rows && nc < cols).then_some((nr, nc))
    })
}
