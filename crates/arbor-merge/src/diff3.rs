//! Line-based three-way merge.
//!
//! Both sides are diffed against the base. Change hunks from the two sides
//! are grouped into regions: a region holding changes from only one side
//! takes that side, a region where both sides made the same change takes it
//! once, and anything else is a conflict written out with `<<<<<<<` /
//! `=======` / `>>>>>>>` markers.
//!
//! Hunks that merely touch (one ends on the line where the other starts) do
//! not conflict. Two hunks starting at the same base line always do.
//!
//! The line alignment comes from a greedy forward Myers search, which picks
//! the same alignment `git merge-file` does on ambiguous input. Past
//! [`MAX_EDIT_DISTANCE`] edits the search gives up and `similar`'s
//! linear-space Myers takes over.

use similar::{capture_diff_slices, Algorithm, DiffTag};

/// Edit distance beyond which the greedy search hands over to `similar`.
/// Its trace grows with the square of the distance.
pub const MAX_EDIT_DISTANCE: usize = 1024;

/// Result of [`merge_lines`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineMergeOutput {
    /// Merged bytes, with conflict markers if `conflicts > 0`.
    pub merged: Vec<u8>,
    /// Number of conflicting regions.
    pub conflicts: usize,
}

impl LineMergeOutput {
    pub fn is_clean(&self) -> bool {
        self.conflicts == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Hunk {
    base_start: usize,
    base_end: usize,
    side_start: usize,
    side_end: usize,
}

impl Hunk {
    fn delta(&self) -> isize {
        (self.side_end - self.side_start) as isize - (self.base_end - self.base_start) as isize
    }
}

fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    data.split_inclusive(|&b| b == b'\n').collect()
}

/// Furthest-reaching x on diagonal `k` after step `d`, from a snapshot of
/// diagonals `-d..=d`.
fn reached(snapshot: &[isize], d: isize, k: isize) -> isize {
    snapshot[(k + d) as usize]
}

/// Whether the path into diagonal `k` at step `d` comes down from `k + 1`
/// (an insertion) rather than across from `k - 1` (a deletion).
fn comes_from_insert(prev: &[isize], d: isize, k: isize) -> bool {
    k == -d || (k != d && reached(prev, d - 1, k - 1) < reached(prev, d - 1, k + 1))
}

/// Matched `(a, b)` index pairs of a shortest edit script, or `None` when
/// more than `limit` edits are needed.
fn greedy_myers(a: &[&[u8]], b: &[&[u8]], limit: usize) -> Option<Vec<(usize, usize)>> {
    let (n, m) = (a.len() as isize, b.len() as isize);
    let offset = n + m + 1;
    let mut v = vec![0isize; (2 * offset + 1) as usize];
    let at = |k: isize| (offset + k) as usize;
    let mut trace: Vec<Vec<isize>> = Vec::new();

    'search: for d in 0..=(n + m) {
        if d as usize > limit {
            return None;
        }
        for k in (-d..=d).step_by(2) {
            let mut x = if k == -d || (k != d && v[at(k - 1)] < v[at(k + 1)]) {
                v[at(k + 1)]
            } else {
                v[at(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y >= 0 && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[at(k)] = x;
            if x >= n && y >= m {
                trace.push(v[at(-d)..=at(d)].to_vec());
                break 'search;
            }
        }
        trace.push(v[at(-d)..=at(d)].to_vec());
    }

    let mut pairs = Vec::new();
    let (mut x, mut y) = (n, m);
    for d in (1..trace.len() as isize).rev() {
        let prev = &trace[(d - 1) as usize];
        let k = x - y;
        let prev_k = if comes_from_insert(prev, d, k) { k + 1 } else { k - 1 };
        let prev_x = reached(prev, d - 1, prev_k);
        let prev_y = prev_x - prev_k;
        let (snake_x, snake_y) = if prev_k == k + 1 {
            (prev_x, prev_y + 1)
        } else {
            (prev_x + 1, prev_y)
        };
        while x > snake_x && y > snake_y {
            x -= 1;
            y -= 1;
            pairs.push((x as usize, y as usize));
        }
        (x, y) = (prev_x, prev_y);
    }
    while x > 0 && y > 0 {
        x -= 1;
        y -= 1;
        pairs.push((x as usize, y as usize));
    }
    pairs.reverse();
    Some(pairs)
}

fn similar_pairs(a: &[&[u8]], b: &[&[u8]]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, a, b) {
        let (tag, old, new) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            pairs.extend(old.zip(new));
        }
    }
    pairs
}

/// Lines of `base` matched to lines of `side`, strictly increasing on both
/// sides and pointing at equal lines.
fn matches(base: &[&[u8]], side: &[&[u8]]) -> Vec<(usize, usize)> {
    let prefix = base.iter().zip(side).take_while(|(a, b)| a == b).count();
    let suffix = base[prefix..]
        .iter()
        .rev()
        .zip(side[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let base_mid = &base[prefix..base.len() - suffix];
    let side_mid = &side[prefix..side.len() - suffix];

    let mut middle = match greedy_myers(base_mid, side_mid, MAX_EDIT_DISTANCE) {
        Some(pairs) => pairs,
        None => similar_pairs(base_mid, side_mid),
    };
    middle.sort_unstable();

    let head = (0..prefix).map(|i| (i, i));
    let body = middle.into_iter().map(|(i, j)| (i + prefix, j + prefix));
    let tail = (0..suffix).map(|t| (base.len() - suffix + t, side.len() - suffix + t));

    let mut out: Vec<(usize, usize)> = Vec::with_capacity(base.len().min(side.len()));
    for (i, j) in head.chain(body).chain(tail) {
        let ordered = out.last().map_or(true, |&(pi, pj)| i > pi && j > pj);
        if ordered && base.get(i).is_some_and(|line| side.get(j) == Some(line)) {
            out.push((i, j));
        }
    }
    out
}

/// The unmatched stretches between consecutive matches.
fn hunks(base: &[&[u8]], side: &[&[u8]]) -> Vec<Hunk> {
    let mut out = Vec::new();
    let (mut b, mut s) = (0, 0);
    let end = (base.len(), side.len());
    for (i, j) in matches(base, side).into_iter().chain(std::iter::once(end)) {
        if i > b || j > s {
            out.push(Hunk {
                base_start: b,
                base_end: i,
                side_start: s,
                side_end: j,
            });
        }
        (b, s) = (i + 1, j + 1);
    }
    out
}

/// One side's pending hunks plus its running line offset against the base.
struct Side<'a> {
    lines: Vec<&'a [u8]>,
    hunks: Vec<Hunk>,
    next: usize,
    offset: isize,
}

impl<'a> Side<'a> {
    fn new(base: &[&[u8]], data: &'a [u8]) -> Self {
        let lines = split_lines(data);
        let hunks = hunks(base, &lines);
        Self {
            lines,
            hunks,
            next: 0,
            offset: 0,
        }
    }

    fn peek(&self) -> Option<&Hunk> {
        self.hunks.get(self.next)
    }

    /// Take the next hunk if it belongs to the region `[start, end)`.
    fn absorb(&mut self, start: usize, end: &mut usize) -> bool {
        match self.peek() {
            Some(h) if h.base_start < *end || h.base_start == start => {
                *end = (*end).max(h.base_end);
                self.next += 1;
                true
            }
            _ => false,
        }
    }

    /// This side's lines for the base region `[start, end)`, given that hunks
    /// `from..self.next` fell inside it. Advances the running offset.
    fn region(&mut self, from: usize, start: usize, end: usize) -> &[&'a [u8]] {
        let inside: isize = self.hunks[from..self.next].iter().map(Hunk::delta).sum();
        let side_start = (start as isize + self.offset) as usize;
        let side_end = (end as isize + self.offset + inside) as usize;
        self.offset += inside;
        &self.lines[side_start..side_end]
    }
}

fn push_lines(out: &mut Vec<u8>, lines: &[&[u8]]) {
    for line in lines {
        out.extend_from_slice(line);
    }
}

fn push_conflict_side(out: &mut Vec<u8>, lines: &[&[u8]]) {
    push_lines(out, lines);
    if out.last().is_some_and(|&b| b != b'\n') {
        out.push(b'\n');
    }
}

/// Three-way merge of `current` and `other` against `base`, line by line.
///
/// `current_label` and `other_label` are written after the opening and
/// closing conflict markers.
pub fn merge_lines(
    base: &[u8],
    current: &[u8],
    other: &[u8],
    current_label: &str,
    other_label: &str,
) -> LineMergeOutput {
    let base_lines = split_lines(base);
    let mut cur = Side::new(&base_lines, current);
    let mut oth = Side::new(&base_lines, other);

    let mut merged = Vec::with_capacity(base.len().max(current.len()).max(other.len()));
    let mut conflicts = 0;
    let mut pos = 0;

    loop {
        let (cur_from, oth_from) = (cur.next, oth.next);
        let start = match (cur.peek(), oth.peek()) {
            (None, None) => break,
            (Some(c), None) => c.base_start,
            (None, Some(o)) => o.base_start,
            (Some(c), Some(o)) => c.base_start.min(o.base_start),
        };

        let mut end = start;
        loop {
            let grew_cur = cur.absorb(start, &mut end);
            let grew_oth = oth.absorb(start, &mut end);
            if !grew_cur && !grew_oth {
                break;
            }
        }

        push_lines(&mut merged, &base_lines[pos..start]);
        pos = end;

        let cur_changed = cur.next > cur_from;
        let oth_changed = oth.next > oth_from;
        let cur_lines = cur.region(cur_from, start, end).to_vec();
        let oth_lines = oth.region(oth_from, start, end).to_vec();

        if !oth_changed || cur_lines == oth_lines {
            push_lines(&mut merged, &cur_lines);
        } else if !cur_changed {
            push_lines(&mut merged, &oth_lines);
        } else {
            conflicts += 1;
            merged.extend_from_slice(format!("<<<<<<< {current_label}\n").as_bytes());
            push_conflict_side(&mut merged, &cur_lines);
            merged.extend_from_slice(b"=======\n");
            push_conflict_side(&mut merged, &oth_lines);
            merged.extend_from_slice(format!(">>>>>>> {other_label}\n").as_bytes());
        }
    }
    push_lines(&mut merged, &base_lines[pos..]);

    LineMergeOutput { merged, conflicts }
}
