//! Enumeration of the assumed-active factor subsets that the cost strategies
//! average over.

use log::debug;

/// All `f`-element subsets of `0..m` for a design with `m` factors.
///
/// `f` is clamped to `2 ..= max(2, m / 3)` on construction. The clamp is the
/// only thing keeping the subset families small, so it is applied here rather
/// than left to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSubsets {
    m: usize,
    f: usize,
}

impl ActiveSubsets {
    pub fn new(m: usize, f: usize) -> Self {
        let clamped = clamp_active(m, f);
        if clamped != f {
            debug!("active subset size {} clamped to {} for {} factors", f, clamped, m);
        }
        Self { m, f: clamped }
    }

    pub fn factors(&self) -> usize {
        self.m
    }

    pub fn active(&self) -> usize {
        self.f
    }

    /// Number of subsets `subsets(fixed)` returns.
    pub fn count(&self, fixed: Option<usize>) -> usize {
        match fixed {
            None => binomial(self.m, self.f),
            Some(j) if j < self.m => binomial(self.m - 1, self.f - 1),
            Some(_) => 0,
        }
    }

    /// Subsets in lexicographic order. With `fixed`, only the subsets that
    /// contain that factor; an out-of-range index yields no subsets.
    pub fn subsets(&self, fixed: Option<usize>) -> Vec<Vec<usize>> {
        match fixed {
            None => Combinations::new(self.m, self.f).collect(),
            Some(j) if j < self.m => {
                // choose the other f-1 members from 0..m-1 and shift past j
                Combinations::new(self.m - 1, self.f - 1)
                    .map(|rest| {
                        let mut subset: Vec<usize> = rest
                            .into_iter()
                            .map(|i| if i >= j { i + 1 } else { i })
                            .collect();
                        let pos = subset.partition_point(|&i| i < j);
                        subset.insert(pos, j);
                        subset
                    })
                    .collect()
            }
            Some(_) => Vec::new(),
        }
    }
}

/// Clamp an assumed-active subset size into `2 ..= max(2, m / 3)`, never
/// exceeding `m`.
pub fn clamp_active(m: usize, f: usize) -> usize {
    let upper = std::cmp::max(2, m / 3);
    f.clamp(2, upper).min(m)
}

pub fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut c: usize = 1;
    for i in 0..k {
        c = c * (n - i) / (i + 1);
    }
    c
}

/// Lexicographic iterator over the `k`-element subsets of `0..n`.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    current: Vec<usize>,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            current: (0..k).collect(),
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let out = self.current.clone();

        let k = self.current.len();
        // rightmost position that can still be incremented
        let mut i = k;
        while i > 0 && self.current[i - 1] == self.n - k + i - 1 {
            i -= 1;
        }
        if i == 0 {
            self.done = true;
        } else {
            self.current[i - 1] += 1;
            for p in i..k {
                self.current[p] = self.current[p - 1] + 1;
            }
        }
        Some(out)
    }
}
