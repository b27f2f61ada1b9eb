/// Running sum with Kahan compensation.
///
/// Adding many small squared residuals (or many products of Jacobian entries)
/// to a large running total loses the low-order bits of each term. `KahanSum`
/// carries the lost bits in a separate compensation term and feeds them back
/// into the next addition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KahanSum {
    total: f64,
    compensation: f64,
}

impl KahanSum {
    /// An empty sum.
    pub const fn new() -> Self {
        Self {
            total: 0.0,
            compensation: 0.0,
        }
    }

    /// Add one term.
    #[inline]
    pub fn add(&mut self, term: f64) {
        let y = term - self.compensation;
        let t = self.total + y;
        self.compensation = (t - self.total) - y;
        self.total = t;
    }

    /// Current value of the sum.
    #[inline]
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Go back to an empty sum, so the accumulator can be reused.
    #[inline]
    pub fn reset(&mut self) {
        self.total = 0.0;
        self.compensation = 0.0;
    }
}

impl Extend<f64> for KahanSum {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for term in iter {
            self.add(term);
        }
    }
}

impl FromIterator<f64> for KahanSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut sum = Self::new();
        sum.extend(iter);
        sum
    }
}

impl std::iter::Sum<f64> for KahanSum {
    fn sum<I: Iterator<Item = f64>>(iter: I) -> Self {
        iter.collect()
    }
}
