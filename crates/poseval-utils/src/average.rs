/// A running weighted average of scalar observations.
///
/// Keeps the latest value, the weighted running sum, the total weight and the
/// current average. One accumulator is typically created per reporting period
/// (an epoch, or an action bucket) and updated once per batch. Single-writer:
/// no synchronization is provided or needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunningAverage {
    /// The most recently observed value.
    pub val: f64,

    /// Weighted sum of all observations so far.
    pub sum: f64,

    /// Total weight of all observations so far.
    pub count: i64,

    /// Current average, `sum / count`. Zero until the first update.
    pub avg: f64,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `val` with weight `n`.
    ///
    /// A batch-mean error over `n` samples is recorded as `update(mean, n)`,
    /// which is equivalent to `n` per-sample updates of weight 1.
    pub fn update(&mut self, val: f64, n: i64) {
        self.val = val;
        self.sum += val * n as f64;
        self.count += n;
        self.avg = self.sum / self.count as f64;
    }
}
