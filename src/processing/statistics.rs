/// Summary of one data segment's samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl SegmentStats {
    /// Compute min/max/mean over the finite samples. `None` when there are none.
    pub fn compute(samples: &[f32]) -> Option<Self> {
        let mut count = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0f64;

        for &s in samples {
            if !s.is_finite() {
                continue;
            }
            let v = s as f64;
            count += 1;
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }

        if count == 0 {
            return None;
        }

        Some(SegmentStats {
            count,
            min,
            max,
            mean: sum / count as f64,
        })
    }
}
