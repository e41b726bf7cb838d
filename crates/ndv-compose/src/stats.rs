//! Per-channel statistics of fetched regions.
//!
//! These feed the contrast controls of the presentation layer. They describe
//! the raw samples (before contrast and LUT), over exactly the region the
//! composite was built from.

use rayon::prelude::*;

use ndv_io::RawRegion;

// ============================================================================
// Histogram
// ============================================================================

/// Number of bins in every channel histogram.
pub const HISTOGRAM_BINS: usize = 256;

/// Fixed-width histogram over `[0, 2^bit_depth)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    /// Bin counts.
    pub bins: Vec<u64>,
    /// Samples per bin.
    pub bin_width: u32,
}

impl Histogram {
    /// Empty histogram for samples of `bit_depth` bits.
    pub fn new(bit_depth: u8) -> Self {
        let range = 1u32 << bit_depth.clamp(1, 16);
        Self {
            bins: vec![0; HISTOGRAM_BINS],
            bin_width: (range / HISTOGRAM_BINS as u32).max(1),
        }
    }

    /// Gets the bin index for a value.
    #[inline]
    pub fn bin_for_value(&self, value: u16) -> usize {
        (u32::from(value) / self.bin_width).min(HISTOGRAM_BINS as u32 - 1) as usize
    }

    /// Adds a value to the histogram.
    #[inline]
    pub fn add(&mut self, value: u16) {
        let bin = self.bin_for_value(value);
        self.bins[bin] += 1;
    }

    /// Returns the total count of samples.
    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }

    /// Returns normalized histogram (probabilities).
    pub fn normalized(&self) -> Vec<f64> {
        let total = self.total() as f64;
        if total > 0.0 {
            self.bins.iter().map(|&c| c as f64 / total).collect()
        } else {
            vec![0.0; HISTOGRAM_BINS]
        }
    }

    fn merge(mut self, other: &Histogram) -> Self {
        for (a, b) in self.bins.iter_mut().zip(&other.bins) {
            *a += b;
        }
        self
    }
}

// ============================================================================
// Channel statistics
// ============================================================================

/// Raw-sample statistics of one composited channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStats {
    /// Channel name
    pub channel: String,
    /// Smallest sample (0 when no data)
    pub min: u16,
    /// Largest sample (0 when no data)
    pub max: u16,
    /// Mean sample value
    pub mean: f64,
    /// 256-bin histogram
    pub histogram: Histogram,
    /// `false` when the source had nothing for this channel
    pub has_data: bool,
}

impl ChannelStats {
    /// Statistics for a channel the source could not supply.
    pub fn empty(channel: &str, bit_depth: u8) -> Self {
        Self {
            channel: channel.to_owned(),
            min: 0,
            max: 0,
            mean: 0.0,
            histogram: Histogram::new(bit_depth),
            has_data: false,
        }
    }

    /// Scans a region in parallel, one row per task.
    pub fn compute(channel: &str, region: &RawRegion, bit_depth: u8) -> Self {
        let width = region.rect.width as usize;
        if region.pixel_count() == 0 || width == 0 {
            return Self::empty(channel, bit_depth);
        }
        let rows = region.pixel_count() / width;

        let identity = || Partial {
            min: u16::MAX,
            max: 0,
            sum: 0,
            histogram: Histogram::new(bit_depth),
        };
        let total = (0..rows)
            .into_par_iter()
            .fold(identity, |mut acc, y| {
                for i in y * width..(y + 1) * width {
                    let v = region.samples.get(i);
                    acc.min = acc.min.min(v);
                    acc.max = acc.max.max(v);
                    acc.sum += u64::from(v);
                    acc.histogram.add(v);
                }
                acc
            })
            .reduce(identity, |a, b| Partial {
                min: a.min.min(b.min),
                max: a.max.max(b.max),
                sum: a.sum + b.sum,
                histogram: a.histogram.merge(&b.histogram),
            });

        Self {
            channel: channel.to_owned(),
            min: total.min,
            max: total.max,
            mean: total.sum as f64 / region.pixel_count() as f64,
            histogram: total.histogram,
            has_data: true,
        }
    }
}

struct Partial {
    min: u16,
    max: u16,
    sum: u64,
    histogram: Histogram,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndv_core::Rect;
    use ndv_io::Samples;

    #[test]
    fn bins_scale_with_bit_depth() {
        let h8 = Histogram::new(8);
        assert_eq!(h8.bin_width, 1);
        assert_eq!(h8.bin_for_value(200), 200);

        let h12 = Histogram::new(12);
        assert_eq!(h12.bin_width, 16);
        assert_eq!(h12.bin_for_value(4095), 255);
        assert_eq!(h12.bin_for_value(15), 0);
        // Values above the nominal range land in the last bin.
        assert_eq!(h12.bin_for_value(60000), 255);
    }

    #[test]
    fn normalized_sums_to_one() {
        let mut h = Histogram::new(8);
        for v in [0u16, 0, 10, 255] {
            h.add(v);
        }
        assert_eq!(h.total(), 4);
        assert_relative_eq!(h.normalized().iter().sum::<f64>(), 1.0);
        assert_relative_eq!(h.normalized()[0], 0.5);
        assert!(Histogram::new(8).normalized().iter().all(|p| *p == 0.0));
    }

    #[test]
    fn region_stats() {
        let region = RawRegion::new(
            Rect::new(0, 0, 3, 2),
            Samples::U16(vec![100, 200, 300, 400, 500, 4095]),
        )
        .unwrap();
        let stats = ChannelStats::compute("c", &region, 12);
        assert_eq!(stats.min, 100);
        assert_eq!(stats.max, 4095);
        assert_relative_eq!(stats.mean, 5595.0 / 6.0);
        assert_eq!(stats.histogram.total(), 6);
        assert_eq!(stats.histogram.bins[255], 1);
        assert!(stats.has_data);
    }

    #[test]
    fn empty_stats() {
        let stats = ChannelStats::empty("gone", 16);
        assert!(!stats.has_data);
        assert_eq!(stats.histogram.total(), 0);
        assert_eq!(stats.histogram.bin_width, 256);
    }
}
