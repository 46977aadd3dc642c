//! Spectrum shaping: reduce a raw frequency snapshot into the sequence the
//! renderers draw.
//!
//! The circle visualizer runs
//! `average_downsample -> mirror_loop -> mirror_loop -> normalize -> tilt`,
//! the bar visualizer only downsamples.

/// Average `bins` down to roughly `len / divisor` groups.
///
/// The group stride `len / new_len` may be fractional. It is accumulated as
/// a float and truncated to source indices, so when the stride is not an
/// integer the output length can differ from `new_len` by one.
pub fn average_downsample(bins: &[u8], divisor: usize) -> Vec<u8> {
    let len = bins.len();
    if len == 0 || divisor == 0 {
        return Vec::new();
    }
    let new_len = (len as f64 / divisor as f64).round() as usize;
    if new_len == 0 {
        return Vec::new();
    }

    let step = len as f64 / new_len as f64;
    let mut out = Vec::with_capacity(new_len + 1);
    let mut i = 0.0_f64;
    while i < len as f64 {
        let start = i.trunc() as usize;
        let end = ((i + step).trunc() as usize).clamp(start + 1, len);
        let group = &bins[start..end];
        let sum: u32 = group.iter().map(|&v| v as u32).sum();
        out.push((sum / group.len() as u32) as u8);
        i += step;
    }
    out
}

/// Append the reversed sequence so the result starts and ends on the same
/// value.
pub fn mirror_loop<T: Clone>(seq: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(seq.len() * 2);
    out.extend_from_slice(seq);
    out.extend(seq.iter().rev().cloned());
    out
}

/// Rotate the start of the sequence left by `amount - 1` positions.
///
/// `amount == 0` rotates right by one.
pub fn tilt<T: Clone>(seq: &[T], amount: usize) -> Vec<T> {
    let mut out = seq.to_vec();
    if out.is_empty() {
        return out;
    }
    let shift = (amount as i64 - 1).rem_euclid(out.len() as i64) as usize;
    out.rotate_left(shift);
    out
}

/// Scale values relative to the peak.
///
/// Values under `peak / damper` are compressed into `[0, 1)`; everything
/// else is scaled so the peak maps to `amplitude`. An all-zero input yields
/// all zeros.
pub fn normalize_peak_relative(seq: &[u8], amplitude: f64, damper: f64) -> Vec<f64> {
    let peak = seq.iter().copied().max().unwrap_or(0) as f64;
    if peak == 0.0 {
        return vec![0.0; seq.len()];
    }
    let floor = peak / damper;

    seq.iter()
        .map(|&v| {
            let v = v as f64;
            if v < floor {
                (v / floor).min(amplitude)
            } else {
                v / peak * amplitude
            }
        })
        .collect()
}

/// Full circle pipeline: `snapshot[..640]` averaged by 8, mirrored twice,
/// normalized to 100 with damper 5, tilted by 8.
pub fn circle_pipeline(snapshot: &[u8]) -> Vec<f64> {
    let head = &snapshot[..snapshot.len().min(CIRCLE_BINS)];
    let reduced = average_downsample(head, CIRCLE_DIVISOR);
    let looped = mirror_loop(&mirror_loop(&reduced));
    let normalized = normalize_peak_relative(&looped, CIRCLE_AMPLITUDE, CIRCLE_DAMPER);
    tilt(&normalized, CIRCLE_TILT)
}

/// Number of leading bins the circle visualizer reads.
pub const CIRCLE_BINS: usize = 640;
const CIRCLE_DIVISOR: usize = 8;
const CIRCLE_AMPLITUDE: f64 = 100.0;
const CIRCLE_DAMPER: f64 = 5.0;
const CIRCLE_TILT: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn downsample_exact_stride() {
        let bins = [2, 4, 6, 8, 10, 12, 14, 16];
        assert_eq!(average_downsample(&bins, 2), vec![3, 7, 11, 15]);
        assert_eq!(average_downsample(&bins, 4), vec![5, 13]);
    }

    #[test]
    fn downsample_fractional_stride_truncates_indices() {
        // len 10 / divisor 3 -> 3 groups, stride 3.33: [0..3), [3..6), [6..10)
        let bins = [0, 0, 0, 3, 3, 3, 8, 8, 8, 8];
        assert_eq!(average_downsample(&bins, 3), vec![0, 3, 8]);
    }

    #[test]
    fn downsample_degenerate_inputs() {
        assert!(average_downsample(&[], 4).is_empty());
        assert!(average_downsample(&[9], 3).is_empty());
        assert!(average_downsample(&[1, 2], 0).is_empty());
    }

    #[test]
    fn mirror_doubles_into_palindrome() {
        assert_eq!(mirror_loop(&[1, 2, 3]), vec![1, 2, 3, 3, 2, 1]);
        assert!(mirror_loop::<u8>(&[]).is_empty());
    }

    #[test]
    fn tilt_rotates_by_amount_minus_one() {
        let seq = [0, 1, 2, 3, 4, 5];
        assert_eq!(tilt(&seq, 3), vec![2, 3, 4, 5, 0, 1]);
        assert_eq!(tilt(&seq, 1), seq.to_vec());
        assert_eq!(tilt(&seq, 0), vec![5, 0, 1, 2, 3, 4]);
        assert_eq!(tilt(&seq, 7), seq.to_vec());
    }

    #[test]
    fn normalize_branches() {
        // peak 100, floor 20
        let out = normalize_peak_relative(&[10, 20, 50, 100], 150.0, 5.0);
        for (got, want) in out.iter().zip([0.5, 30.0, 75.0, 150.0]) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
    }

    #[test]
    fn normalize_all_zero_is_all_zero() {
        let out = normalize_peak_relative(&[0; 12], 100.0, 5.0);
        assert_eq!(out, vec![0.0; 12]);
    }

    #[test]
    fn circle_pipeline_shape() {
        let snapshot = vec![100u8; 1024];
        let ring = circle_pipeline(&snapshot);
        assert_eq!(ring.len(), 320);
        assert!(ring.iter().all(|&v| (v - 100.0).abs() < 1e-9));
    }

    #[test]
    fn circle_pipeline_silence() {
        let ring = circle_pipeline(&[0u8; 1024]);
        assert_eq!(ring.len(), 320);
        assert!(ring.iter().all(|&v| v == 0.0));
    }

    fn sorted<T: Ord + Clone>(v: &[T]) -> Vec<T> {
        let mut v = v.to_vec();
        v.sort();
        v
    }

    proptest! {
        #[test]
        fn uniform_input_stays_uniform(k in any::<u8>(), len in 1usize..700, d in 1usize..16) {
            let out = average_downsample(&vec![k; len], d);
            prop_assert!(out.iter().all(|&v| v == k));
        }

        #[test]
        fn mirror_is_double_length_palindrome(seq in prop::collection::vec(any::<u8>(), 0..200)) {
            let out = mirror_loop(&seq);
            prop_assert_eq!(out.len(), seq.len() * 2);
            let rev: Vec<u8> = out.iter().rev().copied().collect();
            prop_assert_eq!(out, rev);
        }

        #[test]
        fn tilt_preserves_multiset(seq in prop::collection::vec(any::<u8>(), 0..200), amount in 0usize..400) {
            let out = tilt(&seq, amount);
            prop_assert_eq!(sorted(&out), sorted(&seq));
        }

        #[test]
        fn normalize_never_exceeds_amplitude(
            seq in prop::collection::vec(any::<u8>(), 1..200),
            amplitude in 0.01f64..500.0,
            damper in 1.0f64..20.0,
        ) {
            let out = normalize_peak_relative(&seq, amplitude, damper);
            prop_assert_eq!(out.len(), seq.len());
            for v in out {
                prop_assert!(v.is_finite());
                prop_assert!(v <= amplitude + 1e-9);
            }
        }
    }
}
