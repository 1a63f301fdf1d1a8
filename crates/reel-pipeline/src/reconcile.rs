//! Count reconciliation between text segments and visuals.

use serde::Serialize;
use std::path::PathBuf;

use reel_models::NarrativeUnit;

/// Which rule made the segment count match the visual count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Counts already matched
    Exact,
    /// Segments repeated cyclically (`segments[i % from]`) up to `to`
    DuplicatedCyclically { from: usize, to: usize },
    /// Segments cut to the first `to`
    Truncated { from: usize, to: usize },
}

/// Make `segments` exactly `image_count` long.
///
/// Short lists are repeated mechanically in order, with no regard for
/// narrative coherence; long lists keep their head. An empty segment list
/// stays empty.
pub fn reconcile_counts(segments: &[String], image_count: usize) -> (Vec<String>, ReconcilePolicy) {
    let n_txt = segments.len();

    if n_txt == 0 || n_txt == image_count {
        return (segments.to_vec(), ReconcilePolicy::Exact);
    }

    if n_txt < image_count {
        let aligned = (0..image_count).map(|i| segments[i % n_txt].clone()).collect();
        (
            aligned,
            ReconcilePolicy::DuplicatedCyclically {
                from: n_txt,
                to: image_count,
            },
        )
    } else {
        (
            segments[..image_count].to_vec(),
            ReconcilePolicy::Truncated {
                from: n_txt,
                to: image_count,
            },
        )
    }
}

/// Pair aligned segments with visuals into indexed units.
pub fn align_units(segments: &[String], visuals: &[PathBuf]) -> Vec<NarrativeUnit> {
    segments
        .iter()
        .zip(visuals)
        .enumerate()
        .map(|(i, (text, visual))| NarrativeUnit::new(i, text.clone(), visual.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{}", i)).collect()
    }

    #[test]
    fn test_truncation() {
        let (aligned, policy) = reconcile_counts(&texts(4), 2);
        assert_eq!(aligned, vec!["t0", "t1"]);
        assert_eq!(policy, ReconcilePolicy::Truncated { from: 4, to: 2 });
    }

    #[test]
    fn test_cyclic_duplication() {
        let (aligned, policy) = reconcile_counts(&texts(2), 5);
        assert_eq!(aligned, vec!["t0", "t1", "t0", "t1", "t0"]);
        assert_eq!(policy, ReconcilePolicy::DuplicatedCyclically { from: 2, to: 5 });
    }

    #[test]
    fn test_exact_and_empty() {
        assert_eq!(reconcile_counts(&texts(3), 3).1, ReconcilePolicy::Exact);
        let (aligned, policy) = reconcile_counts(&[], 3);
        assert!(aligned.is_empty());
        assert_eq!(policy, ReconcilePolicy::Exact);
    }

    #[test]
    fn test_aligned_length_equals_image_count() {
        for n_txt in 1..6 {
            for n_img in 1..6 {
                let (aligned, _) = reconcile_counts(&texts(n_txt), n_img);
                assert_eq!(aligned.len(), n_img);
            }
        }
    }

    #[test]
    fn test_align_units_indexes() {
        let visuals = vec![PathBuf::from("a.png"), PathBuf::from("b.png")];
        let units = align_units(&texts(2), &visuals);
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].index, 1);
        assert_eq!(units[1].image_path, PathBuf::from("b.png"));
        assert!(units[0].audio_path.is_none());
    }
}
