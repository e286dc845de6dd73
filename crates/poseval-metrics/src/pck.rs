use crate::MM_PER_METER;
use poseval_utils::tensor::{norm_last_dim, validate_same_shape};
use tch::{Device, Kind, Tensor};

/// Percentage of correct keypoints at a millimetre threshold.
///
/// A joint is correct when its Euclidean error, converted to millimetres,
/// falls strictly below `threshold`. The percentage is taken over every
/// sample and every evaluated joint. Evaluation-only.
///
/// # Arguments
///
/// * `gts` - Ground-truth poses of shape `(samples, joints, coords)`.
/// * `preds` - Predicted poses of the same shape.
/// * `eval_joints` - Joint indices to evaluate; `None` evaluates all joints.
/// * `threshold` - Correctness threshold in millimetres.
pub fn compute_pck(
    gts: &Tensor,
    preds: &Tensor,
    eval_joints: Option<&[i64]>,
    threshold: f64,
) -> f64 {
    validate_same_shape(gts, preds, "compute_pck");
    assert_eq!(
        gts.dim(),
        3,
        "compute_pck expects (samples, joints, coords), got {:?}",
        gts.size()
    );

    tch::no_grad(|| {
        let gts = gts.detach().to_device(Device::Cpu).to_kind(Kind::Double);
        let preds = preds.detach().to_device(Device::Cpu).to_kind(Kind::Double);

        let mut per_joint_error = norm_last_dim(&(&preds - &gts)) * MM_PER_METER;
        if let Some(joints) = eval_joints {
            per_joint_error = per_joint_error.index_select(1, &Tensor::from_slice(joints));
        }

        per_joint_error
            .lt(threshold)
            .to_kind(Kind::Double)
            .mean(Kind::Double)
            .double_value(&[])
            * 100.0
    })
}

/// Area under the PCK curve.
///
/// Mean PCK over 31 evenly spaced thresholds from 0 to 150 mm inclusive.
/// This threshold range mimics `mpii_compute_3d_pck.m`, which is provided as
/// part of the MPI-INF-3DHP test data release.
pub fn compute_auc(gts: &Tensor, preds: &Tensor, eval_joints: Option<&[i64]>) -> f64 {
    let steps = 31;
    let total: f64 = (0..steps)
        .map(|i| {
            let threshold = 150.0 * i as f64 / (steps - 1) as f64;
            compute_pck(gts, preds, eval_joints, threshold)
        })
        .sum();
    total / steps as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Tensor;

    fn noisy_pair() -> (Tensor, Tensor) {
        tch::manual_seed(41);
        let gts = Tensor::rand(&[8, 17, 3], tch::kind::DOUBLE_CPU);
        // Millimetre-scale noise so a range of thresholds is exercised.
        let preds = &gts + Tensor::rand(&[8, 17, 3], tch::kind::DOUBLE_CPU) * 0.2;
        (gts, preds)
    }

    #[test]
    fn test_pck_saturates_at_a_huge_threshold() {
        let (gts, preds) = noisy_pair();
        assert_eq!(compute_pck(&gts, &preds, None, 1e9), 100.0);
    }

    #[test]
    fn test_pck_zero_threshold_counts_nothing() {
        let (gts, preds) = noisy_pair();
        assert_eq!(compute_pck(&gts, &preds, None, 0.0), 0.0);
    }

    #[test]
    fn test_pck_monotonic_in_threshold() {
        let (gts, preds) = noisy_pair();
        let low = compute_pck(&gts, &preds, None, 50.0);
        let high = compute_pck(&gts, &preds, None, 120.0);
        assert!(low <= high);
    }

    #[test]
    fn test_pck_joint_subset() {
        let gts = Tensor::zeros(&[2, 17, 3], tch::kind::DOUBLE_CPU);
        let preds = gts.copy();
        // Push joint 0 far past any threshold; the others stay perfect.
        let mut joint0 = preds.select(1, 0);
        joint0.copy_(&(&joint0 + 10.0));

        assert_eq!(compute_pck(&gts, &preds, Some(&[0]), 150.0), 0.0);
        assert_eq!(compute_pck(&gts, &preds, Some(&[1, 2, 3]), 150.0), 100.0);
    }

    #[test]
    fn test_auc_is_bounded() {
        let (gts, preds) = noisy_pair();
        let auc = compute_auc(&gts, &preds, None);
        assert!((0.0..=100.0).contains(&auc), "auc out of range: {}", auc);
    }

    #[test]
    fn test_auc_of_perfect_prediction() {
        let (gts, _) = noisy_pair();
        // Zero error everywhere: correct at every threshold except 0 (strict
        // comparison), so the sweep averages 30/31 of 100%.
        let auc = compute_auc(&gts, &gts, None);
        assert!((auc - 100.0 * 30.0 / 31.0).abs() < 1e-9);
    }
}
