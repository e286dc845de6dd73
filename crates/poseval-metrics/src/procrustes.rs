use poseval_utils::tensor::{norm_last_dim, validate_same_shape};
use tch::{Device, Kind, Tensor};

/// Pose error after rigid alignment (scale, rotation and translation), often
/// referred to as "Protocol #2".
///
/// The optimal similarity transform from prediction to target is solved in
/// closed form per sample (orthogonal Procrustes via SVD), then the mean
/// per-joint distance of the aligned prediction is returned. The result is
/// invariant to any global proper rotation, translation or positive uniform
/// scale applied to the prediction.
///
/// Evaluation-only: inputs are detached and moved to dense f64 CPU tensors,
/// never touching the training gradient path.
///
/// # Arguments
///
/// * `predicted` - Tensor of shape `(samples, joints, coords)`.
/// * `target` - Tensor of the same shape.
pub fn p_mpjpe(predicted: &Tensor, target: &Tensor) -> f64 {
    p_mpjpe_per_sample(predicted, target)
        .mean(Kind::Double)
        .double_value(&[])
}

/// Per-sample rigid-alignment pose error.
///
/// Same computation as [`p_mpjpe`] but without the final reduction over the
/// sample axis; returns a `(samples,)` f64 CPU tensor. The per-action
/// aggregator uses this to attribute errors sample by sample in mixed
/// batches.
pub fn p_mpjpe_per_sample(predicted: &Tensor, target: &Tensor) -> Tensor {
    validate_same_shape(predicted, target, "p_mpjpe");
    assert_eq!(
        predicted.dim(),
        3,
        "p_mpjpe expects (samples, joints, coords), got {:?}",
        predicted.size()
    );

    tch::no_grad(|| {
        let predicted = predicted.detach().to_device(Device::Cpu).to_kind(Kind::Double);
        let target = target.detach().to_device(Device::Cpu).to_kind(Kind::Double);
        let coords = *predicted.size().last().unwrap();

        let mu_x = target.mean_dim(&[1i64][..], true, Kind::Double);
        let mu_y = predicted.mean_dim(&[1i64][..], true, Kind::Double);

        let x0 = &target - &mu_x;
        let y0 = &predicted - &mu_y;

        let norm_x = x0
            .square()
            .sum_dim_intlist(&[1i64, 2][..], true, Kind::Double)
            .sqrt();
        let norm_y = y0
            .square()
            .sum_dim_intlist(&[1i64, 2][..], true, Kind::Double)
            .sqrt();
        let x0 = &x0 / &norm_x;
        let y0 = &y0 / &norm_y;

        let h = x0.transpose(1, 2).matmul(&y0);
        let (u, s, v) = h.svd(true, true);
        let r = v.matmul(&u.transpose(1, 2));

        // An unconstrained solution may come out as a reflection
        // (det(R) = -1). Flip the sign of the last column of V and of the
        // last singular value wherever that happens, which yields the
        // optimal proper rotation instead.
        let det_sign = r.det().sign();
        let flip = Tensor::ones_like(&s);
        let mut last_column = flip.select(1, coords - 1);
        last_column.copy_(&det_sign);
        let v = &v * flip.unsqueeze(1);
        let s = &s * &flip;
        let r = v.matmul(&u.transpose(1, 2));

        let trace = s.sum_dim_intlist(&[1i64][..], true, Kind::Double).unsqueeze(2);
        let scale = &trace * &norm_x / &norm_y;
        let translation = &mu_x - &scale * &mu_y.matmul(&r);

        // The full similarity transform is applied to the raw, uncentered
        // prediction.
        let aligned = &scale * &predicted.matmul(&r) + &translation;

        norm_last_dim(&(aligned - &target)).mean_dim(&[1i64][..], false, Kind::Double)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::mpjpe;
    use tch::Tensor;

    fn rotation_z(angle: f64) -> Tensor {
        let (sin, cos) = angle.sin_cos();
        Tensor::from_slice(&[cos, sin, 0.0, -sin, cos, 0.0, 0.0, 0.0, 1.0]).reshape(&[3, 3])
    }

    fn random_pair() -> (Tensor, Tensor) {
        tch::manual_seed(31);
        let predicted = Tensor::rand(&[4, 17, 3], tch::kind::DOUBLE_CPU);
        let target = Tensor::rand(&[4, 17, 3], tch::kind::DOUBLE_CPU);
        (predicted, target)
    }

    #[test]
    fn test_identical_inputs_align_to_zero() {
        let (predicted, _) = random_pair();
        assert!(p_mpjpe(&predicted, &predicted) < 1e-9);
    }

    #[test]
    fn test_alignment_recovers_similarity_transforms() {
        let (_, target) = random_pair();
        let rotation = rotation_z(0.4);
        let translation = Tensor::from_slice(&[0.3, -1.2, 2.5]);

        // A prediction that differs from the target only by a similarity
        // transform must align back exactly.
        let predicted = target.matmul(&rotation) * 1.7 + &translation;
        assert!(p_mpjpe(&predicted, &target) < 1e-9);
    }

    #[test]
    fn test_error_invariant_to_prediction_transforms() {
        let (predicted, target) = random_pair();
        let base = p_mpjpe(&predicted, &target);

        let rotation = rotation_z(-1.1);
        let translation = Tensor::from_slice(&[5.0, 0.25, -3.0]);
        let transformed = predicted.matmul(&rotation) * 0.6 + &translation;

        let after = p_mpjpe(&transformed, &target);
        assert!(
            (base - after).abs() < 1e-9,
            "alignment must cancel the transform: {} vs {}",
            base,
            after
        );
    }

    #[test]
    fn test_alignment_never_exceeds_plain_error_on_transformed_copy() {
        let (_, target) = random_pair();
        let predicted = target.matmul(&rotation_z(0.9)) * 1.3 + 0.8;

        let plain = f64::try_from(&mpjpe(&predicted, &target)).unwrap();
        let aligned = p_mpjpe(&predicted, &target);
        assert!(aligned <= plain + 1e-9);
        assert!(plain > 0.1, "the transform must actually move the pose");
    }

    #[test]
    fn test_reflection_is_corrected_not_exploited() {
        // Mirroring a chiral point cloud cannot be undone by any proper
        // rotation, so the aligned error must stay clearly nonzero even
        // though an unconstrained (improper) solution would reach zero.
        let (_, target) = random_pair();
        let mirror = Tensor::from_slice(&[-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
            .reshape(&[3, 3]);
        let predicted = target.matmul(&mirror);

        let err = p_mpjpe(&predicted, &target);
        assert!(err > 1e-4, "mirror image must not align to zero: {}", err);
    }

    #[test]
    fn test_per_sample_errors_average_to_the_batch_error() {
        let (predicted, target) = random_pair();
        let per_sample = p_mpjpe_per_sample(&predicted, &target);
        assert_eq!(per_sample.size(), &[4]);

        let mean = per_sample.mean(Kind::Double).double_value(&[]);
        assert!((mean - p_mpjpe(&predicted, &target)).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "identical shapes")]
    fn test_shape_mismatch_is_fatal() {
        let a = Tensor::zeros(&[2, 17, 3], tch::kind::DOUBLE_CPU);
        let b = Tensor::zeros(&[2, 16, 3], tch::kind::DOUBLE_CPU);
        let _ = p_mpjpe(&a, &b);
    }
}
