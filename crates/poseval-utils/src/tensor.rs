use tch::Tensor;

/// Euclidean norm over the last (coordinate) axis.
///
/// For a `(..., coords)` tensor of joint positions this yields the per-joint
/// distance tensor of shape `(...)`. The input dtype is preserved.
pub fn norm_last_dim(tensor: &Tensor) -> Tensor {
    tensor.norm_scalaropt_dim(2.0, &[-1i64][..], false)
}

/// Asserts that two tensors have identical shapes.
///
/// Every error function requires predicted and target tensors of the same
/// shape; a mismatch is a caller bug, so this check stays on in release
/// builds. Nothing is ever broadcast or truncated silently.
pub fn validate_same_shape(predicted: &Tensor, target: &Tensor, name: &str) {
    assert_eq!(
        predicted.size(),
        target.size(),
        "{}: predicted and target must have identical shapes, got {:?} vs {:?}",
        name,
        predicted.size(),
        target.size()
    );
}

#[cfg(debug_assertions)]
pub fn validate_pose_layout(tensor: &Tensor, expected_joints: i64, name: &str) {
    let dims = tensor.size();
    assert!(
        dims.len() >= 2,
        "{} must have at least (joints, coords) dimensions, got {:?}",
        name,
        dims
    );
    assert_eq!(
        dims[dims.len() - 2],
        expected_joints,
        "{} joint axis is {}, expected {}",
        name,
        dims[dims.len() - 2],
        expected_joints
    );
}

#[cfg(not(debug_assertions))]
pub fn validate_pose_layout(_tensor: &Tensor, _expected_joints: i64, _name: &str) {
    // Do nothing
    // For release, we assume the pose layout is always correct
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Kind, Tensor};

    #[test]
    fn test_norm_last_dim() {
        let t = Tensor::from_slice(&[3.0f64, 4.0, 0.0, 0.0, 5.0, 12.0]).reshape(&[2, 3]);
        let n = norm_last_dim(&t);
        assert_eq!(n.size(), &[2]);
        assert!((n.double_value(&[0]) - 5.0).abs() < 1e-12);
        assert!((n.double_value(&[1]) - 13.0).abs() < 1e-12);
        assert_eq!(n.kind(), Kind::Double);
    }

    #[test]
    #[should_panic(expected = "identical shapes")]
    fn test_shape_mismatch_panics() {
        let a = Tensor::zeros(&[2, 17, 3], tch::kind::FLOAT_CPU);
        let b = Tensor::zeros(&[2, 16, 3], tch::kind::FLOAT_CPU);
        validate_same_shape(&a, &b, "test");
    }
}
