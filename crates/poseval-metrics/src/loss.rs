use log::debug;
use poseval_utils::tensor::{norm_last_dim, validate_same_shape};
use tch::{Kind, Tensor};

/// Mean per-joint position error.
///
/// Mean Euclidean distance between corresponding joints, averaged over every
/// remaining axis. Works on `(batch, frames, joints, coords)` sequences as
/// well as flat `(samples, joints, coords)` sets. Differentiable.
pub fn mpjpe(predicted: &Tensor, target: &Tensor) -> Tensor {
    validate_same_shape(predicted, target, "mpjpe");
    norm_last_dim(&(predicted - target)).mean(Kind::Float)
}

/// MPJPE restricted to a subset of joints.
///
/// # Arguments
///
/// * `joints` - Joint indices to keep; every other joint is ignored for both
///              the distance computation and the averaging.
pub fn mpjpe_masked(predicted: &Tensor, target: &Tensor, joints: &[i64]) -> Tensor {
    validate_same_shape(predicted, target, "mpjpe_masked");
    assert_eq!(
        predicted.dim(),
        4,
        "mpjpe_masked expects (batch, frames, joints, coords), got {:?}",
        predicted.size()
    );

    let index = Tensor::from_slice(joints).to_device(predicted.device());
    let predicted = predicted.index_select(2, &index);
    let target = target.index_select(2, &index);
    norm_last_dim(&(predicted - target)).mean(Kind::Float)
}

/// MPJPE blended with a mean absolute per-coordinate error.
///
/// The L2 term penalizes overall position error, the 0.1-weighted L1 term
/// penalizes per-axis bias.
pub fn combined_mpjpe(predicted: &Tensor, target: &Tensor) -> Tensor {
    validate_same_shape(predicted, target, "combined_mpjpe");
    let l2 = norm_last_dim(&(predicted - target)).mean(Kind::Float);
    let l1 = (predicted - target).abs().mean(Kind::Float);
    l2 + l1 * 0.1
}

/// MPJPE with a caller-supplied weight on every per-joint distance.
///
/// `weights` must broadcast against the per-joint distance tensor (the input
/// shape with the coordinate axis dropped); it is applied before averaging to
/// up- or down-weight specific samples, frames or joints.
pub fn weighted_mpjpe(predicted: &Tensor, target: &Tensor, weights: &Tensor) -> Tensor {
    validate_same_shape(predicted, target, "weighted_mpjpe");
    (weights * norm_last_dim(&(predicted - target))).mean(Kind::Float)
}

/// Mean per-joint velocity error.
///
/// Mean Euclidean distance between the first-order temporal differences of
/// the two sequences (frame axis 0). Measures motion consistency rather than
/// static position; a constant offset on either sequence cancels out.
/// Evaluation-only.
pub fn mean_velocity_error(predicted: &Tensor, target: &Tensor) -> f64 {
    validate_same_shape(predicted, target, "mean_velocity_error");
    let frames = predicted.size()[0];
    assert!(
        frames >= 2,
        "mean_velocity_error needs at least two frames, got {}",
        frames
    );

    tch::no_grad(|| {
        let velocity_predicted =
            predicted.narrow(0, 1, frames - 1) - predicted.narrow(0, 0, frames - 1);
        let velocity_target = target.narrow(0, 1, frames - 1) - target.narrow(0, 0, frames - 1);
        norm_last_dim(&(velocity_predicted - velocity_target))
            .mean(Kind::Double)
            .double_value(&[])
    })
}

/// Hinge penalty on depth-ordering disagreements.
///
/// For every ordered joint pair (j, k) within a frame, penalizes the
/// predicted depth margin `z_j - z_k` when it is positive while the ground
/// truth orders them the other way (`z_j < z_k`). Averaged over all pairs,
/// frames and batch samples. Differentiable.
pub fn spatial_rank_loss(predicted: &Tensor, target: &Tensor) -> Tensor {
    validate_same_shape(predicted, target, "spatial_rank_loss");
    assert_eq!(
        *predicted.size().last().unwrap(),
        3,
        "spatial_rank_loss needs 3D joint coordinates"
    );

    let depth = predicted.select(-1, 2);
    let depth_gt = target.select(-1, 2);

    // (.., J, 1) - (.., 1, J) broadcasts to the full (.., J, J) margin grid.
    let margin = depth.unsqueeze(-1) - depth.unsqueeze(-2);
    let misordered = depth_gt
        .unsqueeze(-1)
        .lt_tensor(&depth_gt.unsqueeze(-2))
        .to_kind(Kind::Float);

    (margin.clamp_min(0.0) * misordered).mean(Kind::Float)
}

/// Ranks joints by their mean position error.
///
/// Returns the indices of the `count` worst joints, largest error first.
/// Useful for spotting which parts of the skeleton a model struggles with.
pub fn worst_joints(predicted: &Tensor, target: &Tensor, count: i64) -> Vec<i64> {
    validate_same_shape(predicted, target, "worst_joints");
    assert_eq!(
        predicted.dim(),
        4,
        "worst_joints expects (batch, frames, joints, coords), got {:?}",
        predicted.size()
    );

    let per_joint = norm_last_dim(&(predicted - target)).mean_dim(&[0i64, 1][..], false, Kind::Float);
    debug!("per-joint mpjpe: {:?}", per_joint);

    let order = per_joint.argsort(-1, true).narrow(0, 0, count);
    Vec::<i64>::try_from(&order.to_device(tch::Device::Cpu)).unwrap()
}
