use poseval_utils::tensor::{norm_last_dim, validate_pose_layout, validate_same_shape};
use tch::{Kind, Reduction, Tensor};

/// The number of joints in the Human3.6M skeleton.
pub static NUM_JOINTS: i64 = 17;

/// The number of bones connecting those joints.
pub static NUM_BONES: i64 = 16;

/// The number of tracked angles between bone pairs.
pub static NUM_ANGLES: i64 = 18;

// Bones as parallel (start, end) joint index tables: legs, spine/head, then
// left and right arms. Kept as two flat arrays so they can be fed straight
// into index_select.
static BONE_STARTS: [i64; 16] = [0, 1, 2, 0, 4, 5, 0, 7, 8, 9, 8, 11, 12, 8, 14, 15];
static BONE_ENDS: [i64; 16] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];

// Pairs of bone indices whose relative angle is tracked.
static ANGLE_FIRST: [i64; 18] = [0, 0, 3, 0, 1, 3, 4, 6, 7, 7, 8, 10, 7, 8, 10, 11, 13, 14];
static ANGLE_SECOND: [i64; 18] = [3, 6, 6, 1, 2, 4, 5, 7, 10, 13, 13, 13, 8, 9, 11, 12, 14, 15];

// Keeps the cosine strictly inside the arc-cosine domain; floating-point
// drift can push a cosine of parallel limbs just past 1.
static ANGLE_EPS: f64 = 1e-7;

/// One displacement vector per bone: start joint minus end joint.
///
/// Input `(batch, frames, 17, coords)`, output `(batch, frames, 16, coords)`.
fn limb_vectors(poses: &Tensor) -> Tensor {
    let device = poses.device();
    let starts = Tensor::from_slice(&BONE_STARTS).to_device(device);
    let ends = Tensor::from_slice(&BONE_ENDS).to_device(device);
    poses.index_select(2, &starts) - poses.index_select(2, &ends)
}

/// Angles between the fixed limb pairs, in radians.
///
/// Input `(batch, frames, 17, coords)`, output `(batch, frames, 18)`.
/// The cosine of each pair is clamped away from ±1 before the arc-cosine so
/// numerical drift can never produce a domain error.
pub fn limb_angles(poses: &Tensor) -> Tensor {
    validate_pose_layout(poses, NUM_JOINTS, "limb_angles");
    let device = poses.device();
    let limbs = limb_vectors(poses);

    let first = limbs.index_select(2, &Tensor::from_slice(&ANGLE_FIRST).to_device(device));
    let second = limbs.index_select(2, &Tensor::from_slice(&ANGLE_SECOND).to_device(device));

    Tensor::cosine_similarity(&first, &second, -1, 1e-8)
        .clamp(-1.0 + ANGLE_EPS, 1.0 - ANGLE_EPS)
        .acos()
}

/// Mean absolute difference between predicted and target limb angles.
///
/// Penalizes joint-angle inconsistency independently of limb lengths and
/// global placement. Differentiable.
pub fn angle_loss(predicted: &Tensor, target: &Tensor) -> Tensor {
    validate_same_shape(predicted, target, "angle_loss");
    limb_angles(predicted).l1_loss(&limb_angles(target), Reduction::Mean)
}

/// Mean absolute difference between predicted and target bone lengths.
///
/// Each bone's length is first averaged over the batch and frame axes, then
/// the two 16-length profiles are compared bone by bone. Differentiable.
pub fn bone_length_loss(predicted: &Tensor, target: &Tensor) -> Tensor {
    validate_same_shape(predicted, target, "bone_length_loss");
    validate_pose_layout(predicted, NUM_JOINTS, "bone_length_loss");

    let predicted_lengths =
        norm_last_dim(&limb_vectors(predicted)).mean_dim(&[0i64, 1][..], false, Kind::Float);
    let target_lengths =
        norm_last_dim(&limb_vectors(target)).mean_dim(&[0i64, 1][..], false, Kind::Float);

    (predicted_lengths - target_lengths).abs().mean(Kind::Float)
}
