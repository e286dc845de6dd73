pub mod actions;
pub mod error;
pub mod loss;
pub mod pck;
pub mod procrustes;
pub mod skeleton;

/// Millimetres per metre. Joint errors are computed in metres and reported in
/// millimetres; PCK thresholds are expressed in millimetres.
pub const MM_PER_METER: f64 = 1000.0;
