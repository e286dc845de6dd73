use std::fs;
use std::path::{Path, PathBuf};
use tch::nn::VarStore;
use tch::TchError;

/// Builds the deterministic checkpoint file name for an epoch.
///
/// The threshold is the error the checkpoint was selected on (in metres);
/// it is stamped into the name as `floor(threshold * 100)` so successive
/// bests are distinguishable at a glance.
fn checkpoint_path(save_dir: &Path, prefix: &str, epoch: i64, threshold: f64) -> PathBuf {
    save_dir.join(format!(
        "{}_{}_{}.safetensors",
        prefix,
        epoch,
        (threshold * 100.0) as i64
    ))
}

fn remove_previous(previous: Option<&Path>) -> Result<(), TchError> {
    if let Some(path) = previous {
        if path.exists() {
            fs::remove_file(path)?;
        }
    }
    Ok(())
}

/// Saves the model state, replacing the previously saved checkpoint.
///
/// If `previous` names an existing file it is deleted first (best-effort
/// cleanup, not atomic). Returns the new checkpoint path; the caller threads
/// it back in as `previous` on the next save.
pub fn save_model(
    previous: Option<&Path>,
    save_dir: &Path,
    epoch: i64,
    threshold: f64,
    vs: &VarStore,
) -> Result<PathBuf, TchError> {
    remove_previous(previous)?;
    let path = checkpoint_path(save_dir, "model", epoch, threshold);
    vs.save(&path)?;
    Ok(path)
}

/// Like [`save_model`], but with a caller-supplied file name prefix, so a
/// refinement stage can keep its checkpoints apart from the base model's.
pub fn save_model_refine(
    previous: Option<&Path>,
    save_dir: &Path,
    epoch: i64,
    threshold: f64,
    vs: &VarStore,
    model_name: &str,
) -> Result<PathBuf, TchError> {
    remove_previous(previous)?;
    let path = checkpoint_path(save_dir, model_name, epoch, threshold);
    vs.save(&path)?;
    Ok(path)
}

/// Saves a per-epoch checkpoint without deleting the previous one.
pub fn save_model_epoch(
    save_dir: &Path,
    epoch: i64,
    threshold: f64,
    vs: &VarStore,
) -> Result<PathBuf, TchError> {
    let path = checkpoint_path(save_dir, "model", epoch, threshold);
    vs.save(&path)?;
    Ok(path)
}
