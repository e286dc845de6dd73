use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use tch::{Kind, Tensor};

use poseval_metrics_lib::actions::{define_actions, define_error_list, evaluate_batch, print_error};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        error!("Usage: {} <predictions_json>", args[0]);
        std::process::exit(1);
    }

    let input_path = Path::new(&args[1]);

    // Check if input file exists
    if !input_path.exists() {
        error!("Error: Input file '{}' does not exist.", input_path.display());
        std::process::exit(1);
    }

    info!("Pose Evaluator");
    info!("==============");

    let file = File::open(input_path)?;
    let reader = BufReader::new(file);
    let samples: serde_json::Value = serde_json::from_reader(reader)?;
    let samples = samples
        .as_array()
        .ok_or("expected a top-level JSON array of samples")?;

    let actions = define_actions("all")?;
    let mut errors = define_error_list(&actions);

    // Create a progress bar
    let pb = ProgressBar::new(samples.len() as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap()
        .progress_chars("#>-"));
    pb.set_message("Evaluating...");

    for sample in samples {
        let label = sample["action"]
            .as_str()
            .ok_or("sample is missing an action label")?
            .to_string();
        let predicted = parse_pose(&sample["predicted"])?;
        let target = parse_pose(&sample["target"])?;

        evaluate_batch(&predicted, &target, &[label], &mut errors);
        pb.inc(1);
    }
    pb.finish_with_message("done");

    let (p1, p2) = print_error(&errors, false);
    info!("protocol #1 average: {:.2} mm", p1);
    info!("protocol #2 average: {:.2} mm", p2);

    Ok(())
}

/// Reads one pose sequence (frames x joints x coords, nested JSON arrays)
/// into a `(1, frames, joints, coords)` batch tensor.
fn parse_pose(value: &serde_json::Value) -> Result<Tensor, Box<dyn std::error::Error>> {
    let frames = value.as_array().ok_or("pose must be an array of frames")?;
    let mut flat = Vec::new();
    let mut joints = 0usize;
    let mut coords = 0usize;

    for frame in frames {
        let frame = frame.as_array().ok_or("frame must be an array of joints")?;
        joints = frame.len();
        for joint in frame {
            let joint = joint.as_array().ok_or("joint must be an array of coordinates")?;
            coords = joint.len();
            for coordinate in joint {
                flat.push(coordinate.as_f64().ok_or("coordinate must be a number")?);
            }
        }
    }

    if frames.is_empty() || joints == 0 || coords == 0 {
        return Err("pose must contain at least one frame, joint and coordinate".into());
    }
    if flat.len() != frames.len() * joints * coords {
        return Err("ragged pose arrays are not supported".into());
    }

    Ok(Tensor::from_slice(&flat)
        .reshape(&[1, frames.len() as i64, joints as i64, coords as i64])
        .to_kind(Kind::Float))
}
