use std::collections::HashMap;

use poseval_utils::average::RunningAverage;
use poseval_utils::tensor::{norm_last_dim, validate_same_shape};
use tch::{Kind, Tensor};

use crate::error::EvalError;
use crate::procrustes::p_mpjpe_per_sample;
use crate::MM_PER_METER;

/// The fixed Human3.6M action-family vocabulary, in canonical report order.
pub static ACTIONS: [&str; 15] = [
    "Directions",
    "Discussion",
    "Eating",
    "Greeting",
    "Phoning",
    "Photo",
    "Posing",
    "Purchases",
    "Sitting",
    "SittingDown",
    "Smoking",
    "Waiting",
    "WalkDog",
    "Walking",
    "WalkTogether",
];

/// Resolves an action selector to the list of actions to evaluate.
///
/// `"all"` (any case) and `"*"` select the whole vocabulary; a vocabulary
/// member selects just itself; anything else is an error.
pub fn define_actions(action: &str) -> Result<Vec<&'static str>, EvalError> {
    if action == "*" || action.eq_ignore_ascii_case("all") {
        return Ok(ACTIONS.to_vec());
    }

    ACTIONS
        .iter()
        .find(|&&candidate| candidate == action)
        .map(|&found| vec![found])
        .ok_or_else(|| EvalError::UnrecognizedAction(action.to_string()))
}

/// Derives the action-family name from a raw label.
///
/// Labels like `"Walking 1"` carry a take suffix after the first space; the
/// family name is everything before it. A label without a space is already a
/// family name.
pub fn action_name(label: &str) -> &str {
    match label.find(' ') {
        Some(end) => &label[..end],
        None => label,
    }
}

/// Error accumulators for the two evaluation protocols of one action:
/// p1 is plain MPJPE, p2 is MPJPE after rigid alignment.
#[derive(Debug, Default)]
pub struct ProtocolErrors {
    pub p1: RunningAverage,
    pub p2: RunningAverage,
}

/// Creates an empty error table for the given actions.
pub fn define_error_list(actions: &[&str]) -> HashMap<String, ProtocolErrors> {
    actions
        .iter()
        .map(|&action| (action.to_string(), ProtocolErrors::default()))
        .collect()
}

fn entry<'a>(
    errors: &'a mut HashMap<String, ProtocolErrors>,
    label: &str,
) -> &'a mut ProtocolErrors {
    let name = action_name(label);
    errors
        .get_mut(name)
        .unwrap_or_else(|| panic!("action {} not found in the error table", name))
}

fn uniform_batch(labels: &[String]) -> bool {
    labels.iter().all(|label| label == &labels[0])
}

/// Accumulates plain MPJPE (protocol #1) per action.
///
/// A batch whose samples all carry the same label is folded in as one update
/// of the batch mean weighted by the batch size; a mixed batch updates the
/// table sample by sample.
pub fn mpjpe_by_action_p1(
    predicted: &Tensor,
    target: &Tensor,
    labels: &[String],
    errors: &mut HashMap<String, ProtocolErrors>,
) {
    validate_same_shape(predicted, target, "mpjpe_by_action_p1");
    let num = predicted.size()[0];
    assert_eq!(
        labels.len() as i64,
        num,
        "one action label per batch sample expected"
    );

    let per_sample = norm_last_dim(&(predicted - target))
        .view([num, -1])
        .mean_dim(&[1i64][..], false, Kind::Double);

    if uniform_batch(labels) {
        let batch_mean = per_sample.mean(Kind::Double).double_value(&[]);
        entry(errors, &labels[0]).p1.update(batch_mean, num);
    } else {
        for i in 0..num {
            let sample_error = per_sample.double_value(&[i]);
            entry(errors, &labels[i as usize]).p1.update(sample_error, 1);
        }
    }
}

/// Accumulates rigid-alignment MPJPE (protocol #2) per action.
///
/// Frames are flattened into the sample axis and aligned on the dense f64
/// CPU path, then errors are folded back per pose sequence.
pub fn mpjpe_by_action_p2(
    predicted: &Tensor,
    target: &Tensor,
    labels: &[String],
    errors: &mut HashMap<String, ProtocolErrors>,
) {
    validate_same_shape(predicted, target, "mpjpe_by_action_p2");
    let num = predicted.size()[0];
    assert_eq!(
        labels.len() as i64,
        num,
        "one action label per batch sample expected"
    );

    let dims = predicted.size();
    let (joints, coords) = (dims[dims.len() - 2], dims[dims.len() - 1]);
    let flat_predicted = predicted.reshape(&[-1, joints, coords]);
    let flat_target = target.reshape(&[-1, joints, coords]);

    let per_sample = p_mpjpe_per_sample(&flat_predicted, &flat_target)
        .view([num, -1])
        .mean_dim(&[1i64][..], false, Kind::Double);

    if uniform_batch(labels) {
        let batch_mean = per_sample.mean(Kind::Double).double_value(&[]);
        entry(errors, &labels[0]).p2.update(batch_mean, num);
    } else {
        for i in 0..num {
            let sample_error = per_sample.double_value(&[i]);
            entry(errors, &labels[i as usize]).p2.update(sample_error, 1);
        }
    }
}

/// Folds one evaluation batch into the error table under both protocols.
pub fn evaluate_batch(
    predicted: &Tensor,
    target: &Tensor,
    labels: &[String],
    errors: &mut HashMap<String, ProtocolErrors>,
) {
    mpjpe_by_action_p1(predicted, target, labels, errors);
    mpjpe_by_action_p2(predicted, target, labels, errors);
}

/// Reports per-action errors and returns the overall averages.
///
/// See [`print_error_action`].
pub fn print_error(errors: &HashMap<String, ProtocolErrors>, training: bool) -> (f64, f64) {
    print_error_action(errors, training)
}

/// Prints one row per action (both protocols, in millimetres) plus an
/// average row, in canonical vocabulary order. Printing is suppressed while
/// training; the returned average-of-averages pair is computed either way.
pub fn print_error_action(
    errors: &HashMap<String, ProtocolErrors>,
    training: bool,
) -> (f64, f64) {
    let mut overall_p1 = RunningAverage::new();
    let mut overall_p2 = RunningAverage::new();

    if !training {
        println!("{:=^12} {:=^10} {:=^8}", "Action", "p#1 mm", "p#2 mm");
    }

    for action in ACTIONS.iter() {
        if let Some(entry) = errors.get(*action) {
            let p1_mm = entry.p1.avg * MM_PER_METER;
            let p2_mm = entry.p2.avg * MM_PER_METER;
            overall_p1.update(p1_mm, 1);
            overall_p2.update(p2_mm, 1);

            if !training {
                println!("{:<12} {:>6.2} {:>10.2}", action, p1_mm, p2_mm);
            }
        }
    }

    if !training {
        println!(
            "{:<12} {:>6.2} {:>10.2}",
            "Average", overall_p1.avg, overall_p2.avg
        );
    }

    (overall_p1.avg, overall_p2.avg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Tensor;

    #[test]
    fn test_define_actions_all_selectors() {
        assert_eq!(define_actions("all").unwrap().len(), 15);
        assert_eq!(define_actions("All").unwrap().len(), 15);
        assert_eq!(define_actions("*").unwrap().len(), 15);
    }

    #[test]
    fn test_define_actions_single() {
        assert_eq!(define_actions("Walking").unwrap(), vec!["Walking"]);
    }

    #[test]
    fn test_define_actions_rejects_unknown() {
        let err = define_actions("Moonwalking").unwrap_err();
        assert!(err.to_string().contains("Moonwalking"));
    }

    #[test]
    fn test_action_name_truncates_at_first_space() {
        assert_eq!(action_name("Walking 1"), "Walking");
        assert_eq!(action_name("Smoking"), "Smoking");
        assert_eq!(action_name("Sitting 2 extra"), "Sitting");
    }

    #[test]
    fn test_mixed_batch_updates_per_sample() {
        tch::manual_seed(51);
        let predicted = Tensor::rand(&[2, 1, 17, 3], tch::kind::FLOAT_CPU);
        let target = Tensor::rand(&[2, 1, 17, 3], tch::kind::FLOAT_CPU);
        let labels = vec!["Walking 1".to_string(), "Eating 1".to_string()];

        let actions = define_actions("all").unwrap();
        let mut errors = define_error_list(&actions);
        evaluate_batch(&predicted, &target, &labels, &mut errors);

        assert_eq!(errors["Walking"].p1.count, 1);
        assert_eq!(errors["Eating"].p1.count, 1);
        assert_eq!(errors["Walking"].p2.count, 1);
        assert!(errors["Walking"].p1.avg > 0.0);
    }

    #[test]
    #[should_panic(expected = "not found in the error table")]
    fn test_unknown_label_is_fatal() {
        let predicted = Tensor::zeros(&[1, 1, 17, 3], tch::kind::FLOAT_CPU);
        let target = Tensor::zeros(&[1, 1, 17, 3], tch::kind::FLOAT_CPU);
        let labels = vec!["Juggling 1".to_string()];

        let mut errors = define_error_list(&["Walking"]);
        mpjpe_by_action_p1(&predicted, &target, &labels, &mut errors);
    }
}
