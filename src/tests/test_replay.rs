use crate::replay::{NStepAccumulator, ReplayBuffer, Transition};
use ndarray::{array, Array1};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn transition(tag: f32) -> Transition {
    Transition {
        state: array![tag],
        action: 0,
        ret: tag,
        next_state: array![tag + 1.0],
        done: false,
        discount: 0.99,
    }
}

fn buffer(capacity: usize) -> ReplayBuffer {
    ReplayBuffer::new(capacity, StdRng::seed_from_u64(7)).unwrap()
}

#[test]
fn test_ring_eviction() {
    let mut buffer = buffer(3);
    for i in 0..5 {
        buffer.push(transition(i as f32));
    }
    assert_eq!(buffer.len(), 3);

    // Only the three newest entries remain.
    let batch = buffer.sample(64).unwrap();
    assert!(batch.iter().all(|t| t.ret >= 2.0));
}

#[test]
fn test_sample_with_replacement() {
    let mut buffer = buffer(10);
    buffer.push(transition(1.0));

    // A single stored entry still yields a full batch of duplicates.
    let batch = buffer.sample(32).unwrap();
    assert_eq!(batch.len(), 32);
    assert!(batch.iter().all(|t| t.ret == 1.0));
}

#[test]
fn test_sample_empty_fails() {
    let mut buffer = buffer(10);
    assert!(buffer.sample(1).is_err());
}

#[test]
fn test_zero_capacity_rejected() {
    assert!(ReplayBuffer::new(0, StdRng::seed_from_u64(0)).is_err());
}

fn obs(tag: f32) -> Array1<f32> {
    array![tag]
}

#[test]
fn test_three_step_fold() {
    // Rewards [1, 1, 1] with gamma = 0.5 and n = 3 fold into a return of
    // 1 + 0.5 + 0.25 = 1.75 with a bootstrap discount of 0.5^3 = 0.125.
    let mut acc = NStepAccumulator::new(3, 0.5).unwrap();
    assert!(acc.push(obs(0.0), 1, 1.0, obs(1.0), false).is_none());
    assert!(acc.push(obs(1.0), 0, 1.0, obs(2.0), false).is_none());
    let folded = acc.push(obs(2.0), 0, 1.0, obs(3.0), false).unwrap();

    assert_eq!(folded.ret, 1.75);
    assert_eq!(folded.discount, 0.125);
    assert_eq!(folded.state, obs(0.0));
    assert_eq!(folded.action, 1);
    assert_eq!(folded.next_state, obs(3.0));
    assert!(!folded.done);
}

#[test]
fn test_window_slides_after_filling() {
    let mut acc = NStepAccumulator::new(2, 0.5).unwrap();
    assert!(acc.push(obs(0.0), 0, 1.0, obs(1.0), false).is_none());
    let first = acc.push(obs(1.0), 1, 2.0, obs(2.0), false).unwrap();
    assert_eq!(first.state, obs(0.0));
    assert_eq!(first.ret, 1.0 + 0.5 * 2.0);

    // The next step folds the window starting one step later.
    let second = acc.push(obs(2.0), 0, 4.0, obs(3.0), false).unwrap();
    assert_eq!(second.state, obs(1.0));
    assert_eq!(second.action, 1);
    assert_eq!(second.ret, 2.0 + 0.5 * 4.0);
}

#[test]
fn test_terminal_fold_short_window() {
    let mut acc = NStepAccumulator::new(3, 0.5).unwrap();
    assert!(acc.push(obs(0.0), 0, 1.0, obs(1.0), false).is_none());
    // Episode ends after two staged steps: fold k=2 and clear everything.
    let folded = acc.push(obs(1.0), 1, 1.0, obs(2.0), true).unwrap();
    assert_eq!(folded.ret, 1.5);
    assert_eq!(folded.discount, 0.25);
    assert!(folded.done);
    assert_eq!(acc.staged_len(), 0);
}

#[test]
fn test_single_step_degenerates() {
    let mut acc = NStepAccumulator::new(1, 0.9).unwrap();
    let folded = acc.push(obs(5.0), 2, 3.0, obs(6.0), false).unwrap();
    assert_eq!(folded.ret, 3.0);
    assert_eq!(folded.discount, 0.9);
    assert_eq!(folded.state, obs(5.0));
    assert_eq!(folded.next_state, obs(6.0));
}

#[test]
fn test_reset_clears_stage() {
    let mut acc = NStepAccumulator::new(3, 0.5).unwrap();
    let _ = acc.push(obs(0.0), 0, 1.0, obs(1.0), false);
    let _ = acc.push(obs(1.0), 0, 1.0, obs(2.0), false);
    acc.reset();
    assert_eq!(acc.staged_len(), 0);

    // A fold after the reset only sees post-reset steps.
    assert!(acc.push(obs(9.0), 0, 1.0, obs(10.0), false).is_none());
}

#[test]
fn test_invalid_accumulator_rejected() {
    assert!(NStepAccumulator::new(0, 0.5).is_err());
    assert!(NStepAccumulator::new(3, 1.5).is_err());
}
