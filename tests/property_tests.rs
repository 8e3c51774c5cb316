use ndarray::array;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use talos::exploration::EpsilonSchedule;
use talos::replay::{NStepAccumulator, ReplayBuffer, Transition};

fn transition(tag: f32) -> Transition {
    Transition {
        state: array![tag],
        action: 0,
        ret: tag,
        next_state: array![tag + 1.0],
        done: false,
        discount: 0.9,
    }
}

proptest! {
    #[test]
    fn linear_epsilon_stays_bounded_and_non_increasing(
        epsilon_max in 0.5f32..1.0,
        epsilon_min in 0.01f32..0.3,
        step in 0.0f32..0.2,
        advances in 0usize..500,
    ) {
        let mut schedule = EpsilonSchedule::linear(epsilon_max, epsilon_min, step).unwrap();
        let mut previous = schedule.probability();
        for _ in 0..advances {
            schedule.advance_step();
            let current = schedule.probability();
            prop_assert!(current >= epsilon_min);
            prop_assert!(current <= epsilon_max);
            prop_assert!(current <= previous);
            previous = current;
        }
    }

    #[test]
    fn exponential_epsilon_stays_bounded_and_non_increasing(
        episodes in 1usize..200,
        visits in prop::collection::vec(0usize..500, 0..50),
    ) {
        let mut schedule = EpsilonSchedule::exponential(1.0, 0.01, episodes).unwrap();
        let mut previous = schedule.probability();
        for episode in visits {
            schedule.advance_episode(episode);
            let current = schedule.probability();
            prop_assert!(current >= 0.01);
            prop_assert!(current <= 1.0);
            prop_assert!(current <= previous);
            previous = current;
        }
    }

    #[test]
    fn replay_size_never_exceeds_capacity(
        capacity in 1usize..64,
        pushes in 0usize..200,
    ) {
        let mut buffer = ReplayBuffer::new(capacity, StdRng::seed_from_u64(1)).unwrap();
        for i in 0..pushes {
            buffer.push(transition(i as f32));
            prop_assert!(buffer.len() <= capacity);
        }
        prop_assert_eq!(buffer.len(), pushes.min(capacity));
    }

    #[test]
    fn sampled_batch_always_has_requested_size(
        stored in 1usize..32,
        batch_size in 1usize..128,
    ) {
        let mut buffer = ReplayBuffer::new(64, StdRng::seed_from_u64(2)).unwrap();
        for i in 0..stored {
            buffer.push(transition(i as f32));
        }
        // Uniform with replacement: any batch size is satisfiable from any
        // non-empty store.
        let batch = buffer.sample(batch_size).unwrap();
        prop_assert_eq!(batch.len(), batch_size);
    }

    #[test]
    fn full_window_folds_carry_gamma_pow_n(
        n in 1usize..6,
        steps in 1usize..30,
        gamma in 0.1f32..1.0,
    ) {
        let mut acc = NStepAccumulator::new(n, gamma).unwrap();
        let mut emitted = 0usize;
        for i in 0..steps {
            let folded = acc.push(array![i as f32], 0, 1.0, array![i as f32 + 1.0], false);
            if let Some(t) = folded {
                emitted += 1;
                prop_assert!((t.discount - gamma.powi(n as i32)).abs() < 1e-6);
                prop_assert!(!t.done);
            }
        }
        // The window fills after n steps and slides once per step after.
        prop_assert_eq!(emitted, steps.saturating_sub(n - 1));
    }

    #[test]
    fn terminal_fold_uses_staged_count(
        n in 2usize..6,
        staged in 1usize..5,
        gamma in 0.1f32..1.0,
    ) {
        let staged = staged.min(n - 1);
        let mut acc = NStepAccumulator::new(n, gamma).unwrap();
        for i in 0..staged - 1 {
            let folded = acc.push(array![i as f32], 0, 1.0, array![i as f32 + 1.0], false);
            prop_assert!(folded.is_none());
        }
        let folded = acc
            .push(array![0.0], 0, 1.0, array![1.0], true)
            .expect("terminal step must fold");
        prop_assert!(folded.done);
        prop_assert!((folded.discount - gamma.powi(staged as i32)).abs() < 1e-6);
        prop_assert_eq!(acc.staged_len(), 0);
    }
}
