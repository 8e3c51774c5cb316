use crate::exploration::{Decay, EpsilonSchedule};

#[test]
fn test_linear_decay_per_step() {
    let mut schedule = EpsilonSchedule::linear(1.0, 0.1, 0.25).unwrap();
    assert_eq!(schedule.probability(), 1.0);

    schedule.advance_step();
    assert!((schedule.probability() - 0.75).abs() < 1e-6);
    schedule.advance_step();
    assert!((schedule.probability() - 0.5).abs() < 1e-6);

    // Never drops below the minimum, however many steps follow.
    for _ in 0..100 {
        schedule.advance_step();
    }
    assert_eq!(schedule.probability(), 0.1);
}

#[test]
fn test_linear_ignores_episode_advances() {
    let mut schedule = EpsilonSchedule::linear(1.0, 0.1, 0.25).unwrap();
    schedule.advance_episode(50);
    assert_eq!(schedule.probability(), 1.0);
}

#[test]
fn test_exponential_decay_per_episode() {
    let episodes = 100;
    let mut schedule = EpsilonSchedule::exponential(1.0, 0.01, episodes).unwrap();
    assert_eq!(schedule.probability(), 1.0);

    // The rate is fixed at construction as -ln(eps_min) / episodes.
    let rate = -(0.01f32).ln() / episodes as f32;
    schedule.advance_episode(10);
    let expected = 0.01 + (1.0 - 0.01) * (-rate * 10.0).exp();
    assert!((schedule.probability() - expected).abs() < 1e-6);

    // Near the last episode epsilon has approached the minimum.
    schedule.advance_episode(episodes - 1);
    assert!(schedule.probability() < 0.05);
    assert!(schedule.probability() >= 0.01);
}

#[test]
fn test_exponential_ignores_step_advances() {
    let mut schedule = EpsilonSchedule::exponential(1.0, 0.01, 100).unwrap();
    for _ in 0..1000 {
        schedule.advance_step();
    }
    assert_eq!(schedule.probability(), 1.0);
}

#[test]
fn test_exponential_never_rises() {
    let mut schedule = EpsilonSchedule::exponential(1.0, 0.01, 100).unwrap();
    schedule.advance_episode(50);
    let low = schedule.probability();
    // An out-of-order episode index must not raise epsilon again.
    schedule.advance_episode(10);
    assert!(schedule.probability() <= low);
}

#[test]
fn test_invalid_bounds_rejected() {
    assert!(EpsilonSchedule::linear(0.5, 0.9, 0.1).is_err());
    assert!(EpsilonSchedule::linear(1.5, 0.1, 0.1).is_err());
    assert!(EpsilonSchedule::linear(1.0, 0.1, -0.1).is_err());
    // Exponential mode needs a positive minimum for the log-derived rate.
    assert!(EpsilonSchedule::exponential(1.0, 0.0, 100).is_err());
    assert!(EpsilonSchedule::exponential(1.0, 0.01, 0).is_err());
}

#[test]
fn test_decay_mode_is_preserved() {
    let schedule = EpsilonSchedule::linear(1.0, 0.1, 0.01).unwrap();
    match schedule.decay() {
        Decay::Linear { step } => assert!((step - 0.01).abs() < 1e-7),
        Decay::Exponential { .. } => panic!("expected linear decay"),
    }
}
