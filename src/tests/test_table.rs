use crate::table::QTable;

#[test]
fn test_update_matches_one_step_rule() {
    // S=4, A=2, alpha=0.5, gamma=0.9, all-zero table: one update with
    // (state=0, action=1, reward=2.0, next_state=1, done=false) lands at
    // 0.5 * 0 + 0.5 * (2.0 + 0.9 * 0) = 1.0.
    let mut table = QTable::new(4, 2, 0.5, 0.9).unwrap();
    let updated = table.update(0, 1, 2.0, 1, false);
    assert_eq!(updated, 1.0);
    assert_eq!(table.value(0, 1), 1.0);

    // Every other cell is untouched.
    assert_eq!(table.value(0, 0), 0.0);
    assert_eq!(table.value(1, 0), 0.0);
    assert_eq!(table.value(1, 1), 0.0);
}

#[test]
fn test_terminal_update_ignores_next_state() {
    let mut table = QTable::new(3, 2, 0.5, 0.9).unwrap();
    // Plant an adversarially high value at the next state; a terminal
    // transition must not see it.
    table.update(2, 0, 2000.0, 2, true);
    assert_eq!(table.value(2, 0), 1000.0);

    let updated = table.update(0, 1, 3.0, 2, true);
    assert_eq!(updated, 0.5 * 3.0);

    // The same transition without done bootstraps from state 2.
    let mut table = QTable::new(3, 2, 0.5, 0.9).unwrap();
    table.update(2, 0, 2000.0, 2, true);
    let updated = table.update(0, 1, 3.0, 2, false);
    assert!(updated > 1.5);
}

#[test]
fn test_best_action_breaks_ties_low() {
    let mut table = QTable::new(2, 4, 0.5, 0.9).unwrap();
    // All zero: lowest index wins.
    assert_eq!(table.best_action(0), 0);

    // Equal positive values at actions 1 and 3: index 1 wins.
    table.update(0, 1, 2.0, 1, true);
    table.update(0, 3, 2.0, 1, true);
    assert_eq!(table.value(0, 1), table.value(0, 3));
    assert_eq!(table.best_action(0), 1);
}

#[test]
fn test_best_action_prefers_highest_value() {
    let mut table = QTable::new(2, 3, 1.0, 0.9).unwrap();
    table.update(0, 0, 1.0, 1, true);
    table.update(0, 1, 5.0, 1, true);
    table.update(0, 2, 3.0, 1, true);
    assert_eq!(table.best_action(0), 1);
}

#[test]
fn test_untrained_detection() {
    let mut table = QTable::new(2, 2, 0.5, 0.9).unwrap();
    assert!(table.is_untrained());
    table.update(0, 0, 1.0, 1, true);
    assert!(!table.is_untrained());
}

#[test]
fn test_invalid_construction_rejected() {
    assert!(QTable::new(0, 2, 0.5, 0.9).is_err());
    assert!(QTable::new(4, 0, 0.5, 0.9).is_err());
    assert!(QTable::new(4, 2, 0.0, 0.9).is_err());
    assert!(QTable::new(4, 2, 1.5, 0.9).is_err());
    assert!(QTable::new(4, 2, 0.5, 1.5).is_err());
}
