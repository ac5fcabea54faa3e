//! End-to-end scenarios exercising the engine through the public `Handle`
//! API: build diagrams with `apply`/`ite`, then check their shape and
//! semantics rather than their raw node-file encoding (that level of
//! detail is covered by `reduce`'s own unit tests).

use bdd_core::{EngineConfig, Handle, Op};
use bdd_types::Assignment;
use pretty_assertions::assert_eq;

fn var(level: u64, cfg: EngineConfig) -> Handle {
    Handle::variable(level, cfg).expect("level within configured var_count")
}

#[test]
fn and_of_two_variables_is_the_canonical_two_node_diagram() {
    let cfg = EngineConfig::new(2);
    let x0 = var(0, cfg);
    let x1 = var(1, cfg);

    let and01 = x0.apply(Op::And, &x1).unwrap();

    assert_eq!(and01.node_count(), 2);
    assert_eq!(and01.sat_count(2).unwrap(), 1);
    assert_eq!(and01.sat_min(2), vec![Assignment::new(0, true), Assignment::new(1, true)]);
}

#[test]
fn ite_of_three_variables_has_three_nodes_and_four_models() {
    let cfg = EngineConfig::new(3);
    let x0 = var(0, cfg);
    let x1 = var(1, cfg);
    let x2 = var(2, cfg);

    let result = x0.ite(&x1, &x2).unwrap();

    assert_eq!(result.node_count(), 3);
    assert_eq!(result.sat_count(3).unwrap(), 4);

    // {x0=1, x1=1, x2=*}: both completions satisfy.
    let a1 = result.restrict(0, true).unwrap().restrict(1, true).unwrap();
    assert_eq!(a1.sat_count(1).unwrap(), 2);
    // {x0=0, x2=1, x1=*}: both completions satisfy.
    let a2 = result.restrict(0, false).unwrap().restrict(2, true).unwrap();
    assert_eq!(a2.sat_count(1).unwrap(), 2);
}

#[test]
fn restricting_ite_at_x0_true_leaves_just_x1() {
    let cfg = EngineConfig::new(3);
    let x0 = var(0, cfg);
    let x1 = var(1, cfg);
    let x2 = var(2, cfg);
    let ite_result = x0.ite(&x1, &x2).unwrap();

    let restricted = ite_result.restrict(0, true).unwrap();

    assert!(restricted.equals(&x1).unwrap());
    assert_eq!(restricted.node_count(), 1);
}

#[test]
fn exists_x1_over_and_of_x0_x1_yields_x0() {
    let cfg = EngineConfig::new(2);
    let x0 = var(0, cfg);
    let x1 = var(1, cfg);
    let and01 = x0.apply(Op::And, &x1).unwrap();

    let result = and01.exists(1).unwrap();

    assert!(result.equals(&x0).unwrap());
}

#[test]
fn negated_three_way_xor_counts_even_parity_assignments() {
    let cfg = EngineConfig::new(3);
    let x0 = var(0, cfg);
    let x1 = var(1, cfg);
    let x2 = var(2, cfg);
    let parity = x0.apply(Op::Xor, &x1).unwrap().apply(Op::Xor, &x2).unwrap();

    let not_parity = parity.not_();

    assert_eq!(not_parity.sat_count(3).unwrap(), 4);
    // A function and its negation always partition the full cube.
    assert_eq!(
        parity.sat_count(3).unwrap() + not_parity.sat_count(3).unwrap(),
        1u128 << 3
    );
}

#[test]
fn sat_min_of_negated_single_path_is_all_false() {
    let cfg = EngineConfig::new(4);
    let x0 = var(0, cfg);
    let x1 = var(1, cfg);
    let x2 = var(2, cfg);
    let x3 = var(3, cfg);

    // x0=⊥, x1=⊥, x2=⊤, x3=⊤
    let path = x0
        .not_()
        .apply(Op::And, &x1.not_())
        .unwrap()
        .apply(Op::And, &x2)
        .unwrap()
        .apply(Op::And, &x3)
        .unwrap();

    let not_path = path.not_();

    assert_eq!(
        not_path.sat_min(4),
        vec![
            Assignment::new(0, false),
            Assignment::new(1, false),
            Assignment::new(2, false),
            Assignment::new(3, false),
        ]
    );
}

#[test]
fn apply_is_commutative_for_random_operators_and_variables() {
    use rand::Rng;

    let cfg = EngineConfig::new(4);
    let ops = [
        Op::And,
        Op::Or,
        Op::Xor,
        Op::Nand,
        Op::Nor,
        Op::Xnor,
        Op::Imp,
        Op::ImpBy,
    ];
    let mut rng = rand::thread_rng();
    for _ in 0..50 {
        let op = ops[rng.gen_range(0..ops.len())];
        let a = var(rng.gen_range(0..4), cfg);
        let b = var(rng.gen_range(0..4), cfg);

        let ab = a.apply(op, &b).unwrap();
        let ba = b.apply(op, &a).unwrap();

        let commutative = matches!(
            op,
            Op::And | Op::Or | Op::Xor | Op::Nand | Op::Nor | Op::Xnor
        );
        if commutative {
            assert!(
                ab.equals(&ba).unwrap(),
                "expected {op:?} to be commutative on random operands"
            );
        }
    }
}
