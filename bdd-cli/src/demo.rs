//! Runs the engine's seed end-to-end scenarios (one per named operation)
//! and prints what they compute. A demonstration aid only — the actual
//! correctness checks for these scenarios live in `bdd-core`'s test suite.

use bdd_core::{EngineConfig, Handle, Op};
use bdd_types::Assignment;

pub fn run(config: EngineConfig) {
    and_of_two_variables(config);
    ite_of_three_variables(config);
    restrict_scenario(config);
    exists_scenario(config);
    negated_parity(config);
    sat_min_of_negated_path(config);
}

fn var(level: u64, config: EngineConfig) -> Handle {
    Handle::variable(level, config).expect("demo scenarios stay within the configured var_count")
}

fn and_of_two_variables(config: EngineConfig) {
    let x0 = var(0, config);
    let x1 = var(1, config);
    let and01 = x0.apply(Op::And, &x1).expect("apply never fails on valid operands");
    println!(
        "x0 and x1: node_count={} sat_count={}",
        and01.node_count(),
        and01.sat_count(2).expect("count fits in u128")
    );
}

fn ite_of_three_variables(config: EngineConfig) {
    let x0 = var(0, config);
    let x1 = var(1, config);
    let x2 = var(2, config);
    let result = x0.ite(&x1, &x2).expect("ite never fails on valid operands");
    println!(
        "ite(x0, x1, x2): node_count={} sat_count={}",
        result.node_count(),
        result.sat_count(3).expect("count fits in u128")
    );
}

fn restrict_scenario(config: EngineConfig) {
    let x0 = var(0, config);
    let x1 = var(1, config);
    let x2 = var(2, config);
    let ite_result = x0.ite(&x1, &x2).expect("ite never fails on valid operands");
    let restricted = ite_result
        .restrict(0, true)
        .expect("restrict never fails on valid operands");
    println!(
        "ite(x0, x1, x2) restricted at x0=true: equals x1 = {}",
        restricted.equals(&x1).expect("equals never fails on valid operands")
    );
}

fn exists_scenario(config: EngineConfig) {
    let x0 = var(0, config);
    let x1 = var(1, config);
    let and01 = x0.apply(Op::And, &x1).expect("apply never fails on valid operands");
    let result = and01.exists(1).expect("exists never fails on valid operands");
    println!(
        "exists x1. (x0 and x1): equals x0 = {}",
        result.equals(&x0).expect("equals never fails on valid operands")
    );
}

fn negated_parity(config: EngineConfig) {
    let x0 = var(0, config);
    let x1 = var(1, config);
    let x2 = var(2, config);
    let parity = x0
        .apply(Op::Xor, &x1)
        .and_then(|h| h.apply(Op::Xor, &x2))
        .expect("apply never fails on valid operands");
    let not_parity = parity.not_();
    println!(
        "not(x0 xor x1 xor x2): sat_count={}",
        not_parity.sat_count(3).expect("count fits in u128")
    );
}

fn sat_min_of_negated_path(config: EngineConfig) {
    let x0 = var(0, config);
    let x1 = var(1, config);
    let x2 = var(2, config);
    let x3 = var(3, config);
    let path = x0
        .not_()
        .apply(Op::And, &x1.not_())
        .and_then(|h| h.apply(Op::And, &x2))
        .and_then(|h| h.apply(Op::And, &x3))
        .expect("apply never fails on valid operands");
    let not_path = path.not_();
    let assignment: Vec<Assignment> = not_path.sat_min(4);
    println!("sat_min(not path(x0=F,x1=F,x2=T,x3=T)) = {assignment:?}");
}
