use bdd_core::EngineConfig;
use clap::Parser;

mod cli;
mod demo;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    tracer::init_tracing(Some(&cli.common.log_level));

    let config = EngineConfig {
        var_count: cli.common.var_count,
        memory_budget_bytes: cli.common.memory_budget_bytes,
    };

    match cli.command {
        Commands::Demo => demo::run(config),
        Commands::Apply(cmd) => run_apply(config, cmd),
        Commands::Ite(cmd) => run_ite(config, cmd),
    }
}

fn run_apply(config: EngineConfig, cmd: cli::ApplyConfig) {
    let left = bdd_core::Handle::variable(cmd.left, config).expect("--left within --var-count");
    let right = bdd_core::Handle::variable(cmd.right, config).expect("--right within --var-count");
    let result = left
        .apply(cmd.op.into(), &right)
        .expect("apply never fails on valid operands");
    println!(
        "node_count={} sat_count={}",
        result.node_count(),
        result.sat_count(config.var_count).expect("count fits in u128")
    );
}

fn run_ite(config: EngineConfig, cmd: cli::IteConfig) {
    let f = bdd_core::Handle::variable(cmd.f, config).expect("--f within --var-count");
    let g = bdd_core::Handle::variable(cmd.g, config).expect("--g within --var-count");
    let h = bdd_core::Handle::variable(cmd.h, config).expect("--h within --var-count");
    let result = f.ite(&g, &h).expect("ite never fails on valid operands");
    println!(
        "node_count={} sat_count={}",
        result.node_count(),
        result.sat_count(config.var_count).expect("count fits in u128")
    );
}
