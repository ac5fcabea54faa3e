use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    #[clap(flatten)]
    pub common: CommonConfig,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Runs the engine's seed end-to-end scenarios and prints their results.
    Demo,
    /// Builds `x_left OP x_right` and reports node count / model count.
    Apply(ApplyConfig),
    /// Builds `ite(x_f, x_g, x_h)` and reports node count / model count.
    Ite(IteConfig),
}

/// Engine-wide flags shared by every subcommand, in the same spirit as the
/// teacher's `utils::cli::CommandLineConfig`: a flat, flattened bag of
/// tunables rather than one struct per subcommand.
#[derive(Args, Debug, Clone)]
pub struct CommonConfig {
    /// Number of variable levels the engine is configured over.
    #[arg(long, default_value_t = 8)]
    pub var_count: u64,
    /// Memory budget, in bytes, before a stream spills to disk.
    #[arg(long, default_value_t = 64 * 1024 * 1024)]
    pub memory_budget_bytes: usize,
    /// Log level (or `RUST_LOG`-style filter string).
    #[arg(long, default_value_t = String::from("info"))]
    pub log_level: String,
}

#[derive(Args, Debug, Clone)]
pub struct ApplyConfig {
    #[arg(long, value_enum)]
    pub op: OpArg,
    #[arg(long)]
    pub left: u64,
    #[arg(long)]
    pub right: u64,
}

#[derive(Args, Debug, Clone)]
pub struct IteConfig {
    #[arg(long)]
    pub f: u64,
    #[arg(long)]
    pub g: u64,
    #[arg(long)]
    pub h: u64,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OpArg {
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Xnor,
    Imp,
    ImpBy,
    Diff,
    Less,
}

impl From<OpArg> for bdd_core::Op {
    fn from(value: OpArg) -> Self {
        match value {
            OpArg::And => bdd_core::Op::And,
            OpArg::Or => bdd_core::Op::Or,
            OpArg::Xor => bdd_core::Op::Xor,
            OpArg::Nand => bdd_core::Op::Nand,
            OpArg::Nor => bdd_core::Op::Nor,
            OpArg::Xnor => bdd_core::Op::Xnor,
            OpArg::Imp => bdd_core::Op::Imp,
            OpArg::ImpBy => bdd_core::Op::ImpBy,
            OpArg::Diff => bdd_core::Op::Diff,
            OpArg::Less => bdd_core::Op::Less,
        }
    }
}
