use clap::{Args, Parser, Subcommand};

use crate::backend_kind::BackendKind;

#[derive(Parser, Debug)]
#[command(name = "toolup", version)]
#[command(about = "Keep python, node, go and rust toolchains current", long_about = None)]
pub struct Cli {
    /// Show debug output on the terminal.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Upgrade every toolchain to its latest release and remove old versions.
    Update(UpdateArgs),
    /// Report what each toolchain resolves to. Changes nothing.
    Verify,
    /// One line per toolchain with installed and package counts.
    Versions,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateArgs {
    /// Proceed with upgrades that break installed packages without asking.
    #[arg(long, short)]
    pub yes: bool,

    /// Keep every installed version.
    #[arg(long)]
    pub no_cleanup: bool,

    /// Only process these backends.
    #[arg(long, value_enum, value_delimiter = ',')]
    pub only: Vec<BackendKind>,
}

impl UpdateArgs {
    /// Backends selected for this run, in update order.
    pub fn selected(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|kind| self.only.is_empty() || self.only.contains(kind))
            .collect()
    }
}
