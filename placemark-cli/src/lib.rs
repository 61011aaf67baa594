//! Command-line interface for the Placemark spatial record store.
#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use placemark_core::WGS84;

mod demo;
mod error;

pub use error::CliError;

/// Run the Placemark CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    env_logger::init();
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Demo(args) => demo::run_demo(&args),
        Command::List(args) => demo::run_list(&args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "placemark",
    about = "Demonstrates spatial record persistence over SQLite",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full demonstration: schema, seven-shape insert, proximity
    /// query, single update, batch update, and bulk delete.
    Demo(DemoArgs),
    /// Print every stored record as a JSON line.
    List(ListArgs),
}

/// CLI arguments for the `demo` subcommand.
#[derive(Debug, Clone, Parser)]
pub(crate) struct DemoArgs {
    /// Path of the SQLite database to create or reuse.
    #[arg(long, value_name = "path", default_value = "placemark.db")]
    pub(crate) database: PathBuf,
    /// SRID enforced for every stored geometry.
    #[arg(long, value_name = "epsg", default_value_t = WGS84)]
    pub(crate) srid: i32,
}

/// CLI arguments for the `list` subcommand.
#[derive(Debug, Clone, Parser)]
pub(crate) struct ListArgs {
    /// Path of the SQLite database to read.
    #[arg(long, value_name = "path", default_value = "placemark.db")]
    pub(crate) database: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn demo_defaults_to_wgs84() {
        let cli = Cli::try_parse_from(["placemark", "demo"]).expect("parse");
        let Command::Demo(args) = cli.command else {
            panic!("expected demo subcommand");
        };
        assert_eq!(args.srid, WGS84);
        assert_eq!(args.database, PathBuf::from("placemark.db"));
    }

    #[rstest]
    fn list_accepts_database_flag() {
        let cli =
            Cli::try_parse_from(["placemark", "list", "--database", "/tmp/x.db"]).expect("parse");
        let Command::List(args) = cli.command else {
            panic!("expected list subcommand");
        };
        assert_eq!(args.database, PathBuf::from("/tmp/x.db"));
    }
}
