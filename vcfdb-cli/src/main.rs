mod admin;
mod import;

use anyhow::Result;
use clap::Command;
use env_logger::Env;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const BIN_NAME: &str = "vcfdb";
    /// Store directory used when `--db` is not given.
    pub const DEFAULT_DB: &str = "VCF";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .about("Merge sorted VCF files into one document per locus and manage the resulting collections.")
        .subcommand_required(true)
        .subcommand(import::cli::create_import_cli())
        .subcommand(admin::cli::create_admin_cli())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let app = build_parser();
    let matches = app.get_matches();

    match matches.subcommand() {
        //
        // IMPORT
        //
        Some((import::cli::IMPORT_CMD, matches)) => {
            import::handlers::run_import(matches)?;
        }

        //
        // ADMIN
        //
        Some((admin::cli::ADMIN_CMD, matches)) => {
            admin::handlers::run_admin(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}
