use clap::{Arg, ArgAction, Command, value_parser};

use crate::consts::DEFAULT_DB;

pub const IMPORT_CMD: &str = "import";

fn count_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_parser(value_parser!(usize))
        .help(help)
}

pub fn create_import_cli() -> Command {
    Command::new(IMPORT_CMD)
        .about("Import sorted VCF files into a collection, one document per locus")
        .arg(
            Arg::new("collection")
                .required(true)
                .help("Name of the collection to create or append to"),
        )
        .arg(
            Arg::new("files")
                .required(true)
                .num_args(1..)
                .help("VCF files, plain or gzip/bgzip compressed, sorted by chromosome and position"),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .default_value(DEFAULT_DB)
                .help("Directory of the document store"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("TOML file with import settings; flags override its values"),
        )
        .arg(
            Arg::new("append")
                .long("append")
                .action(ArgAction::SetTrue)
                .help("Add the files to an existing collection"),
        )
        .arg(
            Arg::new("no-progress")
                .long("no-progress")
                .action(ArgAction::SetTrue)
                .help("Don't show the progress spinner"),
        )
        .arg(
            Arg::new("drop-bad-records")
                .long("drop-bad-records")
                .action(ArgAction::SetTrue)
                .help("Skip loci that can't be merged instead of aborting"),
        )
        .arg(count_arg("chunk-size", "Documents per bulk write"))
        .arg(count_arg("merger-threads", "Number of merge workers"))
        .arg(count_arg("loader-threads", "Number of load workers"))
        .arg(count_arg("parser-buffer-size", "Capacity of each parser queue"))
        .arg(count_arg("merger-buffer-size", "Capacity of the merger queue"))
        .arg(count_arg("loader-buffer-size", "Capacity of the loader queue"))
}
