use clap::{Arg, ArgAction, Command};

use crate::consts::DEFAULT_DB;

pub const ADMIN_CMD: &str = "admin";
pub const ADMIN_LIST: &str = "list";
pub const ADMIN_RENAME: &str = "rename";
pub const ADMIN_DELETE: &str = "delete";
pub const ADMIN_CHECK: &str = "check";
pub const ADMIN_FIX: &str = "fix";

pub fn create_admin_cli() -> Command {
    Command::new(ADMIN_CMD)
        .about("Inspect, rename, delete and repair collections")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("db")
                .long("db")
                .default_value(DEFAULT_DB)
                .global(true)
                .help("Directory of the document store"),
        )
        .arg(
            Arg::new("force")
                .long("force")
                .short('f')
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Don't ask for confirmation before destructive operations"),
        )
        .subcommand(
            Command::new(ADMIN_LIST)
                .about("List collections, or show the metadata of one")
                .arg(Arg::new("collection")),
        )
        .subcommand(
            Command::new(ADMIN_RENAME)
                .about("Rename a collection")
                .arg(Arg::new("old").required(true))
                .arg(Arg::new("new").required(true)),
        )
        .subcommand(
            Command::new(ADMIN_DELETE)
                .about("Delete a collection and its metadata")
                .arg(Arg::new("collection").required(true)),
        )
        .subcommand(Command::new(ADMIN_CHECK).about("Report collections left inconsistent by an interrupted import"))
        .subcommand(
            Command::new(ADMIN_FIX)
                .about("Repair a collection left inconsistent by an interrupted import")
                .arg(Arg::new("collection").required(true)),
        )
}
