use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::ArgMatches;

use vcfdb_ledger::{Ledger, RepairKind, StoreStatus, check_store};
use vcfdb_store::{DocumentStore, JournalStore};

use crate::admin::cli::*;

fn open_ledger(db: &str) -> Result<Option<Ledger>> {
    let store: Arc<dyn DocumentStore> = Arc::new(
        JournalStore::open(db).with_context(|| format!("Failed to open the store at {}", db))?,
    );
    match check_store(store.as_ref())? {
        StoreStatus::Ready => Ok(Some(Ledger::new(store))),
        StoreStatus::Empty => Ok(None),
        StoreStatus::VersionMismatch { found } => bail!(
            "The store at {} uses data model version {}, which this version of vcfdb can't read",
            db,
            found
        ),
        StoreStatus::Foreign => bail!("The store at {} was not created by vcfdb", db),
    }
}

///
/// Ask the operator to retype `name`.
///
fn confirm(name: &str, action: &str, input: &mut impl BufRead) -> Result<()> {
    eprint!("This will {} `{}`. Type the collection name to confirm: ", action, name);
    io::stderr().flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    if answer.trim() != name {
        bail!("Confirmation did not match, nothing was changed");
    }
    Ok(())
}

pub fn run_admin(matches: &ArgMatches) -> Result<()> {
    let subcmd = matches
        .subcommand()
        .context("An admin subcommand is required")?;
    let db = matches
        .get_one::<String>("db")
        .context("A store directory is required")?;
    let force = matches.get_flag("force");

    let Some(ledger) = open_ledger(db)? else {
        println!("The store at {} holds no collections", db);
        return Ok(());
    };
    let mut stdin = io::stdin().lock();

    match subcmd {
        (ADMIN_LIST, matches) => match matches.get_one::<String>("collection") {
            Some(name) => {
                let details = ledger.collection_details(name)?;
                println!("{}", serde_json::to_string_pretty(&details.to_document()?)?);
            }
            None => {
                for name in ledger.list_collections()? {
                    println!("{}\t{}", name, ledger.collection_state(&name)?);
                }
            }
        },
        (ADMIN_RENAME, matches) => {
            let old = required(matches, "old")?;
            let new = required(matches, "new")?;
            ledger.rename_collection(old, new)?;
            println!("Renamed `{}` to `{}`", old, new);
        }
        (ADMIN_DELETE, matches) => {
            let name = required(matches, "collection")?;
            ledger.collection_details(name)?;
            if !force {
                confirm(name, "delete", &mut stdin)?;
            }
            ledger.delete_collection(name)?;
            println!("Deleted `{}`", name);
        }
        (ADMIN_CHECK, _) => {
            let bad = ledger.bad_collections()?;
            if bad.is_empty() {
                println!("All collections are consistent");
            }
            for collection in bad {
                println!("{}\t{}", collection.name, collection.reason);
            }
        }
        (ADMIN_FIX, matches) => {
            let name = required(matches, "collection")?;
            let state = ledger.collection_state(name)?;
            let Some(kind) = RepairKind::for_state(state) else {
                println!("`{}` is {}, nothing to fix", name, state);
                return Ok(());
            };
            if kind.is_destructive() && !force {
                confirm(name, &kind.to_string(), &mut stdin)?;
            }
            ledger
                .repair_collection(name, kind)
                .with_context(|| format!("Failed to {} on `{}`", kind, name))?;
            println!("Fixed `{}`: {}", name, kind);
        }
        (other, _) => unreachable!("Admin subcommand {} not found", other),
    }

    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("`{}` is required", name))
}
