use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::ArgMatches;

use vcfdb_import::{ImportConfig, import_files};
use vcfdb_store::{DocumentStore, JournalStore};
use vcfdb_vcf::VcfTextDecoder;

///
/// Settings from `--config` (or the defaults) with the command line flags
/// applied on top.
///
pub fn import_config(matches: &ArgMatches) -> Result<ImportConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ImportConfig::try_from(Path::new(path))
            .with_context(|| format!("Failed to load import settings from {}", path))?,
        None => ImportConfig::default(),
    };

    let counts = [
        ("chunk-size", &mut config.chunk_size),
        ("merger-threads", &mut config.merger_workers),
        ("loader-threads", &mut config.loader_workers),
        ("parser-buffer-size", &mut config.parser_buffer_size),
        ("merger-buffer-size", &mut config.merger_buffer_size),
        ("loader-buffer-size", &mut config.loader_buffer_size),
    ];
    for (flag, field) in counts {
        if let Some(value) = matches.get_one::<usize>(flag) {
            *field = *value;
        }
    }
    if matches.get_flag("drop-bad-records") {
        config.drop_bad_records = true;
    }
    if matches.get_flag("no-progress") {
        config.show_progress = false;
    }

    config.validate()?;
    Ok(config)
}

pub fn run_import(matches: &ArgMatches) -> Result<()> {
    let collection = matches
        .get_one::<String>("collection")
        .context("A collection name is required")?;
    let files: Vec<PathBuf> = matches
        .get_many::<String>("files")
        .context("At least one input file is required")?
        .map(PathBuf::from)
        .collect();
    let db = matches
        .get_one::<String>("db")
        .context("A store directory is required")?;
    let config = import_config(matches)?;

    let store: Arc<dyn DocumentStore> = Arc::new(
        JournalStore::open(db).with_context(|| format!("Failed to open the store at {}", db))?,
    );
    let outcome = import_files(
        store,
        collection,
        &files,
        matches.get_flag("append"),
        &VcfTextDecoder::new(),
        &config,
    )
    .with_context(|| format!("Failed to import into `{}`", collection))?;

    if !outcome.completed {
        bail!(
            "Import into `{}` did not complete. Run `vcfdb admin --db {} fix {}` before using it again",
            collection,
            db,
            collection
        );
    }

    println!(
        "Imported {} files into `{}`: {} documents in {:.1}s",
        files.len(),
        collection,
        outcome.report.imported,
        outcome.report.elapsed.as_secs_f64()
    );
    if !outcome.report.dropped.is_empty() {
        println!("Dropped {} loci that could not be merged", outcome.report.dropped.len());
    }
    Ok(())
}
