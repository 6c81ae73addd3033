//! tsvault CLI: create, inspect, clear and restore archives.
//!
//! The object store and the key-value store are the local-directory
//! implementations from `tsvault_core`. Every failure is reported once, here,
//! and exits with status 1.

mod commands;
mod format;
mod parse;
mod passphrase;

use std::process;

use tracing_subscriber::EnvFilter;
use tsvault_core::{KvStore, LocalKvStore, LocalObjectStore, ObjectStore};
use tsvault_durability::{ArchiveKey, ShardConfig};
use tsvault_engine::{
    clear_stores, create_backup, inspect_archive, restore_backup, BackupConfig, BackupOptions,
    RestoreOptions,
};

use commands::build_cli;
use format::{format_backup, format_clear, format_error, format_inspect, format_restore, OutputMode};
use parse::{matches_to_action, CliAction, StoreArgs};
use passphrase::read_passphrase;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = build_cli().get_matches();
    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("{}", format_error(&e, OutputMode::Human));
            process::exit(1);
        }
    };

    let mode = match &action {
        CliAction::Inspect { json: true, .. } => OutputMode::Json,
        _ => OutputMode::Human,
    };
    match run(action) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            process::exit(1);
        }
    }
}

/// Local store handles opened from the command line.
struct Stores {
    object_store: Option<LocalObjectStore>,
    kv_store: Option<LocalKvStore>,
}

impl Stores {
    fn open(args: &StoreArgs) -> Result<Self, String> {
        let object_store = args
            .object_store
            .as_ref()
            .map(LocalObjectStore::open)
            .transpose()
            .map_err(|e| format!("Failed to open object store: {}", e))?;
        let kv_store = args
            .kv_store
            .as_ref()
            .map(LocalKvStore::open)
            .transpose()
            .map_err(|e| format!("Failed to open key-value store: {}", e))?;
        Ok(Stores {
            object_store,
            kv_store,
        })
    }

    fn objects(&self) -> Option<&dyn ObjectStore> {
        self.object_store.as_ref().map(|s| s as &dyn ObjectStore)
    }

    fn kv(&self) -> Option<&dyn KvStore> {
        self.kv_store.as_ref().map(|s| s as &dyn KvStore)
    }
}

/// Execute one action and render its report.
fn run(action: CliAction) -> Result<String, String> {
    match action {
        CliAction::Create {
            output_dir,
            stores,
            pools,
            incremental_over,
            workers,
            max_file_size,
        } => {
            let stores = Stores::open(&stores)?;
            let mut config = BackupConfig::default();
            if let Some(workers) = workers {
                config = config.with_workers(workers);
            }
            if let Some(size) = max_file_size {
                config = config.with_shard(ShardConfig::new().with_max_file_size(size));
            }
            config.validate().map_err(|e| e.to_string())?;

            let key = ArchiveKey::derive(&read_passphrase(true)?);
            let mut options = BackupOptions::new(output_dir)
                .with_pools(pools)
                .with_config(config);
            options.object_store = stores.objects();
            options.kv_store = stores.kv();
            if let Some(base) = incremental_over {
                options = options.incremental_over(base);
            }
            let report = create_backup(&key, &options).map_err(|e| e.to_string())?;
            Ok(format_backup(&report))
        }
        CliAction::Inspect { archive_dir, json } => {
            let key = ArchiveKey::derive(&read_passphrase(false)?);
            let report = inspect_archive(&key, &archive_dir).map_err(|e| e.to_string())?;
            let mode = if json { OutputMode::Json } else { OutputMode::Human };
            Ok(format_inspect(&report, mode))
        }
        CliAction::Clear { stores, pools } => {
            let stores = Stores::open(&stores)?;
            let report =
                clear_stores(stores.objects(), stores.kv(), &pools).map_err(|e| e.to_string())?;
            Ok(format_clear(&report))
        }
        CliAction::Restore {
            archive_dir,
            stores,
            pool_map,
        } => {
            let stores = Stores::open(&stores)?;
            let key = ArchiveKey::derive(&read_passphrase(false)?);
            let mut options = RestoreOptions::new(archive_dir).with_pool_map(pool_map);
            options.object_store = stores.objects();
            options.kv_store = stores.kv();
            let report = restore_backup(&key, &options).map_err(|e| e.to_string())?;
            Ok(format_restore(&report))
        }
    }
}
