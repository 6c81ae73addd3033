//! ArgMatches → CliAction conversion.
//!
//! All argument validation that does not need a store happens here, so a
//! malformed command line fails before the passphrase prompt.

use std::path::PathBuf;

use clap::ArgMatches;
use tsvault_engine::{PoolMap, PoolSelection};

/// The stores a command operates on. `None` means skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreArgs {
    /// Object store root, unless `--skip-ceph`
    pub object_store: Option<PathBuf>,
    /// Key-value store file, unless `--skip-etcd`
    pub kv_store: Option<PathBuf>,
}

/// The result of parsing the command line.
#[derive(Debug)]
pub enum CliAction {
    /// Back up into a new archive.
    Create {
        output_dir: PathBuf,
        stores: StoreArgs,
        pools: PoolSelection,
        incremental_over: Option<PathBuf>,
        workers: Option<usize>,
        max_file_size: Option<u64>,
    },
    /// Summarize an archive.
    Inspect { archive_dir: PathBuf, json: bool },
    /// Empty pools and the key-value store.
    Clear { stores: StoreArgs, pools: Vec<String> },
    /// Replay an archive.
    Restore {
        archive_dir: PathBuf,
        stores: StoreArgs,
        pool_map: PoolMap,
    },
}

/// Convert parsed arguments to an action.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    match matches.subcommand() {
        Some(("create", sub)) => Ok(CliAction::Create {
            output_dir: required_path(sub, "outputdir")?,
            stores: store_args(sub)?,
            pools: PoolSelection::new(strings(sub, "include-pool"), strings(sub, "skip-pool")),
            incremental_over: sub.get_one::<String>("incremental-over").map(PathBuf::from),
            workers: sub.get_one::<usize>("workers").copied(),
            max_file_size: sub.get_one::<u64>("max-file-size").copied(),
        }),
        Some(("inspect", sub)) => Ok(CliAction::Inspect {
            archive_dir: required_path(sub, "outputdir")?,
            json: sub.get_flag("json"),
        }),
        Some(("clear", sub)) => Ok(CliAction::Clear {
            stores: store_args(sub)?,
            pools: strings(sub, "include-pool"),
        }),
        Some(("restore", sub)) => {
            let pool_map =
                PoolMap::parse(&strings(sub, "restore-pool")).map_err(|e| e.to_string())?;
            Ok(CliAction::Restore {
                archive_dir: required_path(sub, "outputdir")?,
                stores: store_args(sub)?,
                pool_map,
            })
        }
        Some((name, _)) => Err(format!("Unknown command: {}", name)),
        None => Err("No command given".to_string()),
    }
}

fn required_path(sub: &ArgMatches, name: &str) -> Result<PathBuf, String> {
    sub.get_one::<String>(name)
        .map(PathBuf::from)
        .ok_or_else(|| format!("--{} is required", name))
}

fn strings(sub: &ArgMatches, name: &str) -> Vec<String> {
    sub.get_many::<String>(name)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

/// Resolve store locations against the skip flags.
fn store_args(sub: &ArgMatches) -> Result<StoreArgs, String> {
    let skip_ceph = sub.get_flag("skip-ceph");
    let skip_etcd = sub.get_flag("skip-etcd");
    if skip_ceph && skip_etcd {
        return Err("--skip-ceph and --skip-etcd together leave nothing to do".to_string());
    }

    let object_store = if skip_ceph {
        None
    } else {
        Some(
            sub.get_one::<String>("object-store")
                .map(PathBuf::from)
                .ok_or("--object-store is required unless --skip-ceph is given")?,
        )
    };
    let kv_store = if skip_etcd {
        None
    } else {
        Some(
            sub.get_one::<String>("kv-store")
                .map(PathBuf::from)
                .ok_or("--kv-store is required unless --skip-etcd is given")?,
        )
    };
    Ok(StoreArgs {
        object_store,
        kv_store,
    })
}
