//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("tsvault")
        .about("Encrypted, sharded backup and restore for an object store and a key-value store")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("object-store")
                .long("object-store")
                .value_name("DIR")
                .help("Root directory of the object store")
                .global(true),
        )
        .arg(
            Arg::new("kv-store")
                .long("kv-store")
                .value_name("FILE")
                .help("Key-value store file")
                .global(true),
        )
        .subcommand(build_create())
        .subcommand(build_inspect())
        .subcommand(build_clear())
        .subcommand(build_restore())
}

fn build_create() -> Command {
    Command::new("create")
        .about("Back up both stores into a new archive directory")
        .arg(outputdir_arg().help("Archive directory to create (must be empty or absent)"))
        .arg(
            Arg::new("include-pool")
                .long("include-pool")
                .value_name("POOL")
                .action(ArgAction::Append)
                .help("Back up only this pool (repeatable)"),
        )
        .arg(
            Arg::new("skip-pool")
                .long("skip-pool")
                .value_name("POOL")
                .action(ArgAction::Append)
                .help("Leave this pool out (repeatable, ignored with --include-pool)"),
        )
        .arg(
            Arg::new("incremental-over")
                .long("incremental-over")
                .value_name("DIR")
                .help("Skip objects unchanged since the archive in DIR"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .help("Object fetch workers (default: 8)"),
        )
        .arg(
            Arg::new("max-file-size")
                .long("max-file-size")
                .value_name("BYTES")
                .value_parser(clap::value_parser!(u64))
                .help("Data file rollover threshold (default: 2GiB)"),
        )
        .arg(skip_ceph_arg())
        .arg(skip_etcd_arg())
}

fn build_inspect() -> Command {
    Command::new("inspect")
        .about("Summarize the contents of an archive")
        .arg(outputdir_arg().help("Archive directory"))
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("JSON output"),
        )
}

fn build_clear() -> Command {
    Command::new("clear")
        .about("Delete every object in the named pools and every key-value row")
        .arg(
            Arg::new("include-pool")
                .long("include-pool")
                .value_name("POOL")
                .action(ArgAction::Append)
                .help("Pool to empty (repeatable)"),
        )
        .arg(skip_ceph_arg())
        .arg(skip_etcd_arg())
}

fn build_restore() -> Command {
    Command::new("restore")
        .about("Replay an archive into the stores")
        .arg(outputdir_arg().help("Archive directory"))
        .arg(
            Arg::new("restore-pool")
                .long("restore-pool")
                .value_name("SRC:DST")
                .action(ArgAction::Append)
                .help("Restore objects from pool SRC into pool DST (repeatable)"),
        )
        .arg(skip_ceph_arg())
        .arg(skip_etcd_arg())
}

fn outputdir_arg() -> Arg {
    Arg::new("outputdir")
        .long("outputdir")
        .value_name("DIR")
        .required(true)
}

fn skip_ceph_arg() -> Arg {
    Arg::new("skip-ceph")
        .long("skip-ceph")
        .action(ArgAction::SetTrue)
        .help("Leave the object store alone")
}

fn skip_etcd_arg() -> Arg {
    Arg::new("skip-etcd")
        .long("skip-etcd")
        .action(ArgAction::SetTrue)
        .help("Leave the key-value store alone")
}
