use std::path::PathBuf;

use arbor_merge::ResolutionPolicy;
use arbor_types::ObjectId;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "arbor",
    about = "Arbor: index-free three-way tree merge over a content-addressed store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Object store directory
    #[arg(long, global = true, default_value = ".arbor")]
    pub store: PathBuf,

    /// TOML file with a [merge] table
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Settle every conflict with this policy instead of prompting
    #[arg(long, global = true)]
    pub batch: Option<BatchPolicy>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum BatchPolicy {
    TakeCurrent,
    TakeOther,
    Abort,
}

impl From<BatchPolicy> for ResolutionPolicy {
    fn from(policy: BatchPolicy) -> Self {
        match policy {
            BatchPolicy::TakeCurrent => Self::TakeCurrent,
            BatchPolicy::TakeOther => Self::TakeOther,
            BatchPolicy::Abort => Self::Abort,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Snapshot a directory into the store and print its tree id
    Import(ImportArgs),
    /// Create a commit for a tree
    Commit(CommitArgs),
    /// Print a blob, tree, or commit
    Show(ShowArgs),
    /// Three-way merge of trees; prints the merged tree id
    MergeTree(MergeTreeArgs),
    /// Replay a commit onto a new parent; prints the new commit id
    Rebase(RebaseArgs),
}

#[derive(Args)]
pub struct ImportArgs {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct CommitArgs {
    #[arg(long)]
    pub tree: ObjectId,
    #[arg(short, long = "parent")]
    pub parents: Vec<ObjectId>,
    #[arg(short, long)]
    pub message: String,
}

#[derive(Args)]
pub struct ShowArgs {
    pub id: ObjectId,
}

#[derive(Args)]
pub struct MergeTreeArgs {
    pub current: ObjectId,
    pub base: ObjectId,
    pub other: ObjectId,
}

#[derive(Args)]
pub struct RebaseArgs {
    /// Commit to move; further commits are replayed after it in order
    #[arg(required = true)]
    pub commits: Vec<ObjectId>,
    #[arg(long)]
    pub onto: ObjectId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(seed: &str) -> String {
        ObjectId::from_bytes(seed.as_bytes()).to_hex()
    }

    #[test]
    fn parse_import() {
        let cli = Cli::try_parse_from(["arbor", "import", "src"]).unwrap();
        if let Command::Import(args) = cli.command {
            assert_eq!(args.path, PathBuf::from("src"));
        } else {
            panic!("wrong command");
        }
        assert_eq!(cli.store, PathBuf::from(".arbor"));
        assert!(cli.batch.is_none());
    }

    #[test]
    fn parse_commit_with_parents() {
        let cli = Cli::try_parse_from([
            "arbor", "commit", "--tree", &id("t"), "-p", &id("a"), "--parent", &id("b"), "-m", "msg",
        ])
        .unwrap();
        if let Command::Commit(args) = cli.command {
            assert_eq!(args.tree.to_hex(), id("t"));
            assert_eq!(args.parents.len(), 2);
            assert_eq!(args.message, "msg");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_merge_tree() {
        let cli = Cli::try_parse_from(["arbor", "merge-tree", &id("c"), &id("b"), &id("o")]).unwrap();
        if let Command::MergeTree(args) = cli.command {
            assert_eq!(args.base.to_hex(), id("b"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_rebase() {
        let cli =
            Cli::try_parse_from(["arbor", "rebase", &id("c1"), &id("c2"), "--onto", &id("n")]).unwrap();
        if let Command::Rebase(args) = cli.command {
            assert_eq!(args.commits.len(), 2);
            assert_eq!(args.onto.to_hex(), id("n"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn rebase_needs_a_commit() {
        assert!(Cli::try_parse_from(["arbor", "rebase", "--onto", &id("n")]).is_err());
    }

    #[test]
    fn parse_globals() {
        let cli = Cli::try_parse_from([
            "arbor", "-v", "--store", "/tmp/s", "--config", "arbor.toml", "--batch", "take-other",
            "show", &id("x"),
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.store, PathBuf::from("/tmp/s"));
        assert_eq!(cli.config, Some(PathBuf::from("arbor.toml")));
        assert_eq!(cli.batch, Some(BatchPolicy::TakeOther));
        assert_eq!(
            ResolutionPolicy::from(BatchPolicy::TakeOther),
            ResolutionPolicy::TakeOther
        );
    }

    #[test]
    fn bad_object_id_is_rejected() {
        assert!(Cli::try_parse_from(["arbor", "show", "not-hex"]).is_err());
    }
}
