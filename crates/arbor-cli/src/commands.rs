use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;
use arbor_merge::{
    ConflictResolver, MergeConfig, MergeEngine, MergeLabels, PolicyResolver, PromptResolver,
};
use arbor_store::{Commit, LooseObjectStore, ObjectKind, ObjectStore};
use arbor_types::{ObjectId, Signature};
use colored::Colorize;

use crate::cli::*;
use crate::snapshot::import_dir;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let store = LooseObjectStore::open(&cli.store)
        .with_context(|| format!("opening object store at {}", cli.store.display()))?;
    let session = Session {
        store: &store,
        config: cli.config.as_deref(),
        batch: cli.batch,
    };

    match cli.command {
        Command::Import(args) => cmd_import(&session, args),
        Command::Commit(args) => cmd_commit(&session, args),
        Command::Show(args) => cmd_show(&session, args),
        Command::MergeTree(args) => cmd_merge_tree(&session, args),
        Command::Rebase(args) => cmd_rebase(&session, args),
    }
}

struct Session<'a> {
    store: &'a dyn ObjectStore,
    config: Option<&'a Path>,
    batch: Option<BatchPolicy>,
}

impl Session<'_> {
    fn merge_config(&self) -> anyhow::Result<MergeConfig> {
        match self.config {
            Some(path) => MergeConfig::load(path)
                .with_context(|| format!("loading config {}", path.display())),
            None => Ok(MergeConfig::default()),
        }
    }

    /// Prompting resolver with the interactive fallback tool, or a batch
    /// policy with no fallback.
    fn resolver(&self) -> (Box<dyn ConflictResolver>, bool) {
        match self.batch {
            Some(policy) => (Box::new(PolicyResolver::new(policy.into())), false),
            None => (Box::new(PromptResolver::new()), true),
        }
    }
}

fn cmd_import(session: &Session<'_>, args: ImportArgs) -> anyhow::Result<()> {
    let id = import_dir(session.store, &args.path)
        .with_context(|| format!("importing {}", args.path.display()))?;
    eprintln!("{} Imported {}", "✓".green().bold(), args.path.display().to_string().bold());
    println!("{id}");
    Ok(())
}

fn cmd_commit(session: &Session<'_>, args: CommitArgs) -> anyhow::Result<()> {
    session
        .store
        .read_tree(&args.tree)
        .with_context(|| format!("tree {}", args.tree.short_hex()))?;
    for parent in &args.parents {
        session
            .store
            .read_commit(parent)
            .with_context(|| format!("parent {}", parent.short_hex()))?;
    }

    let commit = Commit {
        tree: args.tree,
        parents: args.parents,
        message: args.message,
        author: Signature::author_from_env(),
        committer: Signature::committer_from_env(),
    };
    let id = session.store.write_commit(&commit)?;
    eprintln!("{} Committed {}", "✓".green().bold(), commit.summary());
    println!("{id}");
    Ok(())
}

fn cmd_show(session: &Session<'_>, args: ShowArgs) -> anyhow::Result<()> {
    let object = session
        .store
        .read_existing(&args.id)
        .with_context(|| format!("object {}", args.id.short_hex()))?;

    match object.kind {
        ObjectKind::Blob => {
            io::stdout().write_all(&object.data)?;
        }
        ObjectKind::Tree => {
            let tree = session.store.read_tree(&args.id)?;
            for (name, entry) in &tree.entries {
                println!(
                    "{} {:<15} {}\t{}",
                    entry.mode,
                    entry.mode.describe().dimmed(),
                    entry.id.to_string().yellow(),
                    String::from_utf8_lossy(name)
                );
            }
        }
        ObjectKind::Commit => {
            let commit = session.store.read_commit(&args.id)?;
            println!("{} {}", "commit".yellow().bold(), args.id.to_string().yellow());
            println!("tree      {}", commit.tree);
            for parent in &commit.parents {
                println!("parent    {parent}");
            }
            println!("author    {}", commit.author);
            println!("committer {}", commit.committer);
            if let Ok(when) = commit.author.datetime() {
                println!("date      {}", when.to_rfc2822());
            }
            println!();
            for line in commit.message.lines() {
                println!("    {line}");
            }
        }
    }
    Ok(())
}

fn cmd_merge_tree(session: &Session<'_>, args: MergeTreeArgs) -> anyhow::Result<()> {
    let config = session.merge_config()?;
    let (mut resolver, interactive) = session.resolver();
    let mut engine =
        MergeEngine::from_config(session.store, resolver.as_mut(), &config, interactive);

    let merged = engine
        .merge_trees(&MergeLabels::default(), &args.current, &args.base, &args.other)
        .context("merge failed")?;
    eprintln!("{} Merged trees", "✓".green().bold());
    println!("{merged}");
    Ok(())
}

fn cmd_rebase(session: &Session<'_>, args: RebaseArgs) -> anyhow::Result<()> {
    let config = session.merge_config()?;
    let (mut resolver, interactive) = session.resolver();
    let mut engine =
        MergeEngine::from_config(session.store, resolver.as_mut(), &config, interactive);

    let tip: ObjectId = engine
        .rebase_stack(&args.commits, &args.onto)
        .context("rebase failed")?;
    eprintln!(
        "{} Rebased {} commit(s) onto {}",
        "✓".green().bold(),
        args.commits.len(),
        args.onto.short_hex().yellow()
    );
    println!("{tip}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;

    fn run(store: &Path, args: &[&str]) -> anyhow::Result<()> {
        use clap::Parser;
        let mut argv = vec!["arbor", "--store"];
        let store = store.to_str().unwrap();
        argv.push(store);
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv)?)
    }

    fn project(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        for (name, body) in files {
            fs::write(dir.join(name), body).unwrap();
        }
        dir.to_path_buf()
    }

    #[test]
    fn merge_tree_in_batch_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let store_dir = tmp.path().join("store");
        let store = LooseObjectStore::open(&store_dir).unwrap();

        let tree = |name: &str, body: &str| {
            let dir = project(&tmp.path().join(name), &[("f", body)]);
            import_dir(&store, &dir).unwrap()
        };
        let base = tree("base", "A\nB\n");
        let current = tree("current", "A\nB2\n");
        let other = tree("other", "X\nB\n");

        run(
            &store_dir,
            &[
                "--batch",
                "abort",
                "merge-tree",
                &current.to_hex(),
                &base.to_hex(),
                &other.to_hex(),
            ],
        )
        .unwrap();
    }

    #[test]
    fn batch_abort_fails_on_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        let store_dir = tmp.path().join("store");
        let store = LooseObjectStore::open(&store_dir).unwrap();

        let base = import_dir(&store, &project(&tmp.path().join("b"), &[("f", "1\n"), ("g", "g\n")])).unwrap();
        let current = import_dir(&store, &project(&tmp.path().join("c"), &[("f", "2\n")])).unwrap();
        let other = import_dir(&store, &project(&tmp.path().join("o"), &[("f", "1\n"), ("g", "G\n")])).unwrap();

        let err = run(
            &store_dir,
            &["--batch", "abort", "merge-tree", &current.to_hex(), &base.to_hex(), &other.to_hex()],
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("unresolved conflict at 'g'"));
    }

    #[test]
    fn commit_and_rebase() {
        let tmp = tempfile::tempdir().unwrap();
        let store_dir = tmp.path().join("store");
        let store = LooseObjectStore::open(&store_dir).unwrap();

        let tree = |name: &str, files: &[(&str, &str)]| {
            import_dir(&store, &project(&tmp.path().join(name), files)).unwrap()
        };
        let commit = |tree: ObjectId, parents: Vec<ObjectId>| {
            store
                .write_commit(&Commit {
                    tree,
                    parents,
                    message: "m".into(),
                    author: Signature::new("a", "a@example.com", 0, 0),
                    committer: Signature::new("a", "a@example.com", 0, 0),
                })
                .unwrap()
        };
        let p0 = commit(tree("p0", &[("f", "f\n")]), vec![]);
        let c = commit(tree("c", &[("f", "f\n"), ("c", "c\n")]), vec![p0]);
        let n = commit(tree("n", &[("f", "F\n")]), vec![p0]);

        run(&store_dir, &["--batch", "abort", "rebase", &c.to_hex(), "--onto", &n.to_hex()]).unwrap();
        run(&store_dir, &["commit", "--tree", &store.read_commit(&c).unwrap().tree.to_hex(), "-p", &n.to_hex(), "-m", "manual"]).unwrap();
        run(&store_dir, &["show", &c.to_hex()]).unwrap();
    }

    #[test]
    fn commit_rejects_unknown_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = ObjectId::from_bytes(b"missing").to_hex();
        assert!(run(tmp.path(), &["commit", "--tree", &missing, "-m", "x"]).is_err());
    }

    #[test]
    fn import_rejects_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = tmp.path().join("store");
        let missing = tmp.path().join("nope");
        assert!(run(&store, &["import", missing.to_str().unwrap()]).is_err());
    }
}
