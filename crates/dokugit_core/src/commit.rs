use std::path::Path;

use anyhow::{Context, Result, bail};
use git2::{IndexEntry, IndexTime, Oid, Repository, RepositoryInitOptions, Signature, Time};

use crate::plan::{Operation, OperationKind};

const FILE_MODE_BLOB: u32 = 0o100_644;

/// Consumes the planner's operation stream strictly in order and applies
/// each operation as one atomic history entry. Any apply failure is fatal
/// to the conversion.
pub trait CommitterSink {
    fn apply(&mut self, op: &Operation) -> Result<()>;
}

/// Replays operations into a freshly initialized git repository, one
/// commit per operation, preserving the exact author identity and
/// timestamp each operation carries.
pub struct GitRepoSink {
    repo: Repository,
    parent: Option<Oid>,
    commits: usize,
}

impl std::fmt::Debug for GitRepoSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepoSink")
            .field("parent", &self.parent)
            .field("commits", &self.commits)
            .finish_non_exhaustive()
    }
}

impl GitRepoSink {
    /// Initialize a new repository at `target`. The path must not already
    /// exist; the conversion never writes into a pre-existing directory.
    pub fn create(target: &Path, branch: &str) -> Result<Self> {
        if target.exists() {
            bail!("target {} already exists", target.display());
        }
        let mut options = RepositoryInitOptions::new();
        options.initial_head(branch);
        let repo = Repository::init_opts(target, &options)
            .with_context(|| format!("failed to initialize repository {}", target.display()))?;
        Ok(Self {
            repo,
            parent: None,
            commits: 0,
        })
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Materialize the final tree into the working directory so the
    /// produced repository is clean after conversion.
    pub fn finish(self) -> Result<()> {
        let mut index = self
            .repo
            .index()
            .context("failed to open repository index")?;
        index.write().context("failed to write repository index")?;
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();
        self.repo
            .checkout_head(Some(&mut checkout))
            .context("failed to check out final tree")?;
        Ok(())
    }

    fn commit_current_index(&mut self, op: &Operation) -> Result<()> {
        let mut index = self
            .repo
            .index()
            .context("failed to open repository index")?;
        let tree_oid = index
            .write_tree()
            .context("failed to write tree from index")?;
        let tree = self
            .repo
            .find_tree(tree_oid)
            .context("failed to look up written tree")?;

        let signature = Signature::new(
            &op.author_name,
            &op.author_email,
            &Time::new(op.timestamp, 0),
        )
        .with_context(|| {
            format!(
                "invalid author identity {} <{}>",
                op.author_name, op.author_email
            )
        })?;

        let parent_commits = match self.parent {
            Some(oid) => vec![
                self.repo
                    .find_commit(oid)
                    .context("failed to look up parent commit")?,
            ],
            None => Vec::new(),
        };
        let parent_refs: Vec<&git2::Commit> = parent_commits.iter().collect();

        let commit_oid = self
            .repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                &op.message,
                &tree,
                &parent_refs,
            )
            .with_context(|| format!("failed to commit {:?}", op.message))?;
        self.parent = Some(commit_oid);
        self.commits += 1;
        Ok(())
    }
}

impl CommitterSink for GitRepoSink {
    fn apply(&mut self, op: &Operation) -> Result<()> {
        let mut index = self
            .repo
            .index()
            .context("failed to open repository index")?;
        match op.kind {
            OperationKind::Upsert => {
                let target = op
                    .target_path
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("upsert operation without a target path"))?;
                let content = op
                    .content
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("upsert operation without content"))?;
                let entry = index_entry(target, content.len());
                index
                    .add_frombuffer(&entry, content)
                    .with_context(|| format!("failed to stage {target}"))?;
            }
            OperationKind::Remove => {
                let target = op
                    .target_path
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("remove operation without a target path"))?;
                // A delete whose create was skipped under the
                // missing-snapshot rule leaves nothing to remove; the
                // commit still happens so history keeps one entry per
                // change-log record.
                if index.get_path(Path::new(target), 0).is_some() {
                    index
                        .remove_path(Path::new(target))
                        .with_context(|| format!("failed to unstage {target}"))?;
                }
            }
            OperationKind::Mark => {}
        }
        self.commit_current_index(op)
    }
}

fn index_entry(target: &str, size: usize) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: FILE_MODE_BLOB,
        uid: 0,
        gid: 0,
        file_size: size as u32,
        id: Oid::zero(),
        flags: 0,
        flags_extended: 0,
        path: target.as_bytes().to_vec(),
    }
}
