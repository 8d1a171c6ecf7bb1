use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Heuristic,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Heuristic => "heuristic",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub wiki_root: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub cwd: PathBuf,
}

impl ResolutionContext {
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        Ok(Self { cwd })
    }
}

/// Resolved layout of a DokuWiki source tree. All inputs are read-only;
/// the conversion never writes under `wiki_root`.
#[derive(Debug, Clone)]
pub struct SourcePaths {
    pub wiki_root: PathBuf,
    pub pages_dir: PathBuf,
    pub meta_dir: PathBuf,
    pub attic_dir: PathBuf,
    pub media_dir: PathBuf,
    pub auth_path: PathBuf,
    pub config_path: PathBuf,
    pub root_source: ValueSource,
    pub config_source: ValueSource,
}

impl SourcePaths {
    pub fn diagnostics(&self) -> String {
        format!(
            "wiki_root={} ({})\npages_dir={}\nmeta_dir={}\nattic_dir={}\nmedia_dir={}\nauth_path={}\nconfig_path={} ({})",
            normalize_for_display(&self.wiki_root),
            self.root_source.as_str(),
            normalize_for_display(&self.pages_dir),
            normalize_for_display(&self.meta_dir),
            normalize_for_display(&self.attic_dir),
            normalize_for_display(&self.media_dir),
            normalize_for_display(&self.auth_path),
            normalize_for_display(&self.config_path),
            self.config_source.as_str(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct SourceStatus {
    pub wiki_root_exists: bool,
    pub pages_exists: bool,
    pub meta_exists: bool,
    pub attic_exists: bool,
    pub media_exists: bool,
    pub auth_exists: bool,
    pub config_exists: bool,
    pub warnings: Vec<String>,
}

pub fn resolve_source(
    context: &ResolutionContext,
    overrides: &PathOverrides,
) -> Result<SourcePaths> {
    resolve_source_with_lookup(context, overrides, |key| env::var(key).ok())
}

pub(crate) fn resolve_source_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: F,
) -> Result<SourcePaths>
where
    F: Fn(&str) -> Option<String>,
{
    let (wiki_root, root_source) = resolve_wiki_root(context, overrides, &lookup_env);

    let data_dir = wiki_root.join("data");
    let pages_dir = data_dir.join("pages");
    let meta_dir = data_dir.join("meta");
    let attic_dir = data_dir.join("attic");
    let media_dir = data_dir.join("media");
    let auth_path = wiki_root.join("conf").join("users.auth.php");

    let (config_path, config_source) = if let Some(path) = overrides.config.as_deref() {
        (absolutize(path, &context.cwd), ValueSource::Flag)
    } else if let Some(value) = lookup_env("DOKUGIT_CONFIG") {
        (
            absolutize(Path::new(value.trim()), &context.cwd),
            ValueSource::Env,
        )
    } else {
        (wiki_root.join("dokugit.toml"), ValueSource::Default)
    };

    Ok(SourcePaths {
        wiki_root,
        pages_dir,
        meta_dir,
        attic_dir,
        media_dir,
        auth_path,
        config_path,
        root_source,
        config_source,
    })
}

pub fn inspect_source(paths: &SourcePaths) -> Result<SourceStatus> {
    let wiki_root_exists = paths.wiki_root.exists();
    let pages_exists = paths.pages_dir.exists();
    let meta_exists = paths.meta_dir.exists();
    let attic_exists = paths.attic_dir.exists();
    let media_exists = paths.media_dir.exists();
    let auth_exists = paths.auth_path.exists();
    let config_exists = paths.config_path.exists();

    if wiki_root_exists {
        fs::read_dir(&paths.wiki_root)
            .with_context(|| format!("failed to read {}", paths.wiki_root.display()))?;
    }

    let mut warnings = Vec::new();
    if !media_exists {
        warnings.push("data/media/ is missing; no media files will be imported".to_string());
    }
    if !auth_exists {
        warnings.push(
            "conf/users.auth.php is missing; all authors will use synthetic identities"
                .to_string(),
        );
    }
    if !pages_exists {
        warnings.push("data/pages/ is missing; current page content cannot be inspected".to_string());
    }

    Ok(SourceStatus {
        wiki_root_exists,
        pages_exists,
        meta_exists,
        attic_exists,
        media_exists,
        auth_exists,
        config_exists,
        warnings,
    })
}

pub fn ensure_ready_for_convert(paths: &SourcePaths, status: &SourceStatus) -> Result<()> {
    if !status.meta_exists || !status.attic_exists {
        bail!(
            "Source tree is not a readable DokuWiki data layout.\nRequired paths:\n  - {} ({})\n  - {} ({})\nPass --wiki-root pointing at the DokuWiki installation root.",
            normalize_for_display(&paths.meta_dir),
            if status.meta_exists { "ok" } else { "missing" },
            normalize_for_display(&paths.attic_dir),
            if status.attic_exists { "ok" } else { "missing" },
        );
    }
    Ok(())
}

fn resolve_wiki_root<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: &F,
) -> (PathBuf, ValueSource)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = overrides.wiki_root.as_deref() {
        return (absolutize(path, &context.cwd), ValueSource::Flag);
    }
    if let Some(value) = lookup_env("DOKUGIT_WIKI_ROOT") {
        return (
            absolutize(Path::new(value.trim()), &context.cwd),
            ValueSource::Env,
        );
    }
    if let Some(root) = detect_wiki_root_heuristic(&context.cwd) {
        return (root, ValueSource::Heuristic);
    }
    (context.cwd.clone(), ValueSource::Default)
}

/// Walk cwd ancestors looking for a directory that contains data/meta,
/// the change-log root every conversion needs.
fn detect_wiki_root_heuristic(cwd: &Path) -> Option<PathBuf> {
    let mut cursor = Some(cwd);
    while let Some(current) = cursor {
        if current.join("data").join("meta").is_dir() {
            return Some(current.to_path_buf());
        }
        cursor = current.parent();
    }
    None
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

pub fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use tempfile::tempdir;

    use super::{
        PathOverrides, ResolutionContext, ValueSource, ensure_ready_for_convert, inspect_source,
        resolve_source_with_lookup,
    };

    #[test]
    fn resolve_prefers_flag_over_env() {
        let temp = tempdir().expect("tempdir");
        let cwd = temp.path().join("cwd");
        let from_flag = temp.path().join("flag-root");
        fs::create_dir_all(&cwd).expect("create cwd");

        let overrides = PathOverrides {
            wiki_root: Some(from_flag.clone()),
            ..PathOverrides::default()
        };
        let context = ResolutionContext { cwd };
        let env = HashMap::from([(
            "DOKUGIT_WIKI_ROOT".to_string(),
            temp.path().join("env-root").to_string_lossy().to_string(),
        )]);

        let resolved = resolve_source_with_lookup(&context, &overrides, |key| env.get(key).cloned())
            .expect("resolve");
        assert_eq!(resolved.wiki_root, from_flag);
        assert_eq!(resolved.root_source, ValueSource::Flag);
    }

    #[test]
    fn resolve_finds_wiki_root_from_nested_cwd() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("wiki");
        let nested = root.join("data").join("pages").join("ns");
        fs::create_dir_all(root.join("data").join("meta")).expect("create meta");
        fs::create_dir_all(&nested).expect("create nested");

        let context = ResolutionContext { cwd: nested };
        let resolved =
            resolve_source_with_lookup(&context, &PathOverrides::default(), |_| None)
                .expect("resolve");
        assert_eq!(resolved.wiki_root, root);
        assert_eq!(resolved.root_source, ValueSource::Heuristic);
        assert_eq!(resolved.meta_dir, root.join("data").join("meta"));
    }

    #[test]
    fn resolve_derives_dokuwiki_layout() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("wiki");
        let context = ResolutionContext {
            cwd: temp.path().to_path_buf(),
        };
        let overrides = PathOverrides {
            wiki_root: Some(root.clone()),
            ..PathOverrides::default()
        };
        let resolved =
            resolve_source_with_lookup(&context, &overrides, |_| None).expect("resolve");
        assert_eq!(resolved.attic_dir, root.join("data").join("attic"));
        assert_eq!(resolved.media_dir, root.join("data").join("media"));
        assert_eq!(
            resolved.auth_path,
            root.join("conf").join("users.auth.php")
        );
        assert_eq!(resolved.config_path, root.join("dokugit.toml"));
        assert_eq!(resolved.config_source, ValueSource::Default);
    }

    #[test]
    fn convert_readiness_fails_without_meta_and_attic() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("wiki");
        fs::create_dir_all(&root).expect("create root");
        let context = ResolutionContext { cwd: root.clone() };
        let overrides = PathOverrides {
            wiki_root: Some(root),
            ..PathOverrides::default()
        };
        let paths =
            resolve_source_with_lookup(&context, &overrides, |_| None).expect("resolve");
        let status = inspect_source(&paths).expect("inspect");
        let err = ensure_ready_for_convert(&paths, &status).expect_err("must fail");
        assert!(
            err.to_string()
                .contains("not a readable DokuWiki data layout")
        );
    }

    #[test]
    fn inspect_warns_on_missing_auth_and_media() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("wiki");
        fs::create_dir_all(root.join("data").join("meta")).expect("create meta");
        fs::create_dir_all(root.join("data").join("attic")).expect("create attic");
        let context = ResolutionContext { cwd: root.clone() };
        let overrides = PathOverrides {
            wiki_root: Some(root),
            ..PathOverrides::default()
        };
        let paths =
            resolve_source_with_lookup(&context, &overrides, |_| None).expect("resolve");
        let status = inspect_source(&paths).expect("inspect");
        assert!(status.meta_exists);
        assert!(!status.auth_exists);
        assert!(status.warnings.len() >= 2);
        ensure_ready_for_convert(&paths, &status).expect("ready despite warnings");
    }
}
