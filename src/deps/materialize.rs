//! Copy cached dependencies into a project tree

use crate::cache::naming::validate_name;
use crate::cache::tree::copy_tree;
use crate::cache::GlobalCache;
use crate::deps::registry::Registry;
use crate::error::{TpoError, TpoResult};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Library root inside a project
pub const LIB_DIR: &str = "lib";

/// Platform root inside a project
pub const PLATFORM_DIR: &str = "platforms";

/// A dependency that could not be materialized
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializeFailure {
    pub name: String,
    pub error: String,
    /// A re-run may succeed (lock timeout or network failure)
    pub retryable: bool,
}

/// Outcome of materializing a batch of dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaterializeReport {
    /// Copied in by this call
    pub materialized: Vec<PathBuf>,
    /// Already present from an earlier run
    pub reused: Vec<PathBuf>,
    pub failed: Vec<MaterializeFailure>,
}

impl MaterializeReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: MaterializeReport) {
        self.materialized.extend(other.materialized);
        self.reused.extend(other.reused);
        self.failed.extend(other.failed);
    }
}

enum Outcome {
    Materialized(PathBuf),
    Reused(PathBuf),
}

/// Places global cache artifacts into projects as plain directory copies
#[derive(Debug, Clone)]
pub struct Materializer {
    cache: GlobalCache,
    registry: Registry,
    branches: Vec<String>,
}

impl Materializer {
    pub fn new(cache: GlobalCache, registry: Registry) -> Self {
        Self {
            cache,
            registry,
            branches: Vec::new(),
        }
    }

    /// Candidate branches passed to the global cache (default list if empty)
    pub fn with_branches(mut self, branches: Vec<String>) -> Self {
        self.branches = branches;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Copy each library into `<project_dir>/lib/<name>`.
    ///
    /// Libraries already present are left alone. A failing name is logged
    /// and recorded; the others still proceed.
    pub fn materialize(&self, names: &[String], project_dir: &Path) -> MaterializeReport {
        let root = project_dir.join(LIB_DIR);
        self.materialize_into(names, &root, |name| self.registry.resolve_url(name))
    }

    /// Copy each platform into `<project_dir>/platforms/<name>`. Platform
    /// names must be known to the registry.
    pub fn materialize_platforms(&self, names: &[String], project_dir: &Path) -> MaterializeReport {
        let root = project_dir.join(PLATFORM_DIR);
        self.materialize_into(names, &root, |name| self.registry.platform_url(name))
    }

    fn materialize_into(
        &self,
        names: &[String],
        root: &Path,
        resolve: impl Fn(&str) -> TpoResult<String>,
    ) -> MaterializeReport {
        let mut report = MaterializeReport::default();

        for name in names {
            match self.materialize_one(name, root, &resolve) {
                Ok(Outcome::Materialized(path)) => report.materialized.push(path),
                Ok(Outcome::Reused(path)) => report.reused.push(path),
                Err(e) => {
                    error!("Failed to materialize dependency '{}': {}", name, e);
                    report.failed.push(MaterializeFailure {
                        name: name.clone(),
                        error: e.to_string(),
                        retryable: e.is_retryable(),
                    });
                }
            }
        }

        info!(
            materialized = report.materialized.len(),
            reused = report.reused.len(),
            failed = report.failed.len(),
            "Dependencies ready"
        );
        report
    }

    fn materialize_one(
        &self,
        name: &str,
        root: &Path,
        resolve: &impl Fn(&str) -> TpoResult<String>,
    ) -> TpoResult<Outcome> {
        let dir_name = name.to_lowercase();
        validate_name(&dir_name, "dependency")?;
        let target = root.join(&dir_name);

        if target.exists() {
            debug!(dependency = name, "Already materialized");
            return Ok(Outcome::Reused(target));
        }

        let url = resolve(name)?;
        let source = self.cache.get_or_download(&url, &self.branches)?;

        fs::create_dir_all(root)
            .map_err(|e| TpoError::io(format!("creating {}", root.display()), e))?;
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{dir_name}."))
            .suffix(".staging")
            .tempdir_in(root)
            .map_err(|e| TpoError::io(format!("creating staging dir in {}", root.display()), e))?;
        let staged = staging.path().join(&dir_name);
        copy_tree(&source, &staged)?;

        if let Err(e) = fs::rename(&staged, &target) {
            // Lost a race with another materialization of the same name
            if target.exists() {
                return Ok(Outcome::Reused(target));
            }
            return Err(TpoError::io(
                format!("moving {} into {}", dir_name, target.display()),
                e,
            ));
        }

        info!(dependency = name, target = %target.display(), "Materialized");
        Ok(Outcome::Materialized(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::{build_zip, MemoryFetcher};
    use std::sync::Arc;
    use tempfile::TempDir;

    const FASTLED_ZIP: &str = "https://github.com/fastled/fastled/archive/refs/heads/main.zip";
    const NATIVE_ZIP: &str =
        "https://github.com/platformio/platform-native/archive/refs/heads/main.zip";

    fn setup() -> (TempDir, Materializer, Arc<MemoryFetcher>) {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(
            MemoryFetcher::new()
                .with_archive(
                    FASTLED_ZIP,
                    build_zip(&[
                        ("FastLED-main/library.json", "{}"),
                        ("FastLED-main/src/FastLED.h", "#pragma once"),
                    ]),
                )
                .with_archive(
                    NATIVE_ZIP,
                    build_zip(&[("platform-native-main/platform.json", "{}")]),
                ),
        );
        let cache = GlobalCache::new(temp.path().join("global")).with_fetcher(fetcher.clone());
        let materializer =
            Materializer::new(cache, Registry::builtin()).with_branches(vec!["main".to_string()]);
        (temp, materializer, fetcher)
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn copies_library_into_project() {
        let (temp, materializer, _fetcher) = setup();
        let project = temp.path().join("project");

        let report = materializer.materialize(&names(&["FastLED"]), &project);

        let target = project.join("lib/fastled");
        assert_eq!(report.materialized, vec![target.clone()]);
        assert!(target.join("src/FastLED.h").is_file());
        assert!(!fs::symlink_metadata(&target).unwrap().file_type().is_symlink());

        let leftovers = fs::read_dir(project.join(LIB_DIR)).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn existing_copy_is_reused() {
        let (temp, materializer, fetcher) = setup();
        let project = temp.path().join("project");
        materializer.materialize(&names(&["fastled"]), &project);
        fs::write(project.join("lib/fastled/local-edit.txt"), "kept").unwrap();

        let report = materializer.materialize(&names(&["FastLED"]), &project);

        assert_eq!(report.reused, vec![project.join("lib/fastled")]);
        assert!(report.materialized.is_empty());
        assert!(project.join("lib/fastled/local-edit.txt").exists());
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn one_failure_does_not_stop_the_rest() {
        let (temp, materializer, _fetcher) = setup();
        let project = temp.path().join("project");

        let report = materializer.materialize(&names(&["NoSuchLib", "FastLED", "bad|name"]), &project);

        assert_eq!(report.materialized.len(), 1);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].name, "NoSuchLib");
        assert!(report.failed[0].retryable);
        assert!(!report.failed[1].retryable);
        assert!(!report.is_success());
        assert!(project.join("lib/fastled").is_dir());
        assert!(!project.join("lib/nosuchlib").exists());
    }

    #[test]
    fn names_cannot_leave_the_lib_dir() {
        let (temp, materializer, fetcher) = setup();
        let project = temp.path().join("project");

        let report = materializer.materialize(&names(&["fastled/../../escaped"]), &project);

        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("path separators"));
        assert!(!report.failed[0].retryable);
        assert!(!temp.path().join("escaped").exists());
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn platforms_go_to_platform_root() {
        let (temp, materializer, _fetcher) = setup();
        let project = temp.path().join("project");

        let report = materializer.materialize_platforms(&names(&["dev", "esp32"]), &project);

        assert_eq!(report.materialized, vec![project.join("platforms/dev")]);
        assert!(project.join("platforms/dev/platform.json").is_file());
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("Unknown platform"));
    }

    #[test]
    fn reports_merge() {
        let mut total = MaterializeReport::default();
        total.merge(MaterializeReport {
            materialized: vec![PathBuf::from("a")],
            ..Default::default()
        });
        total.merge(MaterializeReport {
            reused: vec![PathBuf::from("b")],
            ..Default::default()
        });
        assert_eq!(total.materialized.len() + total.reused.len(), 2);
        assert!(total.is_success());
    }
}
