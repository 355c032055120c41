//! Fixture scaffolding for integration tests.
#![allow(dead_code)]

use codeseek::cache::EmbeddingCache;
use codeseek::config::{HomeDirs, Settings};
use codeseek::embed::create_provider;
use codeseek::index::{run_index, IndexJob, IndexMode};
use codeseek::types::{IndexReport, Result};
use std::path::{Path, PathBuf};

/// One isolated tool home plus one scratch repository.
pub struct TestHarness {
    pub home: HomeDirs,
    pub repo: PathBuf,
    _home_dir: tempfile::TempDir,
    _repo_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn new() -> TestHarness {
        let home_dir = tempfile::tempdir().expect("temp home");
        let repo_dir = tempfile::tempdir().expect("temp repo");
        let base = home_dir.path();
        let home = HomeDirs {
            db: base.join("db"),
            cache: base.join("cache"),
            pids: base.join("pids"),
            logs: base.join("logs"),
            sockets: base.join("sockets"),
        };
        for dir in [&home.db, &home.cache, &home.pids, &home.logs, &home.sockets] {
            std::fs::create_dir_all(dir).expect("home layout");
        }
        TestHarness {
            home,
            repo: repo_dir.path().to_path_buf(),
            _home_dir: home_dir,
            _repo_dir: repo_dir,
        }
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.repo.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("fixture dir");
        }
        std::fs::write(path, content).expect("fixture write");
    }

    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.repo.join(rel)).expect("fixture remove");
    }

    pub fn settings(&self) -> Settings {
        Settings { model: "mock:16".to_string(), ..Settings::default() }
    }

    pub fn run(&self, name: &str, mode: IndexMode) -> Result<IndexReport> {
        let settings = self.settings();
        let provider = create_provider(&settings.model)?;
        let mut cache = EmbeddingCache::open(&self.home.cache_db())?;
        let root = if mode == IndexMode::Create { Some(self.repo.as_path()) } else { None };
        run_index(
            &IndexJob { home: &self.home, name, root, mode, settings: &settings },
            provider.as_ref(),
            &mut cache,
            None,
        )
    }

    pub fn create(&self, name: &str) -> IndexReport {
        self.run(name, IndexMode::Create).expect("create index")
    }

    pub fn update(&self, name: &str) -> IndexReport {
        self.run(name, IndexMode::Update).expect("update index")
    }
}

/// Canonical absolute path of a fixture file, matching what the indexer
/// stores (the walk root is canonicalized at create time).
pub fn canonical(root: &Path, rel: &str) -> String {
    root.canonicalize().expect("canonical root").join(rel).to_string_lossy().to_string()
}
