//! Vendoring from a real git repository.
//!
//! Each test builds an upstream repository with git2 inside a temporary
//! directory and clones it over `file://`:
//!
//! - default branch: `widget.proto` at v2
//! - tag `v1.0.0`: `widget.proto` at v1
//! - branch `feature`: v1 plus `feature.proto`

use git2::{Commit, IndexAddOption, Repository, ResetType, Signature};
use pbuf::auth::Anonymous;
use pbuf::config::ModuleSpec;
use pbuf::error::ErrorKind;
use pbuf::fetch::RepositoryFetcher;
use pbuf::vendor::{EngineOptions, ModuleStatus, VendorEngine};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const WIDGET_V1: &str = "syntax = \"proto3\";\npackage widgets.v1;\nmessage Widget {}\n";
const WIDGET_V2: &str =
    "syntax = \"proto3\";\npackage widgets.v1;\nmessage Widget {\n  string id = 1;\n}\n";

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn commit_all(repo: &Repository, message: &str) -> git2::Oid {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("pbuf tests", "tests@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

fn setup_upstream() -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let repo = Repository::init(root).unwrap();

    write(root, "api/v1/widget.proto", WIDGET_V1);
    write(root, "api/v1/gadget.proto", "syntax = \"proto3\";\npackage gadgets.v1;\n");
    write(root, "api/v1/README.md", "not a schema\n");
    write(root, "other/unrelated.proto", "syntax = \"proto3\";\n");
    let first = commit_all(&repo, "initial schemas");
    let first = repo.find_commit(first).unwrap();
    repo.tag_lightweight("v1.0.0", first.as_object(), false)
        .unwrap();

    write(root, "api/v1/feature.proto", "syntax = \"proto3\";\npackage feature;\n");
    let feature = commit_all(&repo, "feature work");
    let feature = repo.find_commit(feature).unwrap();
    repo.branch("feature", &feature, false).unwrap();

    repo.reset(first.as_object(), ResetType::Hard, None).unwrap();
    write(root, "api/v1/widget.proto", WIDGET_V2);
    commit_all(&repo, "widget gains an id");

    let url = format!("file://{}", root.display());
    (dir, url)
}

fn engine(root: &Path) -> VendorEngine {
    let fetcher = RepositoryFetcher::new(Arc::new(Anonymous))
        .full_history()
        .quiet();
    let options = EngineOptions {
        jobs: 4,
        keep_going: true,
        root: root.to_path_buf(),
        go_module: Some("github.com/acme/service".to_string()),
        ..EngineOptions::default()
    };
    VendorEngine::new(fetcher, options).unwrap()
}

fn module(url: &str) -> ModuleSpec {
    ModuleSpec {
        repository: url.to_string(),
        path: "api".to_string(),
        output_folder: "vendor/api".to_string(),
        ..ModuleSpec::default()
    }
}

#[test]
fn test_default_branch_clone() {
    let (_upstream, url) = setup_upstream();
    let out = tempfile::tempdir().unwrap();

    let report = engine(out.path()).run(&[module(&url)]).unwrap();

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(report.modules[0].files_written, 2);
    let vendored = out.path().join("vendor/api/v1");
    assert_eq!(
        fs::read_to_string(vendored.join("widget.proto")).unwrap(),
        WIDGET_V2
    );
    assert!(vendored.join("gadget.proto").exists());
    assert!(!vendored.join("README.md").exists());
    assert!(!vendored.join("feature.proto").exists());
    assert!(!out.path().join("vendor/other").exists());
}

#[test]
fn test_tag_clone() {
    let (_upstream, url) = setup_upstream();
    let out = tempfile::tempdir().unwrap();
    let spec = ModuleSpec {
        tag: "v1.0.0".to_string(),
        ..module(&url)
    };

    let report = engine(out.path()).run(&[spec]).unwrap();

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(
        fs::read_to_string(out.path().join("vendor/api/v1/widget.proto")).unwrap(),
        WIDGET_V1
    );
}

#[test]
fn test_branch_clone_wins_over_tag() {
    let (_upstream, url) = setup_upstream();
    let out = tempfile::tempdir().unwrap();
    let spec = ModuleSpec {
        branch: "feature".to_string(),
        tag: "v1.0.0".to_string(),
        ..module(&url)
    };

    let report = engine(out.path()).run(&[spec]).unwrap();

    assert!(report.is_success(), "{:?}", report);
    assert!(out.path().join("vendor/api/v1/feature.proto").exists());
}

#[test]
fn test_single_file_with_go_package() {
    let (_upstream, url) = setup_upstream();
    let out = tempfile::tempdir().unwrap();
    let spec = ModuleSpec {
        path: "api/v1/widget.proto".to_string(),
        output_folder: "third_party/widgets".to_string(),
        generate_output_folder: "internal/gen/widgets".to_string(),
        ..module(&url)
    };

    let report = engine(out.path()).run(&[spec]).unwrap();

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(report.modules[0].files_written, 1);
    let widget = fs::read_to_string(out.path().join("third_party/widgets/widget.proto")).unwrap();
    assert!(widget.starts_with(
        "syntax = \"proto3\";\noption go_package = \"github.com/acme/service/internal/gen/widgets;widgets\";\n"
    ));
}

#[test]
fn test_missing_tag_and_path_fail_their_module_only() {
    let (_upstream, url) = setup_upstream();
    let out = tempfile::tempdir().unwrap();
    let missing_tag = ModuleSpec {
        tag: "v9.9.9".to_string(),
        ..module(&url)
    };
    let missing_path = ModuleSpec {
        path: "nope".to_string(),
        output_folder: "vendor/nope".to_string(),
        ..module(&url)
    };

    let report = engine(out.path())
        .run(&[missing_tag, missing_path, module(&url)])
        .unwrap();

    assert_eq!(report.modules[0].status, ModuleStatus::Failed);
    assert_eq!(report.modules[0].error_kind, Some(ErrorKind::Transport));
    assert_eq!(report.modules[1].status, ModuleStatus::Failed);
    assert_eq!(report.modules[1].error_kind, Some(ErrorKind::Transport));
    assert_eq!(report.modules[2].status, ModuleStatus::Vendored);
}

#[test]
fn test_unparsable_url_fails_its_module_only() {
    let (_upstream, url) = setup_upstream();
    let out = tempfile::tempdir().unwrap();
    let bad_url = ModuleSpec {
        repository: "not a url".to_string(),
        output_folder: "vendor/bad".to_string(),
        ..ModuleSpec::default()
    };

    let report = engine(out.path()).run(&[bad_url, module(&url)]).unwrap();

    assert_eq!(report.modules[0].status, ModuleStatus::Failed);
    assert_eq!(report.modules[0].error_kind, Some(ErrorKind::Transport));
    assert_eq!(report.modules[1].status, ModuleStatus::Vendored);
    assert!(out.path().join("vendor/api/v1/widget.proto").exists());
}
