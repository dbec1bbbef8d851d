use std::path::Path;

use git2::{IndexAddOption, Repository, Signature};

use super::write_file;

pub fn commit_all(repo: &Repository, message: &str) -> git2::Oid {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let sig = Signature::now("Test User", "test@example.com").unwrap();

    match repo.head() {
        Ok(head) => {
            let parent = repo.find_commit(head.target().unwrap()).unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
                .unwrap()
        }
        Err(_) => repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[])
            .unwrap(),
    }
}

/// Create a repository at `root` containing `files` in a single commit.
pub fn init_repo(root: &Path, files: &[(&str, &str)]) -> (Repository, git2::Oid) {
    let repo = Repository::init(root).unwrap();
    for (path, content) in files {
        write_file(&root.join(path), content);
    }
    let oid = commit_all(&repo, "init");
    (repo, oid)
}

pub fn file_url(repo_root: &Path) -> String {
    url::Url::from_directory_path(repo_root)
        .expect("repo root should convert to file URL")
        .to_string()
}

/// Upstream layout shared by the integration tests.
pub const UPSTREAM_FILES: &[(&str, &str)] = &[
    ("docs/index.md", "# Docs\n"),
    ("docs/guide/install.md", "# Install\n"),
    ("docs/guide/diagram.svg", "<svg/>"),
    ("docs/assets/logo.png", "PNG"),
    ("src/main.rs", "fn main() {}\n"),
    ("README.md", "# Upstream\n"),
    ("LICENSE", "MIT\n"),
];
