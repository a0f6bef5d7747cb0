//! Git-backed module source.
//!
//! Clones are shallow (depth 1) and single-ref: a branch clone only fetches
//! that branch's head, a tag clone only that tag. The working tree lives in a
//! temporary directory that is removed as soon as the schema files have been
//! read into memory.

use super::{FetchedFile, GitReference, ModuleSource, SourceFetcher};
use crate::auth::{Credential, CredentialLookup};
use crate::error::{Result, VendorError};
use crate::vendor::remap::{is_schema_file, to_slash};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Cred, FetchOptions, RemoteCallbacks, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub struct RepositoryFetcher {
    credentials: Arc<dyn CredentialLookup>,
    depth: Option<i32>,
    show_progress: bool,
}

impl RepositoryFetcher {
    pub fn new(credentials: Arc<dyn CredentialLookup>) -> Self {
        Self {
            credentials,
            depth: Some(1),
            show_progress: true,
        }
    }

    /// Fetch complete history. Needed for transports without shallow
    /// support, such as local `file://` repositories.
    pub fn full_history(mut self) -> Self {
        self.depth = None;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    fn clone_into(
        &self,
        url: &str,
        reference: &GitReference,
        credential: Option<Credential>,
        dir: &Path,
    ) -> std::result::Result<(), git2::Error> {
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks(credential));
        if let Some(depth) = self.depth {
            fetch_options.depth(depth);
        }

        match reference {
            GitReference::Default => {
                RepoBuilder::new()
                    .fetch_options(fetch_options)
                    .clone(url, dir)?;
            }
            GitReference::Branch(branch) => {
                let refspec = format!("+refs/heads/{0}:refs/remotes/origin/{0}", branch);
                RepoBuilder::new()
                    .fetch_options(fetch_options)
                    .branch(branch)
                    .remote_create(move |repo, name, url| {
                        repo.remote_with_fetch(name, url, &refspec)
                    })
                    .clone(url, dir)?;
            }
            GitReference::Tag(tag) => {
                let repo = Repository::init(dir)?;
                let refname = format!("refs/tags/{}", tag);
                let refspec = format!("+{0}:{0}", refname);
                repo.remote_anonymous(url)?
                    .fetch(&[refspec.as_str()], Some(&mut fetch_options), None)?;

                let commit = repo.find_reference(&refname)?.peel_to_commit()?;
                repo.set_head_detached(commit.id())?;
                let mut checkout = CheckoutBuilder::new();
                checkout.force();
                repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
            }
        }

        Ok(())
    }

    fn spinner(&self, source: &ModuleSource) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.blue} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Cloning {}...", source));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

impl SourceFetcher for RepositoryFetcher {
    fn fetch(&self, source: &ModuleSource, subtree: &str) -> Result<Vec<FetchedFile>> {
        let ModuleSource::Repository { url, reference } = source else {
            return Err(VendorError::configuration(
                source.to_string(),
                "not a repository module",
            ));
        };

        let host = repository_host(url).map_err(|reason| {
            VendorError::transport(source.to_string(), format!("unparsable repository URL: {}", reason))
        })?;
        let credential = self.credentials.lookup(&host);
        if credential.is_none() {
            debug!(host = %host, "no credentials found, cloning anonymously");
        }

        let checkout = tempfile::Builder::new()
            .prefix("pbuf-clone-")
            .tempdir()
            .map_err(|e| VendorError::io("failed to create clone directory in", std::env::temp_dir(), e))?;

        let spinner = self.spinner(source);
        let cloned = self.clone_into(url, reference, credential, checkout.path());
        spinner.finish_and_clear();
        cloned.map_err(|e| VendorError::transport(source.to_string(), e.message()))?;
        info!(source = %source, "cloned repository");

        collect_schema_files(source, checkout.path(), subtree)
    }
}

/// One credential attempt per clone; libgit2 keeps asking otherwise.
fn remote_callbacks<'a>(credential: Option<Credential>) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(credential) = credential {
        let mut attempted = false;
        callbacks.credentials(move |_url, username_from_url, _allowed| {
            if attempted {
                return Err(git2::Error::from_str("credentials were rejected"));
            }
            attempted = true;
            match &credential {
                Credential::Basic { username, password } => {
                    let username = if username.is_empty() {
                        username_from_url.unwrap_or("git")
                    } else {
                        username.as_str()
                    };
                    Cred::userpass_plaintext(username, password)
                }
                Credential::Token(token) => Cred::userpass_plaintext("oauth2", token),
            }
        });
    }
    callbacks
}

fn collect_schema_files(
    source: &ModuleSource,
    checkout: &Path,
    subtree: &str,
) -> Result<Vec<FetchedFile>> {
    let root = if subtree.is_empty() {
        checkout.to_path_buf()
    } else {
        checkout.join(subtree)
    };
    if !root.exists() {
        return Err(VendorError::transport(
            source.to_string(),
            format!("path '{}' not found in repository", subtree),
        ));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
            VendorError::io("failed to walk", path, e.into())
        })?;

        if !entry.file_type().is_file() || !is_schema_file(&entry.path().to_string_lossy()) {
            continue;
        }

        let bytes =
            fs::read(entry.path()).map_err(|e| VendorError::io("failed to read", entry.path(), e))?;
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %entry.path().display(), "schema file is not valid UTF-8, replacing invalid bytes");
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };
        let relative = entry.path().strip_prefix(checkout).unwrap_or(entry.path());
        files.push(FetchedFile::new(to_slash(relative), content));
    }

    debug!(source = %source, files = files.len(), "collected schema files");
    Ok(files)
}

/// Host part of a repository URL, used as the credential lookup key.
///
/// Accepts URLs (`https://host/org/repo`, `ssh://git@host/repo`,
/// `file:///path`) and scp-like `git@host:org/repo` addresses. `file` URLs
/// have an empty host.
pub fn repository_host(url: &str) -> std::result::Result<String, String> {
    match url::Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => Ok(host.to_string()),
            None if parsed.scheme() == "file" => Ok(String::new()),
            None => Err(format!("no host in '{}'", url)),
        },
        Err(err) => scp_host(url).ok_or_else(|| format!("'{}': {}", url, err)),
    }
}

fn scp_host(url: &str) -> Option<String> {
    if url.contains("://") || url.contains(char::is_whitespace) {
        return None;
    }
    let (authority, path) = url.split_once(':')?;
    if path.is_empty() || authority.contains('/') {
        return None;
    }
    let host = authority.rsplit('@').next()?;
    (!host.is_empty()).then(|| host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_host() {
        assert_eq!(
            repository_host("https://github.com/acme/api.git").unwrap(),
            "github.com"
        );
        assert_eq!(
            repository_host("ssh://git@gitlab.example.com:2222/acme/api").unwrap(),
            "gitlab.example.com"
        );
        assert_eq!(
            repository_host("git@github.com:acme/api.git").unwrap(),
            "github.com"
        );
        assert_eq!(repository_host("file:///tmp/repo").unwrap(), "");
        assert!(repository_host("not a url").is_err());
        assert!(repository_host("relative/path").is_err());
    }

    #[test]
    fn test_collect_schema_files_filters_and_relativizes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("api/v1")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("api/v1/a.proto"), "syntax = \"proto3\";").unwrap();
        fs::write(root.join("api/v1/README.md"), "docs").unwrap();
        fs::write(root.join("top.proto"), "syntax = \"proto3\";").unwrap();
        fs::write(root.join(".git/ignored.proto"), "").unwrap();

        let source = ModuleSource::Repository {
            url: "file:///fixture".to_string(),
            reference: GitReference::Default,
        };

        let all = collect_schema_files(&source, root, "").unwrap();
        let names: Vec<&str> = all.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["api/v1/a.proto", "top.proto"]);

        let api = collect_schema_files(&source, root, "api").unwrap();
        assert_eq!(api.len(), 1);
        assert_eq!(api[0].filename, "api/v1/a.proto");

        let single = collect_schema_files(&source, root, "top.proto").unwrap();
        assert_eq!(single, vec![FetchedFile::new("top.proto", "syntax = \"proto3\";")]);
    }

    #[test]
    fn test_missing_subtree_fails_the_module() {
        let dir = tempfile::tempdir().unwrap();
        let source = ModuleSource::Repository {
            url: "file:///fixture".to_string(),
            reference: GitReference::Default,
        };
        let err = collect_schema_files(&source, dir.path(), "nope").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
    }

    #[test]
    fn test_non_utf8_schema_is_still_collected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("latin1.proto"),
            b"// caf\xe9\nsyntax = \"proto3\";\n",
        )
        .unwrap();
        let source = ModuleSource::Repository {
            url: "file:///fixture".to_string(),
            reference: GitReference::Default,
        };

        let files = collect_schema_files(&source, dir.path(), "").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].content, "// caf\u{fffd}\nsyntax = \"proto3\";\n");
    }

    #[test]
    fn test_unparsable_url_is_transport_error() {
        let fetcher = RepositoryFetcher::new(Arc::new(crate::auth::Anonymous)).quiet();
        let source = ModuleSource::Repository {
            url: "not a url".to_string(),
            reference: GitReference::Default,
        };
        let err = fetcher.fetch(&source, "").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
        assert!(err.to_string().contains("unparsable repository URL"));
    }
}
