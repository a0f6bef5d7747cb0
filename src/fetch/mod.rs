//! Module sources and the fetchers that read them.
//!
//! Every module resolves to exactly one [`ModuleSource`]:
//!
//! - **Repository**: shallow clone of a git repository ([`RepositoryFetcher`])
//! - **Registry**: one `PullModule` call against a pbuf registry ([`RegistryFetcher`])
//!
//! Both fetchers implement [`SourceFetcher`] and return the same flat list of
//! [`FetchedFile`]s, so the vendoring engine does not care which one ran.

mod git;
mod registry;

pub use git::{RepositoryFetcher, repository_host};
pub use registry::{
    BoxFuture, GrpcRegistryClient, ProtoFile, PullModuleRequest, PullModuleResponse, REGISTRY_TIMEOUT,
    RegistryFetcher, RegistryTransport, canonicalize_addr, registry_host,
};

use crate::config::ModuleSpec;
use crate::error::{Result, VendorError};
use std::fmt;

/// A schema file as read from a source, before remapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    /// Path relative to the source root, `/`-separated.
    pub filename: String,
    pub content: String,
}

impl FetchedFile {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitReference {
    /// Whatever the remote's HEAD points at.
    Default,
    Branch(String),
    Tag(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    Repository { url: String, reference: GitReference },
    Registry { name: String, tag: String },
}

impl ModuleSource {
    /// Decide where a module comes from.
    ///
    /// A non-empty `repository` always wins. Otherwise the module must name a
    /// registry module and tag, and a registry must be configured. When both
    /// `branch` and `tag` are set, `branch` is used.
    pub fn resolve(spec: &ModuleSpec, registry_configured: bool) -> Result<Self> {
        let label = spec.label();

        if !spec.repository.is_empty() {
            let reference = match (spec.branch.as_str(), spec.tag.as_str()) {
                ("", "") => GitReference::Default,
                ("", tag) => GitReference::Tag(tag.to_string()),
                (branch, tag) => {
                    if !tag.is_empty() {
                        tracing::warn!(
                            module = %label,
                            branch,
                            tag,
                            "both branch and tag are set, using branch"
                        );
                    }
                    GitReference::Branch(branch.to_string())
                }
            };

            return Ok(Self::Repository {
                url: spec.repository.clone(),
                reference,
            });
        }

        if !registry_configured {
            return Err(VendorError::configuration(
                label,
                "no repository set and no registry configured",
            ));
        }

        if spec.name.is_empty() || spec.tag.is_empty() {
            return Err(VendorError::configuration(
                label,
                "registry modules need both `name` and `tag`",
            ));
        }

        Ok(Self::Registry {
            name: spec.name.clone(),
            tag: spec.tag.clone(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Repository { .. } => "repository",
            Self::Registry { .. } => "registry",
        }
    }
}

impl fmt::Display for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Repository { url, reference } => match reference {
                GitReference::Default => write!(f, "{}", url),
                GitReference::Branch(branch) => write!(f, "{} (branch {})", url, branch),
                GitReference::Tag(tag) => write!(f, "{} (tag {})", url, tag),
            },
            Self::Registry { name, tag } => write!(f, "{}@{}", name, tag),
        }
    }
}

/// Reads every schema file of a module.
///
/// `subtree` is the module's `path`; fetchers may use it to narrow what they
/// read, but the engine filters the result again either way.
pub trait SourceFetcher: Send + Sync {
    fn fetch(&self, source: &ModuleSource, subtree: &str) -> Result<Vec<FetchedFile>>;
}

impl<F> SourceFetcher for F
where
    F: Fn(&ModuleSource, &str) -> Result<Vec<FetchedFile>> + Send + Sync,
{
    fn fetch(&self, source: &ModuleSource, subtree: &str) -> Result<Vec<FetchedFile>> {
        self(source, subtree)
    }
}
