//! Content rewriting applied to schema files before they are written.
//!
//! A [`Patcher`] receives the directory a file is destined for and its
//! content, and returns new content. Patchers hold no cross-file state, so
//! the same pipeline is shared by every worker of a module.
//!
//! - [`GoPackagePatcher`] - rewrites `option go_package`
//! - [`proto`] - the schema reader patchers use to find statements

mod go_package;
pub mod proto;

pub use go_package::GoPackagePatcher;

use crate::error::PatchError;

pub trait Patcher: Send + Sync {
    fn patch(&self, output_dir: &str, content: &str) -> Result<String, PatchError>;
}

impl<F> Patcher for F
where
    F: Fn(&str, &str) -> Result<String, PatchError> + Send + Sync,
{
    fn patch(&self, output_dir: &str, content: &str) -> Result<String, PatchError> {
        self(output_dir, content)
    }
}

/// Ordered chain of patchers; an empty pipeline passes content through.
#[derive(Default)]
pub struct PatcherPipeline {
    patchers: Vec<Box<dyn Patcher>>,
}

impl PatcherPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, patcher: impl Patcher + 'static) -> Self {
        self.patchers.push(Box::new(patcher));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.patchers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patchers.len()
    }

    /// Run every patcher in order, stopping at the first failure.
    pub fn apply(&self, output_dir: &str, content: &str) -> Result<String, PatchError> {
        let mut current = content.to_string();
        for patcher in &self.patchers {
            current = patcher.patch(output_dir, &current)?;
        }
        Ok(current)
    }

    /// Like [`apply`](Self::apply), but a failure yields the original
    /// content together with the error so the caller can warn and move on.
    pub fn apply_or_original(
        &self,
        output_dir: &str,
        content: &str,
    ) -> (String, Option<PatchError>) {
        match self.apply(output_dir, content) {
            Ok(patched) => (patched, None),
            Err(err) => (content.to_string(), Some(err)),
        }
    }
}

impl std::fmt::Debug for PatcherPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatcherPipeline")
            .field("patchers", &self.patchers.len())
            .finish()
    }
}
