//! BDL - a component description language and its composition elaborator.
//!
//! Sources declare structs, interfaces and components with their
//! configuration contracts; composition blocks instantiate and wire them.
//! Compiling a source produces an [`Object`] (its symbol table, cached next
//! to the source); composing a set of objects produces one
//! [`CompositionView`] per target.

pub mod attr;
pub mod builtins;
pub mod composition;
pub mod config;
pub mod contract;
pub mod entity;
pub mod fold;
pub mod grammar;
pub mod object;
pub mod resolver;
pub mod symbols;

mod build;
mod error;
mod literal;
mod parameters;

pub use bdl_parser::{Diagnostic, ParseError};

pub use composition::{Composition, CompositionView};
pub use error::BdlError;
pub use literal::Literal;
pub use object::Object;
pub use parameters::Parameter;
pub use resolver::Resolved;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info, trace};

use builtins::Prelude;
use config::AppConfig;
use object::{ObjectContext, SearchPaths};

/// Compiles BDL units and composes them into per-target views.
///
/// The grammar, builtins and contract registry are built once and shared by
/// every unit the compiler processes.
///
/// # Examples
///
/// ```rust
/// use bdl::{Compiler, config::AppConfig};
///
/// let source = r#"
///     component Hello {
///         config:
///             greeting = String("hello");
///     }
///     composition default {
///         hello = Hello();
///     }
/// "#;
///
/// let compiler = Compiler::new(AppConfig::default().with_cache_enabled(false))
///     .expect("Failed to build the grammar");
/// let object = compiler.compile_source(source, None).expect("Failed to compile");
/// let views = compiler.compose(&[object]).expect("Failed to compose");
///
/// let registry = views[0].entry("default.hello").expect("missing instance");
/// assert_eq!(registry.symbol(), "Hello");
/// assert_eq!(registry.parameters()["greeting"], "hello");
/// ```
#[derive(Debug)]
pub struct Compiler {
    config: AppConfig,
    prelude: Arc<Prelude>,
}

impl Compiler {
    /// Create a compiler with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BdlError::Grammar`] if the grammar cannot be built.
    pub fn new(config: AppConfig) -> Result<Self, BdlError> {
        let prelude = Prelude::new()?;
        debug!(cache = config.cache().enabled(); "Compiler ready");
        Ok(Self { config, prelude })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn prelude(&self) -> &Arc<Prelude> {
        &self.prelude
    }

    fn objects(&self) -> ObjectContext {
        ObjectContext::new(
            Arc::clone(&self.prelude),
            self.config.cache().clone(),
            Box::new(SearchPaths::from(self.config.include())),
        )
    }

    /// Compile the unit at `path`, reusing its cache artifact when fresh.
    ///
    /// # Errors
    ///
    /// Returns I/O errors and every diagnostic of the unit and its includes.
    pub fn compile(&self, path: &Path) -> Result<Object, BdlError> {
        info!(path:? = path; "Compiling");
        let object = self.objects().load(path)?;
        trace!(tree:? = object.tree(); "Compiled unit");
        Ok(object)
    }

    /// Compile a source text; `path` locates its includes and diagnostics.
    ///
    /// # Errors
    ///
    /// Returns every diagnostic of the unit and its includes.
    pub fn compile_source(&self, source: &str, path: Option<PathBuf>) -> Result<Object, BdlError> {
        self.objects().compile(source, path)
    }

    /// Compose `objects` into one view per configured target.
    ///
    /// # Errors
    ///
    /// Returns every diagnostic of every failed target.
    pub fn compose(&self, objects: &[Object]) -> Result<Vec<CompositionView>, BdlError> {
        let mut composition = Composition::new(
            Arc::clone(&self.prelude),
            self.config.composition().targets().to_vec(),
        );
        for object in objects {
            composition.visit(object)?;
        }
        composition.process()?;
        Ok(composition.views().cloned().collect())
    }
}
