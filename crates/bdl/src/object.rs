//! Compiled units and the include machinery.
//!
//! An [`Object`] is the result of compiling one source: its symbol table,
//! merged with everything it includes, and the top-level declarations in
//! source order. Objects are cached next to their source as JSON and
//! reused while the cache is newer than the source and every include.

use std::{
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use bdl_parser::{Context, ContextData, Element, Parser, error::ErrorCode};

use crate::{
    build::Builder,
    builtins::Prelude,
    config::{CacheConfig, IncludeConfig},
    error::BdlError,
    symbols::{EntryData, SymbolMap},
};

/// Finds the file a `use` directive refers to.
pub trait IncludeResolver: fmt::Debug {
    /// Locate `path` as written in a unit located at `from`.
    fn resolve(&self, path: &str, from: Option<&Path>) -> Option<PathBuf>;
}

/// Looks next to the including unit, then in the configured directories.
#[derive(Debug, Clone, Default)]
pub struct SearchPaths {
    paths: Vec<PathBuf>,
}

impl SearchPaths {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl From<&IncludeConfig> for SearchPaths {
    fn from(config: &IncludeConfig) -> Self {
        Self::new(config.search_paths().to_vec())
    }
}

impl IncludeResolver for SearchPaths {
    fn resolve(&self, path: &str, from: Option<&Path>) -> Option<PathBuf> {
        let relative = Path::new(path);
        if relative.is_absolute() {
            return relative.is_file().then(|| relative.to_path_buf());
        }
        from.and_then(Path::parent)
            .into_iter()
            .chain(self.paths.iter().map(PathBuf::as_path))
            .map(|directory| directory.join(relative))
            .find(|candidate| candidate.is_file())
    }
}

/// A compiled unit.
#[derive(Debug)]
pub struct Object {
    context: Arc<Context>,
    symbols: SymbolMap,
    tree: Vec<String>,
    includes: Vec<PathBuf>,
}

/// Serialized form of an [`Object`].
#[derive(Debug, Serialize, Deserialize)]
struct ObjectData {
    context: ContextData,
    symbols: IndexMap<String, EntryData>,
    tree: Vec<String>,
    #[serde(default)]
    includes: Vec<PathBuf>,
}

impl Object {
    pub(crate) fn new(
        context: Arc<Context>,
        symbols: SymbolMap,
        tree: Vec<String>,
        includes: Vec<PathBuf>,
    ) -> Self {
        Self {
            context,
            symbols,
            tree,
            includes,
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn symbols(&self) -> &SymbolMap {
        &self.symbols
    }

    /// FQNs of the top-level declarations, in source order.
    pub fn tree(&self) -> &[String] {
        &self.tree
    }

    /// Every file this unit includes, directly or not.
    pub fn includes(&self) -> &[PathBuf] {
        &self.includes
    }

    /// Serialize to the cache format.
    ///
    /// # Errors
    ///
    /// Fails only if serialization itself fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let data = ObjectData {
            context: ContextData::from_context(&self.context),
            symbols: self.symbols.to_data(),
            tree: self.tree.clone(),
            includes: self.includes.clone(),
        };
        serde_json::to_string_pretty(&data)
    }

    /// Read an object back from the cache format.
    ///
    /// # Errors
    ///
    /// Fails if `json` is not a serialized object.
    pub fn from_json(prelude: Arc<Prelude>, json: &str) -> Result<Self, serde_json::Error> {
        let data: ObjectData = serde_json::from_str(json)?;
        Ok(Self {
            context: data.context.into_context(),
            symbols: SymbolMap::from_data(prelude, data.symbols),
            tree: data.tree,
            includes: data.includes,
        })
    }
}

/// Compiles units, following their includes.
#[derive(Debug)]
pub struct ObjectContext {
    prelude: Arc<Prelude>,
    cache: CacheConfig,
    includes: Box<dyn IncludeResolver>,
    sources: Vec<PathBuf>,
}

impl ObjectContext {
    pub fn new(
        prelude: Arc<Prelude>,
        cache: CacheConfig,
        includes: Box<dyn IncludeResolver>,
    ) -> Self {
        Self {
            prelude,
            cache,
            includes,
            sources: Vec::new(),
        }
    }

    pub fn prelude(&self) -> &Arc<Prelude> {
        &self.prelude
    }

    /// Compile the unit at `path`, or reuse its cached object.
    ///
    /// # Errors
    ///
    /// Returns I/O errors reading the source and every diagnostic of the
    /// unit or its includes.
    pub fn load(&mut self, path: &Path) -> Result<Object, BdlError> {
        if self.cache.enabled() {
            if let Some(object) = self.cached(path) {
                return Ok(object);
            }
        }

        let content = fs::read_to_string(path).map_err(|err| BdlError::io(path, err))?;
        let object = self.compile(&content, Some(path.to_path_buf()))?;

        if self.cache.enabled() {
            if let Err(err) = self.store(path, &object) {
                warn!(path:? = path, err:% = err; "Failed to write the unit cache");
            }
        }
        Ok(object)
    }

    /// Compile a source text.
    ///
    /// # Errors
    ///
    /// Returns every diagnostic of the unit or its includes.
    pub fn compile(&mut self, content: &str, path: Option<PathBuf>) -> Result<Object, BdlError> {
        info!(path:? = path; "Compiling unit");
        let context = Context::from_content(content, path.clone());
        let sequence = Parser::new(self.prelude.grammar()).parse(content, &context)?;

        if let Some(path) = &path {
            self.sources.push(path.clone());
        }
        let result = Builder::new(self, Arc::clone(&context)).build(sequence);
        if path.is_some() {
            self.sources.pop();
        }

        let (symbols, tree, includes) = result?;
        debug!(path:? = path, declarations = tree.len(); "Unit compiled");
        Ok(Object::new(context, symbols, tree, includes))
    }

    /// Load the unit a `use` directive of `element` names.
    pub(crate) fn include(
        &mut self,
        element: &Element,
        path: &str,
    ) -> Result<(PathBuf, Object), BdlError> {
        let from = element.context().and_then(|context| context.path());
        let resolved = self.includes.resolve(path, from).ok_or_else(|| {
            element
                .error(format!("Could not find include '{path}'."))
                .with_code(ErrorCode::E207)
        })?;

        if let Some(start) = self.sources.iter().position(|source| same_file(source, &resolved)) {
            let chain: Vec<String> = self.sources[start..]
                .iter()
                .chain(std::iter::once(&resolved))
                .map(|source| source.display().to_string())
                .collect();
            return Err(element
                .error(format!("Circular dependency detected:\n{}", chain.join("\n")))
                .with_code(ErrorCode::E206)
                .into());
        }

        debug!(path:? = resolved; "Including unit");
        let object = self.load(&resolved)?;
        Ok((resolved, object))
    }

    fn cached(&self, path: &Path) -> Option<Object> {
        let artifact = self.cache.artifact_path(path);
        let built = modified(&artifact)?;
        if modified(path).is_none_or(|source| source > built) {
            return None;
        }

        let json = fs::read_to_string(&artifact).ok()?;
        let object = match Object::from_json(Arc::clone(&self.prelude), &json) {
            Ok(object) => object,
            Err(err) => {
                warn!(artifact:? = artifact, err:% = err; "Ignoring unreadable unit cache");
                return None;
            }
        };
        let stale = object
            .includes()
            .iter()
            .any(|include| modified(include).is_none_or(|source| source > built));
        if stale {
            return None;
        }
        debug!(artifact:? = artifact; "Using cached unit");
        Some(object)
    }

    fn store(&self, path: &Path, object: &Object) -> Result<(), BdlError> {
        let artifact = self.cache.artifact_path(path);
        let json = object.to_json().map_err(|err| BdlError::cache(&artifact, err))?;
        let directory = artifact
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut file =
            tempfile::NamedTempFile::new_in(directory).map_err(|err| BdlError::io(directory, err))?;
        file.write_all(json.as_bytes())
            .map_err(|err| BdlError::io(file.path(), err))?;
        file.persist(&artifact)
            .map_err(|err| BdlError::io(&artifact, err.error))?;
        debug!(artifact:? = artifact; "Unit cache written");
        Ok(())
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|metadata| metadata.modified()).ok()
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
