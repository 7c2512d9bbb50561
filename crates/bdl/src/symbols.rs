//! The symbol table.
//!
//! A [`SymbolMap`] maps fully-qualified names to the elements declaring
//! them. It is built per compilation unit, merged across `use` includes,
//! serialized into the unit cache and resolved lazily: the first
//! [`SymbolMap::resolve`] of a name computes its [`Resolved`] form and
//! memoizes it.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    path::PathBuf,
    rc::Rc,
    sync::Arc,
};

use indexmap::IndexMap;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use bdl_parser::{
    Context, Diagnostic, Element, ElementBuilder, ElementData, ParseError,
    error::{DiagnosticCollector, ErrorCode},
};

use crate::{
    attr::{Attr, ElementExt},
    builtins::Prelude,
    entity::Category,
    resolver::{Resolved, Resolver},
};

/// Suffix marking names generated for unnamed declarations.
pub const PRIVATE_SUFFIX: char = '~';

const MAX_SUGGESTIONS: usize = 5;
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Whether `fqn` was generated for an unnamed declaration.
pub fn is_private(fqn: &str) -> bool {
    fqn.ends_with(PRIVATE_SUFFIX)
}

/// Join namespace segments and a name into an FQN.
pub fn join(namespace: &[String], name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{name}", namespace.join("."))
    }
}

/// The namespace an FQN is declared in.
pub fn parent(fqn: &str) -> Vec<String> {
    let mut segments: Vec<String> = fqn.split('.').map(str::to_string).collect();
    segments.pop();
    segments
}

/// Where a symbol comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    /// A declaration of a unit.
    Global,
    /// An instance of a composition block, only resolved when composing.
    Composition,
    /// Provided by the compiler, never serialized.
    Builtin,
}

/// The lookup context of a symbol: the namespace its references are
/// resolved from, and the instance `this` stands for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    namespace: Vec<String>,
    this: Option<String>,
}

impl Scope {
    pub fn new(namespace: Vec<String>, this: Option<String>) -> Self {
        Self { namespace, this }
    }

    pub fn namespace(&self) -> &[String] {
        &self.namespace
    }

    pub fn this(&self) -> Option<&str> {
        self.this.as_deref()
    }
}

/// One symbol of the table.
#[derive(Debug, Clone)]
pub struct Entry {
    group: Group,
    path: Option<PathBuf>,
    element: Element,
    scope: Option<Scope>,
    block: Option<String>,
}

impl Entry {
    pub fn new(element: Element, group: Group) -> Self {
        let path = element
            .context()
            .and_then(|context| context.path().map(|path| path.to_path_buf()));
        Self {
            group,
            path,
            element,
            scope: None,
            block: None,
        }
    }

    /// Resolve references from an explicit scope instead of the FQN's
    /// namespace.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Name of the composition block this instance was declared in.
    pub fn with_block(mut self, block: Option<String>) -> Self {
        self.block = block;
        self
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    pub fn block(&self) -> Option<&str> {
        self.block.as_deref()
    }

    pub fn category(&self) -> Option<Category> {
        self.element.get(Attr::Category).and_then(Category::parse)
    }

    fn is_namespace(&self) -> bool {
        self.category() == Some(Category::Namespace)
    }

    pub(crate) fn same_declaration(&self, other: &Entry) -> bool {
        self.path == other.path && self.element == other.element
    }
}

/// Serialized form of an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryData {
    pub group: Group,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub element: ElementData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
}

/// Fully-qualified names to declarations, with lazy memoized resolution.
#[derive(Debug)]
pub struct SymbolMap {
    prelude: Arc<Prelude>,
    entries: IndexMap<String, Entry>,
    resolved: RefCell<HashMap<String, Rc<Resolved>>>,
    resolving: RefCell<Vec<String>>,
    private: Cell<usize>,
}

impl SymbolMap {
    /// An empty table knowing only the builtins.
    pub fn new(prelude: Arc<Prelude>) -> Self {
        let entries = prelude
            .builtins()
            .map(|builtin| {
                let element = ElementBuilder::new()
                    .attr(Attr::Category.as_str(), Category::Builtin.as_str())
                    .attr(Attr::Name.as_str(), builtin.name())
                    .build();
                (builtin.name().to_string(), Entry::new(element, Group::Builtin))
            })
            .collect();
        Self {
            prelude,
            entries,
            resolved: RefCell::default(),
            resolving: RefCell::default(),
            private: Cell::new(0),
        }
    }

    pub fn prelude(&self) -> &Arc<Prelude> {
        &self.prelude
    }

    pub fn contains(&self, fqn: &str) -> bool {
        self.entries.contains_key(fqn)
    }

    pub fn get(&self, fqn: &str) -> Option<&Entry> {
        self.entries.get(fqn)
    }

    /// Every entry, builtins included, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(fqn, entry)| (fqn.as_str(), entry))
    }

    /// Entries of one group, in insertion order.
    pub fn group(&self, group: Group) -> impl Iterator<Item = (&str, &Entry)> {
        self.iter().filter(move |(_, entry)| entry.group == group)
    }

    /// Register `entry` under `fqn`.
    ///
    /// Namespace markers never conflict, and a real declaration replaces a
    /// marker of the same name.
    ///
    /// # Errors
    ///
    /// Returns a conflict diagnostic naming both declarations when `fqn` is
    /// already declared.
    pub fn insert(&mut self, fqn: impl Into<String>, entry: Entry) -> Result<(), Diagnostic> {
        let fqn = fqn.into();
        if let Some(existing) = self.entries.get(&fqn) {
            match (existing.is_namespace(), entry.is_namespace()) {
                (_, true) => return Ok(()),
                (true, false) => {}
                (false, false) => return Err(conflict(&fqn, &entry, existing)),
            }
        }
        trace!(fqn = fqn.as_str(), group:? = entry.group; "Insert symbol");
        self.entries.insert(fqn, entry);
        Ok(())
    }

    /// Register a marker for every prefix of `namespace`.
    pub fn insert_namespace(&mut self, namespace: &[String], context: Option<&Arc<Context>>) {
        for end in 1..=namespace.len() {
            let fqn = namespace[..end].join(".");
            if self.entries.contains_key(&fqn) {
                continue;
            }
            let mut builder = ElementBuilder::new()
                .attr(Attr::Category.as_str(), Category::Namespace.as_str())
                .attr(Attr::Name.as_str(), fqn.as_str());
            if let Some(context) = context {
                builder = builder.context(Arc::clone(context));
            }
            self.entries
                .insert(fqn, Entry::new(builder.build(), Group::Global));
        }
    }

    /// A fresh name for an unnamed declaration of `category`.
    pub fn make_private(&self, namespace: &[String], category: Category) -> String {
        loop {
            let index = self.private.get();
            self.private.set(index + 1);
            let fqn = join(namespace, &format!("{category}{index}{PRIVATE_SUFFIX}"));
            if !self.entries.contains_key(&fqn) {
                return fqn;
            }
        }
    }

    /// Merge the public declarations of another unit.
    ///
    /// Private names and composition instances stay in their unit. The
    /// same declaration reached through two includes is merged once.
    ///
    /// # Errors
    ///
    /// Returns every conflict found.
    pub fn update(&mut self, other: &SymbolMap) -> Result<(), ParseError> {
        let mut collector = DiagnosticCollector::new();
        for (fqn, entry) in other.group(Group::Global) {
            if is_private(fqn) {
                continue;
            }
            match self.entries.get(fqn) {
                Some(existing) if existing.same_declaration(entry) => {}
                _ => {
                    collector.check(self.insert(fqn, entry.clone()));
                }
            }
        }
        collector.finish()
    }

    /// Resolve the declaration named `fqn`, memoizing the result.
    ///
    /// # Errors
    ///
    /// Returns the diagnostics of the declaration, or a circular reference
    /// error when `fqn` is already being resolved. Failures are not
    /// memoized.
    pub fn resolve(&self, fqn: &str) -> Result<Rc<Resolved>, ParseError> {
        if let Some(resolved) = self.resolved.borrow().get(fqn) {
            return Ok(Rc::clone(resolved));
        }
        let entry = self.entries.get(fqn).ok_or_else(|| self.unresolved(fqn, &[]))?;

        if self.resolving.borrow().iter().any(|pending| pending == fqn) {
            let chain = self.resolving.borrow().join("' -> '");
            return Err(entry
                .element
                .error(format!("Circular reference while resolving '{fqn}'."))
                .with_code(ErrorCode::E211)
                .with_help(format!("resolution chain: '{chain}' -> '{fqn}'"))
                .into());
        }

        self.resolving.borrow_mut().push(fqn.to_string());
        let result = self.resolver_for(fqn).entity(fqn, &entry.element);
        self.resolving.borrow_mut().pop();

        let resolved = Rc::new(result?);
        debug!(fqn, type_fqn:? = resolved.type_fqn(); "Resolved symbol");
        self.resolved
            .borrow_mut()
            .insert(fqn.to_string(), Rc::clone(&resolved));
        Ok(resolved)
    }

    /// A resolver looking names up from the scope of `fqn`.
    pub fn resolver_for(&self, fqn: &str) -> Resolver<'_> {
        match self.entries.get(fqn).and_then(Entry::scope) {
            Some(scope) => Resolver::new(self, scope.clone()),
            None => Resolver::new(self, Scope::new(parent(fqn), None)),
        }
    }

    /// An unresolved symbol error, with suggestions.
    pub(crate) fn unresolved(&self, name: &str, namespace: &[String]) -> Diagnostic {
        let message = if namespace.is_empty() {
            format!("Symbol '{name}' could not be resolved.")
        } else {
            format!(
                "Symbol '{name}' could not be resolved in namespace '{}'.",
                namespace.join(".")
            )
        };
        let diagnostic = Diagnostic::error(message).with_code(ErrorCode::E200);
        match self.suggest(name) {
            Some(help) => diagnostic.with_help(help),
            None => diagnostic,
        }
    }

    /// Up to five declared names similar to `name`.
    fn suggest(&self, name: &str) -> Option<String> {
        let last = name.rsplit('.').next().unwrap_or(name);
        let mut scored: Vec<(f64, &str)> = self
            .entries
            .iter()
            .filter(|(fqn, entry)| !is_private(fqn) && !entry.is_namespace())
            .map(|(fqn, _)| {
                let short = fqn.rsplit('.').next().unwrap_or(fqn);
                let score = strsim::jaro_winkler(name, fqn).max(strsim::jaro_winkler(last, short));
                (score, fqn.as_str())
            })
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored.truncate(MAX_SUGGESTIONS);

        match scored.as_slice() {
            [] => None,
            [(_, only)] => Some(format!("did you mean '{only}'?")),
            many => {
                let names: Vec<_> = many.iter().map(|(_, fqn)| format!("'{fqn}'")).collect();
                Some(format!("did you mean one of: {}?", names.join(", ")))
            }
        }
    }

    /// Serializable snapshot, without builtins.
    pub fn to_data(&self) -> IndexMap<String, EntryData> {
        self.iter()
            .filter(|(_, entry)| entry.group != Group::Builtin)
            .map(|(fqn, entry)| {
                (
                    fqn.to_string(),
                    EntryData {
                        group: entry.group,
                        path: entry.path.clone(),
                        element: entry.element.to_data(),
                        block: entry.block.clone(),
                    },
                )
            })
            .collect()
    }

    /// Rebuild a table from its snapshot. Elements are attributed to their
    /// source file again so diagnostics keep their positions.
    pub fn from_data(prelude: Arc<Prelude>, data: IndexMap<String, EntryData>) -> Self {
        let mut symbols = Self::new(prelude);
        let mut contexts: HashMap<PathBuf, Arc<Context>> = HashMap::new();
        for (fqn, entry) in data {
            let context = entry.path.as_ref().map(|path| {
                Arc::clone(
                    contexts
                        .entry(path.clone())
                        .or_insert_with(|| Context::from_path(path.clone())),
                )
            });
            let element = Element::from_data(entry.element, context.as_ref());
            symbols.entries.insert(
                fqn,
                Entry {
                    group: entry.group,
                    path: entry.path,
                    element,
                    scope: None,
                    block: entry.block,
                },
            );
        }
        symbols
    }
}

fn conflict(fqn: &str, entry: &Entry, existing: &Entry) -> Diagnostic {
    entry
        .element
        .error(format!("Symbol name '{fqn}' is in conflict..."))
        .with_code(ErrorCode::E205)
        .with_labeled(existing.element.label("...with this one."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> SymbolMap {
        SymbolMap::new(Prelude::new().unwrap())
    }

    fn declaration(category: Category, name: &str, at: std::ops::Range<usize>) -> Entry {
        let context = Context::from_content("component A {}\ncomponent A {}", None);
        let element = ElementBuilder::new()
            .attr_at("category", category.as_str(), at.clone().into())
            .attr_at("name", name, at.into())
            .context(context)
            .build();
        Entry::new(element, Group::Global)
    }

    #[test]
    fn test_conflict_names_both_positions() {
        let mut symbols = symbols();
        symbols
            .insert("A", declaration(Category::Component, "A", 10..11))
            .unwrap();
        let err = symbols
            .insert("A", declaration(Category::Component, "A", 25..26))
            .unwrap_err();

        assert_eq!(err.code(), Some(ErrorCode::E205));
        assert_eq!(err.message(), "Symbol name 'A' is in conflict...");
        let rendered = err.render();
        assert!(rendered.starts_with("<string>:2:11: error: Symbol name 'A' is in conflict..."));
        assert!(rendered.contains("<string>:1:11: note: ...with this one."));
    }

    #[test]
    fn test_namespace_markers_are_shadowed() {
        let mut symbols = symbols();
        symbols.insert_namespace(&["a".to_string(), "b".to_string()], None);
        symbols.insert_namespace(&["a".to_string()], None);
        assert!(symbols.contains("a.b"));

        symbols
            .insert("a.b", declaration(Category::Component, "b", 0..1))
            .unwrap();
        assert_eq!(symbols.get("a.b").unwrap().category(), Some(Category::Component));
    }

    #[test]
    fn test_private_names() {
        let symbols = symbols();
        let first = symbols.make_private(&["ns".to_string()], Category::Composition);
        let second = symbols.make_private(&[], Category::Expression);

        assert_eq!(first, "ns.composition0~");
        assert_eq!(second, "expression1~");
        assert!(is_private(&first));
    }

    #[test]
    fn test_update_skips_private_and_identical() {
        let mut unit = symbols();
        unit.insert("A", declaration(Category::Component, "A", 10..11)).unwrap();
        unit.insert("x0~", declaration(Category::Component, "x", 0..1)).unwrap();

        let mut target = symbols();
        target.update(&unit).unwrap();
        target.update(&unit).unwrap();

        assert!(target.contains("A"));
        assert!(!target.contains("x0~"));
    }

    #[test]
    fn test_unresolved_suggestions() {
        let symbols = symbols();
        let err = symbols.resolve("Integr").unwrap_err();
        let diagnostic = &err.diagnostics()[0];

        assert_eq!(diagnostic.code(), Some(ErrorCode::E200));
        assert_eq!(diagnostic.message(), "Symbol 'Integr' could not be resolved.");
        assert!(diagnostic.help().unwrap().contains("'Integer'"));
    }

    #[test]
    fn test_builtins_are_not_serialized() {
        let mut symbols = symbols();
        symbols.insert("A", declaration(Category::Component, "A", 10..11)).unwrap();
        let data = symbols.to_data();

        assert_eq!(data.keys().collect::<Vec<_>>(), ["A"]);
        let restored = SymbolMap::from_data(Prelude::new().unwrap(), data.clone());
        assert_eq!(restored.to_data(), data);
        assert!(restored.contains("Integer"));
    }
}
