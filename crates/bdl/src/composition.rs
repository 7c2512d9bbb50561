//! The composition elaborator.
//!
//! [`Composition`] collects the composition blocks of every visited unit
//! and elaborates one [`CompositionView`] per target:
//!
//! 1. every selected instance is resolved against the complete symbol
//!    table, so declaration order does not matter;
//! 2. instantiating a component expands its `composition:` section once
//!    per instance, with `this` bound to that instance;
//! 3. `connect` calls are checked and wired;
//! 4. executors are assigned and checked against call sites;
//! 5. `init`/`shutdown` methods are collected and the registry is ordered
//!    by dependencies.
//!
//! Errors of independent instances are all reported; a dependency cycle
//! aborts the target.

mod connections;
mod ordering;
mod view;

use std::{
    collections::{BTreeSet, HashMap, HashSet, VecDeque},
    rc::Rc,
    sync::Arc,
};

use indexmap::{IndexMap, IndexSet};
use log::{debug, info};

use bdl_parser::{
    Diagnostic, ParseError,
    error::{DiagnosticCollector, ErrorCode},
};

use crate::{
    attr::{Attr, ElementExt, Nest},
    build::{is_comment, unexpected_in_composition},
    builtins::{CONNECT, Prelude},
    contract::ContractKind,
    entity::{Category, Entity, Method, Nested, Reference},
    object::Object,
    resolver::Resolved,
    symbols::{Entry, Group, Scope, SymbolMap, is_private, parent},
};

use connections::Wiring;
pub use view::{Call, CompositionView, Connection, Parameters, RegistryEntry};

/// Elaborates composition blocks into per-target views.
#[derive(Debug)]
pub struct Composition {
    targets: Vec<String>,
    symbols: SymbolMap,
    expansions: HashMap<String, Vec<String>>,
    views: IndexMap<String, CompositionView>,
}

impl Composition {
    pub fn new(prelude: Arc<Prelude>, targets: Vec<String>) -> Self {
        Self {
            targets,
            symbols: SymbolMap::new(prelude),
            expansions: HashMap::new(),
            views: IndexMap::new(),
        }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Add the declarations and composition blocks of a compiled unit.
    ///
    /// # Errors
    ///
    /// Returns the conflicts with declarations of units visited before.
    pub fn visit(&mut self, object: &Object) -> Result<(), ParseError> {
        let mut collector = DiagnosticCollector::new();
        if let Err(err) = self.symbols.update(object.symbols()) {
            collector.extend(err);
        }
        for (fqn, entry) in object.symbols().group(Group::Composition) {
            if self
                .symbols
                .get(fqn)
                .is_some_and(|existing| existing.same_declaration(entry))
            {
                continue;
            }
            let fqn = if is_private(fqn) {
                self.symbols.make_private(&parent(fqn), Category::Expression)
            } else {
                fqn.to_string()
            };
            collector.check(self.symbols.insert(fqn, entry.clone()));
        }
        debug!(unit = object.context().display_path(); "Unit visited");
        collector.finish()
    }

    /// Elaborate every target.
    ///
    /// # Errors
    ///
    /// Returns the diagnostics of every failed target; targets that
    /// succeeded are still available through [`Composition::view`].
    pub fn process(&mut self) -> Result<(), ParseError> {
        let mut collector = DiagnosticCollector::new();
        for target in self.targets.clone() {
            info!(target = target.as_str(); "Composing target");
            let elaboration = Elaboration::new(
                &mut self.symbols,
                &mut self.expansions,
                &self.targets,
                target.clone(),
            );
            match elaboration.run() {
                Ok(view) => {
                    info!(
                        target = target.as_str(),
                        instances = view.registry.len(),
                        workloads = view.workloads.len();
                        "Target composed"
                    );
                    self.views.insert(target, view);
                }
                Err(err) => collector.extend(err),
            }
        }
        collector.finish()
    }

    pub fn view(&self, target: &str) -> Option<&CompositionView> {
        self.views.get(target)
    }

    pub fn views(&self) -> impl Iterator<Item = &CompositionView> {
        self.views.values()
    }
}

/// What a composition entry stands for.
enum Kind {
    Value,
    Connect,
    Call,
    Instance(Category),
}

struct Instance {
    resolved: Rc<Resolved>,
    parent: Option<String>,
    lineage: Vec<String>,
}

struct PendingCall {
    fqn: String,
    resolved: Rc<Resolved>,
    workload: bool,
}

/// The elaboration of one target.
struct Elaboration<'c> {
    symbols: &'c mut SymbolMap,
    expansions: &'c mut HashMap<String, Vec<String>>,
    targets: &'c [String],
    target: String,
    collector: DiagnosticCollector,
    seen: HashSet<String>,
    instances: IndexMap<String, Instance>,
    calls: Vec<PendingCall>,
    wiring: Wiring,
}

impl<'c> Elaboration<'c> {
    fn new(
        symbols: &'c mut SymbolMap,
        expansions: &'c mut HashMap<String, Vec<String>>,
        targets: &'c [String],
        target: String,
    ) -> Self {
        Self {
            symbols,
            expansions,
            targets,
            target,
            collector: DiagnosticCollector::new(),
            seen: HashSet::new(),
            instances: IndexMap::new(),
            calls: Vec::new(),
            wiring: Wiring::default(),
        }
    }

    /// Whether an entry of `block` belongs to this target. Blocks named
    /// after another requested target are left to it.
    fn selects(&self, entry: &Entry) -> bool {
        match entry.block() {
            Some(block) if self.targets.iter().any(|target| target == block) => {
                block == self.target
            }
            _ => true,
        }
    }

    fn run(mut self) -> Result<CompositionView, ParseError> {
        let mut worklist: VecDeque<String> = self
            .symbols
            .group(Group::Composition)
            .filter(|(_, entry)| entry.scope().is_none() && self.selects(entry))
            .map(|(fqn, _)| fqn.to_string())
            .collect();

        // Entries referring to members of expanded instances only resolve
        // once the expansion happened, so failures are retried while
        // expansions make progress.
        loop {
            let mut deferred = Vec::new();
            let mut expanded = false;
            while let Some(fqn) = worklist.pop_front() {
                if self.seen.contains(&fqn) {
                    continue;
                }
                match self.symbols.resolve(&fqn) {
                    Ok(resolved) => {
                        self.seen.insert(fqn.clone());
                        match self.classify(&fqn, resolved) {
                            Ok(members) => {
                                expanded |= !members.is_empty();
                                worklist.extend(members);
                            }
                            Err(err) => self.collector.extend(err),
                        }
                    }
                    Err(err) => deferred.push((fqn, err)),
                }
            }
            if deferred.is_empty() {
                break;
            }
            if !expanded {
                for (_, err) in deferred {
                    self.collector.extend(err);
                }
                break;
            }
            worklist.extend(deferred.into_iter().map(|(fqn, _)| fqn));
        }

        let executors = self.assign_executors();
        let (workloads, services) = self.bind_calls(&executors);
        self.finish(executors, workloads, services)
    }

    /// Register one resolved entry, returning the members it expanded to.
    fn classify(&mut self, fqn: &str, resolved: Rc<Resolved>) -> Result<Vec<String>, ParseError> {
        match self.kind(&resolved)? {
            Kind::Value => Ok(Vec::new()),
            Kind::Connect => {
                for diagnostic in self.wiring.connect(&resolved) {
                    self.collector.emit(diagnostic);
                }
                Ok(Vec::new())
            }
            Kind::Call => {
                if resolved.this().is_none() {
                    return Err(resolved
                        .error(format!(
                            "Method '{}' must be called on an instance.",
                            resolved.symbol().unwrap_or_default()
                        ))
                        .with_code(ErrorCode::E408)
                        .into());
                }
                let workload = self
                    .symbols
                    .get(fqn)
                    .is_none_or(|entry| entry.scope().is_none());
                self.calls.push(PendingCall {
                    fqn: fqn.to_string(),
                    resolved,
                    workload,
                });
                Ok(Vec::new())
            }
            Kind::Instance(category) => self.instantiate(fqn, resolved, category),
        }
    }

    fn kind(&self, resolved: &Resolved) -> Result<Kind, ParseError> {
        if resolved.value_fqn().is_some()
            || resolved.literal().is_some()
            || resolved.regexpr().is_some()
            || resolved.preset().is_some()
        {
            return Ok(Kind::Value);
        }
        let Some(type_fqn) = resolved.type_fqn() else {
            return Ok(Kind::Value);
        };
        let declaration = self.symbols.resolve(type_fqn)?;
        Ok(match declaration.category() {
            Category::Builtin if type_fqn == CONNECT => Kind::Connect,
            Category::Builtin | Category::Enum => Kind::Value,
            Category::Method => Kind::Call,
            category @ (Category::Component | Category::Struct | Category::Interface) => {
                Kind::Instance(category)
            }
            other => {
                return Err(resolved
                    .error(format!("A {other} cannot be used as a composition entry."))
                    .with_code(ErrorCode::E408)
                    .into());
            }
        })
    }

    fn instantiate(
        &mut self,
        fqn: &str,
        resolved: Rc<Resolved>,
        category: Category,
    ) -> Result<Vec<String>, ParseError> {
        if is_private(fqn) {
            return Err(resolved
                .error("An instance must be named.")
                .with_code(ErrorCode::E208)
                .into());
        }
        let type_fqn = resolved.type_fqn().unwrap_or_default().to_string();
        let entry = self.symbols.get(fqn);
        let parent = entry
            .and_then(Entry::scope)
            .and_then(Scope::this)
            .map(str::to_string);
        let block = entry.and_then(Entry::block).map(str::to_string);

        let mut lineage = parent
            .as_ref()
            .and_then(|parent| self.instances.get(parent))
            .map(|instance| instance.lineage.clone())
            .unwrap_or_default();
        if lineage.contains(&type_fqn) {
            return Err(resolved
                .error(format!(
                    "Recursive composition: '{type_fqn}' instantiates itself through '{fqn}'."
                ))
                .with_code(ErrorCode::E409)
                .into());
        }
        lineage.push(type_fqn.clone());

        debug!(fqn, type_fqn = type_fqn.as_str(), parent:? = parent; "Instance registered");
        self.instances.insert(
            fqn.to_string(),
            Instance {
                resolved,
                parent,
                lineage,
            },
        );

        if category == Category::Component {
            self.expand(fqn, &type_fqn, block)
        } else {
            Ok(Vec::new())
        }
    }

    /// Register the `composition:` members of `component` for `instance`.
    fn expand(
        &mut self,
        instance: &str,
        component: &str,
        block: Option<String>,
    ) -> Result<Vec<String>, ParseError> {
        if let Some(members) = self.expansions.get(instance) {
            return Ok(members.clone());
        }

        let mut collector = DiagnosticCollector::new();
        let mut members = Vec::new();
        let namespace: Vec<String> = instance.split('.').map(str::to_string).collect();
        for owner in owners(&*self.symbols, component)? {
            let Some(element) = self.symbols.get(&owner).map(|entry| entry.element().clone()) else {
                continue;
            };
            let scope = Scope::new(
                owner.split('.').map(str::to_string).collect(),
                Some(instance.to_string()),
            );
            for member in element.nested_iter(Nest::Composition) {
                if is_comment(member) {
                    continue;
                }
                match Entity::new(member) {
                    Ok(Entity::Expression(_)) => {}
                    Ok(entity) => {
                        collector.emit(unexpected_in_composition(member, entity.category()));
                        continue;
                    }
                    Err(diagnostic) => {
                        collector.emit(diagnostic);
                        continue;
                    }
                }
                let fqn = match member.get(Attr::Name) {
                    Some(name) => format!("{instance}.{}", name.trim_end_matches("...")),
                    None => self.symbols.make_private(&namespace, Category::Expression),
                };
                let entry = Entry::new(member.clone(), Group::Composition)
                    .with_scope(scope.clone())
                    .with_block(block.clone());
                if collector.check(self.symbols.insert(fqn.clone(), entry)).is_some() {
                    members.push(fqn);
                }
            }
        }
        collector.finish()?;

        debug!(instance, members = members.len(); "Instance expanded");
        self.expansions.insert(instance.to_string(), members.clone());
        Ok(members)
    }

    /// Executor of every instance, in registry order.
    fn assign_executors(&mut self) -> IndexMap<String, Option<String>> {
        let executors: Vec<String> = self
            .instances
            .iter()
            .filter(|(_, instance)| {
                instance
                    .resolved
                    .contracts()
                    .get(ContractKind::Executor)
                    .is_some_and(|contract| contract.arg().is_none())
            })
            .map(|(fqn, _)| fqn.clone())
            .collect();

        let mut assigned: IndexMap<String, Option<String>> = IndexMap::new();
        for (fqn, instance) in &self.instances {
            let executor = match instance.resolved.contracts().get(ContractKind::Executor) {
                Some(contract) => match contract.arg() {
                    None => Some(fqn.clone()),
                    Some(name) => match self.symbols.resolver_for(fqn).find(name) {
                        Some(target) => Some(target),
                        None => {
                            self.collector.emit(
                                contract
                                    .error(format!("Executor '{name}' could not be resolved."))
                                    .with_code(ErrorCode::E200),
                            );
                            None
                        }
                    },
                },
                None => match &instance.parent {
                    Some(parent) => assigned.get(parent).cloned().flatten(),
                    None => match executors.as_slice() {
                        [] => None,
                        [only] => Some(only.clone()),
                        many => {
                            self.collector.emit(
                                instance
                                    .resolved
                                    .error(format!(
                                        "No executor is assigned to this expression on a \
                                         multi-executor ({}) composition.",
                                        many.join(", ")
                                    ))
                                    .with_code(ErrorCode::E407),
                            );
                            None
                        }
                    },
                },
            };
            assigned.insert(fqn.clone(), executor);
        }
        assigned
    }

    /// Check the executor of every call against its instance.
    fn bind_calls(
        &mut self,
        executors: &IndexMap<String, Option<String>>,
    ) -> (Vec<Call>, IndexMap<String, Call>) {
        let mut workloads = Vec::new();
        let mut services: IndexMap<String, Call> = IndexMap::new();

        for pending in std::mem::take(&mut self.calls) {
            let resolved = &pending.resolved;
            let instance = resolved.this().unwrap_or_default().to_string();
            let Some(executor) = executors.get(&instance) else {
                self.collector.emit(
                    resolved
                        .error(format!("'{instance}' is not an instance of this composition."))
                        .with_code(ErrorCode::E408),
                );
                continue;
            };

            if let Some(contract) = resolved.contracts().get(ContractKind::Executor) {
                let requested = contract
                    .arg()
                    .and_then(|name| self.symbols.resolver_for(&pending.fqn).find(name));
                if requested.is_none() || requested != *executor {
                    let mut diagnostic = resolved
                        .error(format!(
                            "Mismatch of executors between this expression and '{instance}'."
                        ))
                        .with_code(ErrorCode::E404);
                    if let Some(owner) = self.instances.get(&instance) {
                        let runs_on = executor
                            .as_deref()
                            .map_or("no executor".to_string(), |e| format!("'{e}'"));
                        diagnostic = diagnostic.with_labeled(
                            owner.resolved.label(format!("'{instance}' runs on {runs_on}.")),
                        );
                    }
                    self.collector.emit(diagnostic);
                    continue;
                }
            }

            let method = resolved.type_fqn().unwrap_or_default().to_string();
            let mut call = Call::new(instance, method, Rc::clone(resolved));
            call.set_executor(executor.clone());
            if pending.workload {
                workloads.push(call);
            } else {
                services.insert(call.id().to_string(), call);
            }
        }

        for workload in &workloads {
            services.shift_remove(workload.id());
        }
        (workloads, services)
    }

    fn finish(
        mut self,
        executors: IndexMap<String, Option<String>>,
        workloads: Vec<Call>,
        services: IndexMap<String, Call>,
    ) -> Result<CompositionView, ParseError> {
        let mut deps: IndexMap<String, BTreeSet<String>> = IndexMap::new();
        for (fqn, instance) in &self.instances {
            deps.insert(fqn.clone(), self.instance_deps(fqn, &instance.resolved));
        }

        let order = match ordering::order(&deps) {
            Ok(order) => order,
            Err(cycle) => {
                let first = cycle.0.first().and_then(|fqn| self.instances.get(fqn));
                let message = format!(
                    "The dependencies of this expression are not met: {}.",
                    cycle.describe()
                );
                let diagnostic = match first {
                    Some(instance) => instance.resolved.error(message),
                    None => Diagnostic::error(message),
                };
                self.collector.emit(diagnostic.with_code(ErrorCode::E406));
                return Err(self
                    .collector
                    .finish()
                    .err()
                    .unwrap_or_else(|| ParseError::new(Vec::new())));
            }
        };

        let mut registry = IndexMap::new();
        for fqn in order {
            let Some(instance) = self.instances.get(&fqn) else {
                continue;
            };
            let mut entry = RegistryEntry::new(Rc::clone(&instance.resolved));
            entry.set_executor(executors.get(&fqn).cloned().flatten());
            entry.set_deps(
                deps.get(&fqn)
                    .map(|deps| deps.iter().cloned().collect())
                    .unwrap_or_default(),
            );
            match self.lifecycle(&fqn, &instance.resolved) {
                Ok((init, shutdown)) => entry.set_lifecycle(init, shutdown),
                Err(err) => self.collector.extend(err),
            }
            registry.insert(fqn, entry);
        }
        for call in workloads.iter().chain(services.values()) {
            if let Some(entry) = registry.get_mut(call.instance()) {
                entry.push_intra(call.id().to_string());
            }
        }

        self.collector.finish()?;

        let init = registry
            .values()
            .flat_map(|entry: &RegistryEntry| entry.init().iter().cloned())
            .collect();
        let shutdown = registry
            .values()
            .rev()
            .flat_map(|entry: &RegistryEntry| entry.shutdown().iter().cloned())
            .collect();
        Ok(CompositionView {
            target: self.target,
            registry,
            workloads,
            services: services.into_values().collect(),
            connections: self.wiring.into_connections(),
            executors: bound_executors(&executors),
            init,
            shutdown,
        })
    }

    /// Instances `resolved` depends on, directly or through values.
    fn instance_deps(&self, fqn: &str, resolved: &Resolved) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut pending: Vec<String> = resolved.deps().iter().cloned().collect();
        while let Some(dep) = pending.pop() {
            if dep == fqn || !visited.insert(dep.clone()) {
                continue;
            }
            if self.instances.contains_key(&dep) {
                found.insert(dep);
            } else if let Ok(value) = self.symbols.resolve(&dep) {
                pending.extend(value.deps().iter().cloned());
            }
        }
        found
    }

    /// The `init` and `shutdown` methods of an instance.
    fn lifecycle(
        &self,
        fqn: &str,
        resolved: &Resolved,
    ) -> Result<(Vec<String>, Vec<String>), ParseError> {
        let Some(type_fqn) = resolved.type_fqn() else {
            return Ok((Vec::new(), Vec::new()));
        };

        let mut methods: IndexMap<String, (bool, bool)> = IndexMap::new();
        let mut collector = DiagnosticCollector::new();
        for owner in owners(&*self.symbols, type_fqn)? {
            let Some(entry) = self.symbols.get(&owner) else {
                continue;
            };
            let Some(category) = entry.category() else {
                continue;
            };
            for member in Nested::new(entry.element(), category).section(Nest::Interface) {
                if member.get(Attr::Category) != Some(Category::Reference.as_str()) {
                    continue;
                }
                let target = Reference::new(member)?.target();
                let method = self.symbols.resolve(target)?;
                if method.category() != Category::Method {
                    continue;
                }
                let init = method.contracts().has(ContractKind::Init);
                let shutdown = method.contracts().has(ContractKind::Shutdown);
                if init || shutdown {
                    if let Some(declaration) = self.symbols.get(target) {
                        if Method::new(declaration.element())?.has_arguments() {
                            let kind = if init { "init" } else { "shutdown" };
                            let name = method.name().unwrap_or_default();
                            collector.emit(
                                method
                                    .error(format!(
                                        "Method '{name}' is tagged '{kind}' and must not take \
                                         arguments."
                                    ))
                                    .with_code(ErrorCode::E405),
                            );
                            continue;
                        }
                    }
                }
                let name = method.name().unwrap_or_default().to_string();
                methods.insert(name, (init, shutdown));
            }
        }
        collector.finish()?;

        let init = methods
            .iter()
            .filter(|(_, (init, _))| *init)
            .map(|(name, _)| format!("{fqn}.{name}"))
            .collect();
        let shutdown = methods
            .iter()
            .filter(|(_, (_, shutdown))| *shutdown)
            .map(|(name, _)| format!("{fqn}.{name}"))
            .collect();
        Ok((init, shutdown))
    }
}

/// Instances tagged `[executor]`, followed by every other entry an
/// instance was bound to.
fn bound_executors(assigned: &IndexMap<String, Option<String>>) -> Vec<String> {
    let mut executors: IndexSet<String> = assigned
        .iter()
        .filter(|(fqn, executor)| executor.as_deref() == Some(fqn.as_str()))
        .map(|(fqn, _)| fqn.clone())
        .collect();
    executors.extend(assigned.values().flatten().cloned());
    executors.into_iter().collect()
}

/// A type followed by its ancestors, bases first.
fn owners(symbols: &SymbolMap, type_fqn: &str) -> Result<Vec<String>, ParseError> {
    let mut ordered = Vec::new();
    let mut visiting = Vec::new();
    visit_owner(symbols, type_fqn, &mut ordered, &mut visiting)?;
    Ok(ordered)
}

fn visit_owner(
    symbols: &SymbolMap,
    fqn: &str,
    ordered: &mut Vec<String>,
    visiting: &mut Vec<String>,
) -> Result<(), ParseError> {
    if ordered.iter().any(|owner| owner == fqn) || visiting.iter().any(|owner| owner == fqn) {
        return Ok(());
    }
    visiting.push(fqn.to_string());
    let resolved = symbols.resolve(fqn)?;
    for parent in resolved.parents() {
        visit_owner(symbols, parent, ordered, visiting)?;
    }
    visiting.pop();
    ordered.push(fqn.to_string());
    Ok(())
}
