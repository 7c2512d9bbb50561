//! The build pass: from a parsed unit to its symbol table.
//!
//! Top-level declarations are registered under the current namespace.
//! Members of `interface` and `config` sections are registered as
//! `Owner.member` and replaced in their owner by reference elements, so
//! every declaration is resolved exactly once. Composition blocks
//! register their instances in the composition group. Once the whole
//! unit is registered, every declaration is resolved so errors surface
//! regardless of declaration order.

use std::{path::PathBuf, sync::Arc};

use log::{debug, trace};

use bdl_parser::{
    Context, Diagnostic, Element, ElementBuilder, Sequence,
    error::{DiagnosticCollector, ErrorCode},
};

use crate::{
    attr::{Attr, ElementExt, Nest},
    entity::{Category, Entity, Enum, Namespace, Nested, Use},
    error::BdlError,
    object::ObjectContext,
    symbols::{Entry, Group, SymbolMap, join},
};

/// What a build produces: the symbol table, the top-level FQNs and every
/// included path.
pub(crate) type Built = (SymbolMap, Vec<String>, Vec<PathBuf>);

pub(crate) struct Builder<'o> {
    objects: &'o mut ObjectContext,
    context: Arc<Context>,
    symbols: SymbolMap,
    namespace: Vec<String>,
    tree: Vec<String>,
    declared: Vec<String>,
    includes: Vec<PathBuf>,
    collector: DiagnosticCollector,
}

impl<'o> Builder<'o> {
    pub(crate) fn new(objects: &'o mut ObjectContext, context: Arc<Context>) -> Self {
        let symbols = SymbolMap::new(Arc::clone(objects.prelude()));
        Self {
            objects,
            context,
            symbols,
            namespace: Vec::new(),
            tree: Vec::new(),
            declared: Vec::new(),
            includes: Vec::new(),
            collector: DiagnosticCollector::new(),
        }
    }

    pub(crate) fn build(mut self, sequence: Sequence) -> Result<Built, BdlError> {
        for element in sequence.into_elements() {
            self.top_level(element)?;
        }

        for fqn in &self.declared {
            if let Err(err) = self.symbols.resolve(fqn) {
                self.collector.extend(err);
            }
        }
        self.collector.finish()?;

        debug!(
            path = self.context.display_path(),
            symbols = self.declared.len(),
            includes = self.includes.len();
            "Unit registered"
        );
        Ok((self.symbols, self.tree, self.includes))
    }

    fn top_level(&mut self, element: Element) -> Result<(), BdlError> {
        if is_comment(&element) {
            return Ok(());
        }
        let category = match Entity::new(&element) {
            Ok(entity) => entity.category(),
            Err(diagnostic) => {
                self.collector.emit(diagnostic);
                return Ok(());
            }
        };

        match category {
            Category::Namespace => {
                let segments: Vec<String> = Namespace::new(&element)
                    .segments()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                self.symbols.insert_namespace(&segments, Some(&self.context));
                trace!(namespace:? = segments; "Entering namespace");
                self.namespace = segments;
            }
            Category::Use => {
                let path = match Use::new(&element) {
                    Ok(directive) => directive.path().to_string(),
                    Err(diagnostic) => {
                        self.collector.emit(diagnostic);
                        return Ok(());
                    }
                };
                self.include(&element, &path)?;
            }
            Category::Composition => {
                self.composition(&element);
            }
            Category::Expression if !element.is_set(Attr::Name) => {
                let fqn = self.symbols.make_private(&self.namespace, Category::Expression);
                self.register(fqn, element);
            }
            _ => match element.get(Attr::Name) {
                Some(name) => {
                    let fqn = join(&self.namespace, name.trim_end_matches("..."));
                    self.register(fqn, element);
                }
                None => self.collector.emit(
                    element
                        .error(format!("A top-level {category} must be named."))
                        .with_code(ErrorCode::E202),
                ),
            },
        }
        Ok(())
    }

    fn include(&mut self, element: &Element, path: &str) -> Result<(), BdlError> {
        let (resolved, object) = match self.objects.include(element, path) {
            Ok(included) => included,
            Err(BdlError::Parse(err)) => {
                self.collector.extend(err);
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        if let Err(err) = self.symbols.update(object.symbols()) {
            self.collector.extend(err);
        }
        for include in std::iter::once(&resolved).chain(object.includes()) {
            if !self.includes.contains(include) {
                self.includes.push(include.clone());
            }
        }
        Ok(())
    }

    /// Register a top-level declaration and remember it in the tree.
    fn register(&mut self, fqn: String, element: Element) {
        self.tree.push(fqn.clone());
        self.declare(fqn, element);
    }

    /// Register a declaration and everything declared inside it.
    fn declare(&mut self, fqn: String, element: Element) {
        let category = element.get(Attr::Category).and_then(Category::parse);
        let element = match category {
            Some(Category::Component | Category::Interface | Category::Struct)
                if !element.is_set(Attr::Extern) =>
            {
                self.nested(&fqn, element)
            }
            Some(Category::Enum) => {
                self.enum_values(&fqn, &element);
                element
            }
            _ => element,
        };
        self.insert(fqn, Entry::new(element, Group::Global));
    }

    fn insert(&mut self, fqn: String, entry: Entry) {
        let global = entry.group() == Group::Global;
        match self.symbols.insert(fqn.clone(), entry) {
            Ok(()) if global => self.declared.push(fqn),
            Ok(()) => {}
            Err(diagnostic) => self.collector.emit(diagnostic),
        }
    }

    /// Move the members of the parameter and interface sections out of
    /// `element`, leaving references behind.
    fn nested(&mut self, fqn: &str, element: Element) -> Element {
        let category = element.get(Attr::Category).and_then(Category::parse);
        if category == Some(Category::Component) {
            let misplaced = element
                .nested_iter(Nest::Invalid)
                .find(|member| !is_comment(member));
            if let Some(member) = misplaced {
                self.collector.emit(
                    member
                        .error(
                            "Component members must be declared in an 'interface', 'config' \
                             or 'composition' section.",
                        )
                        .with_code(ErrorCode::E208),
                );
            }
        }

        let mut builder = element.clone().into_builder();
        for section in [Nest::Interface, Nest::Config] {
            let Some(members) = element.nested(section) else {
                continue;
            };
            let mut references = Vec::new();
            for member in members.iter().filter(|member| !is_comment(member)) {
                match self.member(fqn, member.clone()) {
                    Some(reference) => references.push(reference),
                    None => references.push(member.clone()),
                }
            }
            builder = builder.sequence(section.as_str(), Sequence::from_elements(references));
        }
        builder.build()
    }

    /// Register one section member, returning the reference replacing it.
    fn member(&mut self, owner: &str, member: Element) -> Option<Element> {
        let name_attr = member.get_attr(Attr::Name)?.clone();
        let name = name_attr.value().trim_end_matches("...").to_string();
        let fqn = format!("{owner}.{name}");

        let mut reference = ElementBuilder::new()
            .attr(Attr::Category.as_str(), Category::Reference.as_str())
            .attr_at(Attr::Name.as_str(), name_attr.value(), name_attr.span())
            .attr_at(Attr::Symbol.as_str(), fqn.as_str(), name_attr.span());
        if let Some(context) = member.context() {
            reference = reference.context(Arc::clone(context));
        }
        self.declare(fqn, member);
        Some(reference.build())
    }

    fn enum_values(&mut self, fqn: &str, element: &Element) {
        let Ok(declaration) = Enum::new(element) else {
            return;
        };
        for value in declaration.values() {
            let Some(name) = value.get(Attr::Name) else {
                continue;
            };
            let value_fqn = format!("{fqn}.{name}");
            let value = value
                .clone()
                .into_builder()
                .attr(Attr::Category.as_str(), Category::EnumValue.as_str())
                .build();
            self.insert(value_fqn, Entry::new(value, Group::Global));
        }
    }

    /// Register the instances of a composition block.
    ///
    /// Members of a named block live in the namespace of the block name, and
    /// remember the block so composition can select them by target.
    fn composition(&mut self, element: &Element) {
        let block = Nested::new(element, Category::Composition)
            .name()
            .map(str::to_string);
        let mut namespace = self.namespace.clone();
        if let Some(block) = &block {
            namespace.push(block.clone());
            self.symbols.insert_namespace(&namespace, Some(&self.context));
        }

        for member in element.nested_iter(Nest::Composition) {
            if is_comment(member) {
                continue;
            }
            let expression = match Entity::new(member) {
                Ok(Entity::Expression(expression)) => expression,
                Ok(entity) => {
                    self.collector.emit(unexpected_in_composition(member, entity.category()));
                    continue;
                }
                Err(diagnostic) => {
                    self.collector.emit(diagnostic);
                    continue;
                }
            };
            let fqn = match expression.name() {
                Some(name) => join(&namespace, name),
                None => self.symbols.make_private(&namespace, Category::Expression),
            };
            let entry = Entry::new(member.clone(), Group::Composition).with_block(block.clone());
            self.insert(fqn, entry);
        }
    }
}

/// An element holding nothing but comments.
pub(crate) fn is_comment(element: &Element) -> bool {
    element.sequences().next().is_none()
        && element
            .attrs()
            .all(|(name, _)| name == Attr::Comment.as_str())
}

pub(crate) fn unexpected_in_composition(element: &Element, category: Category) -> Diagnostic {
    element
        .error(format!(
            "Only expressions can be declared in a composition, found a {category}."
        ))
        .with_code(ErrorCode::E208)
}
