//! The BDL grammar.
//!
//! Every construct of the language is an arena list of
//! [`GrammarItem`]s. Expressions, templates and call arguments are
//! recursive, so their lists are declared first and filled once every
//! list they refer to exists.

use bdl_parser::grammar::{
    Action, Grammar, GrammarBuilder, GrammarError, GrammarId, GrammarItem, Pattern,
};

use crate::{
    attr::{Attr, Nest},
    entity::Category,
};

/// Words that can never be used as a name or a symbol segment.
pub const RESERVED: &[&str] = &[
    "const",
    "interface",
    "struct",
    "component",
    "method",
    "namespace",
    "use",
    "using",
    "config",
    "composition",
];

const NAME: &str = r"[a-zA-Z_][0-9a-zA-Z_]*";
const FQN: &str = r"[a-zA-Z_][0-9a-zA-Z_]*(?:\.[a-zA-Z_][0-9a-zA-Z_]*)*";

type Result<T> = std::result::Result<T, GrammarError>;

/// Build the complete BDL grammar.
pub fn build() -> Result<Grammar> {
    BdlGrammar::new()?.finish()
}

fn item(pattern: &str) -> Result<GrammarItem> {
    GrammarItem::new(pattern)
}

fn keyword(word: &str) -> Result<GrammarItem> {
    item(&format!(r"{word}\b"))
}

fn guarded(pattern: String, groups: &[&str]) -> Result<Pattern> {
    let mut pattern = Pattern::new(&pattern)?;
    for group in groups {
        pattern = pattern.reserve(group, RESERVED);
    }
    Ok(pattern)
}

fn name() -> Result<GrammarItem> {
    Ok(GrammarItem::from_pattern(guarded(
        format!(r"(?P<name>{NAME})\b"),
        &["name"],
    )?))
}

fn symbol() -> Result<GrammarItem> {
    Ok(GrammarItem::from_pattern(guarded(
        format!(r"(?P<symbol>{FQN})\b"),
        &["symbol"],
    )?))
}

fn category(item: GrammarItem, category: Category) -> GrammarItem {
    item.attr(Attr::Category.as_str(), category.as_str())
}

fn nested_start(nest: Nest) -> Action {
    Action::NestedStart(nest.as_str().to_string())
}

struct BdlGrammar {
    builder: GrammarBuilder,
    template: GrammarId,
    arguments: GrammarId,
}

impl BdlGrammar {
    fn new() -> Result<Self> {
        let mut builder = GrammarBuilder::new();
        let template = builder.declare();
        let arguments = builder.declare();
        let mut grammar = Self {
            builder,
            template,
            arguments,
        };
        grammar.fill_template()?;
        grammar.fill_arguments()?;
        Ok(grammar)
    }

    fn finish(mut self) -> Result<Grammar> {
        let root = self.builder.declare();
        let body = self.builder.declare();

        let namespace = self.namespace()?;
        let use_ = self.use_()?;
        let extern_ = self.extern_()?;
        let members = self.members(body)?;

        for list in [namespace, use_, extern_, members] {
            self.builder.include(root, list);
        }

        for (word, nest) in [
            ("interface", Nest::Interface),
            ("config", Nest::Config),
            ("composition", Nest::Composition),
        ] {
            let start = self
                .builder
                .list([item(":")?.action(nested_start(nest)).then(body)]);
            self.builder.push(
                body,
                keyword(word)?
                    .followed_by(Pattern::new(r"\s*:")?)
                    .action(Action::ParentElement)
                    .then(start),
            );
        }
        self.builder
            .push(body, item(r"\}")?.action(Action::NestedStopNewElement));
        self.builder.include(body, members);

        let pre = self.builder.list([
            item(r"\s+")?.action(Action::Skip),
            item(r"/\*(?P<comment>[\s\S]*?)\*/")?.action(Action::BlockComment),
            item(r"//(?P<comment>[^\n]*)")?.action(Action::Comment),
        ]);

        self.builder.build(root, Some(pre))
    }

    /// Declarations allowed both at the top level and inside a body.
    fn members(&mut self, body: GrammarId) -> Result<GrammarId> {
        let using = self.using()?;
        let enum_ = self.enum_()?;
        let method = self.method()?;
        let component = self.nested(Category::Component, Nest::Invalid, body)?;
        let interface = self.nested(Category::Interface, Nest::Interface, body)?;
        let struct_ = self.nested(Category::Struct, Nest::Interface, body)?;
        let composition = self.nested(Category::Composition, Nest::Composition, body)?;

        let end = self.statement_end()?;
        let expression = self.fragments(end)?;
        let variable = self.variable(expression)?;
        let call = category(item("")?, Category::Expression)
            .followed_by(guarded(format!(r"(?P<symbol>{FQN})\b"), &["symbol"])?)
            .then(expression);

        let members = self.builder.declare();
        for list in [using, enum_, method, component, interface, struct_, composition] {
            self.builder.include(members, list);
        }
        self.builder.push(members, variable);
        self.builder.push(members, call);
        Ok(members)
    }

    /// `[kind, kind(value, ...), ...]`
    fn contracts(&mut self, nest: Nest) -> Result<GrammarId> {
        let after_value = self.builder.list([
            item(",")?.action(Action::NewElement),
            item(r"\)")?.action(Action::ParentElement),
        ]);
        let values = self.builder.list([
            item(r"(?P<value>[\-\.0-9a-zA-Z_]+)")?.then(after_value),
            item(r"\)")?.action(Action::ParentElement),
        ]);
        let after_kind = self.builder.list([
            item(r"\(")?.action(nested_start(Nest::Values)).then(values),
            item(r"\]")?.action(Action::ParentElement),
            item(",")?.action(Action::NewElement),
            item("")?.action(Action::NewElement),
        ]);
        let kind = self
            .builder
            .list([item(&format!(r"(?P<type>{NAME})\b"))?.then(after_kind)]);
        Ok(self
            .builder
            .list([item(r"\[")?.action(nested_start(nest)).then(kind)]))
    }

    /// Contracts then `;`.
    fn statement_end(&mut self) -> Result<GrammarId> {
        let contracts = self.contracts(Nest::Contract)?;
        let end = self.builder.declare();
        self.builder.include(end, contracts);
        self.builder.push(end, item(";")?.action(Action::NewElement));
        Ok(end)
    }

    /// The fragments of an expression, continuing with `next` once the
    /// expression is over.
    fn fragments(&mut self, next: GrammarId) -> Result<GrammarId> {
        let value = self.builder.declare();
        let after_symbol = self.builder.list([
            item("<")?
                .action(nested_start(Nest::Template))
                .then(self.template),
            item(r"\(")?
                .action(nested_start(Nest::Argument))
                .then(self.arguments),
            item("")?.action(Action::NewElement).then(value),
        ]);

        self.builder.push(
            value,
            item(r"/(?P<regexpr>[^\s/0-9][^\s/]*)/")?
                .action(Action::NewElement)
                .then(value),
        );
        self.builder.push(
            value,
            item(&format!(r"\{{(?P<preset>{FQN})\}}"))?
                .action(Action::NewElement)
                .then(value),
        );
        self.builder.push(
            value,
            item(r"(?P<operator>[+\-*/])")?
                .action(Action::NewElement)
                .then(value),
        );
        self.builder.push(
            value,
            item(r#"(?P<value>"(?:[^"\\]|\\.)*"|[0-9]+(?:\.[0-9]+)?\b|true\b|false\b)"#)?
                .action(Action::NewElement)
                .then(value),
        );
        self.builder
            .push(value, keyword("const")?.attr(Attr::Const.as_str(), ""));
        self.builder.push(value, symbol()?.then(after_symbol));
        self.builder
            .push(value, item("")?.action(Action::ParentElement).then(next));

        Ok(self
            .builder
            .list([item("")?.action(nested_start(Nest::Fragments)).then(value)]))
    }

    /// `name[...] [: Interface] = expression`
    fn variable(&mut self, expression: GrammarId) -> Result<GrammarItem> {
        let pattern = guarded(
            format!(r"(?P<name>{NAME}(?:\.\.\.)?)\s*(?::\s*(?P<interface>{FQN})\s*)?="),
            &["name", "interface"],
        )?;
        Ok(category(GrammarItem::from_pattern(pattern), Category::Expression).then(expression))
    }

    /// `Type<const Type, Type<...>>`
    fn fill_template(&mut self) -> Result<()> {
        let after = self.builder.list([
            item("<")?
                .action(nested_start(Nest::Template))
                .then(self.template),
            item(",")?.action(Action::NewElement),
            item(">")?.action(Action::ParentElement),
        ]);
        self.builder
            .push(self.template, keyword("const")?.attr(Attr::Const.as_str(), ""));
        self.builder.push(self.template, symbol()?.then(after));
        Ok(())
    }

    /// `(expression, name = expression, ...)`
    fn fill_arguments(&mut self) -> Result<()> {
        let next = self.builder.list([
            item(",")?.action(Action::NewElement),
            item(r"\)")?.action(Action::ParentElement),
        ]);
        let expression = self.fragments(next)?;
        let named = self.builder.list([GrammarItem::from_pattern(guarded(
            format!(r"(?P<name>{NAME})\s*="),
            &["name"],
        )?)
        .then(expression)]);
        self.builder.include(named, expression);

        self.builder
            .push(self.arguments, item(r"\)")?.action(Action::ParentElement));
        self.builder.push(
            self.arguments,
            category(item("")?, Category::Expression).then(named),
        );
        Ok(())
    }

    /// `method name(arguments) [contracts] -> Type [contracts];`
    fn method(&mut self) -> Result<GrammarId> {
        let return_contracts = self.contracts(Nest::ContractReturn)?;
        let after_return = self.builder.list([
            item("<")?
                .action(nested_start(Nest::Template))
                .then(self.template),
            item(";")?.action(Action::NewElement),
        ]);
        self.builder.include(after_return, return_contracts);
        let return_type = self.builder.list([symbol()?.then(after_return)]);

        let argument_end = self.contracts(Nest::Contract)?;
        let argument_next = self.builder.list([
            item(",")?.action(Action::NewElement),
            item(r"\)")?.action(Action::ParentElement),
        ]);
        self.builder.include(argument_next, argument_end);
        let argument_expression = self.fragments(argument_next)?;
        let argument = self.variable(argument_expression)?;
        let arguments = self
            .builder
            .list([argument, item(r"\)")?.action(Action::ParentElement)]);

        let contracts = self.contracts(Nest::Contract)?;
        let after_name = self.builder.list([
            item(r"\(")?
                .action(nested_start(Nest::Parameters))
                .then(arguments),
            item("->")?.then(return_type),
            item(";")?.action(Action::NewElement),
        ]);
        self.builder.include(after_name, contracts);

        let method_name = self.builder.list([name()?.then(after_name)]);
        Ok(self
            .builder
            .list([category(keyword("method")?, Category::Method).then(method_name)]))
    }

    /// `using Name = Type [contracts];`
    fn using(&mut self) -> Result<GrammarId> {
        let contracts = self.contracts(Nest::Contract)?;
        let after_symbol = self.builder.list([
            item("<")?
                .action(nested_start(Nest::Template))
                .then(self.template),
            item(";")?.action(Action::NewElement),
        ]);
        self.builder.include(after_symbol, contracts);
        let target = self.builder.list([symbol()?.then(after_symbol)]);
        let assign = self.builder.list([item("=")?.then(target)]);
        let using_name = self.builder.list([name()?.then(assign)]);
        Ok(self
            .builder
            .list([category(keyword("using")?, Category::Using).then(using_name)]))
    }

    /// `enum Name { A, B }`
    fn enum_(&mut self) -> Result<GrammarId> {
        let after_value = self.builder.list([
            item(",")?.action(Action::NewElement),
            item(r"\}")?.action(Action::NestedStopNewElement),
        ]);
        let values = self.builder.list([
            name()?.then(after_value),
            item(r"\}")?.action(Action::NestedStopNewElement),
        ]);
        let open = self
            .builder
            .list([item(r"\{")?.action(nested_start(Nest::Values)).then(values)]);
        let enum_name = self.builder.list([name()?.then(open)]);
        Ok(self
            .builder
            .list([category(keyword("enum")?, Category::Enum).then(enum_name)]))
    }

    /// `extern interface Name;`
    fn extern_(&mut self) -> Result<GrammarId> {
        let end = self
            .builder
            .list([item(";")?.action(Action::NewElement)]);
        let extern_name = self.builder.list([name()?.then(end)]);
        let kind = self
            .builder
            .list([item(r"(?P<category>interface|struct)\b")?.then(extern_name)]);
        Ok(self.builder.list([keyword("extern")?
            .attr(Attr::Extern.as_str(), "true")
            .then(kind)]))
    }

    /// `namespace a.b.c;`
    fn namespace(&mut self) -> Result<GrammarId> {
        let after_segment = self.builder.list([
            item(r"\.")?.action(Action::NewElement),
            item(";")?.action(Action::NestedStopNewElement),
        ]);
        let segment = self.builder.list([name()?.then(after_segment)]);
        Ok(self.builder.list([category(keyword("namespace")?, Category::Namespace)
            .action(nested_start(Nest::Name))
            .then(segment)]))
    }

    /// `use "path/to/unit.bdl"`
    fn use_(&mut self) -> Result<GrammarId> {
        let path = self
            .builder
            .list([item(r#""(?P<path>[^"]*)""#)?.action(Action::NewElement)]);
        Ok(self
            .builder
            .list([category(keyword("use")?, Category::Use).then(path)]))
    }

    /// `keyword [Name] [: Parent, ...] [contracts] { body }`
    fn nested(&mut self, kind: Category, default: Nest, body: GrammarId) -> Result<GrammarId> {
        let after_parent = self.builder.list([
            item(",")?.action(Action::NewElement),
            item("")?
                .followed_by(Pattern::new(r"\s*\{")?)
                .action(Action::ParentElement),
        ]);
        let parents = self.builder.list([symbol()?.then(after_parent)]);

        let contracts = self.contracts(Nest::Contract)?;
        let after_name = self.builder.list([
            item(":")?
                .action(nested_start(Nest::Inheritance))
                .then(parents),
            item(r"\{")?.action(nested_start(default)).then(body),
        ]);
        self.builder.include(after_name, contracts);

        let declaration_name = self.builder.list([name()?.then(after_name)]);
        self.builder.include(declaration_name, after_name);

        Ok(self.builder.list([item(&format!(
            r"(?P<category>{})\b",
            kind.as_str()
        ))?
        .then(declaration_name)]))
    }
}

#[cfg(test)]
mod tests {
    use bdl_parser::{Context, Element, Parser, Sequence};

    use super::*;
    use crate::attr::ElementExt;

    fn parse(source: &str) -> Sequence {
        let grammar = build().unwrap();
        let context = Context::from_content(source, None);
        Parser::new(&grammar).parse(source, &context).unwrap()
    }

    fn first(sequence: &Sequence) -> &Element {
        sequence.iter().next().unwrap()
    }

    #[test]
    fn test_variable_with_call() {
        let sequence = parse("value = Integer(12) [min(10) max(20)];");
        let element = first(&sequence);

        assert_eq!(element.get(Attr::Category), Some("expression"));
        assert_eq!(element.get(Attr::Name), Some("value"));
        let fragment = element.nested_iter(Nest::Fragments).next().unwrap();
        assert_eq!(fragment.get(Attr::Symbol), Some("Integer"));
        let argument = fragment.nested_iter(Nest::Argument).next().unwrap();
        let literal = argument.nested_iter(Nest::Fragments).next().unwrap();
        assert_eq!(literal.get(Attr::Value), Some("12"));

        let contracts: Vec<_> = element
            .nested_iter(Nest::Contract)
            .map(|contract| contract.get(Attr::Type).unwrap().to_string())
            .collect();
        assert_eq!(contracts, ["min", "max"]);
    }

    #[test]
    fn test_operators_and_named_arguments() {
        let sequence = parse("test = Hello(var = 2 + 3 * 4, other = -1);");
        let element = first(&sequence);
        let call = element.nested_iter(Nest::Fragments).next().unwrap();
        let arguments: Vec<_> = call.nested_iter(Nest::Argument).collect();

        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments[0].get(Attr::Name), Some("var"));
        assert_eq!(arguments[0].nested_iter(Nest::Fragments).count(), 5);
        assert_eq!(arguments[1].get(Attr::Name), Some("other"));
        let operator = arguments[1].nested_iter(Nest::Fragments).next().unwrap();
        assert_eq!(operator.get(Attr::Operator), Some("-"));
    }

    #[test]
    fn test_component_sections() {
        let sequence = parse(
            r#"
            component Hello : Base, other.Mixin {
            config:
                var = Integer [min(10)];
            interface:
                method run();
                out = Float;
                in = const Float;
            composition:
                this.run();
            }
            "#,
        );
        let component = first(&sequence);

        assert_eq!(component.get(Attr::Category), Some("component"));
        assert_eq!(component.get(Attr::Name), Some("Hello"));
        let parents: Vec<_> = component
            .nested_iter(Nest::Inheritance)
            .filter_map(|parent| parent.get(Attr::Symbol))
            .collect();
        assert_eq!(parents, ["Base", "other.Mixin"]);
        assert_eq!(component.nested_iter(Nest::Config).count(), 1);
        assert_eq!(component.nested_iter(Nest::Interface).count(), 3);
        let call = component.nested_iter(Nest::Composition).next().unwrap();
        assert_eq!(call.get(Attr::Category), Some("expression"));
        assert!(!component.has_sequence(Nest::Invalid.as_str()));

        let input = component.nested_iter(Nest::Interface).nth(2).unwrap();
        let fragment = input.nested_iter(Nest::Fragments).next().unwrap();
        assert!(fragment.is_set(Attr::Const));
    }

    #[test]
    fn test_method_signature() {
        let sequence = parse(concat!(
            "method send(message = String, count... = Integer) [init] ",
            "-> Result<Integer> [mandatory];"
        ));
        let method = first(&sequence);

        assert_eq!(method.get(Attr::Category), Some("method"));
        assert_eq!(method.get(Attr::Symbol), Some("Result"));
        let arguments: Vec<_> = method
            .nested_iter(Nest::Parameters)
            .filter_map(|argument| argument.get(Attr::Name))
            .collect();
        assert_eq!(arguments, ["message", "count..."]);
        assert_eq!(method.nested_iter(Nest::Contract).count(), 1);
        assert_eq!(method.nested_iter(Nest::ContractReturn).count(), 1);
        assert_eq!(method.nested_iter(Nest::Template).count(), 1);
        assert_eq!(method.nested_iter(Nest::Argument).count(), 0);
    }

    #[test]
    fn test_declarations() {
        let sequence = parse(
            r#"
            namespace bzd.test;
            use "other.bdl"
            extern interface Logger;
            using Size = Integer [min(0)];
            enum Color { RED, GREEN, }
            "#,
        );
        let elements: Vec<_> = sequence.iter().collect();

        assert_eq!(elements.len(), 5);
        let segments: Vec<_> = elements[0]
            .nested_iter(Nest::Name)
            .filter_map(|segment| segment.get(Attr::Name))
            .collect();
        assert_eq!(segments, ["bzd", "test"]);
        assert_eq!(elements[1].get(Attr::Path), Some("other.bdl"));
        assert_eq!(elements[2].get(Attr::Extern), Some("true"));
        assert_eq!(elements[2].get(Attr::Category), Some("interface"));
        assert_eq!(elements[3].get(Attr::Symbol), Some("Integer"));
        assert_eq!(elements[4].nested_iter(Nest::Values).count(), 2);
    }

    #[test]
    fn test_unnamed_composition_and_templates() {
        let sequence = parse(
            r#"
            composition {
                values = Vector<Array<Integer>, const Float>(1, 2);
                connect(a.out, b.in);
            }
            "#,
        );
        let composition = first(&sequence);

        assert_eq!(composition.get(Attr::Category), Some("composition"));
        assert!(composition.get(Attr::Name).is_none());
        let members: Vec<_> = composition.nested_iter(Nest::Composition).collect();
        assert_eq!(members.len(), 2);
        let vector = members[0].nested_iter(Nest::Fragments).next().unwrap();
        let template: Vec<_> = vector.nested_iter(Nest::Template).collect();
        assert_eq!(template.len(), 2);
        assert_eq!(template[0].nested_iter(Nest::Template).count(), 1);
        assert!(template[1].is_set(Attr::Const));
    }

    #[test]
    fn test_reserved_name_is_rejected() {
        let grammar = build().unwrap();
        let context = Context::from_content("const = 2;", None);

        assert!(Parser::new(&grammar).parse("const = 2;", &context).is_err());
    }

    #[test]
    fn test_comment_attaches_to_next_declaration() {
        let sequence = parse("// The answer.\nanswer = 42;");

        assert_eq!(first(&sequence).get(Attr::Comment), Some("The answer."));
    }
}
