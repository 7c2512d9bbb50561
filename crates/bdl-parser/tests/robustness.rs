//! Property tests: the driver never panics and always reports positions
//! inside the input.

use bdl_parser::{
    Context, Parser,
    grammar::{Action, Grammar, GrammarBuilder, GrammarItem},
};
use proptest::prelude::*;

fn grammar() -> Grammar {
    let mut builder = GrammarBuilder::new();
    let root = builder.declare();
    let body = builder.declare();
    let end = builder.list([GrammarItem::new(";").unwrap().action(Action::NewElement)]);
    let value = builder.list([GrammarItem::new(r"(?P<value>[0-9]+)").unwrap().then(end)]);
    let after = builder.list([
        GrammarItem::new("=").unwrap().then(value),
        GrammarItem::new(r"\{")
            .unwrap()
            .action(Action::NestedStart("body".into()))
            .then(body),
    ]);
    builder.push(
        root,
        GrammarItem::new(r"(?P<name>[a-z]+)").unwrap().then(after),
    );
    builder.include(body, root);
    builder.push(
        body,
        GrammarItem::new(r"\}")
            .unwrap()
            .action(Action::NestedStopNewElement),
    );
    let pre = builder.list([GrammarItem::new(r"\s+").unwrap().action(Action::Skip)]);
    builder.build(root, Some(pre)).unwrap()
}

proptest! {
    #[test]
    fn parse_never_panics(source in "[a-z0-9 ={};\n]{0,64}") {
        let grammar = grammar();
        let context = Context::from_content(source.as_str(), None);

        if let Err(err) = Parser::new(&grammar).parse(&source, &context) {
            for diagnostic in err.diagnostics() {
                let span = diagnostic.primary_label().unwrap().span();
                prop_assert!(span.end() <= source.len());
            }
            prop_assert!(!err.render().is_empty());
        }
    }

    #[test]
    fn well_formed_assignments_parse(names in prop::collection::vec("[a-z]{1,8}", 1..8)) {
        let grammar = grammar();
        let source: String = names
            .iter()
            .enumerate()
            .map(|(index, name)| format!("{name} = {index};\n"))
            .collect();
        let context = Context::from_content(source.as_str(), None);

        let sequence = Parser::new(&grammar).parse(&source, &context).unwrap();
        prop_assert_eq!(sequence.len(), names.len());
    }
}
