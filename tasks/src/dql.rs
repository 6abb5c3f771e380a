//! Helpers for building query strings by hand.
//!
//! Prefer `:placeholders` with arguments; these are for the places where a
//! name or value has to be spliced into the statement text.

use std::fmt::Display;

/// Quote a collection or field name: wrap it in back-ticks and double any
/// back-tick inside it.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a string value: wrap it in single quotes and double any single
/// quote inside it.
pub fn quote_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Join displayable values with a delimiter.
pub fn join_values<I>(values: I, delimiter: &str) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    let mut out = String::new();
    for (i, value) in values.into_iter().enumerate() {
        if i > 0 {
            out.push_str(delimiter);
        }
        out.push_str(&value.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert_eq!(quote_identifier("tasks"), "`tasks`");
        assert_eq!(quote_identifier("odd`name"), "`odd``name`");
        assert_eq!(quote_identifier(""), "``");
    }

    #[test]
    fn string_literals() {
        assert_eq!(quote_string_literal("hello"), "'hello'");
        assert_eq!(quote_string_literal("it's"), "'it''s'");
        assert_eq!(quote_string_literal("''"), "''''''");
    }

    #[test]
    fn join() {
        assert_eq!(join_values(["a", "b", "c"], ", "), "a, b, c");
        assert_eq!(join_values(Vec::<u32>::new(), ","), "");
        assert_eq!(join_values([1, 2], "|"), "1|2");
    }

    #[test]
    fn quoted_text_survives_the_parser() {
        use quickstart_engine::dql::{parse, BinaryOp, Expr, Statement};

        let name = "weird `name`";
        let value = "it's 'quoted'";
        let query = format!(
            "SELECT * FROM {} WHERE title = {}",
            quote_identifier(name),
            quote_string_literal(value)
        );
        let Statement::Select(select) = parse(&query).unwrap() else {
            panic!("expected SELECT");
        };
        assert_eq!(select.collection, name);
        assert_eq!(
            select.filter,
            Some(Expr::Binary {
                op: BinaryOp::Eq,
                left: Box::new(Expr::Path(vec!["title".into()])),
                right: Box::new(Expr::Literal(value.into())),
            })
        );
    }
}
