//! SQL dialect parameters and identifier rendering.

use std::fmt;

use sea_query::{Iden, Quote};

use crate::query::QueryBuilder;

/// How an INSERT reports generated key values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedKeys {
    /// The statement carries a `RETURNING` clause and yields one row.
    Returning,
    /// The driver reports generated keys after execution.
    Driver,
}

/// Per-dialect parameters the statement generator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    /// Short dialect name, such as `postgres`.
    pub name: &'static str,
    /// Opening and closing identifier quote characters.
    pub quote: (char, char),
    /// Placeholder prefix, `?` or `$`.
    pub placeholder: &'static str,
    /// Whether placeholders are numbered (`$1, $2, ...`).
    pub numbered: bool,
    /// How generated keys come back from an INSERT.
    pub generated_keys: GeneratedKeys,
    /// Statement that opens a transaction.
    pub begin: &'static str,
    /// Whether unquoted identifiers compare case-sensitively. Delimited names
    /// always do.
    pub case_sensitive: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::postgres()
    }
}

impl Dialect {
    /// `PostgreSQL`: numbered `$n` placeholders and `RETURNING` keys.
    #[must_use]
    pub const fn postgres() -> Self {
        Self {
            name: "postgres",
            quote: ('"', '"'),
            placeholder: "$",
            numbered: true,
            generated_keys: GeneratedKeys::Returning,
            begin: "BEGIN",
            case_sensitive: false,
        }
    }

    /// `SQLite`: positional `?` placeholders and rowid keys.
    #[must_use]
    pub const fn sqlite() -> Self {
        Self {
            name: "sqlite",
            quote: ('"', '"'),
            placeholder: "?",
            numbered: false,
            generated_keys: GeneratedKeys::Driver,
            begin: "BEGIN",
            case_sensitive: false,
        }
    }

    /// `MySQL` and `MariaDB`: backtick quotes.
    #[must_use]
    pub const fn mysql() -> Self {
        Self {
            name: "mysql",
            quote: ('`', '`'),
            placeholder: "?",
            numbered: false,
            generated_keys: GeneratedKeys::Driver,
            begin: "START TRANSACTION",
            case_sensitive: false,
        }
    }

    /// SQL Server: bracket quotes and `@Pn` placeholders.
    #[must_use]
    pub const fn mssql() -> Self {
        Self {
            name: "mssql",
            quote: ('[', ']'),
            placeholder: "@P",
            numbered: true,
            generated_keys: GeneratedKeys::Driver,
            begin: "BEGIN TRANSACTION",
            case_sensitive: false,
        }
    }

    /// Identifier for a storage name: plain names stay unquoted.
    #[must_use]
    pub fn ident(&self, name: &Name) -> Ident {
        Ident {
            text: name.text.clone(),
            quote: name.delimited.then_some(self.quote),
        }
    }

    /// Identifier that is always quoted, used for result column labels.
    #[must_use]
    pub fn label(&self, text: impl Into<String>) -> Ident {
        Ident {
            text: text.into(),
            quote: Some(self.quote),
        }
    }

    /// Render a storage name as SQL text.
    #[must_use]
    pub fn render(&self, name: &Name) -> String {
        let mut sql = String::new();
        self.ident(name).prepare(&mut sql, Quote::new(b'"'));
        sql
    }

    /// Whether a result label names `name`. Delimited names, and every name
    /// in a case-sensitive dialect, must match exactly.
    #[must_use]
    pub fn same_name(&self, name: &Name, label: &str) -> bool {
        if name.delimited || self.case_sensitive {
            name.text == label
        } else {
            name.text.eq_ignore_ascii_case(label)
        }
    }

    /// Whether `label` is `qualifier.name`, each part compared as by
    /// [`Dialect::same_name`].
    #[must_use]
    pub fn same_qualified(&self, qualifier: &Name, name: &Name, label: &str) -> bool {
        let split = qualifier.text.len();
        match (label.get(..split), label.get(split..)) {
            (Some(head), Some(rest)) => rest
                .strip_prefix('.')
                .is_some_and(|tail| self.same_name(qualifier, head) && self.same_name(name, tail)),
            _ => false,
        }
    }

    pub(crate) const fn builder(&self) -> QueryBuilder {
        QueryBuilder {
            placeholder: self.placeholder,
            numbered: self.numbered,
        }
    }
}

/// A table or column storage name.
///
/// A name declared wrapped in `"…"`, `` `…` `` or `[…]` is delimited and keeps
/// its exact case in generated SQL. So is a name that could not be written
/// unquoted: one that starts with a digit or contains characters other than
/// ASCII letters, digits, `_` and `.`, and one that is an SQL reserved word.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    text: String,
    delimited: bool,
}

impl Name {
    /// Parse a declared name, stripping any delimiting quotes.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        for (open, close) in [('"', '"'), ('`', '`'), ('[', ']')] {
            let inner = raw.strip_prefix(open).and_then(|rest| rest.strip_suffix(close));
            if let Some(inner) = inner.filter(|inner| !inner.is_empty()) {
                return Self {
                    text: inner.to_string(),
                    delimited: true,
                };
            }
        }
        let delimited = raw.starts_with(|ch: char| ch.is_ascii_digit())
            || !raw.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.')
            || is_reserved(raw);
        Self {
            text: raw.to_string(),
            delimited,
        }
    }

    /// The name without quotes.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the name is quoted in generated SQL.
    #[must_use]
    pub const fn is_delimited(&self) -> bool {
        self.delimited
    }

    /// Case-insensitive comparison against user input.
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        self.text.eq_ignore_ascii_case(other)
    }
}

const RESERVED: &[&str] = &[
    "ALL", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN", "CONSTRAINT",
    "CREATE", "CROSS", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "END", "EXISTS",
    "FETCH", "FOR", "FOREIGN", "FROM", "FULL", "GRANT", "GROUP", "HAVING", "IN", "INDEX", "INNER",
    "INSERT", "INTO", "IS", "JOIN", "KEY", "LEFT", "LIKE", "LIMIT", "NOT", "NULL", "OFFSET", "ON",
    "OR", "ORDER", "OUTER", "PRIMARY", "REFERENCES", "RIGHT", "SELECT", "SET", "TABLE", "THEN",
    "TO", "UNION", "UNIQUE", "UPDATE", "USER", "USING", "VALUES", "WHEN", "WHERE", "WINDOW",
    "WITH",
];

fn is_reserved(name: &str) -> bool {
    RESERVED.iter().any(|word| word.eq_ignore_ascii_case(name))
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A `sea-query` identifier that is quoted only when delimited, using the
/// dialect's own quote characters.
#[derive(Debug, Clone)]
pub struct Ident {
    text: String,
    quote: Option<(char, char)>,
}

impl Iden for Ident {
    fn prepare(&self, s: &mut dyn fmt::Write, _q: Quote) {
        let Some((open, close)) = self.quote else {
            let _ = s.write_str(&self.text);
            return;
        };
        let _ = s.write_char(open);
        for ch in self.text.chars() {
            if ch == close {
                let _ = s.write_char(close);
            }
            let _ = s.write_char(ch);
        }
        let _ = s.write_char(close);
    }

    fn unquoted(&self, s: &mut dyn fmt::Write) {
        let _ = s.write_str(&self.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_stay_unquoted() {
        let name = Name::parse("orders");
        assert!(!name.is_delimited());
        assert_eq!(Dialect::postgres().render(&name), "orders");
        assert_eq!(Dialect::postgres().render(&Name::parse("sales.orders")), "sales.orders");
    }

    #[test]
    fn delimited_names_use_dialect_quotes() {
        let name = Name::parse("\"OrderLines\"");
        assert!(name.is_delimited());
        assert_eq!(name.as_str(), "OrderLines");
        assert_eq!(Dialect::postgres().render(&name), "\"OrderLines\"");
        assert_eq!(Dialect::mysql().render(&name), "`OrderLines`");
        assert_eq!(Dialect::mssql().render(&name), "[OrderLines]");
    }

    #[test]
    fn names_needing_quotes_are_delimited() {
        assert!(Name::parse("order lines").is_delimited());
        assert!(Name::parse("2fa").is_delimited());
        assert!(Name::parse("[select]").is_delimited());
        assert!(!Name::parse("order_lines").is_delimited());
    }

    #[test]
    fn closing_quote_is_doubled() {
        assert_eq!(Dialect::mssql().render(&Name::parse("[a]b]")), "[a]]b]");
        assert_eq!(Dialect::sqlite().render(&Name::parse("say \"hi\"")), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn reserved_words_are_delimited() {
        let name = Name::parse("Order");
        assert!(name.is_delimited());
        assert_eq!(Dialect::postgres().render(&name), "\"Order\"");
        assert_eq!(Dialect::mysql().render(&Name::parse("group")), "`group`");
        assert!(!Name::parse("orders").is_delimited());
        assert!(!Name::parse("sales.order").is_delimited());
    }

    #[test]
    fn matching_ignores_case() {
        assert!(Name::parse("CustomerId").matches("customerid"));
        assert!(!Name::parse("customer").matches("customer_id"));
    }

    #[test]
    fn labels_follow_dialect_case_rules() {
        let plain = Name::parse("CustomerId");
        let quoted = Name::parse("\"Title\"");
        let postgres = Dialect::postgres();
        assert!(postgres.same_name(&plain, "customerid"));
        assert!(postgres.same_name(&quoted, "Title"));
        assert!(!postgres.same_name(&quoted, "title"));

        let strict = Dialect {
            case_sensitive: true,
            ..Dialect::postgres()
        };
        assert!(strict.same_name(&plain, "CustomerId"));
        assert!(!strict.same_name(&plain, "customerid"));
    }

    #[test]
    fn qualified_labels_split_at_qualifier() {
        let dialect = Dialect::sqlite();
        let table = Name::parse("sales.orders");
        let column = Name::parse("\"Total\"");
        assert!(dialect.same_qualified(&table, &column, "SALES.ORDERS.Total"));
        assert!(!dialect.same_qualified(&table, &column, "sales.orders.total"));
        assert!(!dialect.same_qualified(&table, &column, "sales.ordersXTotal"));
        assert!(!dialect.same_qualified(&table, &column, "sales"));
    }
}
