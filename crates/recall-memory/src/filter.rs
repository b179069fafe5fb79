//! Structured record filters.
//!
//! Filters are built from typed conditions and handed to engines as data, never spliced
//! into a query string. The [`Display`](std::fmt::Display) rendering is a boolean
//! expression with every text literal escaped, used for logging and by engines that only
//! accept string expressions.

use std::fmt;

use crate::types::FIELD_ID;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorFilter {
    pub must: Vec<FieldCondition>,
    pub must_not: Vec<FieldCondition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub field: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl VectorFilter {
    /// Match exactly the record whose primary key equals `id`.
    #[must_use]
    pub fn id_equals(id: &str) -> Self {
        Self {
            must: vec![FieldCondition {
                field: FIELD_ID.into(),
                value: FieldValue::Text(id.to_owned()),
            }],
            must_not: vec![],
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.must_not.is_empty()
    }

    /// Evaluate the filter against a JSON payload.
    #[must_use]
    pub fn matches(&self, payload: &std::collections::HashMap<String, serde_json::Value>) -> bool {
        for cond in &self.must {
            let Some(val) = payload.get(&cond.field) else {
                return false;
            };
            if !cond.value.matches(val) {
                return false;
            }
        }
        for cond in &self.must_not {
            if let Some(val) = payload.get(&cond.field)
                && cond.value.matches(val)
            {
                return false;
            }
        }
        true
    }
}

impl FieldValue {
    fn matches(&self, val: &serde_json::Value) -> bool {
        match self {
            Self::Integer(i) => val.as_i64() == Some(*i),
            Self::Text(s) => val.as_str() == Some(s.as_str()),
        }
    }
}

/// Quote a text literal so it cannot terminate the surrounding expression.
#[must_use]
pub fn quote_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{{{:04x}}}", u32::from(c)));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_plain_identifier(field: &str) -> bool {
    !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !field.starts_with(|c: char| c.is_ascii_digit())
}

impl fmt::Display for FieldCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if is_plain_identifier(&self.field) {
            write!(f, "{}", self.field)?;
        } else {
            write!(f, "{}", quote_literal(&self.field))?;
        }
        match &self.value {
            FieldValue::Integer(i) => write!(f, " == {i}"),
            FieldValue::Text(s) => write!(f, " == {}", quote_literal(s)),
        }
    }
}

impl fmt::Display for VectorFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .must
            .iter()
            .map(ToString::to_string)
            .chain(self.must_not.iter().map(|c| format!("not ({c})")))
            .collect();
        if parts.is_empty() {
            f.write_str("true")
        } else {
            f.write_str(&parts.join(" and "))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn id_equals_renders_quoted() {
        assert_eq!(VectorFilter::id_equals("abc").to_string(), r#"id == "abc""#);
    }

    #[test]
    fn injection_attempt_stays_inside_literal() {
        let f = VectorFilter::id_equals("x' or id != '");
        assert_eq!(f.to_string(), r#"id == "x\' or id != \'""#);

        let f = VectorFilter::id_equals(r#"x" or "1" == "1"#);
        assert_eq!(f.to_string(), r#"id == "x\" or \"1\" == \"1""#);
    }

    #[test]
    fn backslash_and_newline_escaped() {
        assert_eq!(quote_literal("a\\b\nc"), r#""a\\b\nc""#);
    }

    #[test]
    fn control_char_escaped() {
        assert_eq!(quote_literal("\u{7}"), r#""\u{0007}""#);
    }

    #[test]
    fn empty_filter_renders_true() {
        assert_eq!(VectorFilter::default().to_string(), "true");
        assert!(VectorFilter::default().is_empty());
    }

    #[test]
    fn must_not_and_integer_rendering() {
        let f = VectorFilter {
            must: vec![FieldCondition {
                field: "created_at".into(),
                value: FieldValue::Integer(7),
            }],
            must_not: vec![FieldCondition {
                field: "bad field".into(),
                value: FieldValue::Text("v".into()),
            }],
        };
        assert_eq!(
            f.to_string(),
            r#"created_at == 7 and not ("bad field" == "v")"#
        );
    }

    #[test]
    fn matches_exact_id_only() {
        let f = VectorFilter::id_equals("a");
        let hit = HashMap::from([("id".to_owned(), serde_json::json!("a"))]);
        let miss = HashMap::from([("id".to_owned(), serde_json::json!("a' or '1'='1"))]);
        assert!(f.matches(&hit));
        assert!(!f.matches(&miss));
        assert!(!f.matches(&HashMap::new()));
    }

    #[test]
    fn must_not_excludes() {
        let f = VectorFilter {
            must: vec![],
            must_not: vec![FieldCondition {
                field: "id".into(),
                value: FieldValue::Text("a".into()),
            }],
        };
        let a = HashMap::from([("id".to_owned(), serde_json::json!("a"))]);
        let b = HashMap::from([("id".to_owned(), serde_json::json!("b"))]);
        assert!(!f.matches(&a));
        assert!(f.matches(&b));
    }

    proptest! {
        #[test]
        fn quoted_literal_has_no_bare_quotes(raw in ".*") {
            let quoted = quote_literal(&raw);
            let inner = &quoted[1..quoted.len() - 1];
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    prop_assert!(chars.next().is_some());
                } else {
                    prop_assert!(c != '"' && c != '\'');
                }
            }
        }
    }
}
