//! Qualified type name grammar for name-based override resolution.
//!
//! Explicit override edges carry no token cross-reference in native metadata;
//! the only handle is the method's own name, which embeds the base type as a
//! dotted qualifier, optionally with a generic argument list and a trailing
//! array marker: `System.Collections.Generic.IDictionary<TKey, TValue>.Add`
//! or `System.IComparable<MyGame.Item[]>.CompareTo`.
//!
//! [`QualifiedTypeName::parse`] decomposes one type qualifier into the name
//! to look up (with the backtick arity suffix generic definitions carry),
//! the raw generic argument names, and the array marker.

/// A parsed type qualifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedTypeName {
    /// The name to resolve, with a `` `N `` arity suffix when generic
    /// arguments are present
    pub lookup_name: String,
    /// Raw generic argument names, unparsed (may themselves be qualified)
    pub generic_args: Vec<String>,
    /// True if the qualifier carried a trailing `[]`
    pub is_array: bool,
}

impl QualifiedTypeName {
    /// Parses a type qualifier.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut name = raw.trim();

        let is_array = name.ends_with("[]");
        if is_array {
            name = &name[..name.len() - 2];
        }

        if let Some(open) = name.find('<') {
            if name.ends_with('>') {
                let args = split_top_level(&name[open + 1..name.len() - 1]);
                return Self {
                    lookup_name: format!("{}`{}", &name[..open], args.len()),
                    generic_args: args,
                    is_array,
                };
            }
        }

        Self {
            lookup_name: name.to_string(),
            generic_args: Vec::new(),
            is_array,
        }
    }
}

/// Splits a generic argument list at top-level commas, leaving nested
/// argument lists intact.
fn split_top_level(args: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in args.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                result.push(args[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }

    let last = args[start..].trim();
    if !last.is_empty() {
        result.push(last.to_string());
    }

    result
}

/// Splits a method name into its type qualifier and base member name at the
/// last dot, `None` when the name carries no qualifier.
#[must_use]
pub fn split_qualified_method_name(name: &str) -> Option<(&str, &str)> {
    let dot = name.rfind('.')?;
    Some((&name[..dot], &name[dot + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let parsed = QualifiedTypeName::parse("System.IDisposable");
        assert_eq!(parsed.lookup_name, "System.IDisposable");
        assert!(parsed.generic_args.is_empty());
        assert!(!parsed.is_array);
    }

    #[test]
    fn test_parse_generic() {
        let parsed =
            QualifiedTypeName::parse("System.Collections.Generic.IDictionary<TKey, TValue>");
        assert_eq!(
            parsed.lookup_name,
            "System.Collections.Generic.IDictionary`2"
        );
        assert_eq!(parsed.generic_args, vec!["TKey", "TValue"]);
        assert!(!parsed.is_array);
    }

    #[test]
    fn test_parse_nested_generic() {
        let parsed = QualifiedTypeName::parse(
            "System.Collections.Generic.IEnumerable<System.Collections.Generic.KeyValuePair<TKey, TValue>>",
        );
        assert_eq!(
            parsed.lookup_name,
            "System.Collections.Generic.IEnumerable`1"
        );
        assert_eq!(
            parsed.generic_args,
            vec!["System.Collections.Generic.KeyValuePair<TKey, TValue>"]
        );
    }

    #[test]
    fn test_parse_array() {
        let parsed = QualifiedTypeName::parse("System.IComparable<MyGame.Item>[]");
        assert!(parsed.is_array);
        assert_eq!(parsed.lookup_name, "System.IComparable`1");
        assert_eq!(parsed.generic_args, vec!["MyGame.Item"]);
    }

    #[test]
    fn test_split_method_name() {
        assert_eq!(
            split_qualified_method_name("System.IDisposable.Dispose"),
            Some(("System.IDisposable", "Dispose"))
        );
        assert_eq!(split_qualified_method_name("Update"), None);
    }
}
