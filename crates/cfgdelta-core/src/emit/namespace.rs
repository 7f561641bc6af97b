use std::collections::HashSet;

/// Deterministic allocator of unique variable names
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    names: HashSet<String>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace with names that must never be handed out
    pub fn with_reserved<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: reserved.into_iter().map(Into::into).collect(),
        }
    }

    /// Claim a name; false if it was already taken
    pub fn reserve(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// `prefix + base`, made unique with `_2`, `_3`, ... suffixes
    pub fn fresh(&mut self, base: &str, prefix: &str) -> String {
        let mut stem = format!("{}{}", prefix, base);
        if base.is_empty() {
            stem = stem.trim_end_matches('_').to_string();
        }
        if stem.is_empty() {
            stem = "value".to_string();
        }
        if stem.starts_with(|c: char| c.is_ascii_digit()) {
            stem.insert(0, '_');
        }

        let mut candidate = stem.clone();
        let mut suffix = 2;
        while self.names.contains(&candidate) {
            candidate = format!("{}_{}", stem, suffix);
            suffix += 1;
        }
        self.names.insert(candidate.clone());
        candidate
    }
}

/// Variable-name stem for a rendered path: `.foo[0]["bar"]` -> `foo_0_bar`
pub fn path_to_name(rendered: &str) -> String {
    identifier_from(rendered).to_lowercase()
}

/// `CamelCase` or `studlyCaps` to `snake_case`
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in identifier_from(name).chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 && !out.ends_with('_') {
            out.push('_');
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Runs of characters outside `[A-Za-z0-9_]` become `_`; outer `_` trimmed
fn identifier_from(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_names_get_suffixes() {
        let mut ns = Namespace::with_reserved(["cfg"]);
        assert_eq!(ns.fresh("x", "moved_cfg_"), "moved_cfg_x");
        assert_eq!(ns.fresh("x", "moved_cfg_"), "moved_cfg_x_2");
        assert_eq!(ns.fresh("x", "moved_cfg_"), "moved_cfg_x_3");
        assert_eq!(ns.fresh("cfg", ""), "cfg_2");
    }

    #[test]
    fn test_empty_base_drops_trailing_underscore() {
        let mut ns = Namespace::new();
        assert_eq!(ns.fresh("", "moved_cfg_"), "moved_cfg");
        assert_eq!(ns.fresh("", ""), "value");
        assert_eq!(ns.fresh("0", ""), "_0");
    }

    #[test]
    fn test_path_to_name() {
        assert_eq!(path_to_name(r#".foo[0]["Bar baz"]"#), "foo_0_bar_baz");
        assert_eq!(path_to_name(""), "");
    }

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("SimpleClass"), "simple_class");
        assert_eq!(camel_to_snake("studlyCaps"), "studly_caps");
        assert_eq!(camel_to_snake("module.Type"), "module_type");
        assert_eq!(camel_to_snake("sequence"), "sequence");
    }
}
