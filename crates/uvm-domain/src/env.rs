use std::collections::HashMap;
use std::env;

pub const UVM_HOME_ENV: &str = "UVM_HOME";

/// Owned copy of the environment variables a call is allowed to see.
///
/// Nothing in the registry or the provisioner reads the process environment
/// directly; callers capture a snapshot once and thread it through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Non-empty value for `key`; empty strings count as unset.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.var(key).filter(|value| !value.trim().is_empty())
    }

    pub fn flag_is_enabled(&self, key: &str) -> bool {
        self.var(key).is_some_and(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Variables as sorted pairs, suitable for handing to a child process.
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<_> = self
            .vars
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        pairs.sort();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_truthy_spellings() {
        let snapshot = EnvSnapshot::from_pairs([
            ("A", "1"),
            ("B", "TRUE"),
            ("C", " yes "),
            ("D", "0"),
            ("E", ""),
        ]);
        assert!(snapshot.flag_is_enabled("A"));
        assert!(snapshot.flag_is_enabled("B"));
        assert!(snapshot.flag_is_enabled("C"));
        assert!(!snapshot.flag_is_enabled("D"));
        assert!(!snapshot.flag_is_enabled("E"));
        assert!(!snapshot.flag_is_enabled("MISSING"));
    }

    #[test]
    fn empty_values_are_treated_as_unset() {
        let snapshot = EnvSnapshot::from_pairs([(UVM_HOME_ENV, "  ")]);
        assert!(snapshot.contains(UVM_HOME_ENV));
        assert_eq!(snapshot.non_empty(UVM_HOME_ENV), None);
    }

    #[test]
    fn pairs_are_sorted() {
        let snapshot = EnvSnapshot::default()
            .with_var("ZED", "1")
            .with_var("ALPHA", "2");
        assert_eq!(
            snapshot.pairs(),
            vec![
                ("ALPHA".to_string(), "2".to_string()),
                ("ZED".to_string(), "1".to_string())
            ]
        );
    }
}
