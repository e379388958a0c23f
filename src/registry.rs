//! Registry: the ordered list of tests
//!
//! Registration order is execution order. The registry is filled by the host
//! in an explicit registration phase before the first `tick`, and the only
//! reshaping allowed afterwards is an order-preserving filter.
//!
//! ## Declared Class Names
//!
//! Hosts that pair two registration mechanisms (one that registers the test
//! and one that declares its class name) can report the second through
//! `register_class_name`. The engine then cross-checks both lists on its first
//! tick; see `consistency_findings`.

use crate::context::Cx;
use crate::record::{AsyncTest, TestRecord};
use std::fmt;

/// A mismatch between declared class names and registered tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// A class name was declared but no test carries it
    MissingRegistration(String),
    /// A test carries a class name that was never declared
    MissingDeclaration(String),
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::MissingRegistration(name) => write!(f, "missing registration for {}", name),
            Finding::MissingDeclaration(name) => write!(f, "missing declaration for {}", name),
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    tests: Vec<TestRecord>,
    /// `None` unless the host reports declared class names
    declared: Option<Vec<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a test. Names are not validated.
    pub fn register(&mut self, record: TestRecord) {
        tracing::trace!(test = record.name(), index = self.tests.len(), "registered test");
        self.tests.push(record);
    }

    /// Register a plain closure test
    pub fn register_fn<F>(&mut self, name: impl Into<String>, body: F)
    where
        F: Fn(&mut Cx<'_>) + 'static,
    {
        self.register(TestRecord::from_fn(name, body));
    }

    /// Register a test object type, built with `Default` on every run.
    /// Its class label is the type's name.
    pub fn register_type<T>(&mut self, name: impl Into<String>)
    where
        T: AsyncTest + Default + 'static,
    {
        self.register(TestRecord::from_factory(name, short_type_name::<T>(), || {
            Box::new(T::default())
        }));
    }

    /// Declare a class name for the startup consistency check
    pub fn register_class_name(&mut self, class_name: impl Into<String>) {
        self.declared
            .get_or_insert_with(Vec::new)
            .push(class_name.into());
    }

    /// Keep only the tests matching `predicate`, preserving order.
    ///
    /// Declared class names whose every test was dropped are dropped too,
    /// so the consistency check only sees classes selected for this run.
    pub fn retain<P>(&mut self, mut predicate: P)
    where
        P: FnMut(&TestRecord) -> bool,
    {
        let mut dropped_classes = Vec::new();
        self.tests.retain(|record| {
            let keep = predicate(record);
            if !keep {
                if let Some(class_name) = record.class_name() {
                    dropped_classes.push(class_name.to_string());
                }
            }
            keep
        });

        let tests = &self.tests;
        if let Some(declared) = &mut self.declared {
            declared.retain(|name| {
                !dropped_classes.contains(name)
                    || tests.iter().any(|t| t.class_name() == Some(name.as_str()))
            });
        }
    }

    /// Keep only the tests whose name or class label contains any of `terms`,
    /// ignoring case. An empty term list keeps everything.
    pub fn filter<S: AsRef<str>>(&mut self, terms: &[S]) {
        if terms.is_empty() {
            return;
        }
        let terms: Vec<String> = terms.iter().map(|t| t.as_ref().to_lowercase()).collect();
        self.retain(|record| matches_any(record, &terms));
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TestRecord> {
        self.tests.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut TestRecord> {
        self.tests.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestRecord> {
        self.tests.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tests.iter().map(TestRecord::name).collect()
    }

    pub fn declared_class_names(&self) -> Option<&[String]> {
        self.declared.as_deref()
    }

    /// Compare declared class names with the class labels of registered
    /// tests. Empty when no class names were ever declared.
    ///
    /// Each missing name is reported once, in first-seen order. Tests
    /// without a class label are not checked.
    pub fn consistency_findings(&self) -> Vec<Finding> {
        let Some(declared) = &self.declared else {
            return Vec::new();
        };

        let mut findings = Vec::new();
        for name in declared {
            let registered = self.tests.iter().any(|t| t.class_name() == Some(name.as_str()));
            let finding = Finding::MissingRegistration(name.clone());
            if !registered && !findings.contains(&finding) {
                findings.push(finding);
            }
        }
        for class_name in self.tests.iter().filter_map(TestRecord::class_name) {
            let finding = Finding::MissingDeclaration(class_name.to_string());
            if !declared.iter().any(|d| d == class_name) && !findings.contains(&finding) {
                findings.push(finding);
            }
        }
        findings
    }
}

fn matches_any(record: &TestRecord, lowered_terms: &[String]) -> bool {
    let name = record.name().to_lowercase();
    let class_name = record.class_name().map(str::to_lowercase);
    lowered_terms.iter().any(|term| {
        name.contains(term.as_str())
            || class_name
                .as_deref()
                .is_some_and(|class| class.contains(term.as_str()))
    })
}

/// `my_crate::tests::Foo` -> `Foo`
fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Sample;

    impl AsyncTest for Sample {
        fn run(&mut self, _cx: &mut Cx<'_>) {}
    }

    fn registry_of(names: &[&str]) -> Registry {
        let mut registry = Registry::new();
        for name in names {
            registry.register_fn(*name, |_cx| {});
        }
        registry
    }

    #[test]
    fn test_register_preserves_order() {
        let registry = registry_of(&["c", "a", "b"]);
        assert_eq!(registry.names(), vec!["c", "a", "b"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_register_type_uses_short_class_name() {
        let mut registry = Registry::new();
        registry.register_type::<Sample>("sample test");
        assert_eq!(registry.get(0).unwrap().class_name(), Some("Sample"));
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let mut registry = registry_of(&["Network Ping", "disk io", "NETWORK close"]);
        registry.filter(&["network"]);
        assert_eq!(registry.names(), vec!["Network Ping", "NETWORK close"]);

        let mut registry = registry_of(&["Network Ping", "disk io"]);
        registry.filter(&["DISK"]);
        assert_eq!(registry.names(), vec!["disk io"]);
    }

    #[test]
    fn test_filter_matches_class_name() {
        let mut registry = registry_of(&["unrelated"]);
        registry.register_type::<Sample>("something");
        registry.filter(&["sample"]);
        assert_eq!(registry.names(), vec!["something"]);
    }

    #[test]
    fn test_filter_empty_terms_keeps_all() {
        let mut registry = registry_of(&["a", "b"]);
        registry.filter::<&str>(&[]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_no_declarations_no_findings() {
        let mut registry = Registry::new();
        registry.register_type::<Sample>("sample");
        assert!(registry.consistency_findings().is_empty());
    }

    #[test]
    fn test_findings_both_directions() {
        let mut registry = Registry::new();
        registry.register_type::<Sample>("sample");
        registry.register_class_name("Ghost");
        registry.register_class_name("Ghost");
        assert_eq!(
            registry.consistency_findings(),
            vec![
                Finding::MissingRegistration("Ghost".to_string()),
                Finding::MissingDeclaration("Sample".to_string()),
            ]
        );
        assert_eq!(
            registry.consistency_findings()[0].to_string(),
            "missing registration for Ghost"
        );
    }

    #[test]
    fn test_filter_prunes_declarations_of_dropped_classes() {
        let mut registry = Registry::new();
        registry.register_type::<Sample>("sample");
        registry.register_fn("kept", |_cx| {});
        registry.register_class_name("Sample");
        registry.register_class_name("Ghost");

        registry.filter(&["kept"]);

        assert_eq!(
            registry.declared_class_names(),
            Some(&["Ghost".to_string()][..])
        );
        assert_eq!(
            registry.consistency_findings(),
            vec![Finding::MissingRegistration("Ghost".to_string())]
        );
    }
}
