//! Request classification.
//!
//! An ordered list of `(predicate, class)` rules evaluated first-match-wins.
//! New classifications slot in without touching existing strategy handlers.

use http::Method;

use crate::config::CacheRules;

use super::net::ResourceRequest;

/// How a request is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    /// Pass straight through to the network; never cached.
    Bypass,
    /// Mutable, time-sensitive data: network-first.
    Api,
    /// Immutable content: cache-first.
    StaticAsset,
    /// Navigable document: stale-while-revalidate.
    Page,
}

type Predicate = Box<dyn Fn(&ResourceRequest) -> bool + Send + Sync>;

/// One classification rule.
pub struct ClassifyRule {
    pub name: &'static str,
    predicate: Predicate,
    pub class: ResourceClass,
}

impl ClassifyRule {
    pub fn new(
        name: &'static str,
        class: ResourceClass,
        predicate: impl Fn(&ResourceRequest) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            predicate: Box::new(predicate),
            class,
        }
    }

    pub fn matches(&self, request: &ResourceRequest) -> bool {
        (self.predicate)(request)
    }
}

/// Ordered first-match-wins classifier.
pub struct Classifier {
    rules: Vec<ClassifyRule>,
    fallback: ResourceClass,
}

impl Classifier {
    pub fn new(rules: Vec<ClassifyRule>, fallback: ResourceClass) -> Self {
        Self { rules, fallback }
    }

    /// Build the standard rule set from host-supplied cache rules.
    ///
    /// Order: bypass (non-GET / non-http) → API prefix → static prefix or
    /// extension → page fallback.
    pub fn from_rules(rules: &CacheRules) -> Self {
        let api_prefixes = rules.api_prefixes.clone();
        let static_prefixes = rules.static_prefixes.clone();
        let static_extensions = rules.static_extensions.clone();

        let rules = vec![
            ClassifyRule::new("bypass", ResourceClass::Bypass, |request| {
                request.method != Method::GET || !request.is_http()
            }),
            ClassifyRule::new("api-prefix", ResourceClass::Api, move |request| {
                let path = request.url.path();
                api_prefixes.iter().any(|prefix| path.starts_with(prefix))
            }),
            ClassifyRule::new("static-asset", ResourceClass::StaticAsset, move |request| {
                let path = request.url.path();
                if static_prefixes.iter().any(|prefix| path.starts_with(prefix)) {
                    return true;
                }
                path.rsplit_once('.')
                    .is_some_and(|(_, ext)| static_extensions.iter().any(|allowed| allowed == ext))
            }),
        ];

        Self::new(rules, ResourceClass::Page)
    }

    pub fn classify(&self, request: &ResourceRequest) -> ResourceClass {
        for rule in &self.rules {
            if rule.matches(request) {
                return rule.class;
            }
        }
        self.fallback
    }
}
