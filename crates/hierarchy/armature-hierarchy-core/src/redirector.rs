//! Connector-to-target key redirection for module rigs.

use armature_api_core::ElementKey;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Redirect>", into = "Vec<Redirect>")]
pub struct ElementKeyRedirector {
    map: IndexMap<ElementKey, ElementKey>,
}

#[derive(Serialize, Deserialize)]
struct Redirect {
    source: ElementKey,
    target: ElementKey,
}

impl From<Vec<Redirect>> for ElementKeyRedirector {
    fn from(entries: Vec<Redirect>) -> Self {
        Self {
            map: entries.into_iter().map(|r| (r.source, r.target)).collect(),
        }
    }
}

impl From<ElementKeyRedirector> for Vec<Redirect> {
    fn from(redirector: ElementKeyRedirector) -> Self {
        redirector
            .map
            .into_iter()
            .map(|(source, target)| Redirect { source, target })
            .collect()
    }
}

impl ElementKeyRedirector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: ElementKey, target: ElementKey) {
        self.map.insert(source, target);
    }

    pub fn remove(&mut self, source: &ElementKey) -> Option<ElementKey> {
        self.map.shift_remove(source)
    }

    pub fn get(&self, source: &ElementKey) -> Option<&ElementKey> {
        self.map.get(source)
    }

    pub fn contains(&self, source: &ElementKey) -> bool {
        self.map.contains_key(source)
    }

    /// Target of `key`, or `key` itself when it is not redirected.
    pub fn resolve(&self, key: &ElementKey) -> ElementKey {
        self.map.get(key).cloned().unwrap_or_else(|| key.clone())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ElementKey, &ElementKey)> {
        self.map.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_connectors_only() {
        let mut redirector = ElementKeyRedirector::new();
        redirector.add(ElementKey::connector("Root"), ElementKey::bone("pelvis"));
        assert_eq!(
            redirector.resolve(&ElementKey::connector("Root")),
            ElementKey::bone("pelvis")
        );
        assert_eq!(
            redirector.resolve(&ElementKey::bone("spine")),
            ElementKey::bone("spine")
        );
    }
}
