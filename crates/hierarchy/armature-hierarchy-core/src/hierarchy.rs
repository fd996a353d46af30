//! RigHierarchy: element store, lookup, notifications and hierarchy-to-hierarchy links.
//!
//! Methods (transform math lives in `transforms.rs`, parents in `parenting.rs`,
//! control values in `control.rs`, poses in `pose.rs`):
//! - find / get / index_of / keys / for_each / filter / traverse_children
//! - curves, metadata, selection
//! - subscribe / unsubscribe / notify
//! - default hierarchy (reset_to_default), listening hierarchies, copy_hierarchy

use armature_api_core::{ElementKey, ElementType, ElementTypeMask};
use hashbrown::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError, Weak};

use crate::config::HierarchySettings;
use crate::element::{ElementPayload, PhysicsSolverId, RigElement};
use crate::error::HierarchyError;
use crate::ids::ListenerId;
use crate::metadata::{MetadataStore, MetadataValue};
use crate::notify::{HierarchyEvent, HierarchyListener, HierarchyNotification};

/// Hierarchy shared between a rig and the systems reading it.
pub type SharedHierarchy = Arc<RwLock<RigHierarchy>>;
/// Back-reference that never keeps a hierarchy alive.
pub type WeakHierarchy = Weak<RwLock<RigHierarchy>>;

pub fn shared(hierarchy: RigHierarchy) -> SharedHierarchy {
    Arc::new(RwLock::new(hierarchy))
}

/// Lock for writing, recovering from a poisoned lock.
pub fn write_hierarchy(hierarchy: &SharedHierarchy) -> RwLockWriteGuard<'_, RigHierarchy> {
    hierarchy.write().unwrap_or_else(PoisonError::into_inner)
}

/// Lock for reading, recovering from a poisoned lock.
pub fn read_hierarchy(hierarchy: &SharedHierarchy) -> RwLockReadGuard<'_, RigHierarchy> {
    hierarchy.read().unwrap_or_else(PoisonError::into_inner)
}

pub struct RigHierarchy {
    pub(crate) elements: Vec<RigElement>,
    pub(crate) index_by_key: HashMap<ElementKey, usize>,
    /// Renamed keys mapped to their current key.
    pub(crate) previous_names: HashMap<ElementKey, ElementKey>,
    pub(crate) topology_version: u64,
    pub(crate) selection: Vec<ElementKey>,
    pub(crate) settings: HierarchySettings,
    listeners: Vec<(ListenerId, HierarchyListener)>,
    next_listener_id: u64,
    pub(crate) notifications_suspended: u32,
    pub(crate) selection_notifications_suppressed: u32,
    default_hierarchy: Option<WeakHierarchy>,
    listening: Vec<WeakHierarchy>,
    pub(crate) execute_context_active: bool,
    pub(crate) controller_brackets: u32,
    interaction_brackets: u32,
}

impl fmt::Debug for RigHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RigHierarchy")
            .field("elements", &self.elements.len())
            .field("topology_version", &self.topology_version)
            .field("selection", &self.selection)
            .field("listeners", &self.listeners.len())
            .field("listening", &self.listening.len())
            .finish()
    }
}

impl Default for RigHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl RigHierarchy {
    pub fn new() -> Self {
        Self::with_settings(HierarchySettings::default())
    }

    pub fn with_settings(settings: HierarchySettings) -> Self {
        Self {
            elements: Vec::new(),
            index_by_key: HashMap::new(),
            previous_names: HashMap::new(),
            topology_version: 0,
            selection: Vec::new(),
            settings,
            listeners: Vec::new(),
            next_listener_id: 0,
            notifications_suspended: 0,
            selection_notifications_suppressed: 0,
            default_hierarchy: None,
            listening: Vec::new(),
            execute_context_active: false,
            controller_brackets: 0,
            interaction_brackets: 0,
        }
    }

    pub fn settings(&self) -> &HierarchySettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: HierarchySettings) {
        self.settings = settings;
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Bumped on every structural change (add, remove, rename, reparent, copy).
    pub fn topology_version(&self) -> u64 {
        self.topology_version
    }

    pub(crate) fn bump_topology(&mut self) {
        self.topology_version = self.topology_version.wrapping_add(1);
    }

    // ---------- lookup ----------

    pub fn index_of(&self, key: &ElementKey) -> Option<usize> {
        self.index_by_key.get(key).copied()
    }

    pub fn contains(&self, key: &ElementKey) -> bool {
        self.index_by_key.contains_key(key)
    }

    pub fn find(&self, key: &ElementKey) -> Option<&RigElement> {
        self.index_of(key).and_then(|i| self.elements.get(i))
    }

    pub fn get(&self, index: usize) -> Option<&RigElement> {
        self.elements.get(index)
    }

    pub(crate) fn element_mut(&mut self, index: usize) -> Option<&mut RigElement> {
        self.elements.get_mut(index)
    }

    pub(crate) fn require(&self, key: &ElementKey) -> Result<usize, HierarchyError> {
        self.index_of(key)
            .ok_or_else(|| HierarchyError::ElementNotFound(key.clone()))
    }

    /// Current key of an element that may have been renamed since `key` was recorded.
    pub fn resolve_renamed(&self, key: &ElementKey) -> Option<ElementKey> {
        if self.contains(key) {
            return Some(key.clone());
        }
        let mut current = self.previous_names.get(key)?;
        // Renames can chain; the map never holds a loop.
        for _ in 0..self.previous_names.len() {
            if self.contains(current) {
                return Some(current.clone());
            }
            current = self.previous_names.get(current)?;
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = &RigElement> {
        self.elements.iter()
    }

    pub fn keys(&self) -> Vec<ElementKey> {
        self.elements.iter().map(|e| e.key.clone()).collect()
    }

    pub fn keys_of_type(&self, mask: ElementTypeMask) -> Vec<ElementKey> {
        self.elements
            .iter()
            .filter(|e| mask.contains(e.element_type()))
            .map(|e| e.key.clone())
            .collect()
    }

    pub fn bones(&self) -> Vec<ElementKey> {
        self.keys_of_type(ElementType::Bone.mask())
    }

    pub fn controls(&self) -> Vec<ElementKey> {
        self.keys_of_type(ElementType::Control.mask())
    }

    pub fn curves(&self) -> Vec<ElementKey> {
        self.keys_of_type(ElementType::Curve.mask())
    }

    pub fn for_each(&self, mut f: impl FnMut(&RigElement)) {
        for element in &self.elements {
            f(element);
        }
    }

    pub fn filter(&self, mut predicate: impl FnMut(&RigElement) -> bool) -> Vec<&RigElement> {
        self.elements.iter().filter(|e| predicate(e)).collect()
    }

    /// Depth-first walk below `key` (not including it). Returning `false`
    /// from `f` skips the subtree of that element.
    pub fn traverse_children(
        &self,
        key: &ElementKey,
        mut f: impl FnMut(&RigElement) -> bool,
    ) -> Result<(), HierarchyError> {
        let root = self.require(key)?;
        let mut visited = vec![false; self.elements.len()];
        let mut stack: Vec<usize> = self.elements[root].children.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            if std::mem::replace(&mut visited[index], true) {
                continue;
            }
            let element = &self.elements[index];
            if f(element) {
                stack.extend(element.children.iter().rev().copied());
            }
        }
        Ok(())
    }

    /// Every element below `index`, parents before children.
    pub(crate) fn descendants(&self, index: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut visited = vec![false; self.elements.len()];
        let mut stack: Vec<usize> = self.elements[index].children.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            if std::mem::replace(&mut visited[i], true) {
                continue;
            }
            out.push(i);
            stack.extend(self.elements[i].children.iter().rev().copied());
        }
        out
    }

    pub(crate) fn rebuild_lookup(&mut self) {
        self.index_by_key.clear();
        for (i, element) in self.elements.iter_mut().enumerate() {
            element.index = i;
            self.index_by_key.insert(element.key.clone(), i);
        }
    }

    // ---------- curves ----------

    pub fn curve_value(&self, key: &ElementKey) -> Option<f32> {
        self.find(key).and_then(|e| e.curve()).map(|c| c.value)
    }

    pub fn is_curve_value_set(&self, key: &ElementKey) -> bool {
        self.find(key)
            .and_then(|e| e.curve())
            .map(|c| c.value_set)
            .unwrap_or(false)
    }

    pub fn set_curve_value(&mut self, key: &ElementKey, value: f32) -> Result<(), HierarchyError> {
        let index = self.require(key)?;
        match &mut self.elements[index].payload {
            ElementPayload::Curve(curve) => {
                curve.value = value;
                curve.value_set = true;
            }
            _ => return Err(HierarchyError::NotACurve(key.clone())),
        }
        self.propagate_to_listening(|other| {
            let _ = other.set_curve_value(key, value);
        });
        Ok(())
    }

    pub fn unset_curve_value(&mut self, key: &ElementKey) -> Result<(), HierarchyError> {
        let index = self.require(key)?;
        match &mut self.elements[index].payload {
            ElementPayload::Curve(curve) => {
                curve.value = 0.0;
                curve.value_set = false;
                Ok(())
            }
            _ => Err(HierarchyError::NotACurve(key.clone())),
        }
    }

    pub fn reset_curve_values(&mut self) {
        for element in &mut self.elements {
            if let ElementPayload::Curve(curve) = &mut element.payload {
                curve.value = 0.0;
                curve.value_set = false;
            }
        }
    }

    // ---------- physics ----------

    /// Rewrite the solver id of every physics element through `remap`.
    /// Returns how many elements changed.
    pub fn remap_physics_solvers(&mut self, mut remap: impl FnMut(PhysicsSolverId) -> PhysicsSolverId) -> usize {
        let mut changed = 0;
        for element in &mut self.elements {
            if let ElementPayload::Physics { solver, .. } = &mut element.payload {
                let next = remap(*solver);
                if next != *solver {
                    *solver = next;
                    changed += 1;
                }
            }
        }
        changed
    }

    // ---------- metadata ----------

    pub fn metadata(&self, key: &ElementKey) -> Option<&MetadataStore> {
        self.find(key).map(|e| &e.metadata)
    }

    pub fn get_metadata(&self, key: &ElementKey, name: &str) -> Option<&MetadataValue> {
        self.metadata(key).and_then(|m| m.get(name))
    }

    pub fn set_metadata(
        &mut self,
        key: &ElementKey,
        name: &str,
        value: MetadataValue,
    ) -> Result<(), HierarchyError> {
        let index = self.require(key)?;
        if self.elements[index].metadata.get(name) == Some(&value) {
            return Ok(());
        }
        if !self.elements[index].metadata.set(name, value) {
            return Err(HierarchyError::MetadataTypeMismatch {
                key: key.clone(),
                name: name.to_string(),
            });
        }
        self.notify(HierarchyNotification::MetadataChanged, Some(key));
        Ok(())
    }

    pub fn remove_metadata(&mut self, key: &ElementKey, name: &str) -> Result<bool, HierarchyError> {
        let index = self.require(key)?;
        let removed = self.elements[index].metadata.remove(name).is_some();
        if removed {
            self.notify(HierarchyNotification::MetadataChanged, Some(key));
        }
        Ok(removed)
    }

    pub fn add_tag(&mut self, key: &ElementKey, tag: &str) -> Result<bool, HierarchyError> {
        let index = self.require(key)?;
        let added = self.elements[index].metadata.add_tag(tag);
        if added {
            self.notify(HierarchyNotification::MetadataTagChanged, Some(key));
        }
        Ok(added)
    }

    pub fn remove_tag(&mut self, key: &ElementKey, tag: &str) -> Result<bool, HierarchyError> {
        let index = self.require(key)?;
        let removed = self.elements[index].metadata.remove_tag(tag);
        if removed {
            self.notify(HierarchyNotification::MetadataTagChanged, Some(key));
        }
        Ok(removed)
    }

    pub fn has_tag(&self, key: &ElementKey, tag: &str) -> bool {
        self.metadata(key).map(|m| m.has_tag(tag)).unwrap_or(false)
    }

    // ---------- selection ----------

    pub fn selected_keys(&self) -> &[ElementKey] {
        &self.selection
    }

    pub fn is_selected(&self, key: &ElementKey) -> bool {
        self.find(key).map(|e| e.selected).unwrap_or(false)
    }

    /// Select or deselect. Returns whether the selection changed.
    pub fn select(&mut self, key: &ElementKey, selected: bool) -> Result<bool, HierarchyError> {
        let index = self.require(key)?;
        if self.elements[index].selected == selected {
            return Ok(false);
        }
        self.elements[index].selected = selected;
        if selected {
            self.selection.push(key.clone());
            self.notify(HierarchyNotification::ElementSelected, Some(key));
        } else {
            self.selection.retain(|k| k != key);
            self.notify(HierarchyNotification::ElementDeselected, Some(key));
        }
        Ok(true)
    }

    pub fn clear_selection(&mut self) -> bool {
        let selected = std::mem::take(&mut self.selection);
        for key in &selected {
            if let Some(index) = self.index_of(key) {
                self.elements[index].selected = false;
            }
            self.notify(HierarchyNotification::ElementDeselected, Some(key));
        }
        !selected.is_empty()
    }

    // ---------- interaction ----------

    pub fn open_interaction_bracket(&mut self) {
        self.interaction_brackets += 1;
        if self.interaction_brackets == 1 {
            self.notify(HierarchyNotification::InteractionBracketOpened, None);
        }
    }

    pub fn close_interaction_bracket(&mut self) {
        if self.interaction_brackets == 0 {
            return;
        }
        self.interaction_brackets -= 1;
        if self.interaction_brackets == 0 {
            self.notify(HierarchyNotification::InteractionBracketClosed, None);
        }
    }

    pub fn is_interacting(&self) -> bool {
        self.interaction_brackets > 0
    }

    // ---------- notifications ----------

    pub fn subscribe(&mut self, listener: impl Fn(&HierarchyEvent) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        before != self.listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn notifications_suspended(&self) -> bool {
        self.notifications_suspended > 0
    }

    /// Fan `notification` out to every listener unless suspended.
    pub fn notify(&self, notification: HierarchyNotification, key: Option<&ElementKey>) {
        self.dispatch(HierarchyEvent::new(notification, key.cloned()));
    }

    pub(crate) fn dispatch(&self, event: HierarchyEvent) {
        if self.notifications_suspended > 0 {
            return;
        }
        if event.notification.is_selection() && self.selection_notifications_suppressed > 0 {
            return;
        }
        for (_, listener) in &self.listeners {
            listener(&event);
        }
    }

    // ---------- controller availability ----------

    /// Structural edits are allowed outside execution, or inside a controller bracket.
    pub fn is_controller_available(&self) -> bool {
        !self.execute_context_active || self.controller_brackets > 0
    }

    pub fn is_executing(&self) -> bool {
        self.execute_context_active
    }

    // ---------- default / listening hierarchies ----------

    pub fn set_default_hierarchy(&mut self, default: &SharedHierarchy) {
        self.default_hierarchy = Some(Arc::downgrade(default));
    }

    pub fn clear_default_hierarchy(&mut self) {
        self.default_hierarchy = None;
    }

    pub fn default_hierarchy(&self) -> Option<SharedHierarchy> {
        self.default_hierarchy.as_ref().and_then(Weak::upgrade)
    }

    /// Replace this hierarchy's content with the default hierarchy's.
    pub fn reset_to_default(&mut self) -> Result<(), HierarchyError> {
        let default = self
            .default_hierarchy()
            .ok_or(HierarchyError::DefaultHierarchyUnavailable)?;
        let source = match default.try_read() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(HierarchyError::DefaultHierarchyUnavailable),
        };
        self.copy_hierarchy(&source);
        Ok(())
    }

    pub fn register_listening_hierarchy(&mut self, listener: &SharedHierarchy) {
        let weak = Arc::downgrade(listener);
        if !self.listening.iter().any(|w| w.ptr_eq(&weak)) {
            self.listening.push(weak);
        }
    }

    pub fn unregister_listening_hierarchy(&mut self, listener: &SharedHierarchy) -> bool {
        let weak = Arc::downgrade(listener);
        let before = self.listening.len();
        self.listening.retain(|w| !w.ptr_eq(&weak));
        before != self.listening.len()
    }

    pub fn clear_listening_hierarchies(&mut self) {
        self.listening.clear();
    }

    pub fn listening_hierarchy_count(&self) -> usize {
        self.listening.len()
    }

    /// Mirror a mutation onto every live listening hierarchy.
    pub(crate) fn propagate_to_listening(&self, f: impl Fn(&mut RigHierarchy)) {
        for weak in &self.listening {
            let Some(target) = weak.upgrade() else {
                continue;
            };
            match target.try_write() {
                Ok(mut guard) => f(&mut *guard),
                Err(TryLockError::Poisoned(poisoned)) => f(&mut *poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {
                    log::warn!("listening hierarchy is locked; skipping propagation");
                }
            };
        }
    }

    // ---------- copy ----------

    /// Full structural clone of `source` (elements, parents, metadata, settings).
    /// Listeners and hierarchy links of `self` are kept.
    pub fn copy_hierarchy(&mut self, source: &RigHierarchy) {
        self.elements = source.elements.clone();
        self.index_by_key = source.index_by_key.clone();
        self.previous_names = source.previous_names.clone();
        self.selection = source.selection.clone();
        self.settings = source.settings.clone();
        self.topology_version = self.topology_version.max(source.topology_version);
        self.bump_topology();
        self.notify(HierarchyNotification::HierarchyReset, None);
    }

    /// New standalone hierarchy with the same content and no listeners.
    pub fn duplicate(&self) -> RigHierarchy {
        let mut copy = RigHierarchy::with_settings(self.settings.clone());
        copy.copy_hierarchy(self);
        copy
    }

    /// Drop every element.
    pub fn reset(&mut self) {
        self.elements.clear();
        self.index_by_key.clear();
        self.previous_names.clear();
        self.selection.clear();
        self.bump_topology();
        self.notify(HierarchyNotification::HierarchyReset, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::HierarchyDefinition;
    use std::sync::Mutex;

    fn sample() -> RigHierarchy {
        HierarchyDefinition::from_json_str(
            r#"{"elements":[
                {"type":"Bone","name":"Root"},
                {"type":"Bone","name":"Spine","parent":"Bone:Root"},
                {"type":"Bone","name":"Head","parent":"Bone:Spine"},
                {"type":"Curve","name":"Blink","value":0.25}
            ]}"#,
        )
        .unwrap()
        .build()
        .unwrap()
    }

    #[test]
    fn lookup_and_traversal() {
        let h = sample();
        assert_eq!(h.len(), 4);
        assert_eq!(h.index_of(&ElementKey::bone("Head")), Some(2));
        assert!(h.find(&ElementKey::null("Head")).is_none());
        assert_eq!(h.bones().len(), 3);

        let mut seen = Vec::new();
        h.traverse_children(&ElementKey::bone("Root"), |e| {
            seen.push(e.name().to_string());
            true
        })
        .unwrap();
        assert_eq!(seen, vec!["Spine", "Head"]);
    }

    #[test]
    fn curves_track_value_set() {
        let mut h = sample();
        let blink = ElementKey::curve("Blink");
        assert_eq!(h.curve_value(&blink), Some(0.25));
        h.set_curve_value(&blink, 0.75).unwrap();
        assert!(h.is_curve_value_set(&blink));
        h.reset_curve_values();
        assert!(!h.is_curve_value_set(&blink));
        assert!(h.set_curve_value(&ElementKey::bone("Root"), 1.0).is_err());
    }

    #[test]
    fn selection_notifications_can_be_observed() {
        let mut h = sample();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let id = h.subscribe(move |e| sink.lock().unwrap().push(e.notification));
        assert!(h.select(&ElementKey::bone("Head"), true).unwrap());
        assert!(!h.select(&ElementKey::bone("Head"), true).unwrap());
        assert!(h.clear_selection());
        assert!(h.unsubscribe(id));
        h.select(&ElementKey::bone("Root"), true).unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                HierarchyNotification::ElementSelected,
                HierarchyNotification::ElementDeselected
            ]
        );
    }

    #[test]
    fn reset_to_default_copies_content() {
        let default = shared(sample());
        let mut instance = RigHierarchy::new();
        assert_eq!(
            instance.reset_to_default(),
            Err(HierarchyError::DefaultHierarchyUnavailable)
        );
        instance.set_default_hierarchy(&default);
        instance.reset_to_default().unwrap();
        assert_eq!(instance.len(), 4);
        drop(default);
        assert!(instance.default_hierarchy().is_none());
    }

    #[test]
    fn listening_hierarchies_receive_curve_writes() {
        let mut cdo = sample();
        let instance = shared(cdo.duplicate());
        cdo.register_listening_hierarchy(&instance);
        cdo.set_curve_value(&ElementKey::curve("Blink"), 0.5).unwrap();
        assert_eq!(
            read_hierarchy(&instance).curve_value(&ElementKey::curve("Blink")),
            Some(0.5)
        );
        assert!(cdo.unregister_listening_hierarchy(&instance));
    }

    #[test]
    fn metadata_and_tags_notify() {
        let mut h = sample();
        let root = ElementKey::bone("Root");
        h.set_metadata(&root, "Rig:Side", MetadataValue::Name("Center".into()))
            .unwrap();
        assert!(h
            .set_metadata(&root, "Rig:Side", MetadataValue::Bool(true))
            .is_err());
        assert!(h.add_tag(&root, "root").unwrap());
        assert!(h.has_tag(&root, "root"));
    }
}
