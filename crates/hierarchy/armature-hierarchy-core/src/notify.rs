//! Hierarchy notifications.
//!
//! Listeners are invoked synchronously on the mutating thread. Registration
//! returns a [`ListenerId`](crate::ids::ListenerId); there is no automatic
//! cleanup, owners unsubscribe explicitly.

use armature_api_core::ElementKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HierarchyNotification {
    ElementAdded,
    ElementRemoved,
    ElementRenamed,
    ElementSelected,
    ElementDeselected,
    ParentChanged,
    ParentWeightsChanged,
    HierarchyReset,
    ControlSettingChanged,
    ControlVisibilityChanged,
    ControlDrivenListChanged,
    ControlShapeTransformChanged,
    ConnectorSettingChanged,
    MetadataChanged,
    MetadataTagChanged,
    InteractionBracketOpened,
    InteractionBracketClosed,
}

impl HierarchyNotification {
    pub fn is_selection(self) -> bool {
        matches!(
            self,
            HierarchyNotification::ElementSelected | HierarchyNotification::ElementDeselected
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyEvent {
    pub notification: HierarchyNotification,
    pub key: Option<ElementKey>,
    /// Key before a rename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_key: Option<ElementKey>,
}

impl HierarchyEvent {
    pub fn new(notification: HierarchyNotification, key: Option<ElementKey>) -> Self {
        Self {
            notification,
            key,
            previous_key: None,
        }
    }
}

pub type HierarchyListener = Arc<dyn Fn(&HierarchyEvent) + Send + Sync>;
