//! Scoped guards over hierarchy state.
//!
//! Each guard captures the prior state when opened and restores it when
//! dropped, including on early return. The guard dereferences to the
//! hierarchy so work continues through it.

use std::ops::{Deref, DerefMut};

use crate::hierarchy::RigHierarchy;

macro_rules! hierarchy_guard {
    ($name:ident) => {
        impl<'a> Deref for $name<'a> {
            type Target = RigHierarchy;

            fn deref(&self) -> &RigHierarchy {
                self.hierarchy
            }
        }

        impl<'a> DerefMut for $name<'a> {
            fn deref_mut(&mut self) -> &mut RigHierarchy {
                self.hierarchy
            }
        }
    };
}

/// Makes the controller available while execution is active.
pub struct ControllerBracket<'a> {
    hierarchy: &'a mut RigHierarchy,
}

impl<'a> ControllerBracket<'a> {
    pub fn new(hierarchy: &'a mut RigHierarchy) -> Self {
        hierarchy.controller_brackets += 1;
        Self { hierarchy }
    }
}

impl Drop for ControllerBracket<'_> {
    fn drop(&mut self) {
        self.hierarchy.controller_brackets = self.hierarchy.controller_brackets.saturating_sub(1);
    }
}

hierarchy_guard!(ControllerBracket);

/// Marks the hierarchy as being driven by an execute context.
pub struct ExecuteBracket<'a> {
    hierarchy: &'a mut RigHierarchy,
    previous: bool,
}

impl<'a> ExecuteBracket<'a> {
    pub fn new(hierarchy: &'a mut RigHierarchy) -> Self {
        let previous = std::mem::replace(&mut hierarchy.execute_context_active, true);
        Self {
            hierarchy,
            previous,
        }
    }
}

impl Drop for ExecuteBracket<'_> {
    fn drop(&mut self) {
        self.hierarchy.execute_context_active = self.previous;
    }
}

hierarchy_guard!(ExecuteBracket);

/// Suspends every notification.
pub struct NotificationBracket<'a> {
    hierarchy: &'a mut RigHierarchy,
}

impl<'a> NotificationBracket<'a> {
    pub fn new(hierarchy: &'a mut RigHierarchy) -> Self {
        hierarchy.notifications_suspended += 1;
        Self { hierarchy }
    }
}

impl Drop for NotificationBracket<'_> {
    fn drop(&mut self) {
        self.hierarchy.notifications_suspended = self.hierarchy.notifications_suspended.saturating_sub(1);
    }
}

hierarchy_guard!(NotificationBracket);

/// Suppresses selection notifications only.
pub struct SelectionNotificationBracket<'a> {
    hierarchy: &'a mut RigHierarchy,
}

impl<'a> SelectionNotificationBracket<'a> {
    pub fn new(hierarchy: &'a mut RigHierarchy) -> Self {
        hierarchy.selection_notifications_suppressed += 1;
        Self { hierarchy }
    }
}

impl Drop for SelectionNotificationBracket<'_> {
    fn drop(&mut self) {
        self.hierarchy.selection_notifications_suppressed = self
            .hierarchy
            .selection_notifications_suppressed
            .saturating_sub(1);
    }
}

hierarchy_guard!(SelectionNotificationBracket);

impl RigHierarchy {
    pub fn controller_bracket(&mut self) -> ControllerBracket<'_> {
        ControllerBracket::new(self)
    }

    pub fn execute_bracket(&mut self) -> ExecuteBracket<'_> {
        ExecuteBracket::new(self)
    }

    pub fn notification_bracket(&mut self) -> NotificationBracket<'_> {
        NotificationBracket::new(self)
    }

    pub fn selection_notification_bracket(&mut self) -> SelectionNotificationBracket<'_> {
        SelectionNotificationBracket::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armature_api_core::ElementKey;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn controller_only_inside_bracket_while_executing() {
        let mut h = RigHierarchy::new();
        assert!(h.is_controller_available());
        {
            let mut executing = h.execute_bracket();
            assert!(!executing.is_controller_available());
            assert!(executing.controller().is_none());
            {
                let mut bracket = executing.controller_bracket();
                assert!(bracket.is_controller_available());
                bracket.controller().unwrap().add_null("Space", None, Default::default(), false).unwrap();
            }
            assert!(!executing.is_controller_available());
        }
        assert!(h.is_controller_available());
        assert!(h.contains(&ElementKey::null("Space")));
    }

    #[test]
    fn selection_bracket_only_mutes_selection() {
        let mut h = RigHierarchy::new();
        h.controller()
            .unwrap()
            .add_null("Space", None, Default::default(), false)
            .unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        h.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        {
            let mut quiet = h.selection_notification_bracket();
            quiet.select(&ElementKey::null("Space"), true).unwrap();
            quiet.add_tag(&ElementKey::null("Space"), "pivot").unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(h.is_selected(&ElementKey::null("Space")));
        {
            let mut muted = h.notification_bracket();
            muted.select(&ElementKey::null("Space"), false).unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
