//! The Control Rig: one hierarchy and one VM, driven through named events.
//!
//! A class default rig ("CDO") is built from a [`RigDefinition`]. Instances
//! share its byte-code, copy its hierarchy on creation and can reset to it
//! before each construction run.
//!
//! [`RigDefinition`]: crate::definition::RigDefinition

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use armature_api_core::{ElementKey, ElementTypeMask, Transform};
use armature_hierarchy_core::{
    read_hierarchy, shared, write_hierarchy, ElementKeyRedirector, HierarchyEvent, HierarchyNotification,
    ListenerId, RigHierarchy, SharedHierarchy,
};
use armature_vm_core::events::{CONNECTOR, FORWARD, INTERACTION, INVERSE, POST_FORWARD, PRE_FORWARD};
use armature_vm_core::{events, ExecuteContext, RigProgram, RigVm, Severity, VmValue};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::additive::AdditiveState;
use crate::config::RigConfig;
use crate::definition::ModuleSettings;
use crate::delegates::{RigDelegates, RigPhase};
use crate::diagnostics::RigDiagnostics;
use crate::error::RigError;
use crate::physics::{instance_solver_id, PhysicsSolverDescription};
use crate::shapes::ShapeLibraryBindings;

/// What the user is currently manipulating, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InteractionType {
    #[default]
    None,
    Translate,
    Rotate,
    Scale,
    All,
}

pub struct ControlRig {
    name: String,
    instance_id: Uuid,
    is_class_default: bool,
    pub(crate) hierarchy: SharedHierarchy,
    pub(crate) vm: Option<RigVm>,
    pub(crate) config: RigConfig,
    event_queue: Vec<String>,
    pub(crate) redirector: ElementKeyRedirector,
    pub(crate) module: Option<ModuleSettings>,
    pub(crate) physics_solvers: Vec<PhysicsSolverDescription>,
    pub(crate) shape_libraries: Vec<String>,
    pub(crate) class_default_shape_libraries: Vec<String>,
    pub(crate) shapes: ShapeLibraryBindings,
    pub(crate) delegates: RigDelegates,
    pub(crate) diagnostics: RigDiagnostics,
    pub(crate) additive: AdditiveState,
    pub(crate) bone_initials: HashMap<String, Transform>,
    interaction: InteractionType,
    delta_time: f32,
    absolute_time: f32,
    requires_init: bool,
    pub(crate) construction_pending: bool,
    pub(crate) executing: bool,
    pub(crate) constructing: bool,
    selection_listener: Option<ListenerId>,
    object_binding: Option<Weak<dyn Any + Send + Sync>>,
}

impl fmt::Debug for ControlRig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlRig")
            .field("name", &self.name)
            .field("instance_id", &self.instance_id)
            .field("is_class_default", &self.is_class_default)
            .field("has_vm", &self.vm.is_some())
            .field("event_queue", &self.event_queue)
            .field("construction_pending", &self.construction_pending)
            .finish()
    }
}

fn forward_selection(delegates: &RigDelegates, event: &HierarchyEvent) {
    let Some(key) = event.key.as_ref() else {
        return;
    };
    if key.element_type != armature_api_core::ElementType::Control {
        return;
    }
    match event.notification {
        HierarchyNotification::ElementSelected => delegates.control_selected(key, true),
        HierarchyNotification::ElementDeselected => delegates.control_selected(key, false),
        _ => {}
    }
}

/// Run the VM for one event with the rig's time, redirector and report sink.
pub(crate) fn run_program(
    vm: &mut RigVm,
    hierarchy: &mut RigHierarchy,
    event: &str,
    diagnostics: &mut RigDiagnostics,
    redirector: &ElementKeyRedirector,
    delta_time: f32,
    absolute_time: f32,
) -> bool {
    let mut ctx = ExecuteContext::new(hierarchy, event, diagnostics)
        .with_time(delta_time, absolute_time)
        .with_redirector(redirector);
    vm.execute(&mut ctx).succeeded()
}

impl ControlRig {
    fn with_parts(
        name: String,
        hierarchy: SharedHierarchy,
        vm: Option<RigVm>,
        config: RigConfig,
        is_class_default: bool,
    ) -> Self {
        Self {
            name,
            instance_id: Uuid::new_v4(),
            is_class_default,
            hierarchy,
            vm,
            config,
            event_queue: vec![FORWARD.to_string()],
            redirector: ElementKeyRedirector::new(),
            module: None,
            physics_solvers: Vec::new(),
            shape_libraries: Vec::new(),
            class_default_shape_libraries: Vec::new(),
            shapes: ShapeLibraryBindings::default(),
            delegates: RigDelegates::new(),
            diagnostics: RigDiagnostics::new(),
            additive: AdditiveState::default(),
            bone_initials: HashMap::new(),
            interaction: InteractionType::None,
            delta_time: 0.0,
            absolute_time: 0.0,
            requires_init: true,
            construction_pending: true,
            executing: false,
            constructing: false,
            selection_listener: None,
            object_binding: None,
        }
    }

    /// A rig without a program. Every event fails quietly.
    pub fn new(name: impl Into<String>, hierarchy: RigHierarchy, config: RigConfig) -> Self {
        Self::with_parts(name.into(), shared(hierarchy), None, config, false)
    }

    /// A standalone rig running `program`.
    pub fn with_program(
        name: impl Into<String>,
        hierarchy: RigHierarchy,
        program: &RigProgram,
        config: RigConfig,
    ) -> Result<Self, RigError> {
        let vm = RigVm::from_program(program)?;
        Ok(Self::with_parts(name.into(), shared(hierarchy), Some(vm), config, false))
    }

    pub(crate) fn class_default(
        name: String,
        hierarchy: RigHierarchy,
        program: &RigProgram,
        config: RigConfig,
    ) -> Result<Self, RigError> {
        let vm = RigVm::from_program(program)?;
        Ok(Self::with_parts(name, shared(hierarchy), Some(vm), config, true))
    }

    /// New instance sharing this class default's byte-code.
    pub fn instantiate(&self) -> Result<ControlRig, RigError> {
        if !self.is_class_default {
            return Err(RigError::NotClassDefault);
        }
        let mut rig = Self::with_parts(
            self.name.clone(),
            shared(RigHierarchy::new()),
            self.vm.as_ref().map(RigVm::share),
            self.config.clone(),
            false,
        );
        rig.event_queue = self.event_queue.clone();
        rig.module = self.module.clone();
        rig.shape_libraries = self.shape_libraries.clone();
        rig.initialize_from_cdo(self);
        Ok(rig)
    }

    /// Copy the class default's hierarchy and settings into this instance.
    ///
    /// Physics solver ids are remapped to instance-unique ids and poses are
    /// reset to initial. Class defaults and module rigs are left alone.
    pub fn initialize_from_cdo(&mut self, cdo: &ControlRig) {
        if self.is_class_default || self.module.is_some() {
            return;
        }
        let instance = self.instance_id;
        {
            let source = read_hierarchy(&cdo.hierarchy);
            let mut hierarchy = write_hierarchy(&self.hierarchy);
            {
                let mut deferred = hierarchy.notification_bracket();
                deferred.copy_hierarchy(&source);
                deferred.remap_physics_solvers(|id| instance_solver_id(instance, id));
                deferred.reset_pose_to_initial(ElementTypeMask::ALL);
                let mut settings = source.settings().clone();
                settings.procedural_element_limit += source.len();
                deferred.set_settings(settings);
            }
            hierarchy.set_default_hierarchy(&cdo.hierarchy);
            hierarchy.notify(HierarchyNotification::HierarchyReset, None);
        }
        self.redirector = cdo.redirector.clone();
        self.physics_solvers = cdo
            .physics_solvers
            .iter()
            .map(|solver| PhysicsSolverDescription {
                name: solver.name.clone(),
                id: instance_solver_id(instance, solver.id),
            })
            .collect();
        self.class_default_shape_libraries = cdo.shape_libraries.clone();
        self.request_init();
        log::debug!("rig '{}' instance {} initialized from class default", self.name, instance);
    }

    /// Mirror edits made on the class default onto this instance.
    pub fn listen_to_class_default(&self, cdo: &ControlRig) {
        write_hierarchy(&cdo.hierarchy).register_listening_hierarchy(&self.hierarchy);
    }

    pub fn stop_listening_to_class_default(&self, cdo: &ControlRig) -> bool {
        write_hierarchy(&cdo.hierarchy).unregister_listening_hierarchy(&self.hierarchy)
    }

    // ---------- identity ----------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn is_class_default(&self) -> bool {
        self.is_class_default
    }

    pub fn is_module(&self) -> bool {
        self.module.is_some()
    }

    pub fn module_settings(&self) -> Option<&ModuleSettings> {
        self.module.as_ref()
    }

    pub fn hierarchy(&self) -> &SharedHierarchy {
        &self.hierarchy
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn is_additive(&self) -> bool {
        self.config.is_additive
    }

    pub fn set_additive(&mut self, additive: bool) {
        self.config.is_additive = additive;
    }

    pub fn vm(&self) -> Option<&RigVm> {
        self.vm.as_ref()
    }

    pub fn delegates(&self) -> &RigDelegates {
        &self.delegates
    }

    pub fn diagnostics(&self) -> &RigDiagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut RigDiagnostics {
        &mut self.diagnostics
    }

    pub fn physics_solvers(&self) -> &[PhysicsSolverDescription] {
        &self.physics_solvers
    }

    pub fn find_physics_solver(&self, name: &str) -> Option<&PhysicsSolverDescription> {
        self.physics_solvers.iter().find(|s| s.name == name)
    }

    // ---------- lifecycle ----------

    /// Prepare the rig for execution and schedule construction.
    ///
    /// Returns false when the rig has no program.
    pub fn initialize(&mut self, request_init: bool) -> bool {
        if request_init {
            self.request_init();
        }
        if self.requires_init {
            self.initialize_vm();
        }
        if self.module.is_none() && self.selection_listener.is_none() {
            let delegates = self.delegates.clone();
            let id = write_hierarchy(&self.hierarchy).subscribe(move |event| forward_selection(&delegates, event));
            self.selection_listener = Some(id);
        }
        if self.config.create_float_controls_for_curves {
            if let Err(err) = self.create_float_controls_for_curves() {
                log::warn!("rig '{}': could not create curve controls: {err}", self.name);
            }
        }
        self.construction_pending = true;
        self.delegates.broadcast(RigPhase::Initialized, "");
        log::debug!("rig '{}' initialized", self.name);
        self.vm.is_some()
    }

    pub(crate) fn requires_init(&self) -> bool {
        self.requires_init
    }

    pub(crate) fn initialize_vm(&mut self) {
        if let Some(vm) = self.vm.as_mut() {
            vm.initialize();
        }
        self.requires_init = false;
    }

    /// Re-initialize the VM and run construction on the next execute.
    pub fn request_init(&mut self) {
        self.requires_init = true;
        self.construction_pending = true;
    }

    /// Run construction once on the next execute.
    pub fn request_construction(&mut self) {
        self.construction_pending = true;
    }

    pub fn is_construction_required(&self) -> bool {
        self.construction_pending
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    // ---------- events ----------

    pub fn set_event_queue(&mut self, queue: Vec<String>) {
        self.event_queue = queue;
    }

    pub fn event_queue(&self) -> &[String] {
        &self.event_queue
    }

    pub fn supports_event(&self, event: &str) -> bool {
        self.vm.as_ref().is_some_and(|vm| vm.supports_event(event))
    }

    pub fn supports_backwards_solve(&self) -> bool {
        self.supports_event(INVERSE)
    }

    pub fn set_interaction_type(&mut self, interaction: InteractionType) {
        let was = self.interaction != InteractionType::None;
        let is = interaction != InteractionType::None;
        self.interaction = interaction;
        if was != is {
            let mut hierarchy = write_hierarchy(&self.hierarchy);
            if is {
                hierarchy.open_interaction_bracket();
            } else {
                hierarchy.close_interaction_bracket();
            }
        }
    }

    pub fn interaction_type(&self) -> InteractionType {
        self.interaction
    }

    pub fn is_interacting(&self) -> bool {
        self.interaction != InteractionType::None
    }

    // ---------- time ----------

    pub fn set_delta_time(&mut self, delta_time: f32) {
        self.delta_time = delta_time;
    }

    pub fn set_absolute_time(&mut self, absolute_time: f32) {
        self.absolute_time = absolute_time;
    }

    pub fn set_absolute_and_delta_time(&mut self, absolute_time: f32, delta_time: f32) {
        self.absolute_time = absolute_time;
        self.delta_time = delta_time;
    }

    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    pub fn absolute_time(&self) -> f32 {
        self.absolute_time
    }

    // ---------- execution ----------

    /// Run one event, constructing first when construction is pending.
    ///
    /// Returns false when the rig has no program, the event failed, or
    /// execute was re-entered.
    pub fn execute(&mut self, event: &str) -> bool {
        if self.vm.is_none() {
            return false;
        }
        if self.executing {
            log::warn!("rig '{}': Execute is being called recursively ({event})", self.name);
            return false;
        }
        if self.requires_init {
            self.initialize_vm();
        }
        let shared = Arc::clone(&self.hierarchy);
        let mut hierarchy = write_hierarchy(&shared);
        self.executing = true;
        let ok = self.execute_locked(&mut hierarchy, event);
        self.executing = false;
        ok
    }

    fn execute_locked(&mut self, hierarchy: &mut RigHierarchy, event: &str) -> bool {
        if event == events::CONSTRUCTION {
            return self.run_construction(hierarchy);
        }
        let mut ok = true;
        if self.construction_pending {
            ok &= self.run_construction(hierarchy);
        }
        ok & self.execute_event(hierarchy, event)
    }

    /// Run a non-construction event with its announcements. Forward is
    /// wrapped by PreForward and PostForward when the program has them.
    pub(crate) fn execute_event(&mut self, hierarchy: &mut RigHierarchy, event: &str) -> bool {
        let forward = event == FORWARD;
        let mut ok = true;
        if forward {
            self.delegates.broadcast(RigPhase::PreForwardsSolve, event);
            if self.supports_event(PRE_FORWARD) {
                ok &= self.execute_internal(hierarchy, PRE_FORWARD);
            }
        }
        ok &= self.execute_internal(hierarchy, event);
        if forward {
            if self.supports_event(POST_FORWARD) {
                ok &= self.execute_internal(hierarchy, POST_FORWARD);
            }
            self.delegates.broadcast(RigPhase::PostForwardsSolve, event);
        }
        self.delegates.broadcast(RigPhase::Executed, event);
        ok
    }

    /// Run the compiled program for `event` without construction handling.
    pub(crate) fn execute_internal(&mut self, hierarchy: &mut RigHierarchy, event: &str) -> bool {
        if !self.supports_event(event) {
            return false;
        }
        if self.module.is_some() && event != CONNECTOR {
            let unresolved = self.unresolved_connectors_in(hierarchy);
            if !unresolved.is_empty() {
                let names: Vec<String> = unresolved.iter().map(ToString::to_string).collect();
                self.diagnostics.log_once(
                    &format!("unresolved-connectors:{event}"),
                    Severity::Warning,
                    event,
                    format!("connectors {} are not resolved; skipping '{event}'", names.join(", ")),
                );
                return false;
            }
        }

        let Some(vm) = self.vm.as_mut() else {
            return false;
        };
        let mut executing = hierarchy.execute_bracket();
        let ok = if events::is_construction(event) {
            let mut bracket = executing.controller_bracket();
            run_program(
                vm,
                &mut bracket,
                event,
                &mut self.diagnostics,
                &self.redirector,
                self.delta_time,
                self.absolute_time,
            )
        } else {
            run_program(
                vm,
                &mut executing,
                event,
                &mut self.diagnostics,
                &self.redirector,
                self.delta_time,
                self.absolute_time,
            )
        };
        if !ok {
            log::error!("rig '{}': '{event}' failed", self.name);
        }
        ok
    }

    /// Run the event queue once.
    ///
    /// Additive rigs run their backwards/forwards composite instead. An
    /// active interaction runs the Interaction event first.
    pub fn evaluate_any_thread(&mut self) -> bool {
        if self.config.is_additive {
            return self.evaluate_additive();
        }
        if self.vm.is_none() {
            return false;
        }
        let mut queue = self.event_queue.clone();
        if self.is_interacting() && self.supports_event(INTERACTION) && !queue.iter().any(|e| e == INTERACTION) {
            queue.insert(0, INTERACTION.to_string());
        }
        let mut ok = true;
        let mut ran = false;
        for event in &queue {
            if event == events::CONSTRUCTION || self.supports_event(event) {
                ok &= self.execute(event);
                ran = true;
            }
        }
        if !ran && self.construction_pending {
            ok &= self.execute(events::CONSTRUCTION);
        }
        ok
    }

    // ---------- connectors ----------

    fn unresolved_connectors_in(&self, hierarchy: &RigHierarchy) -> Vec<ElementKey> {
        hierarchy
            .iter()
            .filter_map(|element| {
                let settings = element.connector()?;
                (!settings.optional && !self.redirector.contains(element.key())).then(|| element.key().clone())
            })
            .collect()
    }

    pub fn unresolved_connectors(&self) -> Vec<ElementKey> {
        self.unresolved_connectors_in(&read_hierarchy(&self.hierarchy))
    }

    /// Point `connector` at `target` for every later key lookup.
    pub fn resolve_connector(&mut self, connector: ElementKey, target: ElementKey) {
        self.redirector.add(connector, target);
        self.diagnostics.reset_once();
    }

    pub fn redirector(&self) -> &ElementKeyRedirector {
        &self.redirector
    }

    // ---------- variables ----------

    pub fn variable(&self, name: &str) -> Option<VmValue> {
        self.vm.as_ref()?.variable(name).cloned()
    }

    pub fn set_variable(&mut self, name: &str, value: VmValue) -> Result<(), RigError> {
        match self.vm.as_mut() {
            Some(vm) => Ok(vm.set_variable(name, value)?),
            None => Err(armature_vm_core::VmError::UnknownVariable(name.to_string()).into()),
        }
    }

    pub fn public_variables(&self) -> Vec<(String, VmValue)> {
        self.vm
            .as_ref()
            .map(|vm| {
                vm.public_variables()
                    .map(|(name, value)| (name.to_string(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    // ---------- host object ----------

    /// Remember the host object this rig drives without keeping it alive.
    pub fn set_object_binding<T: Any + Send + Sync>(&mut self, object: &Arc<T>) {
        let object: Arc<dyn Any + Send + Sync> = object.clone();
        self.object_binding = Some(Arc::downgrade(&object));
    }

    pub fn clear_object_binding(&mut self) {
        self.object_binding = None;
    }

    pub fn object_binding(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.object_binding.as_ref().and_then(Weak::upgrade)
    }

    pub fn has_object_binding(&self) -> bool {
        self.object_binding().is_some()
    }

    pub(crate) fn rig_name(&self) -> &str {
        &self.name
    }
}

impl Drop for ControlRig {
    fn drop(&mut self) {
        if let Some(id) = self.selection_listener.take() {
            write_hierarchy(&self.hierarchy).unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armature_hierarchy_core::HierarchyDefinition;

    fn program(json: &str) -> RigProgram {
        RigProgram::from_json_str(json).unwrap()
    }

    fn hierarchy() -> RigHierarchy {
        HierarchyDefinition::from_json_str(r#"{"elements":[{"type":"Curve","name":"Smile"}]}"#)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn rig_without_program_fails_quietly() {
        let mut rig = ControlRig::new("empty", hierarchy(), RigConfig::default());
        assert!(!rig.initialize(true));
        assert!(!rig.execute(FORWARD));
        assert!(!rig.evaluate_any_thread());
        assert!(rig.diagnostics().reports().is_empty());
    }

    #[test]
    fn construction_runs_once_before_the_first_event() {
        let program = program(
            r#"{"events":{
                "Construction":{"nodes":[{"id":"n","type":"set_curve_value","params":{"item":"Curve:Smile","value":{"kind":"float","value":0.5}}}]},
                "Forward":{"nodes":[{"id":"n","type":"get_curve_value","params":{"item":"Curve:Smile"}}]}
            }}"#,
        );
        let mut rig = ControlRig::with_program("rig", hierarchy(), &program, RigConfig::default()).unwrap();
        rig.initialize(true);
        assert!(rig.is_construction_required());
        assert!(rig.execute(FORWARD));
        assert!(!rig.is_construction_required());
        assert_eq!(
            read_hierarchy(rig.hierarchy()).curve_value(&ElementKey::curve("Smile")),
            Some(0.5)
        );
    }

    #[test]
    fn reentrant_execute_is_refused() {
        let program = program(r#"{"events":{"Forward":{"nodes":[]}}}"#);
        let mut rig = ControlRig::with_program("rig", hierarchy(), &program, RigConfig::default()).unwrap();
        rig.executing = true;
        assert!(!rig.execute(FORWARD));
        assert!(!rig.evaluate_any_thread());
        rig.executing = false;
        assert!(rig.execute(FORWARD));
    }

    #[test]
    fn instances_need_a_class_default() {
        let rig = ControlRig::new("plain", hierarchy(), RigConfig::default());
        assert!(matches!(rig.instantiate(), Err(RigError::NotClassDefault)));
    }

    #[test]
    fn object_binding_is_weak() {
        let mut rig = ControlRig::new("bound", hierarchy(), RigConfig::default());
        let host = Arc::new(String::from("skeletal mesh"));
        rig.set_object_binding(&host);
        assert!(rig.has_object_binding());
        let bound = rig.object_binding().unwrap();
        assert_eq!(bound.downcast_ref::<String>().map(String::as_str), Some("skeletal mesh"));
        drop(bound);
        drop(host);
        assert!(!rig.has_object_binding());
    }
}
