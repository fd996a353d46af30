//! Shape library hooks.
//!
//! The core never loads shapes itself; hosts register callbacks that are
//! invoked when construction restores libraries or a control asks whether a
//! shape name resolves.

use std::fmt;
use std::sync::Arc;

use crate::rig::ControlRig;

pub type AddShapeLibraryFn = Arc<dyn Fn(&str) + Send + Sync>;
pub type ShapeExistsFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct ShapeLibraryBindings {
    on_add_shape_library: Option<AddShapeLibraryFn>,
    on_shape_exists: Option<ShapeExistsFn>,
}

impl fmt::Debug for ShapeLibraryBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeLibraryBindings")
            .field("on_add_shape_library", &self.on_add_shape_library.is_some())
            .field("on_shape_exists", &self.on_shape_exists.is_some())
            .finish()
    }
}

impl ShapeLibraryBindings {
    pub(crate) fn add_library(&self, library: &str) {
        if let Some(f) = &self.on_add_shape_library {
            f(library);
        }
    }

    pub(crate) fn shape_exists(&self, shape: &str) -> bool {
        self.on_shape_exists.as_ref().is_some_and(|f| f(shape))
    }
}

impl ControlRig {
    pub fn on_add_shape_library(&mut self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.shapes.on_add_shape_library = Some(Arc::new(f));
    }

    pub fn on_shape_exists(&mut self, f: impl Fn(&str) -> bool + Send + Sync + 'static) {
        self.shapes.on_shape_exists = Some(Arc::new(f));
    }

    pub fn clear_shape_library_bindings(&mut self) {
        self.shapes = ShapeLibraryBindings::default();
    }

    /// False when no resolver is bound.
    pub fn shape_exists(&self, shape: &str) -> bool {
        self.shapes.shape_exists(shape)
    }

    pub fn shape_libraries(&self) -> &[String] {
        &self.shape_libraries
    }

    pub fn add_shape_library(&mut self, library: impl Into<String>) {
        let library = library.into();
        if !self.shape_libraries.contains(&library) {
            self.shapes.add_library(&library);
            self.shape_libraries.push(library);
        }
    }

    /// Put the class default's libraries back, announcing each one.
    pub(crate) fn restore_shape_libraries(&mut self) {
        if self.class_default_shape_libraries.is_empty() {
            return;
        }
        self.shape_libraries = self.class_default_shape_libraries.clone();
        for library in &self.shape_libraries {
            self.shapes.add_library(library);
        }
    }
}
