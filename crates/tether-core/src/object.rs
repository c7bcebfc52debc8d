//! Object model for Tether.
//!
//! An [`Object`] is a named owner of extensions. Extensions are stored in a
//! SlotMap keyed by [`ExtensionId`] and can be looked up by name, which is
//! how signals resolve slots given as names.
//!
//! # Key Types
//!
//! - [`Object`] - Named container of extensions
//! - [`ExtensionId`] - Stable key of an attached extension
//!
//! # Example
//!
//! ```
//! use tether_core::{CallbackExtension, Object, PackagedArguments, ReturnValue};
//!
//! let object = Object::create("counter");
//! let id = object
//!     .add_extension(CallbackExtension::new("answer", |_, _| ReturnValue::new(42_i32)))
//!     .unwrap();
//!
//! let result = object.invoke("answer", &PackagedArguments::new()).unwrap();
//! assert_eq!(result.get::<i32>(), Some(&42));
//!
//! object.remove_extension(id).unwrap();
//! assert!(object.find_extension("answer").is_none());
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

use crate::arguments::{PackagedArguments, ReturnValue};
use crate::error::ObjectError;
use crate::extension::Extension;
use crate::logging::targets;

new_key_type! {
    /// A unique identifier for an extension attached to an object.
    ///
    /// Returned by [`Object::add_extension`] and used to remove the extension
    /// again. It becomes invalid once the extension is removed.
    pub struct ExtensionId;
}

/// Result type for object operations.
pub type ObjectResult<T> = std::result::Result<T, ObjectError>;

/// A named owner of extensions.
///
/// The object holds its extensions strongly; extensions refer back to the
/// object weakly. Dropping the object drops every extension nobody else
/// holds, which in turn disconnects their connections.
pub struct Object {
    name: String,
    this: Weak<Object>,
    extensions: RwLock<SlotMap<ExtensionId, Arc<dyn Extension>>>,
}

impl Object {
    /// Create an object with no extensions.
    pub fn create(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|this| Self {
            name,
            this: this.clone(),
            extensions: RwLock::new(SlotMap::with_key()),
        })
    }

    /// The object's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach `extension` to this object.
    ///
    /// Fails if the object already has an extension with the same name, or
    /// if the extension is attached to another live object.
    pub fn add_extension(&self, extension: Arc<dyn Extension>) -> ObjectResult<ExtensionId> {
        let mut extensions = self.extensions.write();
        if extensions
            .values()
            .any(|existing| existing.name() == extension.name())
        {
            return Err(ObjectError::duplicate_extension(extension.name()));
        }
        if !extension.base().attach(self.this.clone()) {
            return Err(ObjectError::already_attached(extension.name()));
        }
        let name = extension.name().to_string();
        let id = extensions.insert(extension);
        tracing::trace!(target: targets::OBJECT, object = %self.name, extension = %name, ?id, "extension attached");
        Ok(id)
    }

    /// Detach and return the extension with `id`.
    pub fn remove_extension(&self, id: ExtensionId) -> ObjectResult<Arc<dyn Extension>> {
        let extension = self
            .extensions
            .write()
            .remove(id)
            .ok_or(ObjectError::InvalidExtensionId)?;
        extension.base().detach();
        tracing::trace!(target: targets::OBJECT, object = %self.name, extension = extension.name(), "extension detached");
        Ok(extension)
    }

    /// The extension with `id`.
    pub fn extension(&self, id: ExtensionId) -> Option<Arc<dyn Extension>> {
        self.extensions.read().get(id).cloned()
    }

    /// The extension named `name`.
    pub fn find_extension(&self, name: &str) -> Option<Arc<dyn Extension>> {
        self.extensions
            .read()
            .values()
            .find(|extension| extension.name() == name)
            .cloned()
    }

    /// All attached extensions, in no particular order.
    pub fn extensions(&self) -> Vec<Arc<dyn Extension>> {
        self.extensions.read().values().cloned().collect()
    }

    /// Number of attached extensions.
    pub fn extension_count(&self) -> usize {
        self.extensions.read().len()
    }

    /// Run the extension named `name` with `args`.
    ///
    /// Returns `None` if there is no such extension or it did not run.
    pub fn invoke(&self, name: &str, args: &PackagedArguments) -> Option<ReturnValue> {
        let Some(extension) = self.find_extension(name) else {
            crate::tether_debug!(object = %self.name, extension = name, "invoke: no such extension");
            return None;
        };
        extension.run(args)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("name", &self.name)
            .field("extensions", &self.extension_count())
            .finish()
    }
}
