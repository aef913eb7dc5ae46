//! Window class registration bookkeeping.
//!
//! A registered class is a process-wide named entry; it must be unregistered
//! exactly once, and only after every window created against it has been
//! destroyed. The registry tracks which names this process currently owns so
//! a second unregistration (or one for a never-registered name) is rejected
//! before it reaches the OS.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{NotifyError, Result};
use crate::native::{ClassAtom, MessageHandler, ModuleHandle, NativeApi};

pub struct WindowClassRegistry {
    api: Arc<dyn NativeApi>,
    module: ModuleHandle,
    registered: HashMap<String, ClassAtom>,
}

impl WindowClassRegistry {
    pub fn new(api: Arc<dyn NativeApi>, module: ModuleHandle) -> Self {
        Self {
            api,
            module,
            registered: HashMap::new(),
        }
    }

    /// Register `name` bound to `handler`, making it visible to subsequent
    /// window-creation calls.
    pub fn register(&mut self, name: &str, handler: Arc<dyn MessageHandler>) -> Result<ClassAtom> {
        if self.registered.contains_key(name) {
            return Err(NotifyError::ClassRegistrationFailed(format!(
                "class {name:?} is already registered by this process"
            )));
        }
        let atom = self.api.register_class(name, handler, self.module)?;
        self.registered.insert(name.to_string(), atom);
        debug!(name, atom = atom.0, "window class registered");
        Ok(atom)
    }

    /// Unregister `name`. Callers must have destroyed all of the class's
    /// windows first.
    pub fn unregister(&mut self, name: &str) -> Result<()> {
        if !self.registered.contains_key(name) {
            return Err(NotifyError::ClassUnregistrationFailed(format!(
                "class {name:?} is not registered"
            )));
        }
        self.api.unregister_class(name, self.module)?;
        self.registered.remove(name);
        debug!(name, "window class unregistered");
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registered.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::WindowHandle;
    use crate::native::fake::FakeNative;
    use std::sync::atomic::Ordering;

    struct NoopHandler;

    impl MessageHandler for NoopHandler {
        fn handle(&self, _: WindowHandle, _: u32, _: usize, _: isize) -> isize {
            0
        }
    }

    fn registry(api: &Arc<FakeNative>) -> WindowClassRegistry {
        let api: Arc<dyn NativeApi> = api.clone();
        let module = api.module_handle().unwrap();
        WindowClassRegistry::new(api, module)
    }

    #[test]
    fn register_then_unregister() {
        let api = FakeNative::new();
        let mut registry = registry(&api);
        let atom = registry.register("notify_class", Arc::new(NoopHandler)).unwrap();
        assert_ne!(atom.0, 0);
        assert!(registry.is_registered("notify_class"));
        registry.unregister("notify_class").unwrap();
        assert!(!registry.is_registered("notify_class"));
    }

    #[test]
    fn double_registration_is_rejected_locally() {
        let api = FakeNative::new();
        let mut registry = registry(&api);
        registry.register("notify_class", Arc::new(NoopHandler)).unwrap();
        let err = registry
            .register("notify_class", Arc::new(NoopHandler))
            .unwrap_err();
        assert!(matches!(err, NotifyError::ClassRegistrationFailed(_)));
    }

    #[test]
    fn os_rejection_surfaces_as_registration_failure() {
        let api = FakeNative::new();
        api.fail_register_class.store(true, Ordering::Relaxed);
        let mut registry = registry(&api);
        let err = registry
            .register("notify_class", Arc::new(NoopHandler))
            .unwrap_err();
        assert!(matches!(err, NotifyError::ClassRegistrationFailed(_)));
        assert!(!registry.is_registered("notify_class"));
    }

    #[test]
    fn unregistering_an_unknown_class_fails() {
        let api = FakeNative::new();
        let mut registry = registry(&api);
        let err = registry.unregister("notify_class").unwrap_err();
        assert!(matches!(err, NotifyError::ClassUnregistrationFailed(_)));
    }

    #[test]
    fn second_unregistration_fails() {
        let api = FakeNative::new();
        let mut registry = registry(&api);
        registry.register("notify_class", Arc::new(NoopHandler)).unwrap();
        registry.unregister("notify_class").unwrap();
        let err = registry.unregister("notify_class").unwrap_err();
        assert!(matches!(err, NotifyError::ClassUnregistrationFailed(_)));
    }
}
