//! Module registry and import classification.
//!
//! A module is registered as a loader: a closure that plays the role of the
//! module body and returns the module's named objects. Importing runs the
//! loader under the same limits as a call, with `input()` patched to raise
//! [`Interrupt::InputWhileImporting`] and `exit()`/`quit()` patched to raise
//! instead of ending the process, and classifies what went wrong.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::error::{Interrupt, SYNTAX_ERROR};
use crate::failure::Failure;
use crate::limits::{Limits, run_guarded};
use crate::patch::{Patch, exit_quit_patches};
use crate::runtime::{self, Callable, INPUT, Symbol};

/// A named object defined by a module.
#[derive(Debug, Clone)]
pub enum Object {
    Function(Callable),
    Value(Value),
}

impl Object {
    pub fn as_function(&self) -> Option<&Callable> {
        match self {
            Self::Function(callable) => Some(callable),
            Self::Value(_) => None,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function(_))
    }
}

/// The namespace produced by running a module body.
#[derive(Debug, Clone, Default)]
pub struct Module {
    objects: BTreeMap<String, Object>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(Vec<Value>, Map<String, Value>) -> Result<Value, Interrupt> + Send + Sync + 'static,
    {
        self.objects
            .insert(name.to_string(), Object::Function(Callable::new(f)));
        self
    }

    pub fn value(mut self, name: &str, value: Value) -> Self {
        self.objects.insert(name.to_string(), Object::Value(value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Object> {
        self.objects.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }
}

type LoaderFn = dyn Fn() -> Result<Module, Interrupt> + Send + Sync;

/// Registered modules by name.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    loaders: HashMap<String, Arc<LoaderFn>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module whose body is `loader`.
    pub fn register<F>(&mut self, name: &str, loader: F) -> &mut Self
    where
        F: Fn() -> Result<Module, Interrupt> + Send + Sync + 'static,
    {
        self.loaders.insert(name.to_string(), Arc::new(loader));
        self
    }

    /// Register a module with no top-level side effects.
    pub fn register_module(&mut self, name: &str, module: Module) -> &mut Self {
        self.register(name, move || Ok(module.clone()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loaders.contains_key(name)
    }

    fn loader(&self, name: &str) -> Option<Arc<LoaderFn>> {
        self.loaders.get(name).cloned()
    }

    /// Import `obj_name` from `module` under `limits`.
    ///
    /// On success every function of the module is published at
    /// `<module>.<name>` so code under test can reach it through
    /// `runtime::call` and patches can replace it.
    #[instrument(skip(self, limits))]
    pub fn import(&self, module: &str, obj_name: &str, limits: &Limits) -> Result<Object, Failure> {
        let Some(loader) = self.loader(module) else {
            debug!("module not registered");
            return Err(Failure::module_not_found(module, obj_name));
        };

        let mut import_patches = Vec::from(exit_quit_patches());
        import_patches.push(Patch::function(INPUT, |_, _| {
            Err(Interrupt::InputWhileImporting)
        }));
        let loaded = run_guarded(limits, &import_patches, move || loader());

        let namespace = match loaded {
            Ok(namespace) => namespace,
            Err(Interrupt::InputWhileImporting) => {
                debug!("module body called input()");
                return Err(Failure::import_blocked(obj_name));
            }
            Err(Interrupt::Raised { kind, .. }) if kind == SYNTAX_ERROR => {
                debug!("module body failed to load");
                return Err(Failure::module_not_found(module, obj_name).with_origin(kind));
            }
            Err(interrupt) => {
                debug!(err = %interrupt, "module body raised");
                let seconds = limits.time_limit.as_secs().max(1);
                return Err(
                    Failure::from_interrupt(&interrupt, seconds, limits.memory_limit_gib)
                        .with_context(format!("Error while importing `{obj_name}`."))
                        .with_origin(interrupt.kind_name()),
                );
            }
        };

        for name in namespace.names() {
            if let Some(Object::Function(callable)) = namespace.get(name) {
                runtime::define(&format!("{module}.{name}"), Symbol::Function(callable.clone()));
            }
        }

        namespace.get(obj_name).cloned().ok_or_else(|| {
            debug!("object missing from module");
            Failure::object_not_found(module, obj_name)
        })
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.loaders.keys().collect();
        names.sort();
        f.debug_struct("ModuleRegistry")
            .field("modules", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureKind;
    use crate::runtime::{EXIT, QUIT};
    use crate::test_support::{quick_limits, serial};
    use serde_json::json;

    fn registry() -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        registry
            .register_module(
                "fake_module",
                Module::new().function("fake_func", |_, _| Ok(Value::Null)),
            )
            .register("asks_at_import", || {
                runtime::input("")?;
                Ok(Module::new().function("fake_func", |_, _| Ok(Value::Null)))
            })
            .register("asks_inside_function", || {
                Ok(Module::new().function("fake_func", |_, _| {
                    runtime::input("")?;
                    Ok(Value::Null)
                }))
            })
            .register("broken", || Err(Interrupt::syntax("invalid syntax")))
            .register("exits_at_import", || {
                runtime::exit(Some(3))?;
                Ok(Module::new().function("fake_func", |_, _| Ok(Value::Null)))
            })
            .register("quits_at_import", || {
                runtime::quit(None)?;
                Ok(Module::new().function("fake_func", |_, _| Ok(Value::Null)))
            })
            .register("divides_by_zero", || {
                Err(Interrupt::raised("ZeroDivisionError", "division by zero"))
            });
        registry
    }

    #[test]
    fn imports_valid_object() {
        let _guard = serial();
        let obj = registry()
            .import("fake_module", "fake_func", &quick_limits())
            .expect("import");
        assert!(obj.is_function());
    }

    #[test]
    fn input_at_import_is_blocked() {
        let _guard = serial();
        let err = registry()
            .import("asks_at_import", "fake_func", &quick_limits())
            .expect_err("blocked");
        assert_eq!(err.kind, FailureKind::ImportBlocked);
        assert!(err.render().contains("Stuck at call to `input()` while importing `fake_func`."));
    }

    #[test]
    fn input_inside_function_is_not_blocked() {
        let _guard = serial();
        let obj = registry()
            .import("asks_inside_function", "fake_func", &quick_limits())
            .expect("import");
        assert!(obj.is_function());
    }

    #[test]
    fn missing_object_and_module_are_distinct() {
        let _guard = serial();
        let err = registry()
            .import("fake_module", "fake_obj", &quick_limits())
            .expect_err("missing object");
        assert_eq!(err.kind, FailureKind::ObjectNotFound);
        assert!(err.render().contains("Unable to import `fake_obj`."));

        let err = registry()
            .import("fake_module_0", "fake_func", &quick_limits())
            .expect_err("missing module");
        assert_eq!(err.kind, FailureKind::ModuleNotFound);
        assert!(err.render().contains("Unable to import `fake_module_0`."));
    }

    #[test]
    fn unparsable_module_is_module_not_found() {
        let _guard = serial();
        let err = registry()
            .import("broken", "fake_func", &quick_limits())
            .expect_err("broken");
        assert_eq!(err.kind, FailureKind::ModuleNotFound);
        assert_eq!(err.origin.as_deref(), Some(SYNTAX_ERROR));
    }

    #[test]
    fn other_errors_keep_their_kind_with_preamble() {
        let _guard = serial();
        let err = registry()
            .import("divides_by_zero", "fake_func", &quick_limits())
            .expect_err("raised");
        assert_eq!(err.kind, FailureKind::Unclassified);
        assert_eq!(err.origin.as_deref(), Some("ZeroDivisionError"));
        assert!(err.render().contains("Error while importing `fake_func`."));
    }

    #[test]
    fn exit_and_quit_at_import_are_failures() {
        let _guard = serial();
        let err = registry()
            .import("exits_at_import", "fake_func", &quick_limits())
            .expect_err("exit");
        assert_eq!(err.kind, FailureKind::ProcessExit);
        assert_eq!(err.context.as_deref(), Some("Error while importing `fake_func`."));

        let err = registry()
            .import("quits_at_import", "fake_func", &quick_limits())
            .expect_err("quit");
        assert_eq!(err.kind, FailureKind::ProcessQuit);
        assert!(err.render().contains("Calling the `quit()` function is not allowed."));
    }

    #[test]
    fn input_patch_is_reverted_after_import() {
        let _guard = serial();
        let before: Vec<Symbol> = [INPUT, EXIT, QUIT]
            .iter()
            .map(|path| runtime::lookup(path).expect("builtin bound"))
            .collect();
        let _ = registry().import("asks_at_import", "fake_func", &quick_limits());
        let _ = registry().import("exits_at_import", "fake_func", &quick_limits());
        for (path, before) in [INPUT, EXIT, QUIT].iter().zip(&before) {
            let after = runtime::lookup(path).expect("builtin bound");
            assert!(before.same(&after), "{path} was not restored");
        }
    }

    #[test]
    fn functions_are_published_under_module_path() {
        let _guard = serial();
        let mut registry = ModuleRegistry::new();
        registry.register_module(
            "publish_demo",
            Module::new()
                .function("double", |args, _| {
                    let n = args.first().and_then(Value::as_i64).unwrap_or_default();
                    Ok(json!(n * 2))
                })
                .value("LIMIT", json!(3)),
        );
        registry
            .import("publish_demo", "double", &quick_limits())
            .expect("import");
        assert_eq!(runtime::call("publish_demo.double", vec![json!(21)]), Ok(json!(42)));
        assert!(runtime::lookup("publish_demo.LIMIT").is_none());
    }
}
