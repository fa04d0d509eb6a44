use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::blueprint::{Arguments, Blueprint};
use crate::resolve::{Environment, Identifier, ProcessEnvironment, Reference, Resolver, WiringError};
use crate::value::Value;

/// Blueprints, cached instances and parameters.
///
/// This is the single-threaded core of the registry: every operation takes it by
/// exclusive reference, and blueprint references resolve against it recursively.
/// Use [Registry] to share it between threads.
pub struct Container {
    blueprints: IndexMap<Identifier, Arc<Blueprint>>,
    instances: HashMap<Identifier, Value>,
    parameters: HashMap<Identifier, Value>,
    environment: Box<dyn Environment>,
    compiled: bool,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Empty container reading the process environment
    pub fn new() -> Self {
        Self::with_environment(ProcessEnvironment)
    }

    pub fn with_environment(environment: impl Environment + 'static) -> Self {
        Self {
            blueprints: IndexMap::new(),
            instances: HashMap::new(),
            parameters: HashMap::new(),
            environment: Box::new(environment),
            compiled: false,
        }
    }

    /// Register a blueprint under its identifier
    pub fn add_blueprint(&mut self, blueprint: Blueprint) -> Result<(), WiringError> {
        if self.has(blueprint.id()) {
            return Err(WiringError::DuplicateIdentifier(blueprint.id().to_string()));
        }
        trace!(id = %blueprint.id(), type_name = %blueprint.type_name(), "blueprint added");
        self.blueprints
            .insert(blueprint.id().clone(), Arc::new(blueprint));
        Ok(())
    }

    /// Seed the cache with an already built value
    pub fn set_instance(&mut self, id: &str, value: impl Into<Value>) -> Result<(), WiringError> {
        if self.has(id) {
            return Err(WiringError::DuplicateIdentifier(id.to_owned()));
        }
        self.instances.insert(Identifier::new(id)?, value.into());
        Ok(())
    }

    pub fn has(&self, id: &str) -> bool {
        self.instances.contains_key(id) || self.blueprints.contains_key(id)
    }

    /// Obtain the instance registered under `id`, building it on first use
    pub fn get(&mut self, id: &str) -> Result<Value, WiringError> {
        if let Some(instance) = self.instances.get(id) {
            trace!(id, "cache hit");
            return Ok(instance.clone());
        }
        let Some(blueprint) = self.blueprints.get(id).cloned() else {
            return Err(WiringError::NotFound(id.to_owned()));
        };
        self.instantiate(&blueprint)
    }

    /// Typed variant of [Container::get]
    pub fn get_as<T: std::any::Any + Send + Sync>(&mut self, id: &str) -> Result<Arc<T>, WiringError> {
        self.get(id)?
            .downcast::<T>()
            .ok_or_else(|| WiringError::TypeMismatch {
                id: id.to_owned(),
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn get_parameter(&self, name: &str, default: impl Into<Value>) -> Value {
        self.parameters
            .get(name)
            .cloned()
            .unwrap_or_else(|| default.into())
    }

    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) -> Result<(), WiringError> {
        self.parameters.insert(Identifier::new(name)?, value.into());
        Ok(())
    }

    /// Build every registered blueprint not built yet, in registration order.
    ///
    /// Only the first successful call does any work.
    pub fn compile(&mut self) -> Result<(), WiringError> {
        if self.compiled {
            return Ok(());
        }
        let pending: Vec<Arc<Blueprint>> = self
            .blueprints
            .values()
            .filter(|b| !self.instances.contains_key(b.id()))
            .cloned()
            .collect();
        let mut built = 0;
        for blueprint in pending {
            // an earlier blueprint may have pulled this one in as a dependency
            if self.instances.contains_key(blueprint.id()) {
                continue;
            }
            self.instantiate(&blueprint)?;
            built += 1;
        }
        self.compiled = true;
        info!(built, total = self.blueprints.len(), "registry compiled");
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub fn blueprint(&self, id: &str) -> Option<&Arc<Blueprint>> {
        self.blueprints.get(id)
    }

    /// Registered blueprints, in registration order
    pub fn blueprints(&self) -> impl Iterator<Item = &Arc<Blueprint>> {
        self.blueprints.values()
    }

    fn instantiate(&mut self, blueprint: &Blueprint) -> Result<Value, WiringError> {
        debug!(id = %blueprint.id(), type_name = %blueprint.type_name(), "instantiating");
        let mut values = Vec::with_capacity(blueprint.arguments().len());
        for (name, reference) in blueprint.arguments() {
            self.check_circular(blueprint, reference)?;
            trace!(id = %blueprint.id(), argument = %name, reference = %reference.id(), "resolving");
            values.push((name.clone(), reference.resolve(self)?));
        }
        let arguments = Arguments::new(blueprint.type_name().clone(), values);
        let value = Value::Instance(blueprint.construct(&arguments)?);
        self.instances.insert(blueprint.id().clone(), value.clone());
        Ok(value)
    }

    /// Reject `reference` if resolving it could lead back into an unfinished construction.
    ///
    /// This walks the declared blueprint graph from `root`, before anything is resolved.
    fn check_circular(&self, root: &Blueprint, reference: &Reference) -> Result<(), WiringError> {
        let mut walk = CycleWalk {
            blueprints: &self.blueprints,
            root: root.id(),
            path: Vec::new(),
            cleared: HashSet::new(),
        };
        walk.visit(reference).inspect_err(|e| {
            debug!(root = %root.id(), error = %e, "cycle rejected");
        })
    }
}

/// Depth-first walk of the blueprint graph below a root blueprint
struct CycleWalk<'a> {
    blueprints: &'a IndexMap<Identifier, Arc<Blueprint>>,
    root: &'a Identifier,
    /// Blueprints between the root and the current one
    path: Vec<&'a Identifier>,
    /// Blueprints whose dependencies were fully explored without finding a cycle
    cleared: HashSet<&'a Identifier>,
}

impl<'a> CycleWalk<'a> {
    fn visit(&mut self, reference: &'a Reference) -> Result<(), WiringError> {
        let Some(id) = reference.blueprint_id() else {
            return Ok(());
        };
        let Some(next) = self.blueprints.get(id) else {
            return Ok(());
        };

        if id == self.root {
            return Err(match self.path.last() {
                Some(previous) => WiringError::CircularReference {
                    first: self.root.to_string(),
                    second: previous.to_string(),
                },
                None => WiringError::SelfReference(self.root.to_string()),
            });
        }

        if let Some(position) = self.path.iter().position(|p| *p == id) {
            return Err(if position + 1 == self.path.len() {
                WiringError::SelfReference(id.to_string())
            } else {
                WiringError::CircularReference {
                    first: id.to_string(),
                    second: self.path[self.path.len() - 1].to_string(),
                }
            });
        }

        if self.cleared.contains(id) {
            return Ok(());
        }

        self.path.push(next.id());
        for inner in next.arguments().values() {
            self.visit(inner)?;
        }
        self.path.pop();
        self.cleared.insert(next.id());
        Ok(())
    }
}

impl Resolver for Container {
    fn get(&mut self, id: &str) -> Result<Value, WiringError> {
        Container::get(self, id)
    }

    fn parameter(&self, name: &str) -> Option<Value> {
        self.parameters.get(name).cloned()
    }

    fn environment(&self, name: &str) -> Option<String> {
        self.environment.lookup(name)
    }
}

/// Shareable object registry.
///
/// Wraps a [Container] in a single lock: each call holds it for its whole duration,
/// including any construction it triggers. Factories must not call back into the
/// registry that is building them.
pub struct Registry {
    container: Mutex<Container>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Container> for Registry {
    fn from(container: Container) -> Self {
        Self {
            container: Mutex::new(container),
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Container::new().into()
    }

    pub fn with_environment(environment: impl Environment + 'static) -> Self {
        Container::with_environment(environment).into()
    }

    pub fn add_blueprint(&self, blueprint: Blueprint) -> Result<(), WiringError> {
        self.container.lock().add_blueprint(blueprint)
    }

    pub fn set_instance(&self, id: &str, value: impl Into<Value>) -> Result<(), WiringError> {
        self.container.lock().set_instance(id, value)
    }

    pub fn has(&self, id: &str) -> bool {
        self.container.lock().has(id)
    }

    pub fn get(&self, id: &str) -> Result<Value, WiringError> {
        self.container.lock().get(id)
    }

    pub fn get_as<T: std::any::Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>, WiringError> {
        self.container.lock().get_as(id)
    }

    pub fn get_parameter(&self, name: &str, default: impl Into<Value>) -> Value {
        self.container.lock().get_parameter(name, default)
    }

    /// Parameter value, `None` if it was never set
    pub fn parameter(&self, name: &str) -> Option<Value> {
        Resolver::parameter(&*self.container.lock(), name)
    }

    pub fn set_parameter(&self, name: &str, value: impl Into<Value>) -> Result<(), WiringError> {
        self.container.lock().set_parameter(name, value)
    }

    pub fn compile(&self) -> Result<(), WiringError> {
        self.container.lock().compile()
    }

    pub fn is_compiled(&self) -> bool {
        self.container.lock().is_compiled()
    }

    pub fn blueprint(&self, id: &str) -> Option<Arc<Blueprint>> {
        self.container.lock().blueprint(id).cloned()
    }

    /// Snapshot of the registered blueprints, in registration order
    pub fn blueprints(&self) -> Vec<Arc<Blueprint>> {
        self.container.lock().blueprints().cloned().collect()
    }

    /// Number of registered blueprints
    pub fn len(&self) -> usize {
        self.container.lock().blueprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Give up the lock and work on the container directly
    pub fn into_inner(self) -> Container {
        self.container.into_inner()
    }
}
