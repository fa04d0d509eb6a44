//! Blueprints and the factories that build them
//!
//! A [Catalog] associates a type identifier to a factory function, standing in for
//! construct-from-name. A [Blueprint] picks one of these types, gives the resulting
//! instance an identifier, and lists the (ordered, named) references whose values are
//! passed positionally to the factory.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::resolve::{Identifier, Reference, WiringError};
use crate::value::{Instance, Value};

/// Type-erased constructor: ordered arguments in, shared instance out
pub type Factory = Arc<dyn Fn(&Arguments) -> Result<Instance, WiringError> + Send + Sync>;

/// Known constructible types, by type identifier
#[derive(Clone, Default)]
pub struct Catalog {
    factories: IndexMap<Identifier, Factory>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare how to build instances of `type_name`.
    ///
    /// Registering the same type identifier again replaces the previous factory.
    pub fn register<T, F>(&mut self, type_name: &str, factory: F) -> Result<&mut Self, WiringError>
    where
        T: Any + Send + Sync,
        F: Fn(&Arguments) -> Result<T, WiringError> + Send + Sync + 'static,
    {
        let id = Identifier::new(type_name)?;
        let erased: Factory = Arc::new(move |args: &Arguments| {
            let instance: Instance = Arc::new(factory(args)?);
            Ok(instance)
        });
        self.factories.insert(id, erased);
        Ok(self)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn factory(&self, type_name: &str) -> Option<&Factory> {
        self.factories.get(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &Identifier> {
        self.factories.keys()
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

/// Resolved argument values handed to a factory, in declaration order
pub struct Arguments {
    type_name: Identifier,
    values: Vec<(Identifier, Value)>,
}

impl Arguments {
    pub(crate) fn new(type_name: Identifier, values: Vec<(Identifier, Value)>) -> Self {
        Self { type_name, values }
    }

    pub fn type_name(&self) -> &Identifier {
        &self.type_name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &Value)> {
        self.values.iter().map(|(name, value)| (name, value))
    }

    /// Look up a value by argument name
    pub fn named(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, v)| v)
    }

    /// Fail unless exactly `count` arguments were supplied
    pub fn expect_len(&self, count: usize) -> Result<(), WiringError> {
        if self.values.len() != count {
            return Err(self.error(format!(
                "expected {} argument(s), got {}",
                count,
                self.values.len()
            )));
        }
        Ok(())
    }

    /// Value at `position`
    pub fn value(&self, position: usize) -> Result<&Value, WiringError> {
        self.values
            .get(position)
            .map(|(_, v)| v)
            .ok_or_else(|| self.error(format!("missing argument #{position}")))
    }

    /// String at `position`, `None` if it resolved to null
    pub fn optional_string(&self, position: usize) -> Result<Option<&str>, WiringError> {
        match self.value(position)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(self.mismatch(position, "string", other)),
        }
    }

    pub fn string(&self, position: usize) -> Result<&str, WiringError> {
        match self.value(position)? {
            Value::String(s) => Ok(s),
            other => Err(self.mismatch(position, "string", other)),
        }
    }

    pub fn integer(&self, position: usize) -> Result<i64, WiringError> {
        let value = self.value(position)?;
        value
            .as_i64()
            .ok_or_else(|| self.mismatch(position, "integer", value))
    }

    pub fn float(&self, position: usize) -> Result<f64, WiringError> {
        let value = self.value(position)?;
        value
            .as_f64()
            .ok_or_else(|| self.mismatch(position, "float", value))
    }

    pub fn boolean(&self, position: usize) -> Result<bool, WiringError> {
        let value = self.value(position)?;
        value
            .as_bool()
            .ok_or_else(|| self.mismatch(position, "bool", value))
    }

    /// Typed handle on the instance at `position`
    pub fn instance<T: Any + Send + Sync>(&self, position: usize) -> Result<Arc<T>, WiringError> {
        let value = self.value(position)?;
        value
            .downcast::<T>()
            .ok_or_else(|| self.mismatch(position, type_name::<T>(), value))
    }

    fn mismatch(&self, position: usize, expected: &str, found: &Value) -> WiringError {
        let name = self
            .values
            .get(position)
            .map_or("?", |(n, _)| n.as_str());
        self.error(format!(
            "argument \"{name}\" (#{position}) should be {expected}, found {}",
            found.kind()
        ))
    }

    fn error(&self, reason: String) -> WiringError {
        WiringError::Construction {
            type_name: self.type_name.to_string(),
            reason,
        }
    }
}

/// Description of one constructible object
#[derive(Clone)]
pub struct Blueprint {
    id: Identifier,
    type_name: Identifier,
    factory: Factory,
    arguments: IndexMap<Identifier, Reference>,
}

impl Blueprint {
    /// Blueprint for `type_name`, identified by the type identifier itself.
    ///
    /// Fails with [WiringError::InvalidArgument] if the catalog cannot build this type.
    pub fn new(catalog: &Catalog, type_name: &str) -> Result<Self, WiringError> {
        Self::build(catalog, type_name, None)
    }

    /// Blueprint for `type_name` registered under an explicit identifier
    pub fn with_id(catalog: &Catalog, type_name: &str, id: &str) -> Result<Self, WiringError> {
        Self::build(catalog, type_name, Some(id))
    }

    fn build(catalog: &Catalog, type_name: &str, id: Option<&str>) -> Result<Self, WiringError> {
        let Some(factory) = catalog.factory(type_name) else {
            return Err(WiringError::InvalidArgument(format!(
                "type \"{type_name}\" does not exist"
            )));
        };
        let type_name = Identifier::new(type_name)?;
        let id = match id {
            Some(id) => Identifier::new(id)?,
            None => type_name.clone(),
        };
        Ok(Self {
            id,
            type_name,
            factory: Arc::clone(factory),
            arguments: IndexMap::new(),
        })
    }

    /// Append a constructor argument.
    ///
    /// Fails with [WiringError::InvalidArgument] if the name is empty or already used,
    /// leaving the arguments unchanged.
    pub fn add_argument(&mut self, name: &str, reference: Reference) -> Result<&mut Self, WiringError> {
        if name.is_empty() {
            return Err(WiringError::InvalidArgument(format!(
                "argument name of type \"{}\" must not be empty",
                self.type_name
            )));
        }
        if self.arguments.contains_key(name) {
            return Err(WiringError::InvalidArgument(format!(
                "argument \"{name}\" already exists"
            )));
        }
        self.arguments.insert(Identifier::new(name)?, reference);
        Ok(self)
    }

    /// Arguments in declaration order
    pub fn arguments(&self) -> &IndexMap<Identifier, Reference> {
        &self.arguments
    }

    pub fn type_name(&self) -> &Identifier {
        &self.type_name
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    /// Blueprints this one depends on, in declaration order
    pub fn dependencies(&self) -> impl Iterator<Item = &Identifier> {
        self.arguments.values().filter_map(Reference::blueprint_id)
    }

    pub(crate) fn construct(&self, arguments: &Arguments) -> Result<Instance, WiringError> {
        (self.factory)(arguments)
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}
