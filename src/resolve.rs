//! References and the resolution protocol
//!
//! A [Reference] is a lazy pointer to a value. It is resolved against a [Resolver]
//! (in practice the registry's container) when the blueprint using it is instantiated.
//!
//! * [Reference::Blueprint] resolves to the instance built from another blueprint,
//!   possibly triggering its construction.
//! * [Reference::Environment] reads a variable through the resolver's [Environment].
//! * [Reference::Parameter] reads a scalar parameter held by the registry.
//!
//! Missing environment variables and parameters are not errors: they resolve to
//! [Value::Null] (or the reference's own default).

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;

use thiserror::Error;

use crate::value::Value;

/// Errors triggered while declaring or wiring blueprints
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WiringError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Duplicate identifier: \"{0}\" is already registered")]
    DuplicateIdentifier(String),
    #[error("Not found: undefined \"{0}\" instance")]
    NotFound(String),
    #[error("Detected circular reference \"{first}\" -> <- \"{second}\"")]
    CircularReference { first: String, second: String },
    #[error("Detected self reference \"{0}\"")]
    SelfReference(String),
    #[error("Cannot construct \"{type_name}\": {reason}")]
    Construction { type_name: String, reason: String },
    #[error("Type mismatch: \"{id}\" is not an instance of {expected}")]
    TypeMismatch { id: String, expected: &'static str },
}

/// A non-empty name: blueprint id, type identifier, argument name or variable name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: impl Into<String>) -> Result<Self, WiringError> {
        let name = name.into();
        if name.is_empty() {
            return Err(WiringError::InvalidArgument(
                "identifier must not be empty".to_owned(),
            ));
        }
        Ok(Identifier(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Identifier {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = WiringError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Identifier::new(value)
    }
}

impl TryFrom<String> for Identifier {
    type Error = WiringError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::new(value)
    }
}

/// Source of external named values
pub trait Environment: Send + Sync {
    /// Look up a variable, returning `None` when it is not set.
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Live view of the process environment
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    /// Variables holding invalid unicode read as unset.
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed set of variables, for embedding and tests
impl Environment for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// State that references resolve against.
///
/// Implemented by the registry's container. `get` may construct, and thus mutate the
/// instance cache, but never alters the set of blueprints.
pub trait Resolver {
    /// Obtain the instance registered under `id`, building it if needed.
    fn get(&mut self, id: &str) -> Result<Value, WiringError>;

    /// Read a parameter, `None` if it was never set.
    fn parameter(&self, name: &str) -> Option<Value>;

    /// Read an environment variable, `None` if it is not set.
    fn environment(&self, name: &str) -> Option<String>;
}

/// Lazy pointer to a value, resolved when the owning blueprint is instantiated
#[derive(Clone, Debug, PartialEq)]
pub enum Reference {
    /// Instance built from the blueprint with this identifier
    Blueprint(Identifier),
    /// Environment variable with this name
    Environment(Identifier),
    /// Registry parameter with this name, and the value used when it is unset
    Parameter { name: Identifier, default: Value },
}

impl Reference {
    pub fn blueprint(id: &str) -> Result<Self, WiringError> {
        Ok(Reference::Blueprint(Identifier::new(id)?))
    }

    pub fn environment(name: &str) -> Result<Self, WiringError> {
        Ok(Reference::Environment(Identifier::new(name)?))
    }

    pub fn parameter(name: &str) -> Result<Self, WiringError> {
        Ok(Reference::Parameter {
            name: Identifier::new(name)?,
            default: Value::Null,
        })
    }

    /// Parameter reference falling back to `default` when the parameter is unset
    pub fn parameter_or(name: &str, default: impl Into<Value>) -> Result<Self, WiringError> {
        Ok(Reference::Parameter {
            name: Identifier::new(name)?,
            default: default.into(),
        })
    }

    pub fn id(&self) -> &Identifier {
        match self {
            Reference::Blueprint(id) | Reference::Environment(id) => id,
            Reference::Parameter { name, .. } => name,
        }
    }

    /// Identifier of the blueprint this reference points to, if it is a blueprint edge
    pub fn blueprint_id(&self) -> Option<&Identifier> {
        match self {
            Reference::Blueprint(id) => Some(id),
            _ => None,
        }
    }

    /// Produce the value this reference points to.
    pub fn resolve(&self, resolver: &mut impl Resolver) -> Result<Value, WiringError> {
        match self {
            Reference::Blueprint(id) => resolver.get(id),
            Reference::Environment(name) => Ok(resolver.environment(name).into()),
            Reference::Parameter { name, default } => {
                Ok(resolver.parameter(name).unwrap_or_else(|| default.clone()))
            }
        }
    }
}
