//! Lazy object construction from a graph of named blueprints.
//!
//! # Simple use case
//!
//! ```
//! # use std::collections::HashMap;
//! # use std::sync::Arc;
//! # use odr::*;
//! // Define the types to build
//! struct Connection {
//!     host: String,
//! }
//!
//! struct Repository {
//!     connection: Arc<Connection>,
//! }
//!
//! # fn main() -> Result<(), WiringError> {
//! // Tell the catalog how to build them from positional arguments
//! let mut catalog = Catalog::new();
//! catalog
//!     .register("Connection", |args: &Arguments| {
//!         Ok(Connection { host: args.string(0)?.to_owned() })
//!     })?
//!     .register("Repository", |args: &Arguments| {
//!         Ok(Repository { connection: args.instance(0)? })
//!     })?;
//!
//! // Describe the object graph
//! let mut db = Blueprint::with_id(&catalog, "Connection", "db")?;
//! db.add_argument("host", Reference::environment("DB_HOST")?)?;
//! let mut repo = Blueprint::new(&catalog, "Repository")?;
//! repo.add_argument("connection", Reference::blueprint("db")?)?;
//!
//! let env = HashMap::from([("DB_HOST".to_owned(), "localhost".to_owned())]);
//! let registry = Registry::with_environment(env);
//! registry.add_blueprint(db)?;
//! registry.add_blueprint(repo)?;
//!
//! // Instances are built on first use, then shared
//! let repo: Arc<Repository> = registry.get_as("Repository")?;
//! let db: Arc<Connection> = registry.get_as("db")?;
//! assert_eq!(db.host, "localhost");
//! assert!(Arc::ptr_eq(&repo.connection, &db));
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! * A [Catalog] maps type identifiers to factory functions. A factory receives the
//!   resolved [Arguments] in declaration order and builds the instance.
//! * A [Blueprint] names one object to build: its type identifier, its own identifier
//!   (the type identifier by default) and its named arguments, each a [Reference].
//! * A [Reference] is resolved lazily: to another blueprint's instance, to an environment
//!   variable, or to a registry parameter.
//! * The [Registry] owns blueprints, cached instances and parameters. Each blueprint is
//!   built at most once. Before resolving an argument, the declared graph below it is
//!   walked so that self and circular references are rejected instead of recursing forever.
//!
//! [Container] is the lock-free core behind [Registry], for single-threaded use.

mod blueprint;
mod registry;
mod resolve;
mod value;

pub use blueprint::{Arguments, Blueprint, Catalog, Factory};
pub use registry::{Container, Registry};
pub use resolve::{Environment, Identifier, ProcessEnvironment, Reference, Resolver, WiringError};
pub use value::{Instance, Value};
