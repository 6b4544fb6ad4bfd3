//! linkmesh — a schema/query/validation kernel for structured, linked-data
//! style records.
//!
//! A client builds a *model*: a [`value::Value`] mixing concrete fields
//! with [`shape::Shape`]-typed placeholders and embedded [`query::Query`]
//! values. The model is [`model::expand`]ed (fill shape-inferred
//! defaults), then [`model::populate`]d from a user payload or a decoded
//! [`query_string`], then checked with [`validator::Validator`]. The
//! resulting value — possibly still containing one or more `Query`
//! objects — is handed to a [`store::Store`] driver.

pub mod config;
pub mod error;
pub mod expression;
pub mod model;
pub mod query;
pub mod query_string;
pub mod shape;
pub mod store;
pub mod validator;
pub mod value;

pub use config::EngineConfig;
pub use error::{CompareError, ConstructionError, ParseError, ShapeError};
pub use expression::{Expression, Transform};
pub use model::{expand, populate};
pub use query::{Criterion, Probe, Query, Specs};
pub use shape::{Clazz, Constraint, Property, Shape};
pub use store::{Store, StoreError};
pub use validator::{Validator, Violation};
pub use value::{Data, Datatype, Object, Table, Text, Tuple, Uri, Value};
