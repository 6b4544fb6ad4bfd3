//! Error taxonomy for the core (see spec §7).
//!
//! Construction errors are fatal for the caller and raised as soon as an
//! invariant is violated. Parse errors are recoverable and always name the
//! offending token. Shape errors cover path/transform resolution and
//! merge/extend conflicts. Store errors are the external-driver surface
//! (§6) and are defined alongside [`crate::store::Store`].

use thiserror::Error;

/// Raised by builders when a value would violate a structural invariant.
///
/// These are programmer errors: a conflicting facet, a reserved name used
/// as a property, a malformed regex passed to `.pattern(..)`, and similar.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConstructionError {
    #[error("reserved field name '{0}' cannot be used as a property name")]
    ReservedName(String),

    #[error("facet '{facet}' conflicts: {left} vs {right}")]
    FacetConflict {
        facet: &'static str,
        left: String,
        right: String,
    },

    #[error("range is inconsistent: min {min} is greater than max {max}")]
    RangeInconsistent { min: String, max: String },

    #[error("minLength {min} is greater than maxLength {max}")]
    LengthInconsistent { min: u64, max: u64 },

    #[error("minCount {min} is greater than maxCount {max}")]
    CountInconsistent { min: u64, max: u64 },

    #[error("malformed pattern '{pattern}': {source}")]
    MalformedPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("datatype '{facet}' requires {required:?} but shape already declares {actual:?}")]
    DatatypeConflict {
        facet: &'static str,
        required: crate::value::Datatype,
        actual: crate::value::Datatype,
    },

    #[error("duplicate property: '{0}' reuses a name, forward IRI, or reverse IRI already in use")]
    DuplicateProperty(String),

    #[error("property '{0}' must declare a forward IRI, a reverse IRI, or both")]
    PropertyWithoutIri(String),

    #[error("'{facet}' must not contain array values")]
    ArrayNotAllowed { facet: &'static str },

    #[error("offset must be >= 0, got {0}")]
    NegativeOffset(i64),

    #[error("limit must be >= 0, got {0}")]
    NegativeLimit(i64),

    #[error("duplicate probe name '{0}' in Specs")]
    DuplicateProbe(String),
}

/// Raised when textual input (a selector, an expression, a query string, or
/// a codec literal) cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("malformed selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("malformed expression '{expression}': {reason}")]
    Expression { expression: String, reason: String },

    #[error("unknown transform '{0}' in expression pipeline")]
    UnknownTransform(String),

    #[error("malformed query string pair '{pair}': {reason}")]
    QueryString { pair: String, reason: String },

    #[error("reserved label '{0}' cannot be used as a query-string path")]
    ReservedLabel(String),

    #[error("malformed value '{literal}' for datatype {datatype:?}")]
    MalformedLiteral {
        literal: String,
        datatype: crate::value::Datatype,
    },
}

/// Raised when an [`crate::expression::Expression`] cannot be resolved
/// against a [`crate::shape::Shape`], or when `merge`/`extend` encounter an
/// incompatible datatype pairing that only manifests once both shapes are
/// known (as opposed to [`ConstructionError::DatatypeConflict`], which is
/// raised purely from facet bookkeeping on a single shape).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShapeError {
    #[error("unknown property '{0}' in expression path")]
    UnknownProperty(String),

    #[error("step '{0}' refuses to resolve: reserved-name paths are not addressable")]
    ReservedStep(String),

    #[error("cannot apply transform '{transform}' to datatype {datatype:?}")]
    TransformMismatch {
        transform: &'static str,
        datatype: crate::value::Datatype,
    },

    #[error("incompatible datatypes during {op}: {left:?} vs {right:?}")]
    IncompatibleDatatypes {
        op: &'static str,
        left: crate::value::Datatype,
        right: crate::value::Datatype,
    },

    #[error("class conflict during {op}: '{left}' vs '{right}'")]
    ClassConflict {
        op: &'static str,
        left: String,
        right: String,
    },

    #[error("range is inconsistent after {op}: min {min} is greater than max {max}")]
    RangeInconsistent {
        op: &'static str,
        min: String,
        max: String,
    },
}

/// Raised by the [`crate::value`] comparator (§4.A).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompareError {
    #[error("incomparable values: {0} cannot be ordered")]
    Incomparable(&'static str),

    #[error("incompatible values: {left:?} and {right:?} do not belong to the same family")]
    Incompatible {
        left: crate::value::Datatype,
        right: crate::value::Datatype,
    },
}
