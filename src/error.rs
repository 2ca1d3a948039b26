//! Error types. Plain enums in the teacher's style (`CompileError`/`ReadError`
//! in `bits.rs`/`schema.rs`), split by the moment they can occur: build-time
//! misuse of the schema builder, versus the two runtime directions.

use std::fmt;

/// Raised by [`crate::schema::Schema`] builder methods for invalid option
/// combinations. Build errors are terminal for the builder call only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    InvalidStringOptions,
    InvalidBufferOptions,
    InvalidArrayOptions,
    InvalidChoiceOptions,
    InvalidNestOptions,
    InvalidPointerOptions,
    InvalidChoiceKey(String),
    SeekForbidsAssert,
    UnknownAliasAtBuild(String),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::InvalidStringOptions => {
                write!(f, "string field requires exactly one of length/zeroTerminated/greedy")
            }
            BuildError::InvalidBufferOptions => {
                write!(f, "buffer field requires one of length/readUntil")
            }
            BuildError::InvalidArrayOptions => write!(
                f,
                "array field requires one of length/lengthInBytes/readUntil and a type"
            ),
            BuildError::InvalidChoiceOptions => write!(f, "choice field requires tag and choices"),
            BuildError::InvalidNestOptions => write!(f, "nest field requires a type"),
            BuildError::InvalidPointerOptions => write!(f, "pointer field requires offset and type"),
            BuildError::InvalidChoiceKey(key) => {
                write!(f, "choice discriminator key {key:?} does not parse as an integer")
            }
            BuildError::SeekForbidsAssert => write!(f, "seek field cannot carry an assert option"),
            BuildError::UnknownAliasAtBuild(name) => {
                write!(f, "alias {name:?} referenced as an inline type is not yet registered")
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// Raised by [`crate::schema::Schema::parse`]. Terminal for the call.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    OutOfBounds,
    BitSequenceTooLong,
    AssertFailed { field: String, value: String },
    UndefinedTag,
    UnknownAlias(String),
    UnsupportedEncoding(String),
    ArgumentError,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::OutOfBounds => write!(f, "read past the end of the input buffer"),
            DecodeError::BitSequenceTooLong => write!(f, "bit run exceeds 32 bits"),
            DecodeError::AssertFailed { field, value } => {
                write!(f, "assertion failed on field {field:?}: got {value}")
            }
            DecodeError::UndefinedTag => write!(f, "choice discriminator matched no case and no defaultChoice"),
            DecodeError::UnknownAlias(name) => write!(f, "unknown alias {name:?}"),
            DecodeError::UnsupportedEncoding(name) => write!(f, "unsupported text encoding {name:?}"),
            DecodeError::ArgumentError => write!(f, "parse expects a byte buffer"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Raised by [`crate::schema::Schema::encode`]. Terminal for the call.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeError {
    AssertFailed { field: String, value: String },
    UndefinedTag,
    BitSequenceTooLong,
    UnknownAlias(String),
    UnsupportedEncoding(String),
    ArgumentError,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::AssertFailed { field, value } => {
                write!(f, "assertion failed on field {field:?}: got {value}")
            }
            EncodeError::UndefinedTag => write!(f, "choice discriminator matched no case and no defaultChoice"),
            EncodeError::BitSequenceTooLong => write!(f, "bit run exceeds 32 bits"),
            EncodeError::UnknownAlias(name) => write!(f, "unknown alias {name:?}"),
            EncodeError::UnsupportedEncoding(name) => write!(f, "unsupported encoding: {name}"),
            EncodeError::ArgumentError => write!(f, "encode expects a record"),
        }
    }
}

impl std::error::Error for EncodeError {}
