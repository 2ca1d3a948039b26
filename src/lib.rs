//! # bitspec
//!
//! A library for describing binary formats as declarative, chainable
//! schemas, then decoding byte buffers into structured value trees and
//! encoding them back.
//!
//! Build a schema by chaining one call per field, call [`schema::Schema::parse`]
//! to decode a buffer into a record, and [`schema::Schema::encode`] to turn a
//! record back into bytes.
//!
//! ## Example
//!
//! ```
//! use bitspec::schema::Schema;
//! use bitspec::options::Options;
//! use bitspec::node::{Endian, TypeRef};
//! use bitspec::catalog::Primitive;
//! use bitspec::value::Value;
//!
//! let schema = Schema::start()
//!     .uint8("count")
//!     .array(
//!         "items",
//!         Options::new()
//!             .length_field("count")
//!             .ty(TypeRef::Primitive(Primitive::Uint16, Endian::Big)),
//!     );
//!
//! let record = schema.parse(&[0x02, 0x00, 0x01, 0x00, 0x02]).unwrap();
//! assert_eq!(record.get("count"), Some(&Value::U64(2)));
//!
//! let bytes = schema.encode(&record).unwrap();
//! assert_eq!(bytes, vec![0x02, 0x00, 0x01, 0x00, 0x02]);
//! ```

pub mod alias;
pub mod bits;
pub mod catalog;
pub mod decode;
pub mod encode;
pub mod error;
pub mod node;
pub mod options;
pub mod schema;
pub mod size;
pub mod value;
