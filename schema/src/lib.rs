//! Type descriptors, markers, and dynamic values for the declargs schema
//! compiler. A schema is a tree of record types, variant (union) choice
//! types, containers, and scalar leaves; `Value` holds default instances and
//! the typed object graphs reconstructed from parsed command-line input.
//!
//! ```
//! use declargs_schema::*;
//!
//! let point = RecordSchema::new("Point", vec![
//!     FieldSchema::new("x", TypeNode::Scalar(ScalarKind::Float)),
//!     FieldSchema::new("y", TypeNode::Scalar(ScalarKind::Float)),
//! ]);
//!
//! let value = Value::record(&point, vec![
//!     ("x", Value::Float(0.5)),
//!     ("y", Value::Float(-0.5)),
//! ]);
//! assert_eq!(format!("{:?}", value), "Point { x: 0.5, y: -0.5 }");
//! assert!(value.conforms_to(&TypeNode::Record(point)));
//! ```

pub mod markers;
pub mod registry;
pub mod ty;
pub mod value;

pub use markers::*;
pub use registry::*;
pub use ty::*;
pub use value::*;
