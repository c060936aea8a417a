pub mod registry;
pub mod types;

pub use registry::{demangle, EnumDescriptor, RecordDescriptor, TypeRegistry};
pub use types::TypeExpr;
