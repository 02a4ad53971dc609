//! # jnitramp-core
//!
//! Generator for JNI native-method trampolines around the Zygote
//! process-launch entry points.
//!
//! A [`VariantCatalog`] lists every known argument layout of each launch
//! method across Android releases and vendor forks. [`generate`] validates it
//! and produces a [`Bundle`]: per family, one forwarding trampoline per
//! variant plus a priority-ordered `JNINativeMethod` table. Emitters in
//! [`emit`] render the bundle as a C header or a JSON manifest, and
//! [`binder`] models how the host picks one variant per family at runtime.

pub mod binder;
pub mod catalog;
pub mod catalog_file;
pub mod emit;
pub mod error;
pub mod method;
pub mod table;
pub mod trampoline;
pub mod types;

pub use binder::{install, select_family, FamilyBinding, HookList, Installation, NativeBinder, SimulatedTable};
pub use catalog::VariantCatalog;
pub use catalog_file::{load_catalog_file, parse_catalog, Priority};
pub use error::{CatalogError, EmitError, Result};
pub use method::{ArgumentDescriptor, FamilyKind, FamilyStrategy, MethodBuilder, MethodDescriptor};
pub use table::{generate, Bundle, FamilyTable, NativeMethodTableEntry};
pub use trampoline::{Step, Trampoline};
pub use types::{parse_signature, Primitive, TypeDescriptor};
