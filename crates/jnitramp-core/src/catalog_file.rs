//! Vendor catalog files.
//!
//! New OS variants can be added without rebuilding by listing them in a TOML
//! file:
//!
//! ```toml
//! [[variant]]
//! family = "nativeForkSystemServer"
//! version = "vendor_t"
//! priority = "prepend"
//! args = [
//!     { name = "uid", type = "I" },
//!     { name = "gid", type = "I" },
//!     { name = "gids", type = "[I" },
//!     { name = "runtime_flags", type = "I" },
//!     { type = "Z" },
//!     { name = "rlimits", type = "[[I" },
//!     { name = "permitted_capabilities", type = "J" },
//!     { name = "effective_capabilities", type = "J" },
//! ]
//! ```
//!
//! Arguments without a `name` are anonymous and get `_0`, `_1`, ... like
//! built-in vendor fields.

use std::path::Path;

use serde::Deserialize;

use jnitramp_config::log_catalog_info;

use crate::catalog::VariantCatalog;
use crate::error::{CatalogError, Result};
use crate::method::{ArgumentDescriptor, FamilyKind, MethodBuilder, MethodDescriptor};
use crate::types::TypeDescriptor;

/// Where a file variant lands in its family's matching order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Tried after every built-in variant
    #[default]
    Append,
    /// Tried before every built-in variant
    Prepend,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default, rename = "variant")]
    variants: Vec<VariantEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VariantEntry {
    family: String,
    version: String,
    #[serde(default)]
    priority: Priority,
    return_expression: Option<String>,
    args: Vec<ArgEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArgEntry {
    name: Option<String>,
    #[serde(rename = "type")]
    ty: TypeDescriptor,
    #[serde(default)]
    promote: bool,
}

impl VariantEntry {
    fn into_descriptor(self) -> Result<(MethodDescriptor, Priority)> {
        let family = FamilyKind::from_name(&self.family)?;
        let mut builder = MethodBuilder::new(family, self.version.as_str());

        for (index, arg) in self.args.into_iter().enumerate() {
            builder = match (arg.name, arg.promote) {
                (Some(name), true) => builder.arg(ArgumentDescriptor::promoted(name, arg.ty)),
                (Some(name), false) => builder.arg(ArgumentDescriptor::new(name, arg.ty)),
                (None, false) => builder.anon(arg.ty),
                (None, true) => {
                    return Err(CatalogError::PromotedAnonymous {
                        method: format!("{}_{}", family.name(), self.version),
                        index,
                    })
                }
            };
        }
        if let Some(expr) = self.return_expression {
            builder = builder.return_expression(expr);
        }

        Ok((builder.build(), self.priority))
    }
}

/// Parse catalog text. `origin` is only used in error messages.
pub fn parse_catalog(text: &str, origin: &Path) -> Result<Vec<(MethodDescriptor, Priority)>> {
    let file: CatalogFile = toml::from_str(text).map_err(|source| CatalogError::Toml {
        path: origin.to_path_buf(),
        source,
    })?;
    file.variants
        .into_iter()
        .map(VariantEntry::into_descriptor)
        .collect()
}

pub fn load_catalog_file(path: &Path) -> Result<Vec<(MethodDescriptor, Priority)>> {
    let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog(&text, path)
}

impl VariantCatalog {
    /// Merge parsed file variants. Prepended entries keep their file order
    /// ahead of the built-ins.
    pub fn merge(&mut self, entries: Vec<(MethodDescriptor, Priority)>) {
        let (front, back): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|(_, priority)| *priority == Priority::Prepend);

        for (variant, _) in front.into_iter().rev() {
            self.push_front(variant);
        }
        for (variant, _) in back {
            self.push(variant);
        }
    }

    /// Load and merge one catalog file, returning how many variants it added.
    /// The merged catalog is not validated here; generation does that.
    pub fn merge_file(&mut self, path: &Path) -> Result<usize> {
        let entries = load_catalog_file(path)?;
        let count = entries.len();
        self.merge(entries);
        log_catalog_info!(
            "Merged catalog file",
            path = tracing::field::display(path.display()),
            variants = count
        );
        Ok(count)
    }
}
