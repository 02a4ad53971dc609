//! The curated variant catalog.
//!
//! Each family lists its known variants in the order runtime matching should
//! try them. Argument order is copied from the platform sources of each
//! release/vendor fork and is not checked against anything; a misplaced
//! argument only shows up as a failed bind on that device.

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;

use jnitramp_config::log_catalog_debug;

use crate::error::{CatalogError, Result};
use crate::method::{FamilyKind, MethodBuilder, MethodDescriptor};
use crate::types::{array_of, JBOOLEAN, JINT, JLONG};

/// Families and their variants, in matching priority order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantCatalog {
    families: BTreeMap<FamilyKind, Vec<MethodDescriptor>>,
}

static BUILTIN: Lazy<VariantCatalog> = Lazy::new(build_builtin);

impl VariantCatalog {
    /// Group `variants` by family, keeping their relative order.
    pub fn from_variants(variants: impl IntoIterator<Item = MethodDescriptor>) -> Self {
        let mut families: BTreeMap<FamilyKind, Vec<MethodDescriptor>> = BTreeMap::new();
        for variant in variants {
            families.entry(variant.family).or_default().push(variant);
        }
        Self { families }
    }

    /// Every variant known to ship on some device.
    pub fn builtin() -> &'static VariantCatalog {
        &BUILTIN
    }

    pub fn family(&self, kind: FamilyKind) -> &[MethodDescriptor] {
        self.families.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-empty families in a fixed order.
    pub fn families(&self) -> impl Iterator<Item = (FamilyKind, &[MethodDescriptor])> {
        self.families
            .iter()
            .filter(|(_, variants)| !variants.is_empty())
            .map(|(kind, variants)| (*kind, variants.as_slice()))
    }

    pub fn variants(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.families.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.families.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `variant` at the lowest priority of its family.
    pub fn push(&mut self, variant: MethodDescriptor) {
        self.families.entry(variant.family).or_default().push(variant);
    }

    /// Insert `variant` at the highest priority of its family.
    pub fn push_front(&mut self, variant: MethodDescriptor) {
        self.families
            .entry(variant.family)
            .or_default()
            .insert(0, variant);
    }

    /// Drop whole families from the catalog.
    pub fn without(&self, disabled: &[FamilyKind]) -> Self {
        let families = self
            .families
            .iter()
            .filter(|(kind, _)| !disabled.contains(kind))
            .map(|(kind, variants)| (*kind, variants.clone()))
            .collect();
        Self { families }
    }

    /// Check every catalog invariant that does not need a live process:
    /// per-variant validity, unique derived names, and distinct signatures
    /// within each family.
    pub fn validate(&self) -> Result<()> {
        let mut names: HashSet<String> = HashSet::with_capacity(self.len());

        for (kind, variants) in self.families() {
            let mut signatures: HashMap<String, String> = HashMap::with_capacity(variants.len());

            for variant in variants {
                variant.validate()?;

                let name = variant.name();
                if !names.insert(name.clone()) {
                    return Err(CatalogError::DuplicateMethodName(name));
                }

                let signature = variant.wire_signature();
                if let Some(first) = signatures.insert(signature.clone(), name.clone()) {
                    return Err(CatalogError::DuplicateSignature {
                        exported: kind.name().to_string(),
                        signature,
                        first,
                        second: name,
                    });
                }

                log_catalog_debug!(
                    "Variant ok",
                    name = name.as_str(),
                    signature = signature.as_str()
                );
            }
        }

        Ok(())
    }
}

/// Arguments shared across variants. Names double as context-struct fields.
pub mod args {
    use crate::method::ArgumentDescriptor;
    use crate::types::{array_of, JBOOLEAN, JINT, JLONG, JSTRING};

    pub fn uid() -> ArgumentDescriptor {
        ArgumentDescriptor::new("uid", JINT)
    }
    pub fn gid() -> ArgumentDescriptor {
        ArgumentDescriptor::new("gid", JINT)
    }
    pub fn gids() -> ArgumentDescriptor {
        ArgumentDescriptor::new("gids", array_of(JINT))
    }
    pub fn runtime_flags() -> ArgumentDescriptor {
        ArgumentDescriptor::new("runtime_flags", JINT)
    }
    pub fn rlimits() -> ArgumentDescriptor {
        ArgumentDescriptor::new("rlimits", array_of(array_of(JINT)))
    }
    pub fn mount_external() -> ArgumentDescriptor {
        ArgumentDescriptor::new("mount_external", JINT)
    }
    pub fn se_info() -> ArgumentDescriptor {
        ArgumentDescriptor::new("se_info", JSTRING)
    }
    pub fn nice_name() -> ArgumentDescriptor {
        ArgumentDescriptor::new("nice_name", JSTRING)
    }
    pub fn fds_to_close() -> ArgumentDescriptor {
        ArgumentDescriptor::new("fds_to_close", array_of(JINT))
    }
    pub fn instruction_set() -> ArgumentDescriptor {
        ArgumentDescriptor::new("instruction_set", JSTRING)
    }
    pub fn app_data_dir() -> ArgumentDescriptor {
        ArgumentDescriptor::new("app_data_dir", JSTRING)
    }

    // O
    pub fn fds_to_ignore() -> ArgumentDescriptor {
        ArgumentDescriptor::promoted("fds_to_ignore", array_of(JINT))
    }

    // P
    pub fn is_child_zygote() -> ArgumentDescriptor {
        ArgumentDescriptor::promoted("is_child_zygote", JBOOLEAN)
    }

    // Q (alternate layout)
    pub fn is_top_app() -> ArgumentDescriptor {
        ArgumentDescriptor::promoted("is_top_app", JBOOLEAN)
    }

    // R
    pub fn pkg_data_info_list() -> ArgumentDescriptor {
        ArgumentDescriptor::promoted("pkg_data_info_list", array_of(JSTRING))
    }
    pub fn whitelisted_data_info_list() -> ArgumentDescriptor {
        ArgumentDescriptor::promoted("whitelisted_data_info_list", array_of(JSTRING))
    }
    pub fn mount_data_dirs() -> ArgumentDescriptor {
        ArgumentDescriptor::promoted("mount_data_dirs", JBOOLEAN)
    }
    pub fn mount_storage_dirs() -> ArgumentDescriptor {
        ArgumentDescriptor::promoted("mount_storage_dirs", JBOOLEAN)
    }

    // U
    pub fn mount_sysprop_overrides() -> ArgumentDescriptor {
        ArgumentDescriptor::promoted("mount_sysprop_overrides", JBOOLEAN)
    }

    // System server
    pub fn permitted_capabilities() -> ArgumentDescriptor {
        ArgumentDescriptor::new("permitted_capabilities", JLONG)
    }
    pub fn effective_capabilities() -> ArgumentDescriptor {
        ArgumentDescriptor::new("effective_capabilities", JLONG)
    }
}

use self::args::*;
use FamilyKind::{ForkAndSpecialize, ForkSystemServer, SpecializeApp};

/// Leading arguments common to every app-process variant.
fn app_head(kind: FamilyKind, version: &str) -> MethodBuilder {
    MethodBuilder::new(kind, version).args([
        uid(),
        gid(),
        gids(),
        runtime_flags(),
        rlimits(),
        mount_external(),
        se_info(),
    ])
}

/// Arguments added from R onwards.
fn r_tail() -> [crate::method::ArgumentDescriptor; 5] {
    [
        is_top_app(),
        pkg_data_info_list(),
        whitelisted_data_info_list(),
        mount_data_dirs(),
        mount_storage_dirs(),
    ]
}

fn fork_and_specialize() -> Vec<MethodDescriptor> {
    let fas = |version| app_head(ForkAndSpecialize, version);

    vec![
        fas("l")
            .args([nice_name(), fds_to_close(), instruction_set(), app_data_dir()])
            .build(),
        fas("o")
            .args([
                nice_name(),
                fds_to_close(),
                fds_to_ignore(),
                instruction_set(),
                app_data_dir(),
            ])
            .build(),
        fas("p")
            .args([
                nice_name(),
                fds_to_close(),
                fds_to_ignore(),
                is_child_zygote(),
                instruction_set(),
                app_data_dir(),
            ])
            .build(),
        fas("q_alt")
            .args([
                nice_name(),
                fds_to_close(),
                fds_to_ignore(),
                is_child_zygote(),
                instruction_set(),
                app_data_dir(),
                is_top_app(),
            ])
            .build(),
        fas("r")
            .args([
                nice_name(),
                fds_to_close(),
                fds_to_ignore(),
                is_child_zygote(),
                instruction_set(),
                app_data_dir(),
            ])
            .args(r_tail())
            .build(),
        fas("u")
            .args([
                nice_name(),
                fds_to_close(),
                fds_to_ignore(),
                is_child_zygote(),
                instruction_set(),
                app_data_dir(),
            ])
            .args(r_tail())
            .arg(mount_sysprop_overrides())
            .build(),
        fas("samsung_m")
            .anon(JINT)
            .anon(JINT)
            .args([nice_name(), fds_to_close(), instruction_set(), app_data_dir()])
            .build(),
        fas("samsung_n")
            .anon(JINT)
            .anon(JINT)
            .args([nice_name(), fds_to_close(), instruction_set(), app_data_dir()])
            .anon(JINT)
            .build(),
        fas("samsung_o")
            .anon(JINT)
            .anon(JINT)
            .args([
                nice_name(),
                fds_to_close(),
                fds_to_ignore(),
                instruction_set(),
                app_data_dir(),
            ])
            .build(),
        fas("samsung_p")
            .anon(JINT)
            .anon(JINT)
            .args([
                nice_name(),
                fds_to_close(),
                fds_to_ignore(),
                is_child_zygote(),
                instruction_set(),
                app_data_dir(),
            ])
            .build(),
        fas("samsung_b")
            .args([
                nice_name(),
                fds_to_close(),
                fds_to_ignore(),
                is_child_zygote(),
                instruction_set(),
                app_data_dir(),
            ])
            .anon(JBOOLEAN)
            .args(r_tail())
            .arg(mount_sysprop_overrides())
            .build(),
        fas("grapheneos_u")
            .args([
                nice_name(),
                fds_to_close(),
                fds_to_ignore(),
                is_child_zygote(),
                instruction_set(),
                app_data_dir(),
            ])
            .args(r_tail())
            .arg(mount_sysprop_overrides())
            .anon(array_of(JLONG))
            .build(),
    ]
}

fn specialize_app() -> Vec<MethodDescriptor> {
    let spec = |version| app_head(SpecializeApp, version);

    vec![
        spec("q")
            .args([nice_name(), is_child_zygote(), instruction_set(), app_data_dir()])
            .build(),
        spec("q_alt")
            .args([
                nice_name(),
                is_child_zygote(),
                instruction_set(),
                app_data_dir(),
                is_top_app(),
            ])
            .build(),
        spec("r")
            .args([nice_name(), is_child_zygote(), instruction_set(), app_data_dir()])
            .args(r_tail())
            .build(),
        spec("u")
            .args([nice_name(), is_child_zygote(), instruction_set(), app_data_dir()])
            .args(r_tail())
            .arg(mount_sysprop_overrides())
            .build(),
        spec("samsung_q")
            .anon(JINT)
            .anon(JINT)
            .args([nice_name(), is_child_zygote(), instruction_set(), app_data_dir()])
            .build(),
        spec("grapheneos_u")
            .args([nice_name(), is_child_zygote(), instruction_set(), app_data_dir()])
            .args(r_tail())
            .arg(mount_sysprop_overrides())
            .anon(array_of(JLONG))
            .build(),
    ]
}

fn fork_system_server() -> Vec<MethodDescriptor> {
    let head = |version| {
        MethodBuilder::new(ForkSystemServer, version).args([uid(), gid(), gids(), runtime_flags()])
    };

    vec![
        head("l")
            .args([rlimits(), permitted_capabilities(), effective_capabilities()])
            .build(),
        head("samsung_q")
            .anon(JINT)
            .anon(JINT)
            .args([rlimits(), permitted_capabilities(), effective_capabilities()])
            .build(),
    ]
}

fn build_builtin() -> VariantCatalog {
    let catalog = VariantCatalog::from_variants(
        fork_and_specialize()
            .into_iter()
            .chain(specialize_app())
            .chain(fork_system_server()),
    );
    log_catalog_debug!("Built-in catalog ready", variants = catalog.len());
    catalog
}
