//! Method table assembly and the generation driver.

use serde::Serialize;

use jnitramp_config::{log_gen_debug, log_gen_info, RuntimeConfig};

use crate::catalog::VariantCatalog;
use crate::error::{CatalogError, EmitError, Result};
use crate::method::{FamilyKind, MethodDescriptor};
use crate::trampoline::{fn_type_name, orig_slot_name, referenced_globals, Trampoline};
use crate::types::TypeDescriptor;

/// One row of a JNI `RegisterNatives`-style table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeMethodTableEntry {
    pub exported_name: &'static str,
    pub wire_signature: String,
    /// Trampoline symbol the row points at
    pub entry_point: String,
}

/// Everything emitted for one family. Family-level names and the count come
/// from the family itself, never from whichever variant was processed last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyTable {
    pub family: FamilyKind,
    pub exported_name: &'static str,
    pub return_type: TypeDescriptor,
    /// Function-pointer typedef shared by all variants
    pub fn_type: String,
    /// Storage for the resolved original, NULL until bound
    pub orig_slot: String,
    pub methods_array: String,
    pub count_const: String,
    pub trampolines: Vec<Trampoline>,
    /// Same order as the catalog
    pub entries: Vec<NativeMethodTableEntry>,
}

impl FamilyTable {
    pub fn assemble(family: FamilyKind, variants: &[MethodDescriptor], runtime: &RuntimeConfig) -> Self {
        let exported_name = family.name();

        let trampolines: Vec<Trampoline> = variants
            .iter()
            .map(|variant| Trampoline::plan(variant, runtime))
            .collect();

        let entries = variants
            .iter()
            .zip(&trampolines)
            .map(|(variant, trampoline)| NativeMethodTableEntry {
                exported_name,
                wire_signature: variant.wire_signature(),
                entry_point: trampoline.symbol.clone(),
            })
            .collect();

        Self {
            family,
            exported_name,
            return_type: family.return_type(),
            fn_type: fn_type_name(family),
            orig_slot: orig_slot_name(family),
            methods_array: format!("{exported_name}_methods"),
            count_const: format!("{exported_name}_methods_count"),
            trampolines,
            entries,
        }
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

/// The complete generated artifact, ready for an emitter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bundle {
    /// Class whose methods the tables target
    pub scope: String,
    pub runtime: RuntimeConfig,
    pub families: Vec<FamilyTable>,
}

impl Bundle {
    pub fn family(&self, kind: FamilyKind) -> Option<&FamilyTable> {
        self.families.iter().find(|table| table.family == kind)
    }

    pub fn entries(&self) -> impl Iterator<Item = &NativeMethodTableEntry> {
        self.families.iter().flat_map(|table| table.entries.iter())
    }

    /// BLAKE3 over the serialized bundle: scope, runtime names and every
    /// family table with its trampoline plans. Anything that changes the
    /// rendered trampolines or tables changes the digest.
    pub fn digest(&self) -> std::result::Result<String, EmitError> {
        let mut hasher = blake3::Hasher::new();
        serde_json::to_writer(&mut hasher, self)?;
        Ok(hasher.finalize().to_hex().to_string())
    }
}

/// Validate `catalog` and turn it into a [`Bundle`]. Fails before producing
/// anything if any catalog invariant is broken.
pub fn generate(catalog: &VariantCatalog, runtime: &RuntimeConfig) -> Result<Bundle> {
    catalog.validate()?;
    check_runtime_names(catalog, runtime)?;

    let families: Vec<FamilyTable> = catalog
        .families()
        .map(|(kind, variants)| {
            let table = FamilyTable::assemble(kind, variants, runtime);
            for entry in &table.entries {
                log_gen_debug!(
                    "Trampoline planned",
                    symbol = entry.entry_point.as_str(),
                    signature = entry.wire_signature.as_str()
                );
            }
            log_gen_info!(
                "Family assembled",
                family = table.exported_name,
                variants = table.count()
            );
            table
        })
        .collect();

    Ok(Bundle {
        scope: runtime.scope.clone(),
        runtime: runtime.clone(),
        families,
    })
}

/// Arguments must not shadow the configured hooks or the family globals.
fn check_runtime_names(catalog: &VariantCatalog, runtime: &RuntimeConfig) -> Result<()> {
    for (kind, variants) in catalog.families() {
        let globals = referenced_globals(kind, runtime);
        for variant in variants {
            if let Some(arg) = variant.arguments.iter().find(|arg| globals.contains(&arg.name)) {
                return Err(CatalogError::ReservedArgument {
                    method: variant.name(),
                    argument: arg.name.clone(),
                });
            }
        }
    }
    Ok(())
}
