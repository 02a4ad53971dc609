//! JSON manifest of a generated bundle, for tooling that wants the tables
//! without parsing C.

use serde::Serialize;

use crate::emit::GENERATOR;
use crate::error::EmitError;
use crate::table::{Bundle, FamilyTable};
use crate::trampoline::{Step, Trampoline};
use crate::types::TypeDescriptor;

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    generator: &'static str,
    digest: String,
    scope: &'a str,
    families: Vec<FamilyManifest<'a>>,
}

#[derive(Debug, Serialize)]
struct FamilyManifest<'a> {
    exported_name: &'static str,
    return_type: &'a TypeDescriptor,
    fn_type: &'a str,
    orig_slot: &'a str,
    count: usize,
    entries: Vec<EntryManifest<'a>>,
}

#[derive(Debug, Serialize)]
struct EntryManifest<'a> {
    symbol: &'a str,
    version: &'a str,
    wire_signature: &'a str,
    arguments: Vec<ArgumentManifest<'a>>,
}

#[derive(Debug, Serialize)]
struct ArgumentManifest<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    local_type: &'static str,
    promote: bool,
}

impl<'a> FamilyManifest<'a> {
    fn new(table: &'a FamilyTable) -> Self {
        let entries = table
            .entries
            .iter()
            .zip(&table.trampolines)
            .map(|(entry, trampoline)| EntryManifest {
                symbol: &entry.entry_point,
                version: &trampoline.version,
                wire_signature: &entry.wire_signature,
                arguments: arguments(trampoline),
            })
            .collect();

        Self {
            exported_name: table.exported_name,
            return_type: &table.return_type,
            fn_type: &table.fn_type,
            orig_slot: &table.orig_slot,
            count: table.count(),
            entries,
        }
    }
}

fn arguments(trampoline: &Trampoline) -> Vec<ArgumentManifest<'_>> {
    let promoted: Vec<&str> = trampoline
        .steps
        .iter()
        .filter_map(|step| match step {
            Step::Promote { field } => Some(field.as_str()),
            _ => None,
        })
        .collect();

    trampoline
        .parameters
        .iter()
        .map(|(local_type, name)| ArgumentManifest {
            name: name.as_str(),
            local_type: *local_type,
            promote: promoted.contains(&name.as_str()),
        })
        .collect()
}

pub fn render(bundle: &Bundle) -> Result<String, EmitError> {
    let manifest = Manifest {
        generator: GENERATOR,
        digest: bundle.digest()?,
        scope: &bundle.scope,
        families: bundle.families.iter().map(FamilyManifest::new).collect(),
    };
    let mut text = serde_json::to_string_pretty(&manifest)?;
    text.push('\n');
    Ok(text)
}

/// Digest recorded in a previously rendered manifest, if any.
pub fn read_digest(manifest: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(manifest).ok()?;
    value.get("digest")?.as_str().map(str::to_string)
}
