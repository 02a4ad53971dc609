//! Effective catalog: built-ins, plus configured and command-line catalog
//! files, minus disabled families.

use std::path::PathBuf;

use anyhow::{Context, Result};

use jnitramp_config::{log_catalog_warn, log_cli_debug, Config};
use jnitramp_core::{FamilyKind, VariantCatalog};

pub fn effective_catalog(config: &Config, extra: &[PathBuf]) -> Result<VariantCatalog> {
    let mut catalog = VariantCatalog::builtin().clone();

    for path in config.catalog.extra.iter().chain(extra) {
        let added = catalog
            .merge_file(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?;
        if added == 0 {
            log_catalog_warn!(
                "Catalog file defines no variants",
                path = path.display().to_string()
            );
        }
    }

    let disabled = config
        .catalog
        .disabled_families
        .iter()
        .map(|name| FamilyKind::from_name(name))
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid catalog.disabled_families")?;

    if !disabled.is_empty() {
        log_cli_debug!("Disabling families", count = disabled.len());
        catalog = catalog.without(&disabled);
    }
    Ok(catalog)
}
