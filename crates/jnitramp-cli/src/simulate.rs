//! Dry-run of runtime variant selection.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use console::style;

use jnitramp_config::{log_cli_debug, Config};
use jnitramp_core::{generate, install, parse_signature, SimulatedTable};

use crate::catalog::effective_catalog;

/// Split `NAME:SIG` and check the signature is well formed.
pub fn parse_live(spec: &str) -> Result<(&str, &str)> {
    let (name, signature) = spec
        .split_once(':')
        .ok_or_else(|| anyhow!("expected NAME:SIGNATURE, got `{spec}`"))?;
    if name.is_empty() {
        return Err(anyhow!("missing method name in `{spec}`"));
    }
    parse_signature(signature).with_context(|| format!("invalid signature in `{spec}`"))?;
    Ok((name, signature))
}

pub fn cmd_simulate(config: &Config, live: &[String], json: bool, catalogs: &[PathBuf]) -> Result<()> {
    let mut table = SimulatedTable::new();
    for spec in live {
        let (name, signature) = parse_live(spec)?;
        table.insert(name, signature);
        log_cli_debug!("Live method", name = name, signature = signature);
    }

    let catalog = effective_catalog(config, catalogs)?;
    let bundle = generate(&catalog, &config.runtime).context("Catalog validation failed")?;
    let installation = install(&bundle, &mut table);

    if json {
        println!("{}", serde_json::to_string_pretty(&installation.hooks)?);
        return Ok(());
    }

    for (family, binding) in bundle.families.iter().zip(&installation.bindings) {
        match binding.selected() {
            Some(index) => println!(
                "{} {} -> {} (entry {} of {})",
                style("hook").green().bold(),
                family.exported_name,
                family.entries[index].entry_point,
                index + 1,
                family.count()
            ),
            None => println!(
                "{} {} (no matching variant, left alone)",
                style("skip").yellow().bold(),
                family.exported_name
            ),
        }
    }
    println!(
        "{} hook(s) registered for {}, {} lookups",
        installation.hooks.len(),
        installation.hooks.scope,
        table.attempts().len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_live() {
        assert_eq!(
            parse_live("nativeForkSystemServer:(II[II[[IJJ)I").unwrap(),
            ("nativeForkSystemServer", "(II[II[[IJJ)I")
        );
    }

    #[test]
    fn test_parse_live_rejects_malformed() {
        assert!(parse_live("nativeForkSystemServer").is_err());
        assert!(parse_live(":(I)I").is_err());
        assert!(parse_live("nativeForkSystemServer:(Q)I").is_err());
    }
}
