//! # jnitramp check
//!
//! Validates the effective catalog and compares a previously generated
//! header or manifest with a fresh render: first the recorded digest, then
//! the full text.

use std::path::{Path, PathBuf};

use anyhow::Result;
use console::{style, Emoji};

use jnitramp_config::{log_cli_debug, Config};
use jnitramp_core::{emit, generate};

use crate::catalog::effective_catalog;

static CHECK: Emoji<'_, '_> = Emoji("✔ ", "[ok] ");
static CROSS: Emoji<'_, '_> = Emoji("✘ ", "[!!] ");
static DOT: Emoji<'_, '_> = Emoji("● ", "[-] ");

struct Report {
    passed: u32,
    failed: u32,
}

impl Report {
    fn new() -> Self {
        Self {
            passed: 0,
            failed: 0,
        }
    }

    fn pass(&mut self, msg: &str) {
        self.passed += 1;
        eprintln!("  {} {}", CHECK, style(msg).green());
    }

    fn fail(&mut self, msg: &str) {
        self.failed += 1;
        eprintln!("  {} {}", CROSS, style(msg).red());
    }

    fn info(&self, msg: &str) {
        eprintln!("  {} {}", DOT, style(msg).dim());
    }
}

pub fn cmd_check(config: &Config, header: &Path, catalogs: &[PathBuf]) -> Result<()> {
    eprintln!();
    eprintln!("{}", style("jnitramp check").bold().cyan());
    eprintln!("{}", style("─".repeat(40)).dim());

    let mut r = Report::new();

    eprintln!();
    eprintln!("{}", style("Catalog").bold());
    let expected = check_catalog(config, catalogs, &mut r);

    eprintln!();
    eprintln!("{}", style("Header").bold());
    check_header(header, expected.as_ref(), &mut r);

    eprintln!();
    eprintln!("{}", style("─".repeat(40)).dim());
    eprintln!(
        "  {} passed, {} errors",
        style(r.passed).green().bold(),
        style(r.failed).red().bold(),
    );

    if r.failed > 0 {
        eprintln!();
        eprintln!(
            "{}",
            style(format!(
                "Run 'jnitramp generate -o {}' to regenerate.",
                header.display()
            ))
            .dim()
        );
        std::process::exit(1);
    }

    eprintln!("{}", style("Header is up to date.").dim());
    eprintln!();
    Ok(())
}

/// The current catalog rendered both ways, for comparison with the file.
struct Expected {
    digest: String,
    header: String,
    manifest: String,
}

fn check_catalog(config: &Config, catalogs: &[PathBuf], r: &mut Report) -> Option<Expected> {
    let catalog = match effective_catalog(config, catalogs) {
        Ok(catalog) => catalog,
        Err(e) => {
            r.fail(&format!("Catalog files: {e:#}"));
            return None;
        }
    };

    let bundle = match generate(&catalog, &config.runtime) {
        Ok(bundle) => bundle,
        Err(e) => {
            r.fail(&format!("Catalog invalid: {e}"));
            return None;
        }
    };
    r.pass(&format!(
        "{} variants across {} families valid",
        catalog.len(),
        bundle.families.len()
    ));

    let rendered = bundle.digest().and_then(|digest| {
        Ok(Expected {
            digest,
            header: emit::c::render(&bundle, &config.output)?,
            manifest: emit::json::render(&bundle)?,
        })
    });
    match rendered {
        Ok(expected) => {
            r.info(&format!("digest {}", expected.digest));
            Some(expected)
        }
        Err(e) => {
            r.fail(&format!("Render failed: {e}"));
            None
        }
    }
}

fn check_header(header: &Path, expected: Option<&Expected>, r: &mut Report) {
    let text = match std::fs::read_to_string(header) {
        Ok(text) => text,
        Err(e) => {
            r.fail(&format!("{}: {e}", header.display()));
            return;
        }
    };

    let (recorded, fresh) = match emit::c::read_digest(&text) {
        Some(digest) => (digest.to_string(), expected.map(|e| e.header.as_str())),
        None => match emit::json::read_digest(&text) {
            Some(digest) => (digest, expected.map(|e| e.manifest.as_str())),
            None => {
                r.fail(&format!("{}: no catalog digest recorded", header.display()));
                return;
            }
        },
    };
    log_cli_debug!("Recorded digest", digest = recorded.as_str());

    let (Some(expected), Some(fresh)) = (expected, fresh) else {
        r.info("Digest not compared, catalog did not generate");
        return;
    };

    if recorded != expected.digest {
        r.fail(&format!("{} is stale", header.display()));
        r.info(&format!("recorded {recorded}"));
    } else if text != fresh {
        r.fail(&format!(
            "{} is stale: digest matches but content differs from a fresh render",
            header.display()
        ));
    } else {
        r.pass(&format!("{} matches catalog", header.display()));
    }
}
