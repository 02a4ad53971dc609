//! C header emitter.
//!
//! Output layout per family: original-pointer slot, function-pointer typedef,
//! one trampoline per variant, the `JNINativeMethod` table and its count.
//! The header ends with an installer that applies the selection policy on the
//! native side.

use std::fmt::Write;

use jnitramp_config::{OutputConfig, RuntimeConfig};

use crate::emit::GENERATOR;
use crate::error::EmitError;
use crate::table::{Bundle, FamilyTable};
use crate::trampoline::{Step, Trampoline, ARGS_LOCAL, CONTEXT_LOCAL, RESULT_LOCAL};

/// Prefix of the digest comment line.
pub const DIGEST_MARKER: &str = "/* catalog-digest: ";

const INDENT: &str = "  ";

fn ind(level: usize) -> String {
    INDENT.repeat(level)
}

/// Render a complete header.
pub fn render(bundle: &Bundle, output: &OutputConfig) -> Result<String, EmitError> {
    let mut out = String::new();
    let guard = &output.header_guard;

    writeln!(out, "/* Generated by {GENERATOR}. Do not edit. */")?;
    writeln!(out, "{DIGEST_MARKER}{} */", bundle.digest()?)?;
    writeln!(out, "#ifndef {guard}")?;
    writeln!(out, "#define {guard}")?;

    for table in &bundle.families {
        writeln!(out)?;
        write_family(&mut out, table, output)?;
    }

    writeln!(out)?;
    write_installer(&mut out, bundle)?;
    writeln!(out)?;
    writeln!(out, "#endif /* {guard} */")?;
    Ok(out)
}

fn write_family(out: &mut String, table: &FamilyTable, output: &OutputConfig) -> Result<(), EmitError> {
    writeln!(out, "static void *{} = NULL;", table.orig_slot)?;
    writeln!(
        out,
        "typedef {} (*{})(JNIEnv *, jclass, ...);",
        table.return_type.local_name(),
        table.fn_type
    )?;

    for trampoline in &table.trampolines {
        write_trampoline(out, trampoline, output.no_stack_protector)?;
    }

    writeln!(
        out,
        "static JNINativeMethod {}[{}] = {{",
        table.methods_array,
        table.count()
    )?;
    for entry in &table.entries {
        writeln!(out, "{}{{", ind(1))?;
        writeln!(out, "{}\"{}\",", ind(2), entry.exported_name)?;
        writeln!(out, "{}\"{}\",", ind(2), entry.wire_signature)?;
        writeln!(out, "{}(void *) &{}", ind(2), entry.entry_point)?;
        writeln!(out, "{}}},", ind(1))?;
    }
    writeln!(out, "}};")?;
    writeln!(
        out,
        "static const int {} = {};",
        table.count_const,
        table.count()
    )?;
    Ok(())
}

/// Render one trampoline definition.
pub fn write_trampoline(
    out: &mut String,
    trampoline: &Trampoline,
    no_stack_protector: bool,
) -> Result<(), EmitError> {
    let ret = trampoline.return_type.local_name();
    let mut params = String::from("JNIEnv *env, jclass clazz");
    for (ty, name) in &trampoline.parameters {
        write!(params, ", {ty} {name}")?;
    }

    if no_stack_protector {
        write!(out, "__attribute__((no_stack_protector)) ")?;
    }
    writeln!(out, "static {ret} {}({params}) {{", trampoline.symbol)?;

    for step in &trampoline.steps {
        write_step(out, step, ret)?;
    }

    writeln!(out, "}}")?;
    Ok(())
}

fn write_step(out: &mut String, step: &Step, ret: &str) -> Result<(), EmitError> {
    let i1 = ind(1);
    match step {
        Step::BuildContext {
            context_struct,
            fields,
        } => {
            let init = fields
                .iter()
                .map(|field| format!(".{field} = &{field}"))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "{i1}struct {context_struct} {ARGS_LOCAL} = {{ {init} }};")?;
        }
        Step::Promote { field } => {
            writeln!(out, "{i1}{ARGS_LOCAL}.{field} = &{field};")?;
        }
        Step::InitContext {
            function,
            context_type,
        } => {
            writeln!(out, "{i1}struct {context_type} {CONTEXT_LOCAL};")?;
            writeln!(out, "{i1}{function}(&{CONTEXT_LOCAL}, env, &{ARGS_LOCAL});")?;
        }
        Step::PreHook { function } | Step::PostHook { function } | Step::Cleanup { function } => {
            writeln!(out, "{i1}{function}(&{CONTEXT_LOCAL});")?;
        }
        Step::CallOriginal {
            fn_type,
            orig_slot,
            arguments,
            capture,
        } => {
            let lhs = if *capture {
                format!("{ret} {RESULT_LOCAL} = ")
            } else {
                String::new()
            };
            let mut forwarded = String::from("env, clazz");
            for arg in arguments {
                write!(forwarded, ", {arg}")?;
            }
            writeln!(out, "{i1}{lhs}(({fn_type}){orig_slot})(")?;
            writeln!(out, "{}{forwarded}", ind(2))?;
            writeln!(out, "{i1});")?;
        }
        Step::Return { value } => {
            if let Some(value) = value {
                writeln!(out, "{i1}return {value};")?;
            }
        }
    }
    Ok(())
}

/// Native-side selection: bind each table, keep the first resolved entry,
/// register the survivors.
fn write_installer(out: &mut String, bundle: &Bundle) -> Result<(), EmitError> {
    let RuntimeConfig {
        bind_fn,
        register_fn,
        install_fn,
        ..
    } = &bundle.runtime;
    let slots = bundle.families.len().max(1);

    writeln!(out, "static void {install_fn}(JNIEnv *env) {{")?;
    writeln!(out, "{}JNINativeMethod hooks[{slots}];", ind(1))?;
    writeln!(out, "{}int hooks_count = 0;", ind(1))?;
    writeln!(out)?;
    writeln!(out, "{}const char *clz = \"{}\";", ind(1), bundle.scope)?;

    for table in &bundle.families {
        let methods = &table.methods_array;
        writeln!(
            out,
            "{}{bind_fn}(env, clz, {methods}, {});",
            ind(1),
            table.count_const
        )?;
        writeln!(
            out,
            "{}for (int i = 0; i < {}; i++) {{",
            ind(1),
            table.count_const
        )?;
        writeln!(out, "{}if (!{methods}[i].fnPtr) continue;", ind(2))?;
        writeln!(out)?;
        writeln!(out, "{}{} = {methods}[i].fnPtr;", ind(2), table.orig_slot)?;
        writeln!(out, "{}hooks[hooks_count++] = {methods}[i];", ind(2))?;
        writeln!(out)?;
        writeln!(out, "{}break;", ind(2))?;
        writeln!(out, "{}}}", ind(1))?;
        writeln!(out)?;
    }

    writeln!(out, "{}{register_fn}(clz, hooks, hooks_count);", ind(1))?;
    writeln!(out, "}}")?;
    Ok(())
}

/// Digest recorded in a previously generated header, if any.
pub fn read_digest(header: &str) -> Option<&str> {
    header.lines().find_map(|line| {
        line.strip_prefix(DIGEST_MARKER)
            .and_then(|rest| rest.strip_suffix(" */"))
            .map(str::trim)
    })
}
