//! Per-variant trampoline model.
//!
//! A [`Trampoline`] is the language-neutral plan for one forwarding function:
//! its parameters and the ordered [`Step`]s its body performs. Emitters turn
//! the plan into source text; nothing here knows C syntax.

use serde::Serialize;

use jnitramp_config::RuntimeConfig;

use crate::method::{FamilyKind, MethodDescriptor};
use crate::types::TypeDescriptor;

/// One statement of a trampoline body, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Declare the family context struct with the identity fields bound by address
    BuildContext {
        context_struct: &'static str,
        fields: Vec<&'static str>,
    },
    /// Attach one promoted argument to the context by address
    Promote { field: String },
    /// `contextInit(&ctx, env, &args)`
    InitContext { function: String, context_type: String },
    PreHook { function: String },
    /// Call through the resolved original with `env, clazz` and every argument
    CallOriginal {
        fn_type: String,
        orig_slot: String,
        arguments: Vec<String>,
        capture: bool,
    },
    PostHook { function: String },
    Cleanup { function: String },
    Return { value: Option<String> },
}

/// Forwarding function for one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trampoline {
    /// `<family>_<version>`
    pub symbol: String,
    pub family: FamilyKind,
    pub version: String,
    pub return_type: TypeDescriptor,
    /// (C type, identifier) after the fixed `JNIEnv *env, jclass clazz`
    pub parameters: Vec<(&'static str, String)>,
    pub steps: Vec<Step>,
}

/// Local holding the forwarded result when it is returned unchanged.
pub const RESULT_LOCAL: &str = "ret";
/// Local naming the call-context instance.
pub const CONTEXT_LOCAL: &str = "ctx";
/// Local naming the family argument struct.
pub const ARGS_LOCAL: &str = "args";

pub fn fn_type_name(family: FamilyKind) -> String {
    format!("{}_fn", family.name())
}

pub fn orig_slot_name(family: FamilyKind) -> String {
    format!("{}_orig", family.name())
}

/// `<hook_prefix><family>_<suffix>`
pub fn hook_name(family: FamilyKind, runtime: &RuntimeConfig, suffix: &str) -> String {
    format!("{}{}_{}", runtime.hook_prefix, family.name(), suffix)
}

/// File-scope names a trampoline body refers to. A parameter with one of
/// these names would shadow it.
pub fn referenced_globals(family: FamilyKind, runtime: &RuntimeConfig) -> [String; 6] {
    [
        runtime.context_init.clone(),
        runtime.context_cleanup.clone(),
        hook_name(family, runtime, "pre"),
        hook_name(family, runtime, "post"),
        fn_type_name(family),
        orig_slot_name(family),
    ]
}

impl Trampoline {
    /// Plan the trampoline for `method`. The method is assumed validated.
    pub fn plan(method: &MethodDescriptor, runtime: &RuntimeConfig) -> Self {
        let family = method.family;
        let strategy = family.strategy();
        let hook = |suffix: &str| hook_name(family, runtime, suffix);

        let mut steps = Vec::with_capacity(8 + method.arguments.len());
        steps.push(Step::BuildContext {
            context_struct: strategy.context_struct,
            fields: strategy.identity.iter().map(|(field, _)| *field).collect(),
        });
        steps.extend(method.promoted().map(|arg| Step::Promote {
            field: arg.name.clone(),
        }));
        steps.push(Step::InitContext {
            function: runtime.context_init.clone(),
            context_type: runtime.context_struct.clone(),
        });
        steps.push(Step::PreHook {
            function: hook("pre"),
        });

        let returns_value = !method.return_type.is_void();
        let capture = returns_value && method.return_expression.is_none();
        steps.push(Step::CallOriginal {
            fn_type: fn_type_name(family),
            orig_slot: orig_slot_name(family),
            arguments: method
                .forwarding_argument_list()
                .into_iter()
                .map(str::to_string)
                .collect(),
            capture,
        });

        steps.push(Step::PostHook {
            function: hook("post"),
        });
        steps.push(Step::Cleanup {
            function: runtime.context_cleanup.clone(),
        });

        let value = match (&method.return_expression, capture) {
            (Some(expr), _) if returns_value => Some(expr.clone()),
            (_, true) => Some(RESULT_LOCAL.to_string()),
            _ => None,
        };
        steps.push(Step::Return { value });

        Self {
            symbol: method.name(),
            family,
            version: method.version.clone(),
            return_type: method.return_type.clone(),
            parameters: method
                .local_parameter_list()
                .into_iter()
                .map(|(ty, name)| (ty, name.to_string()))
                .collect(),
            steps,
        }
    }

    /// Arguments handed to the original, excluding `env, clazz`.
    pub fn forwarded(&self) -> &[String] {
        self.steps
            .iter()
            .find_map(|step| match step {
                Step::CallOriginal { arguments, .. } => Some(arguments.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::VariantCatalog;
    use crate::method::ArgumentDescriptor;
    use crate::types::JINT;

    fn runtime() -> RuntimeConfig {
        RuntimeConfig::default()
    }

    #[test]
    fn test_steps_run_in_hook_order() {
        let method = &VariantCatalog::builtin().family(FamilyKind::ForkAndSpecialize)[2];
        assert_eq!(method.version, "p");
        let t = Trampoline::plan(method, &runtime());

        let kinds: Vec<&str> = t
            .steps
            .iter()
            .map(|s| match s {
                Step::BuildContext { .. } => "build",
                Step::Promote { .. } => "promote",
                Step::InitContext { .. } => "init",
                Step::PreHook { .. } => "pre",
                Step::CallOriginal { .. } => "call",
                Step::PostHook { .. } => "post",
                Step::Cleanup { .. } => "cleanup",
                Step::Return { .. } => "return",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["build", "promote", "promote", "init", "pre", "call", "post", "cleanup", "return"]
        );
        assert!(t.steps.contains(&Step::PreHook {
            function: "rz_nativeForkAndSpecialize_pre".to_string()
        }));
    }

    #[test]
    fn test_forwards_every_argument_in_order() {
        for method in VariantCatalog::builtin().variants() {
            let t = Trampoline::plan(method, &runtime());
            let expected: Vec<String> = method
                .arguments
                .iter()
                .map(|a| a.name.clone())
                .collect();
            assert_eq!(t.forwarded(), expected.as_slice(), "{}", t.symbol);
            assert_eq!(t.parameters.len(), method.arguments.len());
        }
    }

    #[test]
    fn test_promoted_subset_matches_flags() {
        let method = VariantCatalog::builtin()
            .family(FamilyKind::SpecializeApp)
            .iter()
            .find(|m| m.version == "u")
            .unwrap();
        let t = Trampoline::plan(method, &runtime());
        let promoted: Vec<_> = t
            .steps
            .iter()
            .filter_map(|s| match s {
                Step::Promote { field } => Some(field.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            promoted,
            vec![
                "is_child_zygote",
                "is_top_app",
                "pkg_data_info_list",
                "whitelisted_data_info_list",
                "mount_data_dirs",
                "mount_storage_dirs",
                "mount_sysprop_overrides",
            ]
        );
    }

    #[test]
    fn test_return_handling() {
        let catalog = VariantCatalog::builtin();

        let fork = Trampoline::plan(&catalog.family(FamilyKind::ForkSystemServer)[0], &runtime());
        assert_eq!(
            fork.steps.last(),
            Some(&Step::Return {
                value: Some(RESULT_LOCAL.to_string())
            })
        );

        let spec = Trampoline::plan(&catalog.family(FamilyKind::SpecializeApp)[0], &runtime());
        assert_eq!(spec.steps.last(), Some(&Step::Return { value: None }));
        assert!(spec.steps.iter().any(|s| matches!(
            s,
            Step::CallOriginal { capture: false, .. }
        )));

        let mut synthesized = catalog.family(FamilyKind::ForkSystemServer)[0].clone();
        synthesized.return_expression = Some("ctx.pid".to_string());
        let t = Trampoline::plan(&synthesized, &runtime());
        assert_eq!(
            t.steps.last(),
            Some(&Step::Return {
                value: Some("ctx.pid".to_string())
            })
        );
    }

    #[test]
    fn test_custom_hook_prefix() {
        let runtime = RuntimeConfig {
            hook_prefix: "zy_".to_string(),
            ..RuntimeConfig::default()
        };
        let mut method = VariantCatalog::builtin().family(FamilyKind::ForkSystemServer)[0].clone();
        method.arguments.push(ArgumentDescriptor::new("extra", JINT));
        let t = Trampoline::plan(&method, &runtime);
        assert!(t.steps.contains(&Step::PostHook {
            function: "zy_nativeForkSystemServer_post".to_string()
        }));
        assert_eq!(t.forwarded().last().map(String::as_str), Some("extra"));
    }
}
