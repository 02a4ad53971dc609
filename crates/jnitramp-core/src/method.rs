//! Argument and method descriptors, and the per-family strategy table.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::error::{CatalogError, Result};
use crate::trampoline::{ARGS_LOCAL, CONTEXT_LOCAL, RESULT_LOCAL};
use crate::types::{TypeDescriptor, JINT, VOID};

/// Identifiers every trampoline already declares.
const TRAMPOLINE_LOCALS: &[&str] = &["env", "clazz", CONTEXT_LOCAL, ARGS_LOCAL, RESULT_LOCAL];

const C_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "_Bool", "bool", "NULL",
];

/// `[A-Za-z_][A-Za-z0-9_]*` and not a C keyword.
pub fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !C_KEYWORDS.contains(&name)
}

/// The logical operation a variant implements. Every variant of a kind shares
/// one exported JNI name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FamilyKind {
    ForkAndSpecialize,
    SpecializeApp,
    ForkSystemServer,
}

impl FamilyKind {
    pub const ALL: [FamilyKind; 3] = [
        FamilyKind::ForkAndSpecialize,
        FamilyKind::SpecializeApp,
        FamilyKind::ForkSystemServer,
    ];

    pub fn strategy(self) -> &'static FamilyStrategy {
        match self {
            FamilyKind::ForkAndSpecialize => &FORK_AND_SPECIALIZE,
            FamilyKind::SpecializeApp => &SPECIALIZE_APP,
            FamilyKind::ForkSystemServer => &FORK_SYSTEM_SERVER,
        }
    }

    /// Exported JNI method name, e.g. `nativeForkAndSpecialize`
    pub fn name(self) -> &'static str {
        self.strategy().exported_name
    }

    pub fn from_name(name: &str) -> Result<Self> {
        FamilyKind::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| CatalogError::UnknownFamily(name.to_string()))
    }

    pub fn return_type(self) -> TypeDescriptor {
        match self {
            FamilyKind::ForkAndSpecialize | FamilyKind::ForkSystemServer => JINT,
            FamilyKind::SpecializeApp => VOID,
        }
    }
}

impl fmt::Display for FamilyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-family data the generator needs besides the argument list.
#[derive(Debug)]
pub struct FamilyStrategy {
    pub exported_name: &'static str,
    /// Struct handed to the hook layer by address
    pub context_struct: &'static str,
    /// Fields every variant must carry, as (name, wire code). They populate the
    /// context struct initializer; promoted arguments are attached after it.
    pub identity: &'static [(&'static str, &'static str)],
    /// Optional context fields a variant may fill by promoting an argument
    pub promotable: &'static [&'static str],
}

const APP_IDENTITY: &[(&str, &str)] = &[
    ("uid", "I"),
    ("gid", "I"),
    ("gids", "[I"),
    ("runtime_flags", "I"),
    ("rlimits", "[[I"),
    ("mount_external", "I"),
    ("se_info", "Ljava/lang/String;"),
    ("nice_name", "Ljava/lang/String;"),
    ("instruction_set", "Ljava/lang/String;"),
    ("app_data_dir", "Ljava/lang/String;"),
];

const APP_PROMOTABLE: &[&str] = &[
    "fds_to_ignore",
    "is_child_zygote",
    "is_top_app",
    "pkg_data_info_list",
    "whitelisted_data_info_list",
    "mount_data_dirs",
    "mount_storage_dirs",
    "mount_sysprop_overrides",
];

static FORK_AND_SPECIALIZE: FamilyStrategy = FamilyStrategy {
    exported_name: "nativeForkAndSpecialize",
    context_struct: "app_specialize_args_v5",
    identity: APP_IDENTITY,
    promotable: APP_PROMOTABLE,
};

static SPECIALIZE_APP: FamilyStrategy = FamilyStrategy {
    exported_name: "nativeSpecializeAppProcess",
    context_struct: "app_specialize_args_v5",
    identity: APP_IDENTITY,
    promotable: APP_PROMOTABLE,
};

static FORK_SYSTEM_SERVER: FamilyStrategy = FamilyStrategy {
    exported_name: "nativeForkSystemServer",
    context_struct: "server_specialize_args_v1",
    identity: &[
        ("uid", "I"),
        ("gid", "I"),
        ("gids", "[I"),
        ("runtime_flags", "I"),
        ("permitted_capabilities", "J"),
        ("effective_capabilities", "J"),
    ],
    promotable: &[],
};

/// A named, typed trampoline parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    /// Exposed to the hook layer by address through the call-context
    pub promote: bool,
}

impl ArgumentDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            promote: false,
        }
    }

    pub fn promoted(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            promote: true,
        }
    }
}

/// One variant of a family: an ordered, ABI-exact argument list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDescriptor {
    pub family: FamilyKind,
    pub version: String,
    pub return_type: TypeDescriptor,
    /// Replaces the forwarded result when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_expression: Option<String>,
    pub arguments: Vec<ArgumentDescriptor>,
}

impl MethodDescriptor {
    pub fn family_name(&self) -> &'static str {
        self.family.name()
    }

    /// `<family>_<version>`, also the trampoline symbol
    pub fn name(&self) -> String {
        format!("{}_{}", self.family_name(), self.version)
    }

    /// `(` argument codes `)` return code
    pub fn wire_signature(&self) -> String {
        let mut sig = String::from("(");
        for arg in &self.arguments {
            arg.ty.write_wire_code(&mut sig);
        }
        sig.push(')');
        self.return_type.write_wire_code(&mut sig);
        sig
    }

    /// (C type, identifier) pairs in declaration order
    pub fn local_parameter_list(&self) -> Vec<(&'static str, &str)> {
        self.arguments
            .iter()
            .map(|arg| (arg.ty.local_name(), arg.name.as_str()))
            .collect()
    }

    /// Identifiers forwarded verbatim to the original, in declaration order
    pub fn forwarding_argument_list(&self) -> Vec<&str> {
        self.arguments.iter().map(|arg| arg.name.as_str()).collect()
    }

    pub fn promoted(&self) -> impl Iterator<Item = &ArgumentDescriptor> {
        self.arguments.iter().filter(|arg| arg.promote)
    }

    pub fn argument(&self, name: &str) -> Option<&ArgumentDescriptor> {
        self.arguments.iter().find(|arg| arg.name == name)
    }

    /// Check everything that can be checked without the live process.
    pub fn validate(&self) -> Result<()> {
        let name = self.name();

        // Appended to `<family>_`, so a leading digit is fine.
        if self.version.is_empty()
            || !self
                .version
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(CatalogError::InvalidVersion {
                family: self.family_name().to_string(),
                version: self.version.clone(),
            });
        }

        if self.arguments.is_empty() {
            return Err(CatalogError::EmptyArguments(name));
        }

        let expected_ret = self.family.return_type();
        if self.return_type != expected_ret {
            return Err(CatalogError::ReturnTypeMismatch {
                method: name,
                expected: expected_ret.wire_code(),
                found: self.return_type.wire_code(),
            });
        }

        let mut seen = HashSet::with_capacity(self.arguments.len());
        for arg in &self.arguments {
            if arg.name.is_empty() {
                return Err(CatalogError::EmptyArgumentName(name));
            }
            if !is_c_identifier(&arg.name) {
                return Err(CatalogError::InvalidIdentifier {
                    method: name,
                    argument: arg.name.clone(),
                });
            }
            if TRAMPOLINE_LOCALS.contains(&arg.name.as_str()) {
                return Err(CatalogError::ReservedArgument {
                    method: name,
                    argument: arg.name.clone(),
                });
            }
            if !seen.insert(arg.name.as_str()) {
                return Err(CatalogError::DuplicateArgument {
                    method: name,
                    argument: arg.name.clone(),
                });
            }
            if arg.ty.contains_void() {
                return Err(CatalogError::VoidArgument {
                    method: name,
                    argument: arg.name.clone(),
                });
            }
        }

        let strategy = self.family.strategy();
        if let Some(arg) = self
            .promoted()
            .find(|arg| !strategy.promotable.contains(&arg.name.as_str()))
        {
            return Err(CatalogError::UnknownContextField {
                method: name,
                argument: arg.name.clone(),
                context: strategy.context_struct.to_string(),
            });
        }

        for (field, code) in strategy.identity {
            let arg = self
                .argument(field)
                .ok_or_else(|| CatalogError::MissingIdentityArgument {
                    method: name.clone(),
                    argument: field.to_string(),
                })?;
            let found = arg.ty.wire_code();
            if found != *code {
                return Err(CatalogError::IdentityTypeMismatch {
                    method: name,
                    argument: field.to_string(),
                    expected: code.to_string(),
                    found,
                });
            }
        }

        Ok(())
    }
}

/// Builds one [`MethodDescriptor`]. Owns the counter that names anonymous
/// arguments, so `_0`, `_1`, ... restart for every descriptor.
#[derive(Debug)]
pub struct MethodBuilder {
    family: FamilyKind,
    version: String,
    return_expression: Option<String>,
    arguments: Vec<ArgumentDescriptor>,
    next_anon: usize,
}

impl MethodBuilder {
    pub fn new(family: FamilyKind, version: impl Into<String>) -> Self {
        Self {
            family,
            version: version.into(),
            return_expression: None,
            arguments: Vec::new(),
            next_anon: 0,
        }
    }

    pub fn arg(mut self, arg: ArgumentDescriptor) -> Self {
        self.arguments.push(arg);
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = ArgumentDescriptor>) -> Self {
        self.arguments.extend(args);
        self
    }

    /// Positional argument the hook layer never looks at.
    pub fn anon(mut self, ty: TypeDescriptor) -> Self {
        let name = format!("_{}", self.next_anon);
        self.next_anon += 1;
        self.arguments.push(ArgumentDescriptor::new(name, ty));
        self
    }

    pub fn return_expression(mut self, expr: impl Into<String>) -> Self {
        self.return_expression = Some(expr.into());
        self
    }

    pub fn build(self) -> MethodDescriptor {
        MethodDescriptor {
            family: self.family,
            version: self.version,
            return_type: self.family.return_type(),
            return_expression: self.return_expression,
            arguments: self.arguments,
        }
    }
}
