//! Runtime selection policy.
//!
//! At install time the host tries each table entry of a family, in priority
//! order, against the live process. The first entry the process knows wins;
//! if none match the family is simply left alone. This module is the
//! reference model of that policy, driven through [`NativeBinder`] so it can
//! run against a real binder or a simulated method table.

use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr::NonNull;

use serde::Serialize;

use jnitramp_config::{log_bind_debug, log_bind_info};

use crate::method::FamilyKind;
use crate::table::{Bundle, FamilyTable, NativeMethodTableEntry};

/// Resolves an (exported name, wire signature) pair to the live native
/// implementation, or `None` when the process has no such method.
pub trait NativeBinder {
    fn bind(&mut self, exported_name: &str, wire_signature: &str) -> Option<NonNull<c_void>>;
}

/// Resolution state of one family. The original is written at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyBinding {
    pub family: FamilyKind,
    original: Option<NonNull<c_void>>,
    selected: Option<usize>,
}

impl FamilyBinding {
    pub fn new(family: FamilyKind) -> Self {
        Self {
            family,
            original: None,
            selected: None,
        }
    }

    pub fn original(&self) -> Option<NonNull<c_void>> {
        self.original
    }

    /// Index into the family table of the entry that bound
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn is_installed(&self) -> bool {
        self.original.is_some()
    }

    /// Record the winning entry. Returns false if the family was already resolved.
    fn resolve(&mut self, index: usize, original: NonNull<c_void>) -> bool {
        if self.original.is_some() {
            return false;
        }
        self.original = Some(original);
        self.selected = Some(index);
        true
    }
}

/// Scan `table` in order and stop at the first entry the binder resolves.
pub fn select_family(table: &FamilyTable, binder: &mut impl NativeBinder) -> FamilyBinding {
    let mut binding = FamilyBinding::new(table.family);

    for (index, entry) in table.entries.iter().enumerate() {
        log_bind_debug!(
            "Trying variant",
            symbol = entry.entry_point.as_str(),
            signature = entry.wire_signature.as_str()
        );
        if let Some(original) = binder.bind(entry.exported_name, &entry.wire_signature) {
            binding.resolve(index, original);
            log_bind_info!(
                "Variant selected",
                family = table.exported_name,
                symbol = entry.entry_point.as_str()
            );
            return binding;
        }
    }

    log_bind_info!(
        "No variant matched, family left unhooked",
        family = table.exported_name,
        tried = table.count()
    );
    binding
}

/// Selected (name, signature, trampoline) triples for one class scope, as
/// handed to the hook-list registrar for later uninstall.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HookList {
    pub scope: String,
    pub hooks: Vec<NativeMethodTableEntry>,
}

impl HookList {
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }
}

/// Outcome of running the selection policy over a whole bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub bindings: Vec<FamilyBinding>,
    pub hooks: HookList,
}

impl Installation {
    pub fn binding(&self, family: FamilyKind) -> Option<&FamilyBinding> {
        self.bindings.iter().find(|b| b.family == family)
    }
}

/// Select one variant per family. Families with no match contribute nothing;
/// that is the expected result on an unlisted OS build, not an error.
pub fn install(bundle: &Bundle, binder: &mut impl NativeBinder) -> Installation {
    let mut bindings = Vec::with_capacity(bundle.families.len());
    let mut hooks = HookList {
        scope: bundle.scope.clone(),
        hooks: Vec::with_capacity(bundle.families.len()),
    };

    for table in &bundle.families {
        let binding = select_family(table, binder);
        if let Some(index) = binding.selected() {
            hooks.hooks.push(table.entries[index].clone());
        }
        bindings.push(binding);
    }

    Installation { bindings, hooks }
}

/// In-memory stand-in for a process's registered native methods.
///
/// Addresses are synthetic and never dereferenced; they only need to be
/// non-null and distinct. Every lookup is recorded.
#[derive(Debug, Default)]
pub struct SimulatedTable {
    methods: HashMap<(String, String), usize>,
    attempts: Vec<(String, String)>,
}

const SIMULATED_BASE: usize = 0x7000_0000;

impl SimulatedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live method and return its synthetic address.
    pub fn insert(&mut self, exported_name: &str, wire_signature: &str) -> usize {
        let next = SIMULATED_BASE + self.methods.len() * 0x10;
        *self
            .methods
            .entry((exported_name.to_string(), wire_signature.to_string()))
            .or_insert(next)
    }

    pub fn with(mut self, exported_name: &str, wire_signature: &str) -> Self {
        self.insert(exported_name, wire_signature);
        self
    }

    /// Every (name, signature) the binder was asked for, in order
    pub fn attempts(&self) -> &[(String, String)] {
        &self.attempts
    }
}

impl NativeBinder for SimulatedTable {
    fn bind(&mut self, exported_name: &str, wire_signature: &str) -> Option<NonNull<c_void>> {
        let key = (exported_name.to_string(), wire_signature.to_string());
        let found = self.methods.get(&key).copied();
        self.attempts.push(key);
        found.and_then(|addr| NonNull::new(addr as *mut c_void))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::VariantCatalog;
    use crate::table::generate;
    use jnitramp_config::RuntimeConfig;

    fn bundle() -> Bundle {
        generate(VariantCatalog::builtin(), &RuntimeConfig::default()).unwrap()
    }

    #[test]
    fn test_second_of_three_is_selected() {
        let b = bundle();
        let table = b.family(FamilyKind::ForkAndSpecialize).unwrap();
        let three = FamilyTable {
            entries: table.entries[..3].to_vec(),
            ..table.clone()
        };
        let second = &three.entries[1];

        let mut live = SimulatedTable::new();
        let addr = live.insert(second.exported_name, &second.wire_signature);

        let binding = select_family(&three, &mut live);

        assert_eq!(binding.selected(), Some(1));
        assert_eq!(binding.original().map(|p| p.as_ptr() as usize), Some(addr));
        assert_eq!(live.attempts().len(), 2);
        assert_eq!(live.attempts()[0].1, three.entries[0].wire_signature);
        assert_eq!(live.attempts()[1].1, second.wire_signature);
    }

    #[test]
    fn test_no_match_is_silent() {
        let b = bundle();
        let mut live = SimulatedTable::new();
        let installation = install(&b, &mut live);

        assert!(installation.hooks.is_empty());
        assert!(installation.bindings.iter().all(|b| !b.is_installed()));
        assert_eq!(live.attempts().len(), b.entries().count());
    }

    #[test]
    fn test_one_hook_per_family() {
        let b = bundle();
        let mut live = SimulatedTable::new();
        for table in &b.families {
            // Two live candidates per family; priority decides.
            let n = table.entries.len();
            for entry in &table.entries[n - 2..] {
                live.insert(entry.exported_name, &entry.wire_signature);
            }
        }

        let installation = install(&b, &mut live);
        assert_eq!(installation.hooks.len(), 3);
        assert_eq!(installation.hooks.scope, "com/android/internal/os/Zygote");
        for (table, hook) in b.families.iter().zip(&installation.hooks.hooks) {
            assert_eq!(hook, &table.entries[table.entries.len() - 2]);
        }
    }

    #[test]
    fn test_name_must_match_as_well_as_signature() {
        let b = bundle();
        let server = b.family(FamilyKind::ForkSystemServer).unwrap();
        let mut live = SimulatedTable::new().with("nativeForkSystemServerX", &server.entries[0].wire_signature);

        let binding = select_family(server, &mut live);
        assert!(!binding.is_installed());
        assert_eq!(binding.selected(), None);
    }

    #[test]
    fn test_binding_resolves_once() {
        let mut binding = FamilyBinding::new(FamilyKind::SpecializeApp);
        let first = NonNull::new(0x1000 as *mut c_void).unwrap();
        let second = NonNull::new(0x2000 as *mut c_void).unwrap();

        assert!(binding.resolve(0, first));
        assert!(!binding.resolve(1, second));
        assert_eq!(binding.original(), Some(first));
        assert_eq!(binding.selected(), Some(0));
    }
}
