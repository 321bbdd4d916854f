//! Dependency-graph ordering and validation for registered modules.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashSet;

use crate::kernel::error::{KernelError, Result};
use crate::manager::registry::ModuleRegistry;
use crate::update::compare_versions;

/// Topologically sort registered modules, prerequisites first.
///
/// Depth-first with a `visiting` path for cycle detection; a cycle is fatal
/// and the error message enumerates the offending path. Seeds enter the
/// search in descending priority (name as tie-break) so higher-priority
/// modules come earlier wherever dependencies leave room. Dependencies on
/// unregistered modules are skipped here; `validate` has already warned
/// about them.
pub fn sort_by_dependencies(registry: &ModuleRegistry) -> Result<Vec<String>> {
    let mut seeds = registry.handles();
    seeds.sort_by(|a, b| {
        b.metadata()
            .priority
            .cmp(&a.metadata().priority)
            .then_with(|| a.name().cmp(b.name()))
    });

    let mut sorted = Vec::with_capacity(seeds.len());
    let mut visited = HashSet::new();
    let mut visiting = Vec::new();

    for handle in &seeds {
        visit(handle.name(), registry, &mut visited, &mut visiting, &mut sorted)?;
    }
    Ok(sorted)
}

fn visit(
    name: &str,
    registry: &ModuleRegistry,
    visited: &mut HashSet<String>,
    visiting: &mut Vec<String>,
    sorted: &mut Vec<String>,
) -> Result<()> {
    if visited.contains(name) {
        return Ok(());
    }
    if visiting.iter().any(|n| n == name) {
        let start = visiting.iter().position(|n| n == name).unwrap_or(0);
        let mut path: Vec<String> = visiting[start..].to_vec();
        path.push(name.to_string());
        return Err(KernelError::Cycle(path));
    }

    let Some(handle) = registry.get(name) else {
        return Ok(());
    };

    visiting.push(name.to_string());
    for dep in &handle.metadata().dependencies {
        if registry.contains(dep) {
            visit(dep, registry, visited, visiting, sorted)?;
        }
    }
    visiting.pop();

    visited.insert(name.to_string());
    sorted.push(name.to_string());
    Ok(())
}

/// Warn about missing dependencies and api_version shortfalls.
///
/// These are warnings, not failures: initialization proceeds and the
/// dependent module may fail on its own terms. Returns the warning
/// messages for callers that want to surface them.
pub fn validate(registry: &ModuleRegistry) -> Vec<String> {
    let mut warnings = Vec::new();
    for handle in registry.handles() {
        let metadata = handle.metadata();
        for dep in &metadata.dependencies {
            let Some(dep_handle) = registry.get(dep) else {
                warnings.push(format!(
                    "module '{}' depends on '{}', which is not registered",
                    handle.name(),
                    dep
                ));
                continue;
            };
            if let Some(min) = metadata.dependency_versions.get(dep) {
                let actual = dep_handle.api_version();
                if compare_versions(&actual, min) == CmpOrdering::Less {
                    warnings.push(format!(
                        "module '{}' requires '{}' API version {} or newer, found {}",
                        handle.name(),
                        dep,
                        min,
                        actual
                    ));
                }
            }
        }
    }
    for warning in &warnings {
        log::warn!("{}", warning);
    }
    warnings
}
