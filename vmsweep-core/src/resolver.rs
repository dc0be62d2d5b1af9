use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::{SweepError, SweepResult};
use crate::inventory::{SearchScope, TargetResolver};
use crate::lifecycle::TargetSet;

/// Turn a folder name and VM names into inventory handles.
///
/// With a folder, only its direct children are searched; without one the
/// whole inventory is searched recursively. Every VM whose name matches is
/// returned, so duplicate names all become targets.
pub async fn resolve_targets<R>(
    resolver: &R,
    folder_name: Option<&str>,
    vm_names: &[String],
) -> SweepResult<TargetSet>
where
    R: TargetResolver + ?Sized,
{
    let folder = match folder_name {
        Some(name) => {
            let folder = resolver
                .find_folder(name)
                .await?
                .ok_or_else(|| SweepError::not_found(format!("target folder '{}'", name)))?;
            debug!(folder = %folder.moref, name = %folder.name, "Resolved target folder");
            Some(folder)
        }
        None => None,
    };

    let scope = match &folder {
        Some(folder) => SearchScope::Folder(folder.moref.clone()),
        None => SearchScope::Root,
    };

    let wanted: HashSet<String> = vm_names.iter().cloned().collect();
    let vms = resolver.find_vms(&wanted, scope).await?;
    if vms.is_empty() {
        return Err(SweepError::not_found("any of the target VMs"));
    }

    info!(requested = wanted.len(), found = vms.len(), "Resolved target VMs");
    Ok(TargetSet::new(folder, vms))
}
