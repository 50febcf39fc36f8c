//! Local reference resolution

use crate::error::{ImportError, Result};
use crate::model::{CatalogObject, LocalIds, VersionContent, VersionRef};

/// Replace every local reference in the object's versions by the catalog id
/// the referenced version was imported under.
pub(crate) fn resolve_object<C: VersionContent>(
    object: &mut CatalogObject<C>,
    ids: &LocalIds,
) -> Result<()> {
    for version in object.versions.iter_mut() {
        let missing = version.content.dependencies().into_iter().find(|(kind, reference)| {
            matches!(reference, VersionRef::Local { .. }) && !ids.contains_key(&(*kind, (*reference).clone()))
        });
        if let Some((kind, reference)) = missing {
            return Err(ImportError::UnresolvedDependency {
                kind: C::KIND,
                name: object.name.clone(),
                dependency: format!("{} {}", kind, reference),
            });
        }

        let resolved = version.content.rewrite_refs(&mut |kind, reference| match reference {
            VersionRef::Local { .. } => ids.get(&(kind, reference.clone())).map(VersionRef::catalog),
            VersionRef::Catalog(_) => None,
        });
        if let Some(resolved) = resolved {
            version.content = resolved;
        }
    }
    Ok(())
}
