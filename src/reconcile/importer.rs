//! Importer
//!
//! Realizes match results as catalog mutations. Per version:
//!
//! | content match | latest found | latest is draft | action |
//! |---|---|---|---|
//! | yes | - | - | reuse the matched version |
//! | no | no | - | create `1.0.0` |
//! | no | yes | no | create at the incremented baseline, record remap |
//! | no | yes | yes | update the draft in place |

use tracing::info;

use super::remap::RemapTables;
use super::ReconcileOptions;
use crate::catalog::CatalogService;
use crate::error::Result;
use crate::model::{CatalogObject, VersionContent};
use crate::version::next_version;

/// What happened to one version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionAction {
    Reused,
    Created,
    Updated,
}

/// Result of importing one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub object_created: bool,
    pub actions: Vec<VersionAction>,
}

pub(crate) fn import_object<C: VersionContent>(
    catalog: &dyn CatalogService,
    options: &ReconcileOptions,
    remaps: &RemapTables,
    domain_id: &str,
    object: &mut CatalogObject<C>,
) -> Result<ImportOutcome> {
    let mut object_created = false;
    let object_id = match (&object.id, object.match_found) {
        (Some(id), true) => id.clone(),
        _ => {
            let created = catalog.create_object(C::KIND, &object.name, domain_id)?;
            info!(object_id = %created.id, "CREATED {}", C::KIND);
            object.id = Some(created.id.clone());
            object.shared = created.shared;
            object_created = true;
            created.id
        }
    };

    let mut actions = Vec::with_capacity(object.versions.len());
    for version in object.versions.iter_mut() {
        if version.match_found {
            actions.push(VersionAction::Reused);
            continue;
        }

        let payload = version.content.to_payload();
        let action = match version.latest.clone() {
            Some(latest) if version.latest_in_draft() => {
                let updated = catalog.update_version(&latest.id, &payload)?;
                info!(
                    version_id = %updated.id,
                    version = updated.version.as_deref().unwrap_or("-"),
                    "UPDATED draft {} version",
                    C::KIND
                );
                version.id = Some(updated.id);
                version.state = Some(updated.state);
                version.version = updated.version;
                VersionAction::Updated
            }
            Some(latest) => {
                let baseline = object.latest_version.as_deref().or(latest.version.as_deref());
                let semver = next_version(baseline, options.strategy)?;
                let created = catalog.create_version(&object_id, &payload, &semver)?;
                if let Some(table) = remaps.table(C::KIND) {
                    table.record(&latest.id, &created.id);
                }
                info!(
                    version_id = %created.id,
                    supersedes = %latest.id,
                    version = %semver,
                    "CREATED {} version",
                    C::KIND
                );
                version.id = Some(created.id);
                version.state = Some(created.state);
                version.version = created.version;
                VersionAction::Created
            }
            None => {
                let semver = next_version(None, options.strategy)?;
                let created = catalog.create_version(&object_id, &payload, &semver)?;
                info!(version_id = %created.id, version = %semver, "CREATED {} version", C::KIND);
                version.id = Some(created.id);
                version.state = Some(created.state);
                version.version = created.version;
                VersionAction::Created
            }
        };
        actions.push(action);
    }

    Ok(ImportOutcome { object_created, actions })
}
