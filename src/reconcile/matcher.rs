//! Matcher
//!
//! Resolves one canonical object against the catalog: by exact name first,
//! then each version by content against every page of existing versions.

use tracing::{debug, info};

use super::ReconcileOptions;
use crate::catalog::{CatalogError, CatalogService, ObjectQuery, PageRequest, RemoteVersion};
use crate::error::Result;
use crate::model::{CatalogObject, LatestVersion, NameScope, ObjectKind, VersionContent};

/// Match an object and its versions.
///
/// Leaves `match_found` false when no object of that name exists. When one
/// does, each version either gets the id of a content-equal catalog version
/// or records the newest catalog version as its increment baseline.
pub(crate) fn match_object<C: VersionContent>(
    catalog: &dyn CatalogService,
    options: &ReconcileOptions,
    domain_id: &str,
    object: &mut CatalogObject<C>,
) -> Result<()> {
    let mut query = ObjectQuery::kind(C::KIND).named(&object.name);
    if C::KIND.name_scope() == NameScope::Domain {
        query = query.in_domain(domain_id);
    }

    let Some(remote) = catalog.find_object(&query, options.object_page_size)? else {
        object.match_found = false;
        debug!("No catalog object with this name");
        return Ok(());
    };

    if remote.domain_id != domain_id {
        return Err(CatalogError::ForeignDomain {
            kind: C::KIND,
            name: object.name.clone(),
            found: remote.domain_id,
            expected: domain_id.to_string(),
        }
        .into());
    }

    object.id = Some(remote.id.clone());
    object.shared = remote.shared;
    object.match_found = true;

    let existing = all_versions(catalog, options, &remote.id, C::KIND)?;
    let latest = existing.first().map(|v| LatestVersion {
        id: v.id.clone(),
        version: v.version.clone(),
        state: v.state,
    });
    object.latest_version = latest.as_ref().and_then(|l| l.version.clone());

    for version in object.versions.iter_mut() {
        let matched = existing.iter().find(|remote_version| {
            C::from_payload(remote_version.payload.clone())
                .map(|content| content.same_content(&version.content))
                .unwrap_or(false)
        });

        match matched {
            Some(remote_version) => {
                info!(
                    version_id = %remote_version.id,
                    version = remote_version.version.as_deref().unwrap_or("-"),
                    "Matched existing version"
                );
                version.id = Some(remote_version.id.clone());
                version.state = Some(remote_version.state);
                version.version = remote_version.version.clone();
                version.match_found = true;
            }
            None => {
                version.match_found = false;
                version.latest = latest.clone();
                if let Some(latest) = &latest {
                    debug!(
                        latest_id = %latest.id,
                        draft = version.latest_in_draft(),
                        "No content match; recorded latest version"
                    );
                }
            }
        }
    }

    Ok(())
}

/// Every version of an object, newest first, across all pages
fn all_versions(
    catalog: &dyn CatalogService,
    options: &ReconcileOptions,
    object_id: &str,
    kind: ObjectKind,
) -> Result<Vec<RemoteVersion>> {
    let mut request = PageRequest::first(options.version_page_size);
    let mut versions = Vec::new();
    loop {
        let page = catalog.list_versions(kind, object_id, request)?;
        debug!(page = page.page, total_pages = page.total_pages, "Fetched version page");
        let more = page.has_next();
        versions.extend(page.items);
        if !more {
            return Ok(versions);
        }
        request = request.next();
    }
}
