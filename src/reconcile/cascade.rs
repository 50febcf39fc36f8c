//! Cascade updates
//!
//! After a kind's dependencies were re-versioned, every object of that kind
//! in the domain whose latest version still points at a superseded version
//! gets a successor pointing at the replacement. Drafts are rewritten in
//! place; anything else gets a new version, and the supersession is
//! recorded so the next kind up the chain follows it.
//!
//! Runs in two parallel phases with a barrier in between: first fetch and
//! rewrite every latest version, then write the rewrites back.

use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info, info_span, warn};

use super::ImportOperator;
use crate::catalog::{ObjectQuery, RemoteObject, RemoteVersion};
use crate::error::{ImportError, Result};
use crate::model::{VersionContent, VersionRef};
use crate::report::ImportSummary;
use crate::version::cascade_version;

/// What a cascade did to one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeAction {
    /// The latest version was a draft and was rewritten in place
    Updated,
    /// A successor version was created
    Created,
}

/// A latest version that needs a successor
struct Stale<C> {
    object: RemoteObject,
    superseded: RemoteVersion,
    content: C,
}

pub(crate) fn cascade_kind<C: VersionContent>(
    op: &ImportOperator<'_>,
    own_versions: &HashSet<String>,
    summary: &mut ImportSummary,
) -> Result<()> {
    let run_id = op.context.run_id();
    if op.remaps.is_empty() {
        debug!(run = %run_id, kind = %C::KIND, "No superseded versions; nothing to cascade");
        return Ok(());
    }

    let query = ObjectQuery::kind(C::KIND).in_domain(&op.domain_id);
    let objects = match op.catalog.all_objects(&query, op.options.object_page_size) {
        Ok(objects) => objects,
        Err(err) => {
            let err = ImportError::from(err);
            if err.is_fatal() {
                return Err(err);
            }
            warn!(run = %run_id, kind = %C::KIND, error = %err, "Could not list objects for cascade");
            summary.record_skip(C::KIND, "*", "cascade", err.to_string());
            return Ok(());
        }
    };
    info!(run = %run_id, kind = %C::KIND, count = objects.len(), "Checking for cascade updates");

    let found: Vec<(String, Result<Option<Stale<C>>>)> = op.pool.install(|| {
        objects
            .into_par_iter()
            .map(|object| {
                let span = info_span!("object", run = %run_id, stage = "cascade", kind = %C::KIND, name = %object.name);
                let _enter = span.enter();
                (object.name.clone(), find_stale::<C>(op, object, own_versions))
            })
            .collect()
    });

    let mut stale: Vec<Stale<C>> = Vec::new();
    op.settle(C::KIND, "cascade", found, summary, |_, hit| stale.extend(hit), |_, _| {})?;

    let written: Vec<(String, Result<CascadeAction>)> = op.pool.install(|| {
        stale
            .into_par_iter()
            .map(|candidate| {
                let name = candidate.object.name.clone();
                let span = info_span!("object", run = %run_id, stage = "cascade", kind = %C::KIND, name = %name);
                let _enter = span.enter();
                (name, write_successor(op, candidate))
            })
            .collect()
    });

    op.settle(
        C::KIND,
        "cascade",
        written,
        summary,
        |summary, action| summary.record_cascade(C::KIND, action),
        |_, _| {},
    )
}

/// Rewrite the object's latest version through the remap tables; `None`
/// when it references nothing superseded.
fn find_stale<C: VersionContent>(
    op: &ImportOperator<'_>,
    object: RemoteObject,
    own_versions: &HashSet<String>,
) -> Result<Option<Stale<C>>> {
    let Some(latest) = op.catalog.latest_version(C::KIND, &object.id)? else {
        return Ok(None);
    };

    let produced_this_run = own_versions.contains(&latest.id)
        || op.remaps.table(C::KIND).map_or(false, |t| t.contains_key(&latest.id));
    if produced_this_run {
        debug!(version_id = %latest.id, "Latest version written by this run");
        return Ok(None);
    }

    let Some(content) = C::from_payload(latest.payload.clone()) else {
        warn!(version_id = %latest.id, "Latest version carries a different kind of payload");
        return Ok(None);
    };

    let remaps = &op.remaps;
    let rewritten = content.rewrite_refs(&mut |kind, reference| {
        reference
            .catalog_id()
            .and_then(|id| remaps.lookup(kind, id))
            .map(VersionRef::catalog)
    });

    Ok(rewritten.map(|content| Stale { object, superseded: latest, content }))
}

fn write_successor<C: VersionContent>(op: &ImportOperator<'_>, stale: Stale<C>) -> Result<CascadeAction> {
    let payload = stale.content.to_payload();

    if stale.superseded.state.is_draft() {
        let updated = op.catalog.update_version(&stale.superseded.id, &payload)?;
        info!(version_id = %updated.id, "UPDATED draft {} version (cascade)", C::KIND);
        return Ok(CascadeAction::Updated);
    }

    let semver = cascade_version(
        stale.superseded.version.as_deref(),
        op.options.cascade_versioning,
        op.options.strategy,
    )?;
    let created = op.catalog.create_version(&stale.object.id, &payload, &semver)?;
    if let Some(table) = op.remaps.table(C::KIND) {
        table.record(&stale.superseded.id, &created.id);
    }
    info!(
        version_id = %created.id,
        supersedes = %stale.superseded.id,
        version = %semver,
        "CREATED {} version (cascade)",
        C::KIND
    );
    Ok(CascadeAction::Created)
}
