//! Identity resolution: a stable local filename for every media reference.
//!
//! Resolution is deterministic wherever the URL carries a usable name; only
//! the synthesized fallback depends on the clock. A caller always gets a
//! filename back, even for a URL that does not parse; the download and the
//! skip-check must agree on one path, and a broken reference must stay a
//! per-item problem.

use std::collections::HashSet;

use chrono::Utc;
use url::Url;

use crate::mirror::extract::{MediaKind, MediaReference};

/// A media reference paired with the local filename assigned to it. The
/// filename is assigned exactly once, before retrieval begins, and never
/// recomputed.
#[derive(Debug, Clone)]
pub(crate) struct RetrievalItem {
    reference: MediaReference,
    local_filename: String,
}

impl RetrievalItem {
    pub(crate) fn new(reference: MediaReference, local_filename: String) -> Self {
        RetrievalItem {
            reference,
            local_filename,
        }
    }

    pub(crate) fn reference(&self) -> &MediaReference {
        &self.reference
    }

    pub(crate) fn local_filename(&self) -> &str {
        &self.local_filename
    }
}

/// Derives a filename for one reference. Attempts, in order: the last path
/// segment when it carries a name and extension; the path embedded in a `url`
/// query parameter (next/image style indirection); a name lacking an
/// extension gets the kind default appended; otherwise a synthesized
/// `<kind>_p<index>_<unix_ts>` name.
pub(crate) fn resolve_filename(reference: &MediaReference) -> String {
    let parsed = match Url::parse(reference.source_url()) {
        Ok(url) => url,
        Err(_) => return synthesize(reference.kind(), reference.origin_index(), true),
    };

    let segment = last_segment(parsed.path());

    if let Some(name) = segment {
        if name.contains('.') {
            return name.to_string();
        }
    }

    if let Some(name) = embedded_name(&parsed) {
        if name.contains('.') {
            return name;
        }
        return format!("{name}{}", reference.kind().default_extension());
    }

    if let Some(name) = segment {
        return format!("{name}{}", reference.kind().default_extension());
    }

    synthesize(reference.kind(), reference.origin_index(), false)
}

/// Turns discovered references into retrieval items, enforcing filename
/// uniqueness within the run. Collisions get an origin-index suffix, then a
/// random token; a file is never silently overwritten by a sibling item.
pub(crate) fn assign_items(references: Vec<MediaReference>) -> Vec<RetrievalItem> {
    let mut taken: HashSet<String> = HashSet::with_capacity(references.len());

    references
        .into_iter()
        .map(|reference| {
            let mut name = resolve_filename(&reference);
            if !taken.insert(name.clone()) {
                name = with_suffix(&name, &format!("p{}", reference.origin_index()));
                if !taken.insert(name.clone()) {
                    name = with_suffix(&name, &uuid::Uuid::new_v4().simple().to_string()[..12]);
                    taken.insert(name.clone());
                }
                warn!(
                    "Filename collision on page {}, saving as {}",
                    reference.origin_index(),
                    name
                );
            }
            RetrievalItem::new(reference, name)
        })
        .collect()
}

fn last_segment(path: &str) -> Option<&str> {
    path.rsplit('/').find(|segment| !segment.is_empty())
}

/// Recovers a name from an indirection URL that carries the true remote path
/// in its `url` query parameter.
fn embedded_name(url: &Url) -> Option<String> {
    let embedded = url
        .query_pairs()
        .find(|(name, _)| name == "url")
        .map(|(_, value)| value.into_owned())?;

    let path = match Url::parse(&embedded) {
        Ok(absolute) => absolute.path().to_string(),
        Err(_) => embedded.split('?').next().unwrap_or_default().to_string(),
    };

    last_segment(&path).map(str::to_string)
}

fn synthesize(kind: MediaKind, origin_index: u64, fallback: bool) -> String {
    let marker = if fallback { "fallback_" } else { "" };
    format!(
        "{}_p{}_{marker}{}{}",
        kind.label(),
        origin_index,
        Utc::now().timestamp(),
        kind.default_extension()
    )
}

fn with_suffix(name: &str, suffix: &str) -> String {
    match name.rfind('.') {
        Some(dot) => format!("{}_{suffix}{}", &name[..dot], &name[dot..]),
        None => format!("{name}_{suffix}"),
    }
}
