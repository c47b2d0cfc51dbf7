//! Budget-based inlining selection
//!
//! Candidates are bucketed by kind and size. The visit's withheld quota is
//! taken from the lowest-priority buckets first; inside a bucket the
//! earliest references in document order win.

use std::sync::Arc;

use crate::config::InlineThresholds;
use crate::http::url::path_and_query;
use crate::origin::CdnLookup;
use crate::resource::{Resource, ResourceKind};
use crate::variant::{BrowserClass, Variant};

use super::references::{RefClass, Reference};

/// Inlining buckets in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    Css,
    TinyImage,
    TinyJs,
    SmallImage,
    SmallJs,
    MediumImage,
    MediumJs,
    LargeImage,
    LargeJs,
}

impl Bucket {
    pub const COUNT: usize = 9;

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Bucket of an inlinable `kind` whose inline form is `size` bytes.
    #[must_use]
    pub fn of(kind: ResourceKind, size: usize, thresholds: &InlineThresholds) -> Option<Bucket> {
        let tier = if size <= thresholds.tiny {
            0
        } else if size <= thresholds.small {
            1
        } else if size <= thresholds.medium {
            2
        } else {
            3
        };
        let bucket = match (kind, tier) {
            (ResourceKind::Css, _) => Bucket::Css,
            (ResourceKind::Image, 0) => Bucket::TinyImage,
            (ResourceKind::Js, 0) => Bucket::TinyJs,
            (ResourceKind::Image, 1) => Bucket::SmallImage,
            (ResourceKind::Js, 1) => Bucket::SmallJs,
            (ResourceKind::Image, 2) => Bucket::MediumImage,
            (ResourceKind::Js, 2) => Bucket::MediumJs,
            (ResourceKind::Image, _) => Bucket::LargeImage,
            (ResourceKind::Js, _) => Bucket::LargeJs,
            _ => return None,
        };
        Some(bucket)
    }
}

/// What the assembler does with one reference
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Copy the reference through untouched
    Leave,
    /// Embed the resource
    Inline(Arc<Resource>),
    /// Point the reference at another URL (CDN or version URL)
    Substitute(String),
}

/// Inputs to [`plan`] that do not vary per reference
#[derive(Clone, Copy)]
pub struct PlanContext<'a> {
    pub variant: Variant,
    pub https: bool,
    pub version_urls: bool,
    pub thresholds: &'a InlineThresholds,
    pub cdn: &'a dyn CdnLookup,
}

/// Per-bucket admission counts after withholding `withheld` candidates.
///
/// The quota comes off the last bucket first so higher-priority buckets
/// stay whole.
#[must_use]
pub fn admitted_per_bucket(counts: [usize; Bucket::COUNT], withheld: usize) -> [usize; Bucket::COUNT] {
    let mut allowed = counts;
    let mut remaining = withheld;
    for slot in allowed.iter_mut().rev() {
        if remaining == 0 {
            break;
        }
        let take = (*slot).min(remaining);
        *slot -= take;
        remaining -= take;
    }
    allowed
}

/// Decide every reference; `resources` runs parallel to `refs`.
#[must_use]
pub fn plan(
    refs: &[Reference],
    resources: &[Option<Arc<Resource>>],
    ctx: &PlanContext<'_>,
) -> Vec<Decision> {
    let buckets: Vec<Option<Bucket>> = refs
        .iter()
        .zip(resources)
        .map(|(reference, resource)| candidate(reference, resource.as_deref(), ctx))
        .collect();

    let mut counts = [0usize; Bucket::COUNT];
    for bucket in buckets.iter().flatten() {
        counts[bucket.index()] += 1;
    }
    let total: usize = counts.iter().sum();
    let visit = ctx.variant.visit();
    let allowed = match visit.and_then(|v| v.withheld(total)) {
        Some(withheld) => admitted_per_bucket(counts, withheld),
        None => [0; Bucket::COUNT],
    };

    let mut admitted = [0usize; Bucket::COUNT];
    let decisions: Vec<Decision> = refs
        .iter()
        .zip(resources)
        .zip(&buckets)
        .map(|((reference, resource), bucket)| {
            let Some(resource) = resource else {
                return Decision::Leave;
            };
            if let Some(bucket) = bucket {
                let i = bucket.index();
                if admitted[i] < allowed[i] {
                    admitted[i] += 1;
                    return Decision::Inline(resource.clone());
                }
            }
            substitute(reference, resource, ctx)
        })
        .collect();

    tracing::trace!(
        target: "htmlspeed::resolver",
        variant = %ctx.variant,
        candidates = total,
        inlined = admitted.iter().sum::<usize>(),
        "Planned inlining"
    );
    decisions
}

fn candidate(reference: &Reference, resource: Option<&Resource>, ctx: &PlanContext<'_>) -> Option<Bucket> {
    let resource = resource?;
    if !reference.may_inline()
        || !resource.flags.inlinable
        || resource.kind != reference.class.kind()
    {
        return None;
    }
    let size = resource.inline_size();
    if size > ctx.thresholds.huge {
        return None;
    }
    if reference.class == RefClass::Image
        && ctx.variant.browser() == Some(BrowserClass::Ie8)
        && size > ctx.thresholds.ie8_data_uri_limit
    {
        return None;
    }
    Bucket::of(resource.kind, size, ctx.thresholds)
}

/// CDN URL when the collaborator maps the host, else the version URL.
fn substitute(reference: &Reference, resource: &Resource, ctx: &PlanContext<'_>) -> Decision {
    if let Some(cdn) = ctx.cdn.lookup(&resource.host, resource.optimized.len()) {
        let prefix = cdn.prefix(ctx.https).trim_end_matches('/');
        return Decision::Substitute(format!("{prefix}{}", path_and_query(&reference.url)));
    }
    match &resource.version_url {
        Some(version_url) if ctx.version_urls => Decision::Substitute(version_url.clone()),
        _ => Decision::Leave,
    }
}
