//! Per-item state transitions
//!
//! [`plan`] maps a fetch outcome to the item's next status and the side
//! effects the engine must carry out, in order. It does no I/O, so the whole
//! decision table is testable without a server.

use crate::crawler::fetcher::FetchOutcome;
use crate::detect::DetectorRegistry;
use crate::state::{FailureCode, FetchStatus, ResponseMeta};

/// A side effect of completing an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Run the detector pipeline on the body and queue what it finds
    Detect,

    /// Queue the anchors and resource references of an HTML page
    ExtractLinks,

    /// Run the filter pipeline, then publish the result as markup
    PublishMarkup,

    /// Publish the raw body as a file
    PublishFile,

    /// Resolve the redirect against `location` and queue the destination
    ResolveRedirect { location: String },

    /// Append to the failure list
    RecordFailure(FailureCode),
}

/// The next status of an item and what to do about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub status: FetchStatus,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn failed(code: FailureCode) -> Self {
        Self {
            status: FetchStatus::Failed,
            effects: vec![Effect::RecordFailure(code)],
        }
    }
}

/// Plans the transition of a `fetching` item
pub fn plan(outcome: &FetchOutcome, detectors: &DetectorRegistry) -> Transition {
    match outcome {
        FetchOutcome::Fetched { meta, .. } => Transition {
            status: FetchStatus::Fetched,
            effects: fetched_effects(meta, detectors),
        },
        FetchOutcome::Redirected { location, .. } => Transition {
            status: FetchStatus::Redirected,
            effects: vec![Effect::ResolveRedirect {
                location: location.clone(),
            }],
        },
        FetchOutcome::HttpError { status_code } => {
            Transition::failed(FailureCode::Http(*status_code))
        }
        FetchOutcome::Timeout => Transition::failed(FailureCode::Timeout),
        FetchOutcome::Network { .. } => Transition::failed(FailureCode::Network),
        FetchOutcome::TooLarge { .. } => Transition::failed(FailureCode::TooLarge),
    }
}

/// Plans the transition of an item robots.txt does not allow
pub fn plan_disallowed() -> Transition {
    Transition::failed(FailureCode::Robots)
}

fn fetched_effects(meta: &ResponseMeta, detectors: &DetectorRegistry) -> Vec<Effect> {
    let html = meta.is_html();
    let mut effects = Vec::new();

    if html || detectors.any_applies(meta) {
        effects.push(Effect::Detect);
    }
    if html {
        effects.push(Effect::ExtractLinks);
        effects.push(Effect::PublishMarkup);
    } else {
        effects.push(Effect::PublishFile);
    }
    effects
}
