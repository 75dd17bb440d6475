//! One tagging pass over every load balancer in the region.
//!
//! Each load balancer is handled independently: a failure on one is logged
//! and counted but does not stop the pass. Nothing is remembered between
//! passes; the merge rules in [`crate::tags`] make repeated passes converge.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::cloud::Cloud;
use crate::resource::LoadBalancer;
use crate::tags::{self, TagPolicy};

/// What one pass did, per load balancer outcome.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub examined: usize,
    /// Already carried every global key.
    pub already_tagged: usize,
    /// Had new tags applied (or would have, in dry run).
    pub tagged: usize,
    /// Under-tagged, but the sources supplied nothing new.
    pub unchanged: usize,
    /// Skipped because no bound instance could be resolved.
    pub no_source_instance: usize,
    /// Failed with a provider error; the pass continued.
    pub failed: usize,
}

enum Outcome {
    AlreadyTagged,
    Tagged,
    Unchanged,
    NoSourceInstance,
}

/// Tag every under-tagged load balancer from its first bound instance and
/// that instance's source image.
pub async fn tag_load_balancers(cloud: &dyn Cloud, policy: &TagPolicy) -> Result<SyncSummary> {
    let load_balancers = cloud.list_load_balancers().await?;
    info!("Found {} load balancers", load_balancers.len());
    let mut summary = SyncSummary::default();
    for load_balancer in &load_balancers {
        summary.examined += 1;
        match tag_one(cloud, policy, load_balancer).await {
            Ok(Outcome::AlreadyTagged) => summary.already_tagged += 1,
            Ok(Outcome::Tagged) => summary.tagged += 1,
            Ok(Outcome::Unchanged) => summary.unchanged += 1,
            Ok(Outcome::NoSourceInstance) => summary.no_source_instance += 1,
            Err(err) => {
                error!(name = %load_balancer.name, "Failed to tag load balancer: {err}");
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

async fn tag_one(
    cloud: &dyn Cloud,
    policy: &TagPolicy,
    load_balancer: &LoadBalancer,
) -> Result<Outcome> {
    let name = &load_balancer.name;
    let current = cloud.load_balancer_tags(name).await?;
    if tags::is_fully_tagged(policy, &current) {
        debug!(%name, "Has all global keys");
        return Ok(Outcome::AlreadyTagged);
    }

    // A load balancer with nothing behind it has no tag source; skip it
    // rather than guessing.
    if load_balancer.instance_ids.is_empty() {
        warn!(%name, "No eligible source instance, skipping");
        return Ok(Outcome::NoSourceInstance);
    }
    let instances = cloud.describe_instances(&load_balancer.instance_ids).await?;
    let Some(instance) = instances.first() else {
        warn!(%name, "No eligible source instance, skipping");
        return Ok(Outcome::NoSourceInstance);
    };

    let instance_tags = tags::instance_tags(&instance.tags);
    let image_tags = match &instance.image_id {
        Some(image_id) => {
            let image = cloud.describe_image(image_id).await?;
            debug!(image = %image.id, owner = ?image.owner_id, "Source image");
            tags::image_tags(&image.tags)
        }
        None => Vec::new(),
    };

    let merged = tags::merge_tags(policy, &current, &instance_tags, &image_tags);
    if merged.len() > current.len() {
        info!(%name, ?merged, "Applying derived tags");
        cloud
            .apply_load_balancer_tags(name, &merged)
            .await
            .inspect_err(|err| error!(%name, tags = ?merged, "Failed to apply tags: {err}"))?;
        Ok(Outcome::Tagged)
    } else {
        debug!(%name, "Sources supplied no new tags");
        Ok(Outcome::Unchanged)
    }
}
