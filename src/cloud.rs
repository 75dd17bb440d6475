//! Cloud abstraction for elb-tagger.
//!
//! Provides the resource directory the tagging pass runs against: enumerate
//! load balancers, describe their tags and bound instances, describe
//! instances and images, and apply a tag set to a load balancer.

use async_trait::async_trait;
use tracing::error;

use crate::Result;
use crate::cloud::aws::AwsCloud;
use crate::config::Config;
use crate::resource::{Image, Instance, LoadBalancer};
use crate::tags::Tag;

pub mod aws;

/// Abstraction of a cloud that can list load balancers, describe instances
/// and images, and tag resources.
#[async_trait]
pub trait Cloud {
    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>>;

    /// The tags currently on a load balancer.
    async fn load_balancer_tags(&self, name: &str) -> Result<Vec<Tag>>;

    async fn describe_instances(&self, ids: &[String]) -> Result<Vec<Instance>>;

    /// Describe an image.
    ///
    /// An image that no longer exists or whose tags cannot be read is
    /// reported as [`Image::untagged`], not as an error.
    async fn describe_image(&self, image_id: &str) -> Result<Image>;

    /// Replace-or-add the given tags on a load balancer.
    ///
    /// In dry run mode this logs the would-be mutation and changes nothing.
    async fn apply_load_balancer_tags(&self, name: &str, tags: &[Tag]) -> Result<()>;
}

/// Credentials given explicitly on the command line, instead of the ambient
/// default chain.
#[derive(Clone)]
pub struct ExplicitCredentials {
    pub access_key: String,
    pub secret_key: String,
}

/// Create a new cloud provider instance from the configuration.
pub async fn open_cloud(
    config: &Config,
    credentials: Option<ExplicitCredentials>,
    dry_run: bool,
) -> Result<Box<dyn Cloud>> {
    match AwsCloud::new(config, credentials, dry_run).await {
        Ok(cloud) => Ok(Box::new(cloud)),
        Err(err) => {
            error!("Failed to initialize AWS cloud: {err}");
            Err(err)
        }
    }
}
