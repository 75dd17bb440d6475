//! AWS implementation of the Cloud abstraction, over Classic ELB and EC2.

use std::fmt::Debug;

use async_trait::async_trait;
use aws_config::{AppName, BehaviorVersion, Region, meta::region::RegionProviderChain};
use aws_credential_types::Credentials;
use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::Tag as Ec2Tag;
use aws_sdk_elasticloadbalancing::types::Tag as ElbTag;
use tracing::{debug, error, info};

use super::{Cloud, ExplicitCredentials};
use crate::config::Config;
use crate::resource::{Image, Instance, LoadBalancer};
use crate::tags::Tag;
use crate::{Error, Result};

#[derive(Debug)]
pub struct AwsCloud {
    elb_client: aws_sdk_elasticloadbalancing::Client,
    ec2_client: aws_sdk_ec2::Client,
    dry_run: bool,
}

impl AwsCloud {
    pub async fn new(
        config: &Config,
        credentials: Option<ExplicitCredentials>,
        dry_run: bool,
    ) -> Result<Self> {
        let region_provider =
            RegionProviderChain::first_try(config.region.clone().map(Region::new))
                .or_default_provider()
                .or_else("us-east-1");
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .app_name(
                AppName::new(format!("{}-{}", env!("CARGO_PKG_NAME"), crate::VERSION)).unwrap(),
            );
        if let Some(ExplicitCredentials {
            access_key,
            secret_key,
        }) = credentials
        {
            loader = loader.credentials_provider(Credentials::from_keys(
                access_key, secret_key, None,
            ));
        }
        let sdk_config = loader.load().await;

        let sts_client = aws_sdk_sts::Client::new(&sdk_config);
        let elb_client = aws_sdk_elasticloadbalancing::Client::new(&sdk_config);
        let ec2_client = aws_sdk_ec2::Client::new(&sdk_config);

        let account_id = match sts_client
            .get_caller_identity()
            .send()
            .await
            .inspect_err(|err| {
                error!(?err, "GetCallerIdentity failed");
            }) {
            Err(aws_sdk_sts::error::SdkError::DispatchFailure(dispatch)) => {
                error!(
                    ?dispatch,
                    is_io = dispatch.is_io(),
                    is_user = dispatch.is_user(),
                    is_other = dispatch.is_other(),
                    is_timeout = dispatch.is_timeout(),
                    "DispatchFailure"
                );
                Err(Error::Credentials(format!("{dispatch:?}")))
            }
            Err(err) => Err(err.into()),
            Ok(caller_identity) => {
                let account_id = caller_identity.account().unwrap_or_default().to_owned();
                debug!(?account_id);
                Ok(account_id)
            }
        }?;
        info!(
            ?account_id,
            region = ?sdk_config.region(),
            dry_run,
            "AWS session established"
        );

        Ok(Self {
            elb_client,
            ec2_client,
            dry_run,
        })
    }
}

#[async_trait]
impl Cloud for AwsCloud {
    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>> {
        let mut load_balancers = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let response = self
                .elb_client
                .describe_load_balancers()
                .set_marker(marker.clone())
                .send()
                .await
                .inspect_err(|err| error!(?err, "DescribeLoadBalancers failed"))?;
            for description in response.load_balancer_descriptions() {
                let Some(name) = description.load_balancer_name() else {
                    continue;
                };
                let instance_ids = description
                    .instances()
                    .iter()
                    .filter_map(|i| i.instance_id())
                    .map(ToOwned::to_owned)
                    .collect();
                load_balancers.push(LoadBalancer {
                    name: name.to_owned(),
                    instance_ids,
                });
            }
            marker = response.next_marker().map(ToOwned::to_owned);
            if marker.as_deref().is_none_or(str::is_empty) {
                break;
            }
        }
        debug!("{} load balancers listed", load_balancers.len());
        Ok(load_balancers)
    }

    async fn load_balancer_tags(&self, name: &str) -> Result<Vec<Tag>> {
        let response = self
            .elb_client
            .describe_tags()
            .load_balancer_names(name)
            .send()
            .await
            .inspect_err(|err| error!(?err, ?name, "DescribeTags failed"))?;
        Ok(response
            .tag_descriptions()
            .first()
            .map(|description| from_elb_tags(description.tags()))
            .unwrap_or_default())
    }

    async fn describe_instances(&self, ids: &[String]) -> Result<Vec<Instance>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .ec2_client
            .describe_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
            .inspect_err(|err| error!(?err, ?ids, "DescribeInstances failed"))?;
        let mut instances = Vec::new();
        for reservation in response.reservations() {
            for instance in reservation.instances() {
                let Some(id) = instance.instance_id() else {
                    continue;
                };
                instances.push(Instance {
                    id: id.to_owned(),
                    tags: from_ec2_tags(instance.tags()),
                    image_id: instance.image_id().map(ToOwned::to_owned),
                });
            }
        }
        Ok(instances)
    }

    async fn describe_image(&self, image_id: &str) -> Result<Image> {
        let response = match self
            .ec2_client
            .describe_images()
            .image_ids(image_id)
            .send()
            .await
        {
            Ok(response) => response,
            // A deregistered or inaccessible image contributes no tags; any
            // other provider error surfaces to the caller.
            Err(err) if err.code().is_some_and(|code| code.starts_with("InvalidAMIID")) => {
                debug!(?image_id, "Image not available, treating as untagged");
                return Ok(Image::untagged(image_id));
            }
            Err(err) => return Err(err.into()),
        };
        match response.images().first() {
            Some(image) => Ok(Image {
                id: image.image_id().unwrap_or(image_id).to_owned(),
                tags: from_ec2_tags(image.tags()),
                owner_id: image.owner_id().map(ToOwned::to_owned),
            }),
            None => {
                debug!(?image_id, "Image no longer exists, treating as untagged");
                Ok(Image::untagged(image_id))
            }
        }
    }

    async fn apply_load_balancer_tags(&self, name: &str, tags: &[Tag]) -> Result<()> {
        if self.dry_run {
            info!(?name, ?tags, "Dry run: would tag load balancer");
            return Ok(());
        }
        let mut builder = self.elb_client.add_tags().load_balancer_names(name);
        for tag in tags {
            builder = builder.tags(to_elb_tag(tag)?);
        }
        let result = builder
            .send()
            .await
            .inspect_err(|err| error!(?err, ?name, "AddTags failed"))?;
        debug!(?result, ?name, "Load balancer tagged");
        Ok(())
    }
}

fn from_elb_tags(tags: &[ElbTag]) -> Vec<Tag> {
    tags.iter()
        .map(|t| Tag::new(t.key(), t.value().unwrap_or_default()))
        .collect()
}

fn to_elb_tag(tag: &Tag) -> Result<ElbTag> {
    ElbTag::builder()
        .key(tag.key.clone())
        .value(tag.value.clone())
        .build()
        .map_err(|err| Error::Cloud(Box::new(err)))
}

fn from_ec2_tags(tags: &[Ec2Tag]) -> Vec<Tag> {
    tags.iter()
        .filter_map(|t| {
            t.key()
                .map(|key| Tag::new(key, t.value().unwrap_or_default()))
        })
        .collect()
}

impl<R: Debug + Send + Sync + 'static, E: std::error::Error + Sync + Send + 'static>
    From<SdkError<E, R>> for Error
{
    fn from(err: SdkError<E, R>) -> Self {
        match err {
            // Unpack this because the Display form of the service error is much more informative,
            // including the actual message from the service. The top level error is often just
            // "service error".
            SdkError::ServiceError(service_error) => {
                Error::Cloud(Box::new(service_error.into_err()))
            }
            _ => Error::Cloud(Box::new(err)),
        }
    }
}
