//! Cloud-independent descriptions of the resources in a fleet.
//!
//! These are parsed/interpreted from the raw descriptions returned by the
//! cloud; nothing is cached between runs.

use serde::Serialize;

use crate::tags::Tag;

/// A load balancer and the instances bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancer {
    pub name: String,
    /// Ids of the instances currently registered with this load balancer.
    pub instance_ids: Vec<String>,
}

/// An instance that can serve as a tagging source for a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instance {
    pub id: String,
    pub tags: Vec<Tag>,
    /// The image the instance was launched from, if it is still known.
    pub image_id: Option<String>,
}

/// The source image of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub id: String,
    pub tags: Vec<Tag>,
    /// Owner account, for diagnostics only; the tag rules never look at it.
    pub owner_id: Option<String>,
}

impl Image {
    /// An image whose tags could not be retrieved behaves as if it had none.
    pub fn untagged(id: &str) -> Image {
        Image {
            id: id.to_owned(),
            tags: Vec::new(),
            owner_id: None,
        }
    }
}
