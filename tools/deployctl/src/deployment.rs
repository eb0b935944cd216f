//! Deployment resource model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the container created by default.
pub const DEFAULT_CONTAINER: &str = "nginx";

/// Errors in deployment inputs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DeploymentError {
    #[error("version must not be empty")]
    EmptyVersion,

    #[error("invalid version '{0}': must not contain ':', '/', '@' or whitespace")]
    InvalidVersion(String),

    #[error("image must not be empty")]
    EmptyImage,
}

/// A port exposed by a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPort {
    pub name: String,
    pub container_port: u16,
}

/// A container in the pod template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
}

/// Template for the pods a deployment runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PodTemplate {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub containers: Vec<Container>,
}

/// Desired state of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub replicas: u32,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
    pub template: PodTemplate,
}

impl DeploymentSpec {
    /// Single-container deployment of `image` labelled `app=<container>`.
    pub fn single_container(
        container: &str,
        image: impl Into<String>,
        port: u16,
        replicas: u32,
    ) -> Self {
        let labels: BTreeMap<String, String> =
            [("app".to_string(), container.to_string())].into_iter().collect();

        Self {
            replicas,
            selector: labels.clone(),
            template: PodTemplate {
                labels,
                containers: vec![Container {
                    name: container.to_string(),
                    image: image.into(),
                    ports: vec![ContainerPort {
                        name: "http".to_string(),
                        container_port: port,
                    }],
                }],
            },
        }
    }

    /// Image of the first container.
    pub fn image(&self) -> Option<&str> {
        self.template.containers.first().map(|c| c.image.as_str())
    }

    /// Set the image of the first container.
    ///
    /// A template without containers gets the default container.
    pub fn set_image(mut self, image: &str) -> Self {
        match self.template.containers.first_mut() {
            Some(container) => container.image = image.to_string(),
            None => self.template.containers.push(Container {
                name: DEFAULT_CONTAINER.to_string(),
                image: image.to_string(),
                ports: Vec::new(),
            }),
        }
        self
    }

    /// Set the replica count.
    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }
}

/// Build `<repository>:<version>`, rejecting versions that would make a
/// different image reference.
pub fn image_for(repository: &str, version: &str) -> Result<String, DeploymentError> {
    let version = version.trim();
    if version.is_empty() {
        return Err(DeploymentError::EmptyVersion);
    }
    if version
        .chars()
        .any(|c| c == ':' || c == '/' || c == '@' || c.is_whitespace())
    {
        return Err(DeploymentError::InvalidVersion(version.to_string()));
    }
    Ok(format!("{}:{}", repository, version))
}
