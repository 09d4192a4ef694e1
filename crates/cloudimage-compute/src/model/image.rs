use super::{Progress, ResourceState, ServerDeployment};
use serde::{Deserialize, Serialize};

/// A provider-supplied operating system image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsImage {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub datacenter_id: String,
}

/// A reusable image created from a server clone or an OVF import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerImage {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub datacenter_id: String,

    #[serde(default)]
    pub state: ResourceState,

    #[serde(default)]
    pub progress: Option<Progress>,
}

/// Either kind of image a server can be deployed from
#[derive(Debug, Clone, PartialEq)]
pub enum Image {
    Os(OsImage),
    Customer(CustomerImage),
}

impl Image {
    pub fn id(&self) -> &str {
        match self {
            Image::Os(image) => &image.id,
            Image::Customer(image) => &image.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Image::Os(image) => &image.name,
            Image::Customer(image) => &image.name,
        }
    }

    pub fn datacenter_id(&self) -> &str {
        match self {
            Image::Os(image) => &image.datacenter_id,
            Image::Customer(image) => &image.datacenter_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Image::Os(_) => "OS",
            Image::Customer(_) => "customer",
        }
    }

    pub fn as_customer_image(&self) -> Option<&CustomerImage> {
        match self {
            Image::Customer(image) => Some(image),
            Image::Os(_) => None,
        }
    }

    /// Point a server deployment at this image.
    pub fn apply_to(&self, deployment: &mut ServerDeployment) {
        deployment.image_id = self.id().to_string();
    }
}

/// Request body for `image/importImage`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageImport {
    /// OVF package name (the `.mf` file name prefix on the FTPS host)
    #[serde(rename = "ovfPackage")]
    pub ovf_package_prefix: String,

    pub name: String,

    pub description: String,

    pub datacenter_id: String,

    pub guest_os_customization: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_to_deployment() {
        let image = Image::Customer(CustomerImage {
            id: "img-A".to_string(),
            name: "base".to_string(),
            ..Default::default()
        });

        let mut deployment = ServerDeployment::default();
        image.apply_to(&mut deployment);
        assert_eq!(deployment.image_id, "img-A");
        assert!(image.as_customer_image().is_some());
        assert_eq!(image.kind(), "customer");
    }

    #[test]
    fn test_import_request_shape() {
        let import = ImageImport {
            ovf_package_prefix: "my-package".to_string(),
            name: "img-B".to_string(),
            description: "img-B (created by CloudImage)".to_string(),
            datacenter_id: "AU9".to_string(),
            guest_os_customization: true,
        };

        let value = serde_json::to_value(&import).unwrap();
        assert_eq!(value["ovfPackage"], "my-package");
        assert_eq!(value["datacenterId"], "AU9");
        assert_eq!(value["guestOsCustomization"], true);
    }
}
