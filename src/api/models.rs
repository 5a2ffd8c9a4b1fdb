use serde::{Deserialize, Serialize};

pub use resource::ResourceMeta;

pub mod upload {
    use super::*;
    use chrono::{DateTime, Utc};

    /// Returned both when a session is created and when an existing one is
    /// queried. A new session has no parts yet; a queried one carries no id
    /// and usually no limits.
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct UploadInfo {
        #[serde(default)]
        pub upload_id: String,
        #[serde(default)]
        pub expires: Option<DateTime<Utc>>,
        #[serde(default)]
        pub min_part_size: u64,
        #[serde(default)]
        pub max_part_size: u64,
        #[serde(default)]
        pub max_parts: u32,
        #[serde(default)]
        pub parts: Vec<PartStatus>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct PartStatus {
        #[serde(default)]
        pub hash: String,
        #[serde(default)]
        pub size: u64,
        #[serde(default)]
        pub complete: bool,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct PartRef {
        pub hash: String,
        pub size: u64,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct FinishUploadRequest {
        pub parts: Vec<PartRef>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct FinishUploadResponse {
        pub hash: String,
    }
}

pub mod resource {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct ResourceMeta {
        pub name: String,
        #[serde(rename = "Type")]
        pub kind: String,
        #[serde(default)]
        pub path: String,
        #[serde(default)]
        pub description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub revision: Option<u64>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct RevisionResponse {
        pub revision: u64,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct DockerResourceRequest {
        pub digest: String,
        #[serde(skip_serializing_if = "String::is_empty")]
        pub image_name: String,
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::resource::*;
    use super::upload::*;
    use serde_json::json;

    #[test]
    fn test_upload_info_parses_store_fields() {
        let info: UploadInfo = serde_json::from_value(json!({
            "UploadId": "u-1",
            "Expires": "2026-10-20T10:00:00Z",
            "MinPartSize": 5242880,
            "MaxPartSize": 1073741824,
            "MaxParts": 400,
            "Parts": [{"Hash": "abc", "Size": 10, "Complete": true}]
        }))
        .unwrap();

        assert_eq!(info.upload_id, "u-1");
        assert!(info.expires.is_some());
        assert_eq!(info.max_parts, 400);
        assert_eq!(info.parts.len(), 1);
        assert!(info.parts[0].complete);
    }

    #[test]
    fn test_upload_status_without_id_or_limits() {
        let info: UploadInfo = serde_json::from_value(json!({
            "Expires": "2026-10-20T10:00:00Z",
            "Parts": [{"Hash": "abc", "Size": 4, "Complete": true}]
        }))
        .unwrap();

        assert!(info.upload_id.is_empty());
        assert_eq!(info.min_part_size, 0);
        assert_eq!(info.parts[0].size, 4);
    }

    #[test]
    fn test_docker_request_omits_empty_image_name() {
        let body = serde_json::to_value(DockerResourceRequest {
            digest: "sha256:abc".to_string(),
            image_name: String::new(),
        })
        .unwrap();
        assert_eq!(body, json!({"Digest": "sha256:abc"}));
    }

    #[test]
    fn test_resource_meta_type_field() {
        let meta: ResourceMeta = serde_json::from_value(json!({
            "Name": "website",
            "Type": "file",
            "Path": "site.tgz"
        }))
        .unwrap();
        assert_eq!(meta.kind, "file");
        assert_eq!(meta.path, "site.tgz");
        assert!(meta.description.is_empty());
        assert!(meta.revision.is_none());
    }

    #[test]
    fn test_finish_request_shape() {
        let body = serde_json::to_value(FinishUploadRequest {
            parts: vec![PartRef {
                hash: "h".to_string(),
                size: 3,
            }],
        })
        .unwrap();
        assert_eq!(body, json!({"Parts": [{"Hash": "h", "Size": 3}]}));
    }
}
