use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct TransformQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProxyQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyDimensionsQuery {
    pub url: Option<String>,
    pub secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFileRequest {
    pub secret: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteBatchRequest {
    pub secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl DeletedResponse {
    pub fn file() -> Self {
        Self {
            status: "deleted",
            count: None,
        }
    }

    pub fn batch(count: usize) -> Self {
        Self {
            status: "deleted",
            count: Some(count),
        }
    }
}
