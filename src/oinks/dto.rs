use serde::{Deserialize, Serialize};

use super::repo_types::{Oink, OinkWithCreator};

#[derive(Debug, Deserialize)]
pub struct CreateOinkRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedOinkResponse {
    pub oink: Oink,
}

#[derive(Debug, Serialize)]
pub struct OinkResponse {
    pub oink: OinkWithCreator,
}

#[derive(Debug, Serialize)]
pub struct OinkListResponse {
    pub oinks: Vec<OinkWithCreator>,
}
