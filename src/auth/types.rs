// Authentication types

use serde::Deserialize;

/// Refresh endpoint success body
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: Option<String>,
}
