use serde::Deserialize;

use crate::model::{Deal, Store};

#[derive(Deserialize, Debug)]
pub struct DealsPageResp {
    pub deals: Vec<Deal>,
    pub has_next_page: bool,
}

#[derive(Deserialize, Debug)]
pub struct StoreSearchResp {
    pub stores: Vec<Store>,
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
    #[serde(rename = "totalFound", default)]
    pub total_found: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
pub struct SubscriptionResp {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Reply of the store manager's edit and delete views.
#[derive(Deserialize, Debug, Default)]
pub struct StoreChangeResp {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
