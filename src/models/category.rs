use serde::{Deserialize, Serialize};

use super::TransactionType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(rename = "type")]
    pub r#type: TransactionType,
}
