//! Serializable summaries of a model

use serde::{Deserialize, Serialize};

use crate::DeckModel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckCapabilities {
    pub model: DeckModel,
    pub product_id: u16,
    pub icon_size: usize,
    pub columns: usize,
    pub rows: usize,
    pub key_count: usize,
}

impl From<DeckModel> for DeckCapabilities {
    fn from(model: DeckModel) -> Self {
        let spec = model.spec();
        Self {
            model,
            product_id: spec.product_id,
            icon_size: spec.icon_size,
            columns: spec.columns,
            rows: spec.rows,
            key_count: spec.key_count(),
        }
    }
}
