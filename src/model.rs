use serde::{Deserialize, Serialize};

/// One fighter as listed on the stats site, plus an optional portrait.
///
/// Built once by the row extractor and moved into the batch unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FighterRecord {
    pub first_name: String,
    pub last_name: String,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub image_url: Option<String>,
}

impl FighterRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
