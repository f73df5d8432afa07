use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Company fundamentals, best effort
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fundamentals {
    /// Provider that supplied the data
    pub source: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,

    /// Trailing price-to-earnings ratio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl Fundamentals {
    /// True when the provider returned nothing beyond its own name.
    pub fn is_blank(&self) -> bool {
        self.name.is_none()
            && self.sector.is_none()
            && self.industry.is_none()
            && self.market_cap.is_none()
            && self.pe_ratio.is_none()
    }
}
