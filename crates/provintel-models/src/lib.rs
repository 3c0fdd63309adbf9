pub mod config;
pub mod criteria;
pub mod provider;

pub use config::{IntelligenceConfig, LedgerConfig, ProvintelConfig, StatusConfig};
pub use criteria::{Priority, ScoreBreakdown, SelectionCriteria, Weights};
pub use provider::{
    Capability, ClusterSnapshot, LedgerInfo, ParseWarning, ProviderRecord, ResourceSummary,
    DATACENTER_ATTRIBUTE, NVIDIA_GPU_ATTRIBUTE, REGION_ATTRIBUTE, TIER_ATTRIBUTE,
};
