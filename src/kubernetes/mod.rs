mod age;
mod label_selector;
mod resources;

pub use age::reference_time;
pub use label_selector::LabelSelector;
pub use resources::{
    ConfigMaps, Kind, ResourceKind, RowContext, Secrets, ServiceAccounts, Services, format_pairs,
};
