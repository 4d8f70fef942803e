pub mod components;
pub mod service;

pub use components::{
    EditForm, PollingRefresher, RescheduleCoordinator, SchedulingStore, SimalClient, TimelineConfig,
    TimelineTask,
};
pub use service::PlannerService;
