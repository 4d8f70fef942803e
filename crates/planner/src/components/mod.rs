pub mod coordinator;
pub mod refresher;
pub mod simal_client;
pub mod store;
pub mod timeline;

pub use coordinator::{EditForm, RescheduleCoordinator};
pub use refresher::{ApplyFn, FetchFn, PollingRefresher};
pub use simal_client::SimalClient;
pub use store::SchedulingStore;
pub use timeline::{TimelineConfig, TimelineTask};
