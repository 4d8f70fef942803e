pub mod conflict;
pub mod entities;
pub mod events;
pub mod ports;
pub mod value_objects;

pub use conflict::*;
pub use entities::*;
pub use events::*;
pub use ports::*;
pub use value_objects::*;
pub use workbench_errors::{WorkbenchError, WorkbenchResult};
