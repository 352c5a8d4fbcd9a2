//! Runtime API: shared solver, background planning, event delivery and the
//! session that wires them together

pub mod events;
pub mod planning;
pub mod session;
pub mod shared;

pub use events::{CallbackHandle, EventBus, EventCallback};
pub use planning::{PlanResult, PlanningWorker};
pub use session::NavigationSession;
pub use shared::SharedPositionSolver;
