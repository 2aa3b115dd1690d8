pub mod bus;
pub mod frontend;
pub mod r#loop;
pub mod session;
pub mod snapshot;

pub use bus::{EventBus, SubscriptionId};
pub use frontend::{FrontendAdapter, ScrollAction, UserInputEvent};
pub use r#loop::{HostCommand, Runtime};
pub use session::TerminalSession;
pub use snapshot::SessionSnapshotManager;
