pub mod apply;
pub mod event_loop;
pub mod notice;
pub mod seq;
pub mod session;

pub use apply::{ApplyOutcome, ApplyPlan, ApplyTarget, RecordInstructions};
pub use event_loop::{EventLoop, Intent, LoopHandle, Response};
pub use notice::{Notice, NoticeLevel};
pub use seq::Slot;
pub use session::{DashboardView, Session, SessionSettings};
