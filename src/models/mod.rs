mod event;
mod reading;
mod session;

pub use event::{Event, EventKind};
pub use reading::{Detection, Reading};
pub use session::{parse_session_timestamp, ScanSession, SESSION_ID_FORMAT};
