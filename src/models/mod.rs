pub mod call;
pub mod caller;
pub mod trip;

pub use call::{CallEventKind, CallOutcome, CallStatus, RawCallNotification, ResolvedCall};
pub use caller::CallerId;
pub use trip::{ActivityEntry, TripSession, MAX_TRIP_HISTORY};
