//! Multiplayer position sync: throttled publishing, last-write-wins inbox,
//! interpolated remote boats and once-only finish persistence

pub mod channel;
pub mod finish;
pub mod link;
pub mod mailbox;
pub mod publisher;
pub mod remote;

pub use channel::{LocalBus, LocalChannel, SyncChannel};
pub use finish::{FinishRecord, FinishReporter};
pub use link::{local_peer_state, MatchLink};
pub use mailbox::Mailbox;
pub use publisher::StatePublisher;
pub use remote::RemoteBoat;
