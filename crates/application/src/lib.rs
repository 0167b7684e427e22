//! 实时核心
//!
//! 连接注册表、房间管理、事件中枢、在线状态清扫器。
//! 所有共享可变状态都集中在这里，传输层只负责帧的收发。

pub mod clock;
pub mod events;
pub mod hub;
pub mod registry;
pub mod rooms;
pub mod router;
pub mod sweeper;
pub mod typing;

pub use clock::{Clock, SystemClock};
pub use events::*;
pub use hub::EventHub;
pub use registry::{AdmitOutcome, ConnectionRegistry};
pub use rooms::RoomManager;
pub use router::{ConnectionRouter, EventSender};
pub use sweeper::PresenceSweeper;
pub use typing::TypingTracker;
