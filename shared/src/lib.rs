//! Shared types for the DineLink ordering platform
//!
//! Common types used by the server and its clients: the order/table
//! data model, the realtime wire message contract and the table-side
//! session token.

pub mod message;
pub mod order;
pub mod session;
pub mod table;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use message::{ClientMessage, ServerMessage};
pub use order::{Order, OrderDraft, OrderStatus};
pub use session::TableSession;
pub use table::Table;
