pub mod types;

pub use types::BlockRange;
pub use types::ErrorReply;
pub use types::StoredValue;
pub use types::UpdateEvent;
pub use types::ValueReply;
pub use types::WriteRequest;

pub type BlockNr = u64;
pub type ChainId = u64;
