/// Event contracts between the composer, the session and the host channel.
pub mod events;
/// Ordered transcript with the streaming merge rule.
pub mod log;
pub mod message;
pub mod message_input;
pub mod message_list;
pub mod scroll_manager;
pub mod session;
pub mod state;
pub mod view;

pub use events::{AssistantDelta, Submit, decode_assistant_delta};
pub use log::{AssistantUpdate, MessageLog};
pub use message::{ChatMessage, MessageId, Role};
pub use message_input::MessageInput;
pub use message_list::MessageList;
pub use scroll_manager::ScrollManager;
pub use session::{ChatSession, ChatSessionEvent};
pub use state::{ChatState, PreparedSend, SendRejection};
pub use view::ChatView;
