pub mod difficulty_matrix;
pub mod item_properties;
pub mod node;
pub mod review_item;
pub mod review_session;
pub mod scheduler;
pub mod session_summary;

pub use difficulty_matrix::{DifficultyMatrix, MatrixEntry, SharedMatrix};
pub use item_properties::{CARD_TYPE_KEY, ItemProperties, PropertyMap, SCHEDULING_KEYS};
pub use node::{Node, NodeId};
pub use review_item::{DisplayConfig, ItemVariant, Phase, Reveal, ReviewItem};
pub use review_session::{CompletionCallback, Outcome, ReviewSession, Tally};
pub use scheduler::{ScheduleOutcome, compute_next};
pub use session_summary::SessionSummary;
