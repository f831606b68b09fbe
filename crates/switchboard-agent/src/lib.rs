pub mod dispatcher;
pub mod evaluator;
pub mod narrator;
pub mod router;
pub mod session;

pub use dispatcher::{DispatchPolicy, Dispatcher};
pub use evaluator::Evaluator;
pub use narrator::Narrator;
pub use router::Router;
pub use session::{SessionController, SessionPolicy};
