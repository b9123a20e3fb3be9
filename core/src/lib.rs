pub mod decision;
pub mod engine;
pub mod error;
pub mod executor;
pub mod fix;
pub mod identity;
pub mod interpreter;
pub mod message;
pub mod policy;
pub mod prompt;
pub mod task;

pub use decision::{Confidence, DecisionRecord};
pub use engine::{EngineError, ReasoningEngine};
pub use executor::{AnalysisExecutor, ExecutionMode, ExecutionOutcome, ExecutionRequest};
pub use identity::SessionKey;
pub use interpreter::ResponseInterpreter;
pub use message::{AnalysisRequest, Message, Part, Role};
pub use policy::FailurePolicy;
pub use task::{InMemoryTaskRegistry, Task, TaskError, TaskRegistry, TaskState};
