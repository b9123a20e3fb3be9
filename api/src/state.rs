use std::sync::Arc;

use rollout_core::engine::ReasoningEngine;
use rollout_core::executor::AnalysisExecutor;
use rollout_core::interpreter::ResponseInterpreter;
use rollout_core::task::TaskRegistry;

use crate::config::ServiceConfig;

#[derive(Clone)]
pub struct AppState {
    pub executor: AnalysisExecutor,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(
        engine: Arc<dyn ReasoningEngine>,
        registry: Arc<dyn TaskRegistry>,
        config: ServiceConfig,
    ) -> Self {
        let executor = AnalysisExecutor::new(engine, registry)
            .with_policy(config.failure_policy)
            .with_interpreter(
                ResponseInterpreter::new().with_explicit_confidence(config.explicit_confidence),
            );
        Self {
            executor,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rollout_core::engine::EngineError;
    use rollout_core::identity::SessionKey;
    use rollout_core::task::InMemoryTaskRegistry;

    use super::*;

    /// Engine answering from a script; records the session key of each call
    /// (`None` for stateless calls).
    #[derive(Default)]
    pub struct ScriptedEngine {
        answers: Mutex<VecDeque<Result<String, String>>>,
        pub sessions: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedEngine {
        pub fn answering(answers: &[&str]) -> Arc<Self> {
            let engine = Self::default();
            engine
                .answers
                .lock()
                .unwrap()
                .extend(answers.iter().map(|a| Ok(a.to_string())));
            Arc::new(engine)
        }

        pub fn failing(error: &str) -> Arc<Self> {
            let engine = Self::default();
            engine.answers.lock().unwrap().push_back(Err(error.to_string()));
            Arc::new(engine)
        }

        fn next(&self) -> Result<String, EngineError> {
            match self.answers.lock().unwrap().pop_front() {
                Some(Ok(answer)) => Ok(answer),
                Some(Err(error)) => Err(EngineError::Transport(error)),
                None => Err(EngineError::Transport("script exhausted".to_string())),
            }
        }
    }

    #[async_trait]
    impl ReasoningEngine for ScriptedEngine {
        async fn chat(&self, session: &SessionKey, _prompt: &str) -> Result<String, EngineError> {
            self.sessions
                .lock()
                .unwrap()
                .push(Some(session.as_str().to_string()));
            self.next()
        }

        async fn chat_stateless(&self, _prompt: &str) -> Result<String, EngineError> {
            self.sessions.lock().unwrap().push(None);
            self.next()
        }
    }

    pub fn state_with(engine: Arc<ScriptedEngine>) -> AppState {
        AppState::new(
            engine,
            Arc::new(InMemoryTaskRegistry::new()),
            ServiceConfig::default(),
        )
    }
}
