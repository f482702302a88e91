//! Terminal execution handlers.
//!
//! Mutually exclusive: `execution_strategy` is the sole discriminator,
//! and exactly one handler's guard evaluates true for any context. The
//! standard handler is the default when no enricher overrode the
//! strategy.

mod agent_chat;
mod code_interpreter;
mod standard;

pub use agent_chat::AgentChatHandler;
pub use code_interpreter::CodeInterpreterChatHandler;
pub use standard::StandardChatHandler;

#[cfg(test)]
mod tests {
    use crate::context::ExecutionStrategy;
    use crate::stage::Stage;
    use crate::test_support;

    #[test]
    fn exactly_one_handler_guard_is_true_per_strategy() {
        let services = test_support::container();
        let handlers: Vec<Box<dyn Stage>> = vec![
            Box::new(super::StandardChatHandler::new(services.clone())),
            Box::new(super::AgentChatHandler::new(services.clone())),
            Box::new(super::CodeInterpreterChatHandler::new(services)),
        ];

        for strategy in [
            ExecutionStrategy::Standard,
            ExecutionStrategy::Agent,
            ExecutionStrategy::CodeInterpreter,
        ] {
            let mut ctx = test_support::context();
            ctx.execution_strategy = strategy;
            let matching = handlers.iter().filter(|h| h.should_run(&ctx)).count();
            assert_eq!(matching, 1, "strategy {strategy:?}");
        }
    }
}
