//! One handler slot of a task

use crate::subscriber::traits::{Condition, Dispatcher, ResultValidator};
use std::fmt;

/// Condition, dispatcher and result validator used for one kind of callback.
/// A slot without a dispatcher is never built, so every `Subscriber` can
/// deliver.
pub struct Subscriber {
    condition: Option<Box<dyn Condition>>,
    dispatcher: Box<dyn Dispatcher>,
    result: Option<Box<dyn ResultValidator>>,
}

impl Subscriber {
    pub fn new(dispatcher: Box<dyn Dispatcher>) -> Self {
        Self {
            condition: None,
            dispatcher,
            result: None,
        }
    }

    pub fn with_condition(mut self, condition: Box<dyn Condition>) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_result(mut self, result: Box<dyn ResultValidator>) -> Self {
        self.result = Some(result);
        self
    }

    pub fn condition(&self) -> Option<&dyn Condition> {
        self.condition.as_deref()
    }

    pub fn dispatcher(&self) -> &dyn Dispatcher {
        self.dispatcher.as_ref()
    }

    pub fn result(&self) -> Option<&dyn ResultValidator> {
        self.result.as_deref()
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("condition", &self.condition.as_ref().map(|c| c.kind()))
            .field("dispatcher", &self.dispatcher.kind())
            .field("result", &self.result.as_ref().map(|r| r.kind()))
            .finish()
    }
}
