//! Handler construction shared by the command handlers.

use super::super::CliContext;

/// Trait for handlers that can be created from a CLI context
pub trait HandlerFactory<'a> {
    type Handler;

    fn create(context: &'a CliContext) -> Self::Handler;
}

/// Implements [`HandlerFactory`] for a handler with a `new(&CliContext)`
macro_rules! impl_context_handler {
    ($handler:ty) => {
        impl<'a> crate::cli::handlers::traits::HandlerFactory<'a> for $handler {
            type Handler = Self;

            fn create(context: &'a crate::cli::CliContext) -> Self::Handler {
                Self::new(context)
            }
        }
    };
}

pub(crate) use impl_context_handler;

pub struct HandlerBuilder<'a> {
    context: &'a CliContext,
}

impl<'a> HandlerBuilder<'a> {
    pub fn new(context: &'a CliContext) -> Self {
        Self { context }
    }

    pub fn create_with_context<F>(&self) -> F::Handler
    where
        F: HandlerFactory<'a>,
    {
        F::create(self.context)
    }
}
