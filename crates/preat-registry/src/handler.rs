use preat_assert::{AssertionControl, EventMask, InputHandle, INVALID_EVENT};
use preat_frame::{Outcome, Param};

/// Access a method has to the rest of the target while it runs.
///
/// Output methods executed under an open assertion get a context without
/// the assertion; every other call can reach it.
pub struct MethodContext<'a> {
    assertion: Option<&'a mut dyn AssertionControl>,
}

impl<'a> MethodContext<'a> {
    pub fn new(assertion: &'a mut dyn AssertionControl) -> Self {
        Self {
            assertion: Some(assertion),
        }
    }

    /// A context with no assertion attached.
    pub fn detached() -> Self {
        Self { assertion: None }
    }

    pub fn assertion(&mut self) -> Option<&mut (dyn AssertionControl + 'a)> {
        self.assertion.as_deref_mut()
    }

    /// True if an assertion is open and reachable from this call.
    pub fn assertion_open(&self) -> bool {
        self.assertion
            .as_deref()
            .is_some_and(|assertion| assertion.is_open())
    }

    /// Attach an input to the open assertion; [`INVALID_EVENT`] if there is none.
    pub fn register_event(&mut self, input: Box<dyn InputHandle>) -> EventMask {
        match self.assertion.as_deref_mut() {
            Some(assertion) => assertion.register_event(input),
            None => INVALID_EVENT,
        }
    }
}

impl std::fmt::Debug for MethodContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodContext")
            .field("assertion_open", &self.assertion_open())
            .finish()
    }
}

/// A remotely invokable method.
///
/// Parameters have already been checked against the declared signature;
/// range checks are the handler's job.
pub trait Handler: Send + Sync {
    fn invoke(&self, ctx: &mut MethodContext<'_>, params: &[Param]) -> Outcome;
}

/// Handler backed by a closure. Build with [`handler_fn`].
pub struct FnHandler<F>(F);

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&mut MethodContext<'_>, &[Param]) -> Outcome + Send + Sync,
{
    FnHandler(f)
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut MethodContext<'_>, &[Param]) -> Outcome + Send + Sync,
{
    fn invoke(&self, ctx: &mut MethodContext<'_>, params: &[Param]) -> Outcome {
        (self.0)(ctx, params)
    }
}
