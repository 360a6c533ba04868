use std::fmt;
use std::time::Duration;

use preat_frame::{ErrorCode, Outcome};
use tracing::{debug, trace, warn};

use crate::events::{EventMask, EventWait, INVALID_EVENT, MAX_EVENTS};

/// Default number of inputs one assertion may track.
pub const DEFAULT_MAX_INPUTS: usize = 8;

/// Configuration for the assertion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssertionConfig {
    /// Upper bound on inputs declared by `start`. Default: 8; never above 32.
    pub max_inputs: usize,
}

impl AssertionConfig {
    /// `max_inputs`, limited to what an event mask can address.
    pub fn effective_max_inputs(&self) -> usize {
        self.max_inputs.min(MAX_EVENTS)
    }
}

impl Default for AssertionConfig {
    fn default() -> Self {
        Self {
            max_inputs: DEFAULT_MAX_INPUTS,
        }
    }
}

/// An input that reports events to an open assertion.
pub trait InputHandle: Send {
    /// Stop reporting events. Called exactly once when the assertion ends.
    fn stop(&mut self);
}

/// Single-shot timed correlation of an output action against input events.
///
/// `start` opens the assertion, input methods attach with `register_event`,
/// and the next output method runs through `execute`, which always leaves
/// the assertion idle again.
pub struct Assertion<W> {
    waiter: W,
    config: AssertionConfig,
    delay: Duration,
    timeout: Duration,
    declared: usize,
    inputs: Vec<Box<dyn InputHandle>>,
    active: bool,
}

impl<W: EventWait> Assertion<W> {
    pub fn new(waiter: W) -> Self {
        Self::with_config(waiter, AssertionConfig::default())
    }

    pub fn with_config(waiter: W, config: AssertionConfig) -> Self {
        Self {
            waiter,
            inputs: Vec::with_capacity(config.effective_max_inputs()),
            config,
            delay: Duration::ZERO,
            timeout: Duration::ZERO,
            declared: 0,
            active: false,
        }
    }

    /// Open an assertion expecting `declared_inputs` input registrations.
    pub fn start(&mut self, delay: Duration, timeout: Duration, declared_inputs: usize) -> Outcome {
        if self.active {
            warn!("assertion started while another is open");
            return Err(ErrorCode::Redefined);
        }
        let max = self.config.effective_max_inputs();
        if declared_inputs > max {
            warn!(declared_inputs, max, "assertion declares too many inputs");
            return Err(ErrorCode::Generic);
        }

        self.delay = delay;
        self.timeout = timeout;
        self.declared = declared_inputs;
        self.inputs.clear();
        self.active = true;
        debug!(?delay, ?timeout, declared_inputs, "assertion opened");
        Ok(())
    }

    /// Attach an input to the open assertion.
    ///
    /// Returns the event bit the input must signal, or [`INVALID_EVENT`] if no
    /// assertion is open or every declared input is already attached. A
    /// rejected handle is dropped without being stopped.
    pub fn register_event(&mut self, input: Box<dyn InputHandle>) -> EventMask {
        if !self.active || self.inputs.len() >= self.declared {
            debug!(
                active = self.active,
                defined = self.inputs.len(),
                declared = self.declared,
                "input registration rejected"
            );
            return INVALID_EVENT;
        }
        let id = 1 << self.inputs.len();
        self.inputs.push(input);
        trace!(id, defined = self.inputs.len(), "input registered");
        id
    }

    /// Run `output` under the open assertion and wait for the expected events.
    ///
    /// `output` is only called if every declared input is attached. Attached
    /// inputs are stopped, in registration order, whatever the outcome.
    pub fn execute<F>(&mut self, output: F) -> Outcome
    where
        F: FnOnce() -> Outcome,
    {
        let outcome = if self.inputs.len() != self.declared {
            Err(ErrorCode::Undefined)
        } else {
            output().and_then(|()| self.wait_for_inputs())
        };

        if let Err(code) = outcome {
            warn!(error = code.name(), "assertion failed");
        } else {
            debug!("assertion passed");
        }
        self.close();
        outcome
    }

    fn wait_for_inputs(&self) -> Outcome {
        let expected = expected_mask(self.inputs.len());

        // Occurrences before each window are discarded.
        self.waiter.clear_events(expected);
        if self.waiter.wait_events(expected, self.delay, false) != 0 {
            return Err(ErrorCode::TooEarly);
        }

        self.waiter.clear_events(expected);
        if self.waiter.wait_events(expected, self.timeout, true) != expected {
            return Err(ErrorCode::Timeout);
        }
        Ok(())
    }

    /// Abandon the open assertion, stopping any attached input.
    pub fn clear(&mut self) {
        if self.active {
            debug!(defined = self.inputs.len(), "assertion cleared");
        }
        self.close();
    }

    fn close(&mut self) {
        for input in &mut self.inputs {
            input.stop();
        }
        self.inputs.clear();
        self.declared = 0;
        self.active = false;
    }

    /// True between a successful `start` and the following `execute` or `clear`.
    pub fn is_open(&self) -> bool {
        self.active
    }

    pub fn declared_inputs(&self) -> usize {
        self.declared
    }

    pub fn defined_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn config(&self) -> &AssertionConfig {
        &self.config
    }

    /// The event source the assertion waits on.
    pub fn waiter(&self) -> &W {
        &self.waiter
    }
}

/// What method handlers may do with the assertion during dispatch.
pub trait AssertionControl {
    fn start(&mut self, delay: Duration, timeout: Duration, declared_inputs: usize) -> Outcome;
    fn register_event(&mut self, input: Box<dyn InputHandle>) -> EventMask;
    fn is_open(&self) -> bool;
}

impl<W: EventWait> AssertionControl for Assertion<W> {
    fn start(&mut self, delay: Duration, timeout: Duration, declared_inputs: usize) -> Outcome {
        Assertion::start(self, delay, timeout, declared_inputs)
    }

    fn register_event(&mut self, input: Box<dyn InputHandle>) -> EventMask {
        Assertion::register_event(self, input)
    }

    fn is_open(&self) -> bool {
        Assertion::is_open(self)
    }
}

impl<W> fmt::Debug for Assertion<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assertion")
            .field("active", &self.active)
            .field("delay", &self.delay)
            .field("timeout", &self.timeout)
            .field("declared", &self.declared)
            .field("defined", &self.inputs.len())
            .finish()
    }
}

fn expected_mask(defined: usize) -> EventMask {
    if defined >= MAX_EVENTS {
        EventMask::MAX
    } else {
        (1 << defined) - 1
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    const DELAY: Duration = Duration::from_millis(100);
    const TIMEOUT: Duration = Duration::from_millis(5000);

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Clear(EventMask),
        Wait {
            mask: EventMask,
            timeout: Duration,
            wait_for_all: bool,
        },
    }

    /// Records every call and answers waits from a script.
    #[derive(Default)]
    struct ScriptedEvents {
        calls: RefCell<Vec<Call>>,
        answers: RefCell<VecDeque<EventMask>>,
    }

    impl ScriptedEvents {
        fn answering(answers: &[EventMask]) -> Self {
            Self {
                calls: RefCell::default(),
                answers: RefCell::new(answers.iter().copied().collect()),
            }
        }

        fn waits(&self) -> Vec<Call> {
            self.calls
                .borrow()
                .iter()
                .copied()
                .filter(|call| matches!(call, Call::Wait { .. }))
                .collect()
        }
    }

    impl EventWait for ScriptedEvents {
        fn clear_events(&self, mask: EventMask) {
            self.calls.borrow_mut().push(Call::Clear(mask));
        }

        fn wait_events(&self, mask: EventMask, timeout: Duration, wait_for_all: bool) -> EventMask {
            self.calls.borrow_mut().push(Call::Wait {
                mask,
                timeout,
                wait_for_all,
            });
            self.answers.borrow_mut().pop_front().unwrap_or(0)
        }
    }

    #[derive(Clone, Default)]
    struct StopCounter(Arc<AtomicUsize>);

    impl StopCounter {
        fn handle(&self) -> Box<dyn InputHandle> {
            Box::new(self.clone())
        }

        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl InputHandle for StopCounter {
        fn stop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn opened(answers: &[EventMask]) -> (Assertion<ScriptedEvents>, StopCounter) {
        let mut assertion = Assertion::new(ScriptedEvents::answering(answers));
        assertion.start(DELAY, TIMEOUT, 1).unwrap();
        let input = StopCounter::default();
        assert_eq!(assertion.register_event(input.handle()), 0b1);
        (assertion, input)
    }

    #[test]
    fn events_arrive_as_expected() {
        let (mut assertion, input) = opened(&[0, 0b1]);
        let mut called = false;

        let outcome = assertion.execute(|| {
            called = true;
            Ok(())
        });

        assert_eq!(outcome, Ok(()));
        assert!(called);
        assert_eq!(
            assertion.waiter().waits(),
            vec![
                Call::Wait {
                    mask: 0b1,
                    timeout: DELAY,
                    wait_for_all: false
                },
                Call::Wait {
                    mask: 0b1,
                    timeout: TIMEOUT,
                    wait_for_all: true
                },
            ]
        );
        assert_eq!(input.count(), 1);
        assert!(!assertion.is_open());
    }

    #[test]
    fn events_never_arrive() {
        let (mut assertion, input) = opened(&[]);
        assert_eq!(assertion.execute(|| Ok(())), Err(ErrorCode::Timeout));
        assert_eq!(assertion.waiter().waits().len(), 2);
        assert_eq!(input.count(), 1);
    }

    #[test]
    fn event_during_delay_is_too_early() {
        let (mut assertion, input) = opened(&[0b1]);
        assert_eq!(assertion.execute(|| Ok(())), Err(ErrorCode::TooEarly));
        assert_eq!(assertion.waiter().waits().len(), 1, "no timeout window");
        assert_eq!(input.count(), 1);
    }

    #[test]
    fn failing_output_skips_the_waits() {
        let (mut assertion, input) = opened(&[]);
        assert_eq!(
            assertion.execute(|| Err(ErrorCode::Parameters)),
            Err(ErrorCode::Parameters)
        );
        assert!(assertion.waiter().waits().is_empty());
        assert_eq!(input.count(), 1);
        assert!(!assertion.is_open());
    }

    #[test]
    fn second_start_is_redefined() {
        let mut assertion = Assertion::new(ScriptedEvents::default());
        assert_eq!(assertion.start(DELAY, TIMEOUT, 4), Ok(()));
        assert_eq!(
            assertion.start(DELAY, TIMEOUT, 4),
            Err(ErrorCode::Redefined)
        );
        assert_eq!(assertion.declared_inputs(), 4);
    }

    #[test]
    fn execute_before_all_inputs_registered_is_undefined() {
        let mut assertion = Assertion::new(ScriptedEvents::default());
        assertion.start(DELAY, TIMEOUT, 1).unwrap();
        let mut called = false;

        let outcome = assertion.execute(|| {
            called = true;
            Ok(())
        });

        assert_eq!(outcome, Err(ErrorCode::Undefined));
        assert!(!called);
        assert!(assertion.waiter().calls.borrow().is_empty());
        assert!(!assertion.is_open());
    }

    #[test]
    fn partially_registered_inputs_are_still_stopped() {
        let mut assertion = Assertion::new(ScriptedEvents::default());
        assertion.start(DELAY, TIMEOUT, 2).unwrap();
        let input = StopCounter::default();
        assertion.register_event(input.handle());

        assert_eq!(assertion.execute(|| Ok(())), Err(ErrorCode::Undefined));
        assert_eq!(input.count(), 1);
    }

    #[test]
    fn registration_beyond_declared_is_rejected() {
        let mut assertion = Assertion::new(ScriptedEvents::default());
        assertion.start(DELAY, TIMEOUT, 2).unwrap();
        let input = StopCounter::default();

        assert_eq!(assertion.register_event(input.handle()), 0b01);
        assert_eq!(assertion.register_event(input.handle()), 0b10);
        assert_eq!(assertion.register_event(input.handle()), INVALID_EVENT);
        assert_eq!(assertion.defined_inputs(), 2);
    }

    #[test]
    fn registration_without_open_assertion_is_rejected() {
        let mut assertion = Assertion::new(ScriptedEvents::default());
        let input = StopCounter::default();
        assert_eq!(assertion.register_event(input.handle()), INVALID_EVENT);
        assert_eq!(assertion.defined_inputs(), 0);
    }

    #[test]
    fn too_many_declared_inputs_is_a_generic_error() {
        let mut assertion = Assertion::new(ScriptedEvents::default());
        assert_eq!(
            assertion.start(DELAY, TIMEOUT, DEFAULT_MAX_INPUTS + 1),
            Err(ErrorCode::Generic)
        );
        assert!(!assertion.is_open());
    }

    #[test]
    fn config_is_clamped_to_mask_width() {
        let config = AssertionConfig { max_inputs: 64 };
        assert_eq!(config.effective_max_inputs(), 32);
    }

    #[test]
    fn clear_stops_inputs_and_reopens() {
        let (mut assertion, input) = opened(&[]);
        assertion.clear();
        assert_eq!(input.count(), 1);
        assert!(!assertion.is_open());
        assert_eq!(assertion.start(DELAY, TIMEOUT, 0), Ok(()));
    }

    #[test]
    fn expected_bits_are_cleared_before_each_window() {
        let (mut assertion, _input) = opened(&[0, 0b1]);
        assertion.execute(|| Ok(())).unwrap();

        let calls = assertion.waiter().calls.borrow().clone();
        assert!(matches!(
            calls.as_slice(),
            [
                Call::Clear(0b1),
                Call::Wait { wait_for_all: false, .. },
                Call::Clear(0b1),
                Call::Wait { wait_for_all: true, .. },
            ]
        ));
    }

    #[test]
    fn event_before_execute_is_lost() {
        // The output's own effect may fire an input before the delay window
        // starts; the clear ahead of the window discards it, so the
        // assertion times out instead of reporting it too early.
        let group = crate::events::EventGroup::new();
        let signal = group.signal();
        let mut assertion = Assertion::new(group);
        assertion
            .start(Duration::from_millis(5), Duration::from_millis(20), 1)
            .unwrap();
        let input = StopCounter::default();
        let id = assertion.register_event(input.handle());

        let outcome = assertion.execute(|| {
            signal.set(id);
            Ok(())
        });
        assert_eq!(outcome, Err(ErrorCode::Timeout));
    }

    #[test]
    fn zero_input_assertion_passes_after_delay() {
        let mut assertion = Assertion::new(ScriptedEvents::default());
        assertion.start(DELAY, TIMEOUT, 0).unwrap();
        assert_eq!(assertion.execute(|| Ok(())), Ok(()));
        assert_eq!(
            assertion.waiter().waits(),
            vec![
                Call::Wait {
                    mask: 0,
                    timeout: DELAY,
                    wait_for_all: false
                },
                Call::Wait {
                    mask: 0,
                    timeout: TIMEOUT,
                    wait_for_all: true
                },
            ]
        );
    }
}
