use preat_assert::{Assertion, AssertionConfig, EventGroup, EventSignal, EventWait};
use preat_frame::{
    decode_frame, encode_response, match_signature, method_name, ErrorCode, FrameBuffer,
    FrameConfig, Message, Outcome, ParamKind,
};
use preat_registry::{Direction, Handler, MethodContext, MethodRegistry, RegistryConfig};
use tracing::{debug, warn};

/// Configuration for a [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub frame: FrameConfig,
    pub registry: RegistryConfig,
    pub assertion: AssertionConfig,
    /// Abandon an open assertion when a frame fails before reaching a handler.
    pub clear_assertion_on_error: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            registry: RegistryConfig::default(),
            assertion: AssertionConfig::default(),
            clear_assertion_on_error: true,
        }
    }
}

/// Executes request frames against the registered methods.
///
/// Owns the registry, the assertion engine and the decoded message, so one
/// dispatcher serves exactly one protocol session at a time.
pub struct Dispatcher<W = EventGroup> {
    config: DispatcherConfig,
    registry: MethodRegistry,
    assertion: Assertion<W>,
    message: Message,
}

impl Dispatcher<EventGroup> {
    /// Create a dispatcher with default config and its own event group.
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    pub fn with_config(config: DispatcherConfig) -> Self {
        Self::with_events(EventGroup::new(), config)
    }

    /// Handle through which inputs report events to the assertion engine.
    pub fn signal(&self) -> EventSignal {
        self.assertion.waiter().signal()
    }
}

impl Default for Dispatcher<EventGroup> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: EventWait> Dispatcher<W> {
    /// Create a dispatcher whose assertions wait on `events`.
    pub fn with_events(events: W, config: DispatcherConfig) -> Self {
        Self {
            registry: MethodRegistry::with_config(config.registry),
            assertion: Assertion::with_config(events, config.assertion),
            message: Message {
                method: 0,
                params: Vec::with_capacity(config.frame.max_params),
            },
            config,
        }
    }

    /// Register a method; see [`MethodRegistry::register`].
    pub fn register<H>(
        &mut self,
        id: u16,
        direction: Direction,
        handler: H,
        signature: &'static [ParamKind],
    ) -> bool
    where
        H: Handler + 'static,
    {
        self.registry.register(id, direction, handler, signature)
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MethodRegistry {
        &mut self.registry
    }

    pub fn assertion(&self) -> &Assertion<W> {
        &self.assertion
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Execute the request in `buf` and replace it with the response.
    pub fn execute(&mut self, buf: &mut FrameBuffer) -> Outcome {
        let outcome = self.dispatch(buf.as_bytes());
        encode_response(buf, &outcome, &self.config.frame.crc);
        outcome
    }

    /// Answer `buf` with `code` without dispatching it, as for a frame the
    /// link layer could not even delimit.
    pub fn reject(&mut self, buf: &mut FrameBuffer, code: ErrorCode) {
        abort(&mut self.assertion, self.config.clear_assertion_on_error);
        encode_response(buf, &Err(code), &self.config.frame.crc);
    }

    fn dispatch(&mut self, raw: &[u8]) -> Outcome {
        let clear_on_error = self.config.clear_assertion_on_error;

        if let Err(err) = decode_frame(raw, &self.config.frame, &mut self.message) {
            warn!(%err, "frame rejected");
            abort(&mut self.assertion, clear_on_error);
            return Err(err.error_code());
        }
        let method = self.message.method;
        let params = &self.message.params;

        let Some(descriptor) = self.registry.find(method) else {
            warn!(method, "method not found");
            abort(&mut self.assertion, clear_on_error);
            return Err(ErrorCode::Method);
        };
        if !match_signature(params, descriptor.signature) {
            warn!(
                method,
                received = params.len(),
                "parameters do not match method signature"
            );
            abort(&mut self.assertion, clear_on_error);
            return Err(ErrorCode::Parameters);
        }

        let asserted = descriptor.direction.is_output() && self.assertion.is_open();
        let outcome = if asserted {
            let handler = &descriptor.handler;
            self.assertion
                .execute(|| handler.invoke(&mut MethodContext::detached(), params))
        } else {
            descriptor
                .handler
                .invoke(&mut MethodContext::new(&mut self.assertion), params)
        };

        debug!(
            method,
            name = method_name(method),
            params = params.len(),
            asserted,
            result = outcome.err().map_or("no_error", ErrorCode::name),
            "frame dispatched"
        );
        outcome
    }
}

fn abort<W: EventWait>(assertion: &mut Assertion<W>, enabled: bool) {
    if enabled && assertion.is_open() {
        warn!("abandoning open assertion after rejected frame");
        assertion.clear();
    }
}

impl<W> std::fmt::Debug for Dispatcher<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("assertion", &self.assertion)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use preat_assert::InputHandle;
    use preat_frame::{encode_request, Crc16, Param, SINGLE_UINT8};
    use preat_registry::handler_fn;

    use super::*;

    fn counting_output(calls: &Arc<AtomicUsize>) -> impl Handler {
        let calls = Arc::clone(calls);
        handler_fn(move |_ctx, _params| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn request(method: u16, params: &[Param]) -> FrameBuffer {
        encode_request(method, params, &Crc16::DEFAULT).unwrap()
    }

    fn start_assertion(inputs: u8) -> FrameBuffer {
        request(
            0x005,
            &[Param::U32(0), Param::U32(10), Param::U8(inputs), Param::U8(0)],
        )
    }

    #[test]
    fn direct_output_call_is_acknowledged() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(0x010, Direction::Output, counting_output(&calls), SINGLE_UINT8);

        let mut buf = FrameBuffer::from_slice(&[0x07, 0x01, 0x01, 0x10, 0x01, 0xb5, 0xa3]).unwrap();
        assert_eq!(dispatcher.execute(&mut buf), Ok(()));
        assert_eq!(buf.as_frame(), &[0x05, 0x00, 0x00, 0xa1, 0xb5]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_sees_decoded_parameters() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(
            0x040,
            Direction::Input,
            handler_fn(|_ctx, params| match params {
                [Param::U16(0x1234), Param::U32(7)] => Ok(()),
                _ => Err(ErrorCode::Generic),
            }),
            &[ParamKind::U16, ParamKind::U32],
        );

        let mut buf = request(0x040, &[Param::U16(0x1234), Param::U32(7)]);
        assert_eq!(dispatcher.execute(&mut buf), Ok(()));
    }

    #[test]
    fn handler_error_is_reported() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(
            0x010,
            Direction::Output,
            handler_fn(|_ctx, _params| Err(ErrorCode::Generic)),
            SINGLE_UINT8,
        );
        let mut buf = request(0x010, &[Param::U8(9)]);
        assert_eq!(dispatcher.execute(&mut buf), Err(ErrorCode::Generic));
        assert_eq!(&buf.as_frame()[..5], &[0x07, 0x00, 0x11, 0x10, 0xff]);
    }

    #[test]
    fn output_runs_through_open_assertion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(0x010, Direction::Output, counting_output(&calls), SINGLE_UINT8);

        let mut buf = start_assertion(0);
        assert_eq!(dispatcher.execute(&mut buf), Ok(()));
        assert!(dispatcher.assertion().is_open());

        let mut buf = request(0x010, &[Param::U8(1)]);
        assert_eq!(dispatcher.execute(&mut buf), Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!dispatcher.assertion().is_open());
    }

    #[test]
    fn unwired_assertion_skips_the_output() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(0x010, Direction::Output, counting_output(&calls), SINGLE_UINT8);

        dispatcher.execute(&mut start_assertion(1)).unwrap();
        let mut buf = request(0x010, &[Param::U8(1)]);
        assert_eq!(dispatcher.execute(&mut buf), Err(ErrorCode::Undefined));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!dispatcher.assertion().is_open());
    }

    #[test]
    fn second_start_is_redefined() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.execute(&mut start_assertion(1)).unwrap();
        assert_eq!(
            dispatcher.execute(&mut start_assertion(1)),
            Err(ErrorCode::Redefined)
        );
    }

    struct CountStops(Arc<AtomicUsize>);

    impl InputHandle for CountStops {
        fn stop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn rejected_frame_clears_open_assertion() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new();
        let watcher_stops = Arc::clone(&stops);
        dispatcher.register(
            0x018,
            Direction::Input,
            handler_fn(move |ctx, _params| {
                match ctx.register_event(Box::new(CountStops(Arc::clone(&watcher_stops)))) {
                    0 => Err(ErrorCode::Undefined),
                    _ => Ok(()),
                }
            }),
            SINGLE_UINT8,
        );

        dispatcher.execute(&mut start_assertion(1)).unwrap();
        dispatcher.execute(&mut request(0x018, &[Param::U8(0)])).unwrap();

        let mut buf = request(0x077, &[]);
        assert_eq!(dispatcher.execute(&mut buf), Err(ErrorCode::Method));
        assert!(!dispatcher.assertion().is_open());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejected_frame_keeps_assertion_when_configured() {
        let mut dispatcher = Dispatcher::with_config(DispatcherConfig {
            clear_assertion_on_error: false,
            ..DispatcherConfig::default()
        });
        dispatcher.execute(&mut start_assertion(1)).unwrap();
        dispatcher.execute(&mut request(0x077, &[])).unwrap_err();
        assert!(dispatcher.assertion().is_open());
    }

    #[test]
    fn reject_answers_without_dispatch() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.execute(&mut start_assertion(1)).unwrap();

        let mut buf = FrameBuffer::new();
        dispatcher.reject(&mut buf, ErrorCode::Crc);
        assert_eq!(buf.as_frame(), &[0x07, 0x00, 0x11, 0x10, 0x01, 0xcc, 0x08]);
        assert!(!dispatcher.assertion().is_open());
    }

    #[test]
    fn assertion_timeout_is_reported() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(
            0x010,
            Direction::Output,
            handler_fn(|_ctx, _params| Ok(())),
            SINGLE_UINT8,
        );
        dispatcher.register(
            0x018,
            Direction::Input,
            handler_fn(|ctx, _params| {
                struct Quiet;
                impl InputHandle for Quiet {
                    fn stop(&mut self) {}
                }
                match ctx.register_event(Box::new(Quiet)) {
                    0 => Err(ErrorCode::Undefined),
                    _ => Ok(()),
                }
            }),
            SINGLE_UINT8,
        );

        dispatcher.execute(&mut start_assertion(1)).unwrap();
        dispatcher.execute(&mut request(0x018, &[Param::U8(0)])).unwrap();

        let started = std::time::Instant::now();
        let mut buf = request(0x010, &[Param::U8(0)]);
        assert_eq!(dispatcher.execute(&mut buf), Err(ErrorCode::Timeout));
        assert!(started.elapsed() >= Duration::from_millis(10));
    }
}
