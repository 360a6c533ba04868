use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use preat_assert::{EventMask, EventSignal, InputHandle, INVALID_EVENT};
use preat_frame::{ErrorCode, Outcome, Param, ParamKind, SINGLE_UINT8};
use preat_registry::{handler_fn, Direction, MethodContext, MethodRegistry};
use tracing::{debug, trace, warn};

/// Drive an output high: `{UINT8 index}`.
pub const METHOD_OUTPUT_HIGH: u16 = 0x010;
/// Drive an output low: `{UINT8 index}`.
pub const METHOD_OUTPUT_LOW: u16 = 0x011;
/// Expect a rising edge on an input: `{UINT8 index}`.
pub const METHOD_EXPECT_RISING: u16 = 0x018;
/// Expect a falling edge on an input: `{UINT8 index}`.
pub const METHOD_EXPECT_FALLING: u16 = 0x019;
/// Check the current level of an input: `{UINT8 index, UINT8 level}`.
pub const METHOD_INPUT_LEVEL: u16 = 0x01A;

const INPUT_LEVEL_SIGNATURE: &[ParamKind] = &[ParamKind::U8, ParamKind::U8];

/// Geometry of a simulated board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardConfig {
    pub outputs: u8,
    pub inputs: u8,
    /// Delay before an output change reaches the input wired to it.
    /// `None` propagates synchronously.
    pub loopback_latency: Option<Duration>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            outputs: 8,
            inputs: 8,
            loopback_latency: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Rising,
    Falling,
}

#[derive(Debug, Clone, Copy)]
struct EdgeWatch {
    serial: u64,
    input: usize,
    edge: Edge,
    event: EventMask,
}

#[derive(Debug)]
struct BoardState {
    outputs: Vec<bool>,
    inputs: Vec<bool>,
    watches: Vec<EdgeWatch>,
    next_serial: u64,
}

#[derive(Debug)]
struct BoardShared {
    config: BoardConfig,
    state: Mutex<BoardState>,
    signal: EventSignal,
}

impl BoardShared {
    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A simulated target with digital outputs wired back to its inputs.
///
/// Output `n` drives input `n` when both exist. Edge watchers registered by
/// the input methods report to the assertion engine through an
/// [`EventSignal`].
#[derive(Debug, Clone)]
pub struct SimBoard {
    shared: Arc<BoardShared>,
}

impl SimBoard {
    pub fn new(config: BoardConfig, signal: EventSignal) -> Self {
        let state = BoardState {
            outputs: vec![false; usize::from(config.outputs)],
            inputs: vec![false; usize::from(config.inputs)],
            watches: Vec::new(),
            next_serial: 0,
        };
        Self {
            shared: Arc::new(BoardShared {
                config,
                state: Mutex::new(state),
                signal,
            }),
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.shared.config
    }

    /// Register the board's methods. Returns false if any registration failed.
    pub fn install(&self, registry: &mut MethodRegistry) -> bool {
        let high = self.clone();
        let low = self.clone();
        let rising = self.clone();
        let falling = self.clone();
        let level = self.clone();

        let mut installed = true;
        installed &= registry.register(
            METHOD_OUTPUT_HIGH,
            Direction::Output,
            handler_fn(move |_ctx, params| high.set_output(single_index(params)?, true)),
            SINGLE_UINT8,
        );
        installed &= registry.register(
            METHOD_OUTPUT_LOW,
            Direction::Output,
            handler_fn(move |_ctx, params| low.set_output(single_index(params)?, false)),
            SINGLE_UINT8,
        );
        installed &= registry.register(
            METHOD_EXPECT_RISING,
            Direction::Input,
            handler_fn(move |ctx, params| {
                rising.expect_edge(ctx, single_index(params)?, Edge::Rising)
            }),
            SINGLE_UINT8,
        );
        installed &= registry.register(
            METHOD_EXPECT_FALLING,
            Direction::Input,
            handler_fn(move |ctx, params| {
                falling.expect_edge(ctx, single_index(params)?, Edge::Falling)
            }),
            SINGLE_UINT8,
        );
        installed &= registry.register(
            METHOD_INPUT_LEVEL,
            Direction::Input,
            handler_fn(move |_ctx, params| match params {
                [Param::U8(index), Param::U8(expected)] => {
                    level.check_input(usize::from(*index), *expected != 0)
                }
                _ => Err(ErrorCode::Parameters),
            }),
            INPUT_LEVEL_SIGNATURE,
        );
        installed
    }

    /// Set output `index` and propagate it to the wired input.
    pub fn set_output(&self, index: usize, level: bool) -> Outcome {
        {
            let mut state = self.shared.lock();
            let Some(output) = state.outputs.get_mut(index) else {
                warn!(index, "output index out of range");
                return Err(ErrorCode::Generic);
            };
            *output = level;
        }
        debug!(index, level, "output set");

        if index < usize::from(self.shared.config.inputs) {
            match self.shared.config.loopback_latency {
                Some(latency) => {
                    let board = self.clone();
                    thread::spawn(move || {
                        thread::sleep(latency);
                        board.drive_input(index, level);
                    });
                }
                None => self.drive_input(index, level),
            }
        }
        Ok(())
    }

    /// Change the level seen on input `index`, as an external stimulus would.
    ///
    /// Watchers armed for the resulting edge have their events set. Out of
    /// range indices are ignored.
    pub fn drive_input(&self, index: usize, level: bool) {
        let fired = {
            let mut state = self.shared.lock();
            let Some(input) = state.inputs.get_mut(index) else {
                return;
            };
            if *input == level {
                return;
            }
            *input = level;

            let edge = if level { Edge::Rising } else { Edge::Falling };
            state
                .watches
                .iter()
                .filter(|watch| watch.input == index && watch.edge == edge)
                .fold(0, |mask, watch| mask | watch.event)
        };

        trace!(index, level, fired, "input changed");
        if fired != 0 {
            self.shared.signal.set(fired);
        }
    }

    pub fn output(&self, index: usize) -> Option<bool> {
        self.shared.lock().outputs.get(index).copied()
    }

    pub fn input(&self, index: usize) -> Option<bool> {
        self.shared.lock().inputs.get(index).copied()
    }

    /// Number of armed edge watchers.
    pub fn armed_watches(&self) -> usize {
        self.shared.lock().watches.len()
    }

    fn check_input(&self, index: usize, expected: bool) -> Outcome {
        match self.input(index) {
            Some(level) if level == expected => Ok(()),
            Some(_) => Err(ErrorCode::Generic),
            None => {
                warn!(index, "input index out of range");
                Err(ErrorCode::Generic)
            }
        }
    }

    fn expect_edge(&self, ctx: &mut MethodContext<'_>, input: usize, edge: Edge) -> Outcome {
        if input >= usize::from(self.shared.config.inputs) {
            warn!(input, "input index out of range");
            return Err(ErrorCode::Generic);
        }
        if !ctx.assertion_open() {
            warn!(input, ?edge, "edge expected without an open assertion");
            return Err(ErrorCode::Undefined);
        }

        let serial = {
            let mut state = self.shared.lock();
            state.next_serial += 1;
            state.next_serial
        };
        let watcher = EdgeWatcher {
            shared: Arc::clone(&self.shared),
            serial,
        };
        let event = ctx.register_event(Box::new(watcher));
        if event == INVALID_EVENT {
            warn!(input, ?edge, "assertion accepts no more inputs");
            return Err(ErrorCode::Undefined);
        }

        // Armed only after the assertion assigned a bit.
        self.shared.lock().watches.push(EdgeWatch {
            serial,
            input,
            edge,
            event,
        });
        debug!(input, ?edge, event, "edge watch armed");
        Ok(())
    }
}

fn single_index(params: &[Param]) -> Result<usize, ErrorCode> {
    match params {
        [Param::U8(index)] => Ok(usize::from(*index)),
        _ => Err(ErrorCode::Parameters),
    }
}

/// Disarms the edge watch of one assertion input.
struct EdgeWatcher {
    shared: Arc<BoardShared>,
    serial: u64,
}

impl InputHandle for EdgeWatcher {
    fn stop(&mut self) {
        let serial = self.serial;
        self.shared
            .lock()
            .watches
            .retain(|watch| watch.serial != serial);
        trace!(serial, "edge watch disarmed");
    }
}
