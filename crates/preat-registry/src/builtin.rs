use std::time::Duration;

use preat_frame::{ErrorCode, Outcome, Param};
use tracing::warn;

use crate::handler::{Handler, MethodContext};

/// Built-in method that opens an assertion.
///
/// Parameters: `UINT32` delay in ms, `UINT32` timeout in ms, `UINT8` number
/// of inputs to expect, and a reserved `UINT8`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StartAssertion;

impl Handler for StartAssertion {
    fn invoke(&self, ctx: &mut MethodContext<'_>, params: &[Param]) -> Outcome {
        let [Param::U32(delay), Param::U32(timeout), Param::U8(inputs), Param::U8(_reserved)] =
            params
        else {
            return Err(ErrorCode::Parameters);
        };
        let Some(assertion) = ctx.assertion() else {
            warn!("start assertion called without an assertion engine");
            return Err(ErrorCode::Generic);
        };
        assertion.start(
            Duration::from_millis(u64::from(*delay)),
            Duration::from_millis(u64::from(*timeout)),
            usize::from(*inputs),
        )
    }
}
