//! Try/catch loop driver
//!
//! Catches jumps aimed at a target buffer without unwinding past its own
//! frame:
//!
//! 1. run the body (or, in the rescue phase, the handler)
//! 2. catch jumps targeting the given buffer, or return
//! 3. run the handler if there is one, otherwise return
//! 4. catch jumps targeting the given buffer, or return
//! 5. repeat from step 3
//!
//! `run_protected` is not instrumented: it never records a frame. When a
//! capture inside the body unwinds through it, the rewind re-enters it from
//! the top and the persisted phase decides whether the body or the handler is
//! resumed.
//!
//! NOTICE: every jump to the target must happen before the caller of
//! `run_protected` returns.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use crate::arena::Handle;
use crate::error::JmpError;
use crate::jmp_buf::{JmpBufId, JmpBufState};
use crate::runtime::{fatal, Runtime};

/// Body or handler of a try/catch
pub type ProtectedFn<C> = fn(&mut Runtime, &mut C);

/// Try/catch phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Phase {
    /// Running the protected body
    Main = 0,
    /// A jump was caught; running the handler
    Rescue = 1,
}

pub struct TryCatch<C> {
    pub body: ProtectedFn<C>,
    pub handler: Option<ProtectedFn<C>>,
    /// `None` while the body or handler is borrowing it
    context: Option<C>,
    pub phase: Phase,
}

impl<C> TryCatch<C> {
    pub fn new(body: ProtectedFn<C>, handler: Option<ProtectedFn<C>>, context: C) -> Self {
        Self {
            body,
            handler,
            context: Some(context),
            phase: Phase::Main,
        }
    }
}

/// Handle to a [`TryCatch`] stored in a [`Runtime`]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TryCatchId<C> {
    handle: Handle<Box<dyn Any>>,
    #[serde(skip)]
    _marker: PhantomData<fn() -> C>,
}

impl<C> Clone for TryCatchId<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for TryCatchId<C> {}

impl<C> PartialEq for TryCatchId<C> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<C> fmt::Debug for TryCatchId<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TryCatchId({})", self.handle)
    }
}

/* ===================== Runtime API ===================== */

impl Runtime {
    /// Store a try/catch context in phase `Main`
    pub fn try_catch_new<C: 'static>(
        &mut self,
        body: ProtectedFn<C>,
        handler: Option<ProtectedFn<C>>,
        context: C,
    ) -> TryCatchId<C> {
        let boxed: Box<dyn Any> = Box::new(TryCatch::new(body, handler, context));
        let result = self.try_catches.insert(boxed);
        TryCatchId {
            handle: self.check(result),
            _marker: PhantomData,
        }
    }

    pub fn try_catch_phase<C: 'static>(&self, id: TryCatchId<C>) -> Phase {
        let result = self.try_catch_ref(id).map(|tc| tc.phase);
        self.check(result)
    }

    /// Borrow the user context; fatal while the body or handler holds it
    pub fn try_catch_context<C: 'static>(&self, id: TryCatchId<C>) -> &C {
        let result = self.try_catch_ref(id).and_then(|tc| {
            tc.context
                .as_ref()
                .ok_or_else(|| JmpError::Lent(id.handle.to_string()))
        });
        self.check(result)
    }

    pub fn try_catch_context_mut<C: 'static>(&mut self, id: TryCatchId<C>) -> &mut C {
        let policy = self.config.on_fatal;
        let result = try_catch_mut(self, id).and_then(|tc| {
            tc.context
                .as_mut()
                .ok_or_else(|| JmpError::Lent(id.handle.to_string()))
        });
        match result {
            Ok(context) => context,
            Err(err) => fatal(policy, err),
        }
    }

    /// Free the context and hand back the user context
    pub fn try_catch_release<C: 'static>(&mut self, id: TryCatchId<C>) -> C {
        let result = self.try_catches.remove(id.handle).and_then(|boxed| {
            let tc = boxed
                .downcast::<TryCatch<C>>()
                .map_err(|_| JmpError::StaleHandle(id.handle.to_string()))?;
            tc.context.ok_or_else(|| JmpError::Lent(id.handle.to_string()))
        });
        self.check(result)
    }

    fn try_catch_ref<C: 'static>(&self, id: TryCatchId<C>) -> Result<&TryCatch<C>, JmpError> {
        self.try_catches
            .get(id.handle)?
            .downcast_ref::<TryCatch<C>>()
            .ok_or_else(|| JmpError::StaleHandle(id.handle.to_string()))
    }
}

fn try_catch_mut<C: 'static>(
    rt: &mut Runtime,
    id: TryCatchId<C>,
) -> Result<&mut TryCatch<C>, JmpError> {
    rt.try_catches
        .get_mut(id.handle)?
        .downcast_mut::<TryCatch<C>>()
        .ok_or_else(|| JmpError::StaleHandle(id.handle.to_string()))
}

/// Take the user context out so the body or handler can borrow it next to the runtime
fn take_context<C: 'static>(rt: &mut Runtime, id: TryCatchId<C>) -> Result<C, JmpError> {
    try_catch_mut(rt, id)?
        .context
        .take()
        .ok_or_else(|| JmpError::Lent(id.handle.to_string()))
}

/* ===================== Loop Driver ===================== */

/// Run the body of `id`, catching every jump that targets `target`
///
/// A caught jump moves the try/catch to the `Rescue` phase and runs the
/// handler, whose own jumps to `target` are caught again. The payload is
/// readable through [`Runtime::payload`]. Without a handler, a jump to
/// `target` still moves the try/catch to `Rescue` but is not caught. In that
/// case, or when a jump targets another buffer, the transfer stays in flight
/// and the caller must observe it through [`Runtime::suspend`].
pub fn run_protected<C: 'static>(rt: &mut Runtime, id: TryCatchId<C>, target: JmpBufId) {
    let result = try_run_protected(rt, id, target);
    rt.check(result)
}

fn try_run_protected<C: 'static>(
    rt: &mut Runtime,
    id: TryCatchId<C>,
    target: JmpBufId,
) -> Result<(), JmpError> {
    // while rewinding, the target's state belongs to the transfer being resumed
    if !rt.is_rewinding() {
        rt.buf_mut(target)?.state = JmpBufState::Captured;
    }

    let (body, handler, phase) = {
        let tc = try_catch_mut(rt, id)?;
        (tc.body, tc.handler, tc.phase)
    };
    let mut context = take_context(rt, id)?;

    match phase {
        Phase::Main => body(rt, &mut context),
        Phase::Rescue => {
            if let Some(handler) = handler {
                handler(rt, &mut context);
            }
        }
    }

    // catch jumps aimed at the target
    while rt.transfer_pending() && rt.active == Some(target) {
        try_catch_mut(rt, id)?.phase = Phase::Rescue;
        let Some(handler) = handler else {
            tracing::debug!(buf = %target, "try/catch: no handler, jump propagates");
            break;
        };

        intercept(rt, target)?;
        tracing::trace!(buf = %target, payload = rt.payload(target), "try/catch: rescue");
        handler(rt, &mut context);
    }

    try_catch_mut(rt, id)?.context = Some(context);
    Ok(())
}

/// Stop the unwind a jump to `target` started, as if it had been delivered here
fn intercept(rt: &mut Runtime, target: JmpBufId) -> Result<(), JmpError> {
    rt.stop_unwind()?;
    rt.active = None;

    let buf = rt.buf_mut(target)?;
    buf.state = JmpBufState::Captured;
    buf.longjmp_storage = None;

    rt.stats.intercepts += 1;
    Ok(())
}
