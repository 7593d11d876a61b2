//! Device Context
//!
//! The [`Context`] owns GPU acquisition and the per-frame output. Adapter and
//! device requests are futures polled once per frame with a no-op waker, so
//! acquisition never blocks the render thread:
//!
//! ```text
//! Uninitialized ──request_device──▶ Requesting ──ready──▶ Ok
//!                                        ▲                 │ device lost / suspend
//!                                        └── Incomplete ◀──┘
//! ```
//!
//! Every device that reaches `Ok` gets a new generation number. Caches compare
//! it against the generation their GPU objects were created under.

use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::task::noop_waker_ref;

use super::backend::{GpuAdapter, GpuBackend, GpuInstance, OutputImage, RenderOutput};
use super::settings::ContextSettings;
use crate::errors::{GfxError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// No device was ever requested
    Uninitialized,
    /// An adapter or device request is in flight
    Requesting,
    Ok,
    /// The device was lost or released; the next frame re-requests it
    Incomplete,
}

impl ContextState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Requesting => "requesting",
            Self::Ok => "ok",
            Self::Incomplete => "incomplete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Ok,
    /// `begin_frame` succeeded, `end_frame` has not been called yet
    WaitingForEnd,
}

enum PendingRequest {
    Adapter(BoxFuture<'static, Result<Arc<dyn GpuAdapter>>>),
    Device(BoxFuture<'static, Result<Arc<dyn GpuBackend>>>),
}

pub struct Context {
    instance: Arc<dyn GpuInstance>,
    settings: ContextSettings,
    state: ContextState,
    frame_state: FrameState,
    adapter: Option<Arc<dyn GpuAdapter>>,
    backend: Option<Arc<dyn GpuBackend>>,
    pending: Option<PendingRequest>,
    output: Box<dyn RenderOutput>,
    current_image: Option<OutputImage>,
    generation: u64,
}

impl Context {
    pub fn new(
        instance: Arc<dyn GpuInstance>,
        output: Box<dyn RenderOutput>,
        settings: ContextSettings,
    ) -> Self {
        Self {
            instance,
            settings,
            state: ContextState::Uninitialized,
            frame_state: FrameState::Ok,
            adapter: None,
            backend: None,
            pending: None,
            output,
            current_image: None,
            generation: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> ContextState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn frame_state(&self) -> FrameState {
        self.frame_state
    }

    /// The current device, `None` unless the state is `Ok`.
    #[inline]
    #[must_use]
    pub fn backend(&self) -> Option<&Arc<dyn GpuBackend>> {
        self.backend.as_ref()
    }

    /// Generation of the current device. Starts at 1 for the first device.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Output image of the running frame.
    #[inline]
    #[must_use]
    pub fn current_image(&self) -> Option<OutputImage> {
        self.current_image
    }

    #[must_use]
    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// Starts acquiring a device, requesting an adapter first if none is known.
    ///
    /// Does nothing while a request is in flight or a device is ready.
    pub fn request_device(&mut self) {
        if matches!(self.state, ContextState::Requesting | ContextState::Ok) {
            return;
        }

        self.pending = Some(match &self.adapter {
            Some(adapter) => {
                log::info!("Requesting device from adapter {}", adapter.describe());
                PendingRequest::Device(adapter.request_device(&self.settings))
            }
            None => {
                log::info!("Requesting adapter ({:?})", self.settings.power_preference);
                PendingRequest::Adapter(self.instance.request_adapter(&self.settings))
            }
        });
        self.state = ContextState::Requesting;

        if let Err(e) = self.tick_requesting() {
            log::error!("Device request failed: {e}");
        }
    }

    /// Polls the in-flight request once. Returns `true` when a device is ready.
    ///
    /// A finished adapter request chains straight into the device request.
    /// On failure the context falls back to `Uninitialized` (no device so far)
    /// or `Incomplete`, and the adapter is forgotten after a device failure.
    pub fn tick_requesting(&mut self) -> Result<bool> {
        let mut cx = TaskContext::from_waker(noop_waker_ref());

        loop {
            let Some(pending) = self.pending.as_mut() else {
                return Ok(self.state == ContextState::Ok);
            };

            match pending {
                PendingRequest::Adapter(future) => match future.poll_unpin(&mut cx) {
                    Poll::Pending => return Ok(false),
                    Poll::Ready(Ok(adapter)) => {
                        log::info!("Adapter acquired: {}", adapter.describe());
                        self.pending = Some(PendingRequest::Device(adapter.request_device(&self.settings)));
                        self.adapter = Some(adapter);
                    }
                    Poll::Ready(Err(e)) => {
                        self.fail_request();
                        return Err(e);
                    }
                },
                PendingRequest::Device(future) => match future.poll_unpin(&mut cx) {
                    Poll::Pending => return Ok(false),
                    Poll::Ready(Ok(backend)) => {
                        self.pending = None;
                        self.backend = Some(backend);
                        self.generation += 1;
                        self.state = ContextState::Ok;
                        log::info!("Device ready (generation {})", self.generation);
                        return Ok(true);
                    }
                    Poll::Ready(Err(e)) => {
                        self.adapter = None;
                        self.fail_request();
                        return Err(e);
                    }
                },
            }
        }
    }

    fn fail_request(&mut self) {
        self.pending = None;
        self.state = if self.generation == 0 {
            ContextState::Uninitialized
        } else {
            ContextState::Incomplete
        };
    }

    /// Moves to `Incomplete` if the device reports loss. Returns whether it did.
    ///
    /// Objects of a lost device are invalid, so nothing is released.
    pub fn check_device_lost(&mut self) -> bool {
        let lost = self.state == ContextState::Ok && self.backend.as_ref().is_some_and(|b| b.is_lost());
        if lost {
            log::warn!("Device lost (generation {})", self.generation);
            self.backend = None;
            self.output.invalidate();
            self.current_image = None;
            self.frame_state = FrameState::Ok;
            self.state = ContextState::Incomplete;
        }
        lost
    }

    /// Starts a frame. Returns `false` when no device is ready or the output
    /// could not be acquired.
    pub fn begin_frame(&mut self) -> bool {
        if self.frame_state == FrameState::WaitingForEnd {
            log::warn!("begin_frame called twice without end_frame");
            return false;
        }

        self.check_device_lost();
        match self.state {
            ContextState::Incomplete => self.request_device(),
            ContextState::Requesting => {
                if let Err(e) = self.tick_requesting() {
                    log::error!("Device request failed: {e}");
                }
            }
            ContextState::Uninitialized | ContextState::Ok => {}
        }
        if self.state != ContextState::Ok {
            return false;
        }
        let Some(backend) = self.backend.clone() else {
            return false;
        };

        let attempts = self.settings.acquire_attempts.max(1);
        for attempt in 1..=attempts {
            match self.output.acquire(backend.as_ref()) {
                Ok(image) => {
                    self.current_image = Some(image);
                    self.frame_state = FrameState::WaitingForEnd;
                    return true;
                }
                Err(e) => {
                    log::warn!("Output acquire failed (attempt {attempt}/{attempts}): {e}");
                    self.output.recreate(backend.as_ref());
                }
            }
        }
        false
    }

    /// Presents the frame output.
    pub fn end_frame(&mut self) -> Result<()> {
        if self.frame_state != FrameState::WaitingForEnd {
            return Err(GfxError::NoActiveFrame);
        }
        self.output.present();
        self.current_image = None;
        self.frame_state = FrameState::Ok;
        Ok(())
    }

    /// Releases the output and the device. CPU-side content is untouched.
    pub fn suspend(&mut self) {
        if let Some(backend) = self.backend.take() {
            self.output.release(backend.as_ref());
        }
        self.pending = None;
        self.current_image = None;
        self.frame_state = FrameState::Ok;
        if self.state != ContextState::Uninitialized {
            self.state = ContextState::Incomplete;
        }
        log::info!("Context suspended");
    }

    /// Re-requests the device released by [`suspend`](Self::suspend).
    pub fn resume(&mut self) {
        if self.state == ContextState::Incomplete {
            log::info!("Context resuming");
            self.request_device();
        }
    }
}
