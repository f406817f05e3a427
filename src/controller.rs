//! Camera capture controller.
//!
//! Owns the device lifecycle for one session at a time: acquire a stream,
//! sample it on a fixed-period tick, encode each sample into a [`FrameData`]
//! and hand it to the registered frame handler. Acquisition failures are
//! classified and reported to the error handler.
//!
//! # Scheduling
//!
//! Everything runs on one thread. The sampling tick is a `spawn_local` task,
//! so [`CaptureController::start`] must be awaited inside a
//! [`tokio::task::LocalSet`]. Ticks and handler calls never overlap with
//! `start`/`stop` bookkeeping, and no state borrow is held while a handler
//! runs, so handlers may call back into the controller.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
    time::Duration,
};

use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    clock::{Clock, SystemClock},
    config::{CaptureOptions, TargetFps},
    device::{CameraBackend, VideoStream},
    error::CaptureError,
    frames::{FrameData, FrameStats},
    surface::DecodeSurface,
};

/// Receives every sampled frame.
pub type FrameHandler = dyn Fn(FrameData);

/// Receives classified capture failures.
pub type ErrorHandler = dyn Fn(&CaptureError);

/// Lower and upper (exclusive) bound of the synthetic processing time.
const PROCESSING_TIME_MS: std::ops::Range<u32> = 5..10;

/// Indirection cell holding the latest handler.
///
/// The tick reads the cell on every call instead of capturing the handler at
/// start time, so replacing a handler takes effect without restarting capture.
struct HandlerCell<H: ?Sized> {
    current: RefCell<Rc<H>>,
}

impl<H: ?Sized> HandlerCell<H> {
    fn new(handler: Rc<H>) -> Self {
        Self {
            current: RefCell::new(handler),
        }
    }

    fn replace(&self, handler: Rc<H>) {
        *self.current.borrow_mut() = handler;
    }

    /// Clone out the handler so the cell is not borrowed while it runs.
    fn current(&self) -> Rc<H> {
        Rc::clone(&self.current.borrow())
    }
}

/// Resources of one start/stop cycle.
struct CaptureSession<S> {
    generation: u64,
    target_fps: TargetFps,
    stream: S,
    surface: DecodeSurface,
    ticker: JoinHandle<()>,
}

enum TickOutcome {
    Skipped,
    Frame(FrameData),
    Ended,
}

impl<S: VideoStream> CaptureSession<S> {
    fn sample(&mut self, options: &CaptureOptions, clock: &dyn Clock) -> TickOutcome {
        if !self.stream.is_live() {
            return TickOutcome::Ended;
        }

        if self.stream.dimensions().is_empty() {
            debug!("device has no dimensions yet, skipping tick");
            return TickOutcome::Skipped;
        }

        let surface = &mut self.surface;
        let encoded = self
            .stream
            .snapshot()
            .and_then(|snapshot| surface.draw(&snapshot))
            .and_then(|()| surface.encode(options.image_format));

        match encoded {
            Ok(image_url) => {
                let stats = FrameStats::new(
                    self.target_fps.get(),
                    self.surface.resolution(),
                    fastrand::u32(PROCESSING_TIME_MS),
                    clock.epoch_ms(),
                );
                TickOutcome::Frame(FrameData::new(image_url, stats))
            }
            Err(e) => {
                warn!(error = %e, "dropping frame");
                TickOutcome::Skipped
            }
        }
    }

    /// Cancel the tick before releasing the device, so no tick can run
    /// against a released stream.
    fn close(mut self) {
        self.ticker.abort();
        self.stream.stop_tracks();
        self.surface.clear();
    }
}

struct Shared<S> {
    options: CaptureOptions,
    clock: Rc<dyn Clock>,
    on_frame: HandlerCell<FrameHandler>,
    on_error: HandlerCell<ErrorHandler>,
    session: RefCell<Option<CaptureSession<S>>>,
    /// Acquisition in flight.
    pending: Cell<bool>,
    /// Bumped by every teardown. A start or tick carrying an older value is
    /// stale.
    generation: Cell<u64>,
}

impl<S: VideoStream> Shared<S> {
    /// Run one sampling tick. Returns `false` once the tick should stop firing.
    fn tick(&self, generation: u64) -> bool {
        let outcome = {
            let mut slot = self.session.borrow_mut();
            match slot.as_mut() {
                Some(session) if session.generation == generation => {
                    session.sample(&self.options, &*self.clock)
                }
                _ => return false,
            }
        };

        match outcome {
            TickOutcome::Skipped => true,
            TickOutcome::Frame(frame) => {
                (self.on_frame.current())(frame);
                true
            }
            TickOutcome::Ended => {
                warn!("camera stream ended, tearing down session");
                self.teardown();
                (self.on_error.current())(&CaptureError::StreamEnded);
                false
            }
        }
    }

    /// Release the session if there is one and invalidate any pending start.
    fn teardown(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
        self.pending.set(false);

        let session = self.session.borrow_mut().take();
        if let Some(session) = session {
            session.close();
            info!("capture stopped");
        }
    }
}

fn spawn_ticker<S: VideoStream + 'static>(
    shared: Weak<Shared<S>>,
    generation: u64,
    period: Duration,
) -> JoinHandle<()> {
    tokio::task::spawn_local(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            if !shared.tick(generation) {
                break;
            }
        }
    })
}

/// Drives one camera device through start/stop cycles.
///
/// At most one stream and one sampling tick exist at any time. Dropping the
/// controller stops it.
///
/// # Examples
///
/// ```no_run
/// use camera_feed::{CaptureController, CaptureOptions, SyntheticCamera, TargetFps};
///
/// # async fn run() -> Result<(), camera_feed::Error> {
/// let controller = CaptureController::new(SyntheticCamera::default(), CaptureOptions::default());
/// controller.on_frame(|frame| println!("{}", frame.stats().resolution()));
/// controller.on_error(|err| eprintln!("{err}"));
///
/// tokio::task::LocalSet::new()
///     .run_until(async {
///         controller.start(TargetFps::new(15)?).await?;
///         tokio::time::sleep(std::time::Duration::from_secs(1)).await;
///         controller.stop();
///         Ok::<(), camera_feed::Error>(())
///     })
///     .await
/// # }
/// ```
pub struct CaptureController<B: CameraBackend> {
    backend: B,
    shared: Rc<Shared<B::Stream>>,
}

impl<B: CameraBackend> fmt::Debug for CaptureController<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureController")
            .field("options", &self.shared.options)
            .field("active", &self.is_active())
            .field("pending", &self.shared.pending.get())
            .field("generation", &self.shared.generation.get())
            .finish()
    }
}

impl<B: CameraBackend> CaptureController<B> {
    pub fn new(backend: B, options: CaptureOptions) -> Self {
        Self::with_clock(backend, options, Rc::new(SystemClock::new()))
    }

    /// Use `clock` for frame timestamps.
    pub fn with_clock(backend: B, options: CaptureOptions, clock: Rc<dyn Clock>) -> Self {
        Self {
            backend,
            shared: Rc::new(Shared {
                options,
                clock,
                on_frame: HandlerCell::new(Rc::new(|_: FrameData| {})),
                on_error: HandlerCell::new(Rc::new(|_: &CaptureError| {})),
                session: RefCell::new(None),
                pending: Cell::new(false),
                generation: Cell::new(0),
            }),
        }
    }

    /// Register the frame handler, replacing the previous one.
    ///
    /// Takes effect from the next tick, also for a running session.
    pub fn on_frame<F>(&self, handler: F)
    where
        F: Fn(FrameData) + 'static,
    {
        self.shared.on_frame.replace(Rc::new(handler));
    }

    /// Register the error handler, replacing the previous one.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&CaptureError) + 'static,
    {
        self.shared.on_error.replace(Rc::new(handler));
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.shared.options
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// A session holds a stream and a sampling tick.
    pub fn is_active(&self) -> bool {
        self.shared.session.borrow().is_some()
    }

    /// An acquisition is in flight.
    pub fn is_pending(&self) -> bool {
        self.shared.pending.get()
    }

    /// Sampling rate of the active session.
    pub fn target_fps(&self) -> Option<TargetFps> {
        self.shared
            .session
            .borrow()
            .as_ref()
            .map(|session| session.target_fps)
    }

    /// Acquire the camera and start sampling every `1000 / target_fps` ms.
    ///
    /// Does nothing if a session is active or an acquisition is already in
    /// flight. Must be awaited inside a [`tokio::task::LocalSet`].
    ///
    /// # Errors
    ///
    /// An acquisition failure is classified, passed to the error handler, and
    /// then returned; callers should treat it as already reported. If `stop`
    /// runs while acquisition is pending, the granted stream is released and
    /// [`CaptureError::Aborted`] is returned without calling the handler.
    pub async fn start(&self, target_fps: TargetFps) -> Result<(), CaptureError> {
        let shared = &self.shared;
        if shared.session.borrow().is_some() || shared.pending.get() {
            debug!("capture already started");
            return Ok(());
        }

        let generation = shared.generation.get();
        shared.pending.set(true);
        let acquired = self.backend.acquire(&shared.options.constraints).await;

        if shared.generation.get() != generation {
            debug!("capture stopped while acquiring, releasing stream");
            if let Ok(mut stream) = acquired {
                stream.stop_tracks();
            }
            return Err(CaptureError::Aborted);
        }
        shared.pending.set(false);

        let stream = match acquired {
            Ok(stream) => stream,
            Err(err) => {
                error!(error = %err, "camera access error");
                let classified = CaptureError::classify(&err);
                (shared.on_error.current())(&classified);
                return Err(classified);
            }
        };

        let ticker = spawn_ticker(Rc::downgrade(shared), generation, target_fps.period());
        *shared.session.borrow_mut() = Some(CaptureSession {
            generation,
            target_fps,
            stream,
            surface: DecodeSurface::new(),
            ticker,
        });
        info!(fps = target_fps.get(), "capture started");
        Ok(())
    }

    /// Cancel the sampling tick, then stop and release every device track.
    ///
    /// Safe to call at any time. No handler fires after this returns for the
    /// session it ended.
    pub fn stop(&self) {
        self.shared.teardown();
    }
}

impl<B: CameraBackend> Drop for CaptureController<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
