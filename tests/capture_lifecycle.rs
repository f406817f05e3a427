//! Capture controller lifecycle tests
//!
//! These run on a paused tokio clock inside a `LocalSet`, so sampling ticks
//! fire at exact simulated times and the tests finish instantly.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
    time::Duration,
};

use camera_feed::{
    AcquireError, CameraBackend, CaptureController, CaptureError, CaptureOptions, Clock,
    FrameData, FrameThrottle, ManualClock, SyntheticCamera, SystemClock, TargetFps,
};
use tokio::{task::LocalSet, time::sleep};

fn small_camera() -> SyntheticCamera {
    SyntheticCamera::builder().native_resolution(64, 36).build()
}

fn fps(value: u32) -> TargetFps {
    TargetFps::new(value).unwrap()
}

#[derive(Clone, Default)]
struct Recorder {
    frames: Rc<RefCell<Vec<FrameData>>>,
    errors: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    fn attach<B: CameraBackend>(controller: &CaptureController<B>) -> Self {
        let recorder = Self::default();
        let frames = Rc::clone(&recorder.frames);
        controller.on_frame(move |frame| frames.borrow_mut().push(frame));
        let errors = Rc::clone(&recorder.errors);
        controller.on_error(move |err| errors.borrow_mut().push(err.to_string()));
        recorder
    }

    fn frame_count(&self) -> usize {
        self.frames.borrow().len()
    }

    fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_acquires_once() {
    LocalSet::new()
        .run_until(async {
            let camera = small_camera();
            let controller = CaptureController::new(camera.clone(), CaptureOptions::default());

            controller.start(fps(10)).await.unwrap();
            controller.start(fps(10)).await.unwrap();

            assert_eq!(camera.acquisitions(), 1);
            assert_eq!(camera.live_tracks(), 1);
            assert_eq!(controller.target_fps(), Some(fps(10)));

            controller.stop();
            assert_eq!(camera.live_tracks(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_starts_acquire_once() {
    LocalSet::new()
        .run_until(async {
            let camera = SyntheticCamera::builder()
                .native_resolution(64, 36)
                .acquire_delay(Duration::from_millis(200))
                .build();
            let controller = CaptureController::new(camera.clone(), CaptureOptions::default());

            let (first, second) = tokio::join!(controller.start(fps(10)), controller.start(fps(10)));
            assert!(first.is_ok());
            assert!(second.is_ok());
            assert_eq!(camera.acquisitions(), 1);
            assert!(controller.is_active());
            assert!(!controller.is_pending());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_when_idle_is_harmless() {
    LocalSet::new()
        .run_until(async {
            let camera = small_camera();
            let controller = CaptureController::new(camera.clone(), CaptureOptions::default());
            let recorder = Recorder::attach(&controller);

            controller.stop();
            controller.stop();

            assert!(!controller.is_active());
            assert!(recorder.errors().is_empty());
            assert_eq!(camera.acquisitions(), 0);

            // Still usable afterwards
            controller.start(fps(10)).await.unwrap();
            assert!(controller.is_active());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_frames_carry_synthetic_stats() {
    LocalSet::new()
        .run_until(async {
            let clock = ManualClock::new(1_700_000_000_000);
            let controller = CaptureController::with_clock(
                small_camera(),
                CaptureOptions::default(),
                Rc::new(clock),
            );
            let recorder = Recorder::attach(&controller);

            controller.start(fps(10)).await.unwrap();
            sleep(Duration::from_millis(1050)).await;
            controller.stop();

            let frames = recorder.frames.borrow();
            assert!((9..=11).contains(&frames.len()), "got {} frames", frames.len());
            for frame in frames.iter() {
                let stats = frame.stats();
                assert_eq!(stats.fps(), 10);
                assert_eq!(stats.resolution().to_string(), "64x36");
                assert!((5..10).contains(&stats.processing_time_ms()));
                assert_eq!(stats.timestamp_ms(), 1_700_000_000_000);
                assert!(frame.image_url().starts_with("data:image/jpeg;base64,"));
            }
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_waits_one_period() {
    LocalSet::new()
        .run_until(async {
            let controller = CaptureController::new(small_camera(), CaptureOptions::default());
            let recorder = Recorder::attach(&controller);

            controller.start(fps(2)).await.unwrap();
            sleep(Duration::from_millis(450)).await;
            assert_eq!(recorder.frame_count(), 0);

            sleep(Duration::from_millis(100)).await;
            assert_eq!(recorder.frame_count(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_native_resolution_formatting() {
    LocalSet::new()
        .run_until(async {
            let camera = SyntheticCamera::default();
            let controller = CaptureController::new(camera, CaptureOptions::default());
            let recorder = Recorder::attach(&controller);

            controller.start(fps(1)).await.unwrap();
            sleep(Duration::from_millis(1100)).await;
            controller.stop();

            let frames = recorder.frames.borrow();
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].stats().resolution().to_string(), "1280x720");
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_negotiating_device_emits_nothing() {
    LocalSet::new()
        .run_until(async {
            let camera = SyntheticCamera::builder()
                .native_resolution(64, 36)
                .negotiating_polls(u32::MAX)
                .build();
            let controller = CaptureController::new(camera, CaptureOptions::default());
            let recorder = Recorder::attach(&controller);

            controller.start(fps(30)).await.unwrap();
            sleep(Duration::from_secs(1)).await;

            assert_eq!(recorder.frame_count(), 0);
            assert!(recorder.errors().is_empty());
            assert!(controller.is_active());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_frames_begin_once_dimensions_are_known() {
    LocalSet::new()
        .run_until(async {
            let camera = SyntheticCamera::builder()
                .native_resolution(64, 36)
                .negotiating_polls(3)
                .build();
            let controller = CaptureController::new(camera, CaptureOptions::default());
            let recorder = Recorder::attach(&controller);

            controller.start(fps(10)).await.unwrap();
            sleep(Duration::from_millis(1050)).await;

            let count = recorder.frame_count();
            assert!((6..=8).contains(&count), "got {count} frames");
            assert!(recorder.errors().is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_is_reported_once() {
    LocalSet::new()
        .run_until(async {
            let camera = SyntheticCamera::builder()
                .failure(AcquireError::NotAllowed)
                .build();
            let controller = CaptureController::new(camera.clone(), CaptureOptions::default());
            let recorder = Recorder::attach(&controller);

            let result = controller.start(fps(15)).await;

            assert_eq!(result, Err(CaptureError::PermissionDenied));
            assert_eq!(
                recorder.errors(),
                vec!["Camera permission was denied. Please grant permission and try again."]
            );
            assert!(!controller.is_active());
            assert!(!controller.is_pending());
            assert_eq!(camera.live_tracks(), 0);

            sleep(Duration::from_secs(1)).await;
            assert_eq!(recorder.frame_count(), 0);
            assert_eq!(recorder.errors().len(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_error_taxonomy() {
    LocalSet::new()
        .run_until(async {
            let cases = [
                (
                    AcquireError::NotFound,
                    CaptureError::DeviceNotFound,
                    "No camera was found on this device.",
                ),
                (
                    AcquireError::from_name("NotReadableError", "device busy"),
                    CaptureError::Unknown,
                    "Could not access the camera. Please ensure permissions are granted.",
                ),
            ];

            for (failure, expected, message) in cases {
                let camera = SyntheticCamera::builder().failure(failure).build();
                let controller = CaptureController::new(camera, CaptureOptions::default());
                let recorder = Recorder::attach(&controller);

                assert_eq!(controller.start(fps(15)).await, Err(expected));
                assert_eq!(recorder.errors(), vec![message]);
            }
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_failure() {
    LocalSet::new()
        .run_until(async {
            let camera = SyntheticCamera::builder()
                .native_resolution(64, 36)
                .failure(AcquireError::NotFound)
                .build();
            let controller = CaptureController::new(camera.clone(), CaptureOptions::default());

            assert!(controller.start(fps(10)).await.is_err());
            assert!(!controller.is_active());

            camera.set_failure(None);
            controller.start(fps(10)).await.unwrap();
            assert!(controller.is_active());
            assert_eq!(camera.acquisitions(), 2);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_no_callbacks_after_stop() {
    LocalSet::new()
        .run_until(async {
            let camera = small_camera();
            let controller = CaptureController::new(camera.clone(), CaptureOptions::default());
            let recorder = Recorder::attach(&controller);

            controller.start(fps(10)).await.unwrap();
            // Wakes at the same instant the third tick is due
            sleep(Duration::from_millis(300)).await;
            controller.stop();

            let frames_at_stop = recorder.frame_count();
            assert!(frames_at_stop >= 2);
            assert_eq!(camera.live_tracks(), 0);
            assert!(!controller.is_active());

            sleep(Duration::from_secs(2)).await;
            assert_eq!(recorder.frame_count(), frames_at_stop);
            assert!(recorder.errors().is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_handler_replacement_without_restart() {
    LocalSet::new()
        .run_until(async {
            let camera = small_camera();
            let controller = CaptureController::new(camera.clone(), CaptureOptions::default());
            let first = Recorder::attach(&controller);

            controller.start(fps(10)).await.unwrap();
            sleep(Duration::from_millis(250)).await;
            let first_count = first.frame_count();
            assert!(first_count >= 1);

            let second = Recorder::attach(&controller);
            sleep(Duration::from_millis(300)).await;

            assert_eq!(first.frame_count(), first_count);
            assert!(second.frame_count() >= 2);
            assert_eq!(camera.acquisitions(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_handler_may_stop_controller() {
    LocalSet::new()
        .run_until(async {
            let camera = small_camera();
            let controller = Rc::new(CaptureController::new(
                camera.clone(),
                CaptureOptions::default(),
            ));
            let frames = Rc::new(RefCell::new(0usize));

            let weak: Weak<CaptureController<SyntheticCamera>> = Rc::downgrade(&controller);
            let counter = Rc::clone(&frames);
            controller.on_frame(move |_| {
                *counter.borrow_mut() += 1;
                if let Some(controller) = weak.upgrade() {
                    controller.stop();
                }
            });

            controller.start(fps(10)).await.unwrap();
            sleep(Duration::from_secs(1)).await;

            assert_eq!(*frames.borrow(), 1);
            assert!(!controller.is_active());
            assert_eq!(camera.live_tracks(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_pending_start_releases_stream() {
    LocalSet::new()
        .run_until(async {
            let camera = SyntheticCamera::builder()
                .native_resolution(64, 36)
                .acquire_delay(Duration::from_millis(500))
                .build();
            let controller = Rc::new(CaptureController::new(
                camera.clone(),
                CaptureOptions::default(),
            ));
            let recorder = Recorder::attach(&controller);

            let pending = Rc::clone(&controller);
            let start = tokio::task::spawn_local(async move { pending.start(fps(10)).await });

            sleep(Duration::from_millis(100)).await;
            assert!(controller.is_pending());
            controller.stop();

            let result = start.await.unwrap();
            assert_eq!(result, Err(CaptureError::Aborted));
            assert!(!controller.is_active());
            assert_eq!(camera.live_tracks(), 0);

            sleep(Duration::from_secs(1)).await;
            assert_eq!(recorder.frame_count(), 0);
            assert!(recorder.errors().is_empty());

            controller.start(fps(10)).await.unwrap();
            assert!(controller.is_active());
            assert_eq!(camera.acquisitions(), 2);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_restart_while_stale_start_pending() {
    LocalSet::new()
        .run_until(async {
            let camera = SyntheticCamera::builder()
                .native_resolution(64, 36)
                .acquire_delay(Duration::from_millis(500))
                .build();
            let controller = Rc::new(CaptureController::new(
                camera.clone(),
                CaptureOptions::default(),
            ));

            let stale = Rc::clone(&controller);
            let stale = tokio::task::spawn_local(async move { stale.start(fps(10)).await });
            sleep(Duration::from_millis(100)).await;
            controller.stop();

            let fresh = Rc::clone(&controller);
            let fresh = tokio::task::spawn_local(async move { fresh.start(fps(10)).await });

            assert_eq!(stale.await.unwrap(), Err(CaptureError::Aborted));
            assert_eq!(fresh.await.unwrap(), Ok(()));
            assert_eq!(camera.acquisitions(), 2);
            assert_eq!(camera.live_tracks(), 1);
            assert!(controller.is_active());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_stream_end_tears_down_session() {
    LocalSet::new()
        .run_until(async {
            let camera = small_camera();
            let controller = CaptureController::new(camera.clone(), CaptureOptions::default());
            let recorder = Recorder::attach(&controller);

            controller.start(fps(10)).await.unwrap();
            sleep(Duration::from_millis(250)).await;
            camera.end_stream();
            sleep(Duration::from_millis(200)).await;

            assert_eq!(
                recorder.errors(),
                vec!["The camera stream ended unexpectedly."]
            );
            assert!(!controller.is_active());
            assert_eq!(camera.live_tracks(), 0);

            let frames_after_end = recorder.frame_count();
            sleep(Duration::from_secs(1)).await;
            assert_eq!(recorder.frame_count(), frames_after_end);
            assert_eq!(recorder.errors().len(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_drop_releases_device() {
    LocalSet::new()
        .run_until(async {
            let camera = small_camera();
            {
                let controller =
                    CaptureController::new(camera.clone(), CaptureOptions::default());
                controller.start(fps(10)).await.unwrap();
                assert_eq!(camera.live_tracks(), 1);
            }
            assert_eq!(camera.live_tracks(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_thirty_fps_capture_into_ten_fps_display() {
    LocalSet::new()
        .run_until(async {
            let controller = CaptureController::new(small_camera(), CaptureOptions::default());
            let clock = SystemClock::new();
            let throttle = Rc::new(RefCell::new(FrameThrottle::new()));
            let ticks = Rc::new(RefCell::new(0usize));
            let accepted = Rc::new(RefCell::new(0usize));

            {
                let (throttle, ticks, accepted) =
                    (Rc::clone(&throttle), Rc::clone(&ticks), Rc::clone(&accepted));
                controller.on_frame(move |_| {
                    *ticks.borrow_mut() += 1;
                    if throttle.borrow_mut().admit(clock.monotonic_ms(), fps(10)) {
                        *accepted.borrow_mut() += 1;
                    }
                });
            }

            controller.start(fps(30)).await.unwrap();
            sleep(Duration::from_millis(10_010)).await;
            controller.stop();

            let ticks = *ticks.borrow();
            let accepted = *accepted.borrow();
            assert!((299..=301).contains(&ticks), "ticks {ticks}");
            assert!((97..=103).contains(&accepted), "accepted {accepted}");
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_equal_capture_and_display_rates() {
    LocalSet::new()
        .run_until(async {
            let controller = CaptureController::new(small_camera(), CaptureOptions::default());
            let clock = SystemClock::new();
            let counts = Rc::new(RefCell::new((0usize, 0usize)));

            {
                let counts = Rc::clone(&counts);
                let throttle = RefCell::new(FrameThrottle::new());
                controller.on_frame(move |_| {
                    let mut counts = counts.borrow_mut();
                    counts.0 += 1;
                    if throttle.borrow_mut().admit(clock.monotonic_ms(), fps(15)) {
                        counts.1 += 1;
                    }
                });
            }

            controller.start(fps(15)).await.unwrap();
            sleep(Duration::from_millis(3_010)).await;
            controller.stop();

            let (ticks, accepted) = *counts.borrow();
            assert!((44..=46).contains(&ticks), "ticks {ticks}");
            assert_eq!(accepted, ticks);
        })
        .await;
}
