//! The per-frame state machine.
//!
//! [`FrameLoop`] sequences one iteration over a [`FrameBackend`]:
//!
//! ```text
//! wait(slot) -> acquire -> reset(slot) -> record -> submit -> present -> advance
//!                  |                                            |
//!             out of date                             stale / resized
//!                  v                                            v
//!           rebuild, skip frame                         rebuild, then advance
//! ```
//!
//! The backend owns the GPU objects. The loop owns the slot counter, the
//! per-slot state and the decision of when to rebuild. Keeping the two apart
//! lets the ordering be tested without a GPU.

use tracing::{debug, trace};

use trigon_platform::WindowEvents;

use crate::error::RendererResult;
use crate::resize::ResizeHandler;

/// Round-robin frame slot index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameCounter {
    current: usize,
    count: usize,
}

impl FrameCounter {
    /// Creates a counter over `count` slots. Zero is treated as one.
    pub fn new(count: usize) -> Self {
        Self {
            current: 0,
            count: count.max(1),
        }
    }

    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.count;
    }
}

/// Where a frame slot is in its iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotState {
    #[default]
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image index was returned. `suboptimal` asks for a rebuild once the
    /// frame is presented.
    Ready { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface and cannot be used.
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Out of date or suboptimal. The frame was queued or dropped, either
    /// way the bundle needs a rebuild.
    Stale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Presented { slot: usize, image_index: u32 },
    /// The iteration was abandoned for a rebuild. The slot is retried.
    Skipped,
}

/// GPU operations one frame iteration needs, addressed by slot index.
///
/// Errors returned here are fatal. Stale presentation is reported through
/// the outcome enums instead.
pub trait FrameBackend {
    /// Blocks until the slot's previous submission has completed.
    fn wait_for_slot(&mut self, slot: usize) -> RendererResult<()>;

    /// Requests the next presentable image, signaling the slot's acquire
    /// semaphore once it is available.
    fn acquire_image(&mut self, slot: usize) -> RendererResult<AcquireOutcome>;

    /// Unsignals the slot's fence. Only valid after a successful acquire.
    fn reset_slot(&mut self, slot: usize) -> RendererResult<()>;

    /// Re-records the slot's command buffer for `image_index`.
    fn record(&mut self, slot: usize, image_index: u32) -> RendererResult<()>;

    /// Submits the slot's command buffer, arming its fence.
    fn submit(&mut self, slot: usize) -> RendererResult<()>;

    fn present(&mut self, slot: usize, image_index: u32) -> RendererResult<PresentOutcome>;

    /// Blocks until the device has no work in flight.
    fn wait_idle(&mut self) -> RendererResult<()>;

    /// Replaces the presentation bundle for a window of the given size.
    fn rebuild_presentation(&mut self, width: u32, height: u32) -> RendererResult<()>;
}

/// Drives frames through a [`FrameBackend`].
#[derive(Debug)]
pub struct FrameLoop {
    counter: FrameCounter,
    states: Vec<SlotState>,
    resize: ResizeHandler,
    frames_presented: u64,
}

impl FrameLoop {
    pub fn new(frames_in_flight: usize) -> Self {
        let counter = FrameCounter::new(frames_in_flight);
        Self {
            states: vec![SlotState::Idle; counter.count()],
            counter,
            resize: ResizeHandler::new(),
            frames_presented: 0,
        }
    }

    #[inline]
    pub fn current_slot(&self) -> usize {
        self.counter.current()
    }

    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.states.get(slot).copied()
    }

    #[inline]
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    #[inline]
    pub fn rebuilds(&self) -> u64 {
        self.resize.rebuilds()
    }

    fn set_state(&mut self, slot: usize, state: SlotState) {
        if let Some(s) = self.states.get_mut(slot) {
            trace!("Slot {}: {:?} -> {:?}", slot, s, state);
            *s = state;
        }
    }

    /// Runs one frame iteration.
    pub fn draw_frame(
        &mut self,
        backend: &mut impl FrameBackend,
        window: &mut impl WindowEvents,
    ) -> RendererResult<FrameStatus> {
        let slot = self.counter.current();

        backend.wait_for_slot(slot)?;

        self.set_state(slot, SlotState::Acquiring);
        let (image_index, suboptimal) = match backend.acquire_image(slot)? {
            AcquireOutcome::Ready {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                // The fence is still signaled, so the retry's wait returns
                // immediately.
                debug!("Swapchain out of date on acquire, rebuilding");
                self.set_state(slot, SlotState::Idle);
                window.take_resize();
                self.resize.handle(backend, window)?;
                return Ok(FrameStatus::Skipped);
            }
        };

        if suboptimal {
            debug!("Swapchain suboptimal on acquire, rebuild scheduled");
        }

        backend.reset_slot(slot)?;

        self.set_state(slot, SlotState::Recording);
        backend.record(slot, image_index)?;

        backend.submit(slot)?;
        self.set_state(slot, SlotState::Submitted);

        self.set_state(slot, SlotState::Presenting);
        let presented = backend.present(slot, image_index)?;

        let resized = window.take_resize().is_some();
        if presented == PresentOutcome::Stale || resized || suboptimal {
            debug!(
                "Rebuilding after present (stale: {}, resized: {}, suboptimal: {})",
                presented == PresentOutcome::Stale,
                resized,
                suboptimal
            );
            self.resize.handle(backend, window)?;
        }

        self.set_state(slot, SlotState::Idle);
        self.counter.advance();
        self.frames_presented += 1;

        Ok(FrameStatus::Presented { slot, image_index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trigon_rhi::{RhiError, vk};

    use crate::MAX_FRAMES_IN_FLIGHT;
    use crate::error::RendererError;
    use crate::test_support::{Call, MockBackend, MockWindow};

    #[test]
    fn test_counter_has_period_n() {
        let mut counter = FrameCounter::new(3);
        let seen: Vec<usize> = (0..7)
            .map(|_| {
                let c = counter.current();
                counter.advance();
                c
            })
            .collect();
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_counter_clamps_zero() {
        let mut counter = FrameCounter::new(0);
        assert_eq!(counter.count(), 1);
        counter.advance();
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_iteration_order() {
        let mut backend = MockBackend::new();
        let mut window = MockWindow::new(800, 600);
        let mut frame_loop = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);

        let status = frame_loop.draw_frame(&mut backend, &mut window).unwrap();

        assert_eq!(
            status,
            FrameStatus::Presented {
                slot: 0,
                image_index: 0
            }
        );
        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Reset(0),
                Call::Record(0, 0),
                Call::Submit(0),
                Call::Present(0, 0),
            ]
        );
        assert_eq!(frame_loop.slot_state(0), Some(SlotState::Idle));
        assert_eq!(frame_loop.current_slot(), 1);
    }

    #[test]
    fn test_reset_never_precedes_wait() {
        let mut backend = MockBackend::new();
        let mut window = MockWindow::new(800, 600);
        let mut frame_loop = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);

        for _ in 0..6 {
            frame_loop.draw_frame(&mut backend, &mut window).unwrap();
        }

        for (i, call) in backend.calls.iter().enumerate() {
            if let Call::Reset(slot) = *call {
                let last_wait = backend.calls[..i]
                    .iter()
                    .rposition(|c| matches!(c, Call::Wait(_)));
                let last_wait = last_wait.map(|w| backend.calls[w]);
                assert_eq!(last_wait, Some(Call::Wait(slot)));
            }
        }
        assert_eq!(backend.count(Call::Wait(0)), 3);
        assert_eq!(backend.count(Call::Wait(1)), 3);
    }

    #[test]
    fn test_out_of_date_acquire_skips_and_retries_slot() {
        let mut backend = MockBackend::new();
        backend.acquire_script.extend([
            AcquireOutcome::Ready {
                image_index: 0,
                suboptimal: false,
            },
            AcquireOutcome::Ready {
                image_index: 1,
                suboptimal: false,
            },
            AcquireOutcome::OutOfDate,
        ]);
        let mut window = MockWindow::new(800, 600);
        let mut frame_loop = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);

        frame_loop.draw_frame(&mut backend, &mut window).unwrap();
        frame_loop.draw_frame(&mut backend, &mut window).unwrap();
        let before = backend.calls.len();

        let third = frame_loop.draw_frame(&mut backend, &mut window).unwrap();
        assert_eq!(third, FrameStatus::Skipped);
        assert_eq!(
            backend.calls[before..],
            [
                Call::Wait(0),
                Call::Acquire(0),
                Call::WaitIdle,
                Call::Rebuild(800, 600)
            ]
        );
        assert_eq!(frame_loop.current_slot(), 0);
        assert_eq!(frame_loop.rebuilds(), 1);

        let fourth = frame_loop.draw_frame(&mut backend, &mut window).unwrap();
        assert!(matches!(fourth, FrameStatus::Presented { slot: 0, .. }));
        assert_eq!(backend.count(Call::Reset(0)), 2);
        assert_eq!(frame_loop.frames_presented(), 3);
    }

    #[test]
    fn test_stale_present_rebuilds_after_presenting() {
        let mut backend = MockBackend::new();
        backend.present_script.push_back(PresentOutcome::Stale);
        let mut window = MockWindow::new(800, 600);
        let mut frame_loop = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);

        let status = frame_loop.draw_frame(&mut backend, &mut window).unwrap();

        assert!(matches!(status, FrameStatus::Presented { slot: 0, .. }));
        assert_eq!(
            backend.calls[5..],
            [Call::Present(0, 0), Call::WaitIdle, Call::Rebuild(800, 600)]
        );
        assert_eq!(frame_loop.current_slot(), 1);
    }

    #[test]
    fn test_suboptimal_acquire_still_renders() {
        let mut backend = MockBackend::new();
        backend.acquire_script.push_back(AcquireOutcome::Ready {
            image_index: 2,
            suboptimal: true,
        });
        let mut window = MockWindow::new(800, 600);
        let mut frame_loop = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);

        frame_loop.draw_frame(&mut backend, &mut window).unwrap();

        assert_eq!(backend.count(Call::Submit(0)), 1);
        assert_eq!(backend.count(Call::Present(0, 2)), 1);
        assert_eq!(backend.calls.last(), Some(&Call::Rebuild(800, 600)));
    }

    #[test]
    fn test_resize_yields_clamped_extent() {
        let mut backend = MockBackend::new();
        let mut window = MockWindow::new(800, 600);
        let mut frame_loop = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);

        frame_loop.draw_frame(&mut backend, &mut window).unwrap();

        window.resize(4000, 8);
        frame_loop.draw_frame(&mut backend, &mut window).unwrap();

        assert_eq!(backend.calls.last(), Some(&Call::Rebuild(4000, 8)));
        assert_eq!(
            backend.extent,
            vk_extent(1920, 16),
            "extent must be clamped to the surface bounds"
        );

        // The notification is consumed by the rebuild.
        let before = backend.count(Call::WaitIdle);
        frame_loop.draw_frame(&mut backend, &mut window).unwrap();
        assert_eq!(backend.count(Call::WaitIdle), before);
    }

    #[test]
    fn test_in_flight_submissions_bounded_by_slot_count() {
        for n in 1..=4 {
            let mut backend = MockBackend::new();
            let mut window = MockWindow::new(800, 600);
            let mut frame_loop = FrameLoop::new(n);

            for _ in 0..12 {
                frame_loop.draw_frame(&mut backend, &mut window).unwrap();
            }

            assert_eq!(backend.max_unsignaled, n, "frames in flight: {n}");
            assert_eq!(backend.early_resets, 0, "frames in flight: {n}");
            assert_eq!(backend.fences.len(), n);
        }
    }

    #[test]
    fn test_fatal_submit_propagates_without_advancing() {
        let mut backend = MockBackend::new();
        backend.fail_on = Some((Call::Submit(0), 2));
        let mut window = MockWindow::new(800, 600);
        let mut frame_loop = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);

        frame_loop.draw_frame(&mut backend, &mut window).unwrap();
        frame_loop.draw_frame(&mut backend, &mut window).unwrap();
        let err = frame_loop
            .draw_frame(&mut backend, &mut window)
            .unwrap_err();

        assert!(matches!(
            err,
            RendererError::Submission(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST))
        ));
        assert_eq!(frame_loop.current_slot(), 0);
        assert_eq!(frame_loop.frames_presented(), 2);
        assert_eq!(backend.calls.last(), Some(&Call::Submit(0)));
        assert_eq!(backend.count(Call::Present(0, 2)), 0);
    }

    #[test]
    fn test_fatal_acquire_and_present_propagate() {
        for failing in [Call::Acquire(0), Call::Present(0, 0)] {
            let mut backend = MockBackend::new();
            backend.fail_on = Some((failing, 1));
            let mut window = MockWindow::new(800, 600);
            let mut frame_loop = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);

            let result = frame_loop.draw_frame(&mut backend, &mut window);

            assert!(
                matches!(result, Err(RendererError::Submission(_))),
                "{failing:?}"
            );
            assert_eq!(frame_loop.current_slot(), 0);
            assert_eq!(frame_loop.frames_presented(), 0);
            assert_eq!(backend.count(Call::Rebuild(800, 600)), 0);
        }
    }

    #[test]
    fn test_retry_after_out_of_date_uses_current_size() {
        let mut backend = MockBackend::new();
        backend.acquire_script.extend([
            AcquireOutcome::Ready {
                image_index: 0,
                suboptimal: false,
            },
            AcquireOutcome::Ready {
                image_index: 1,
                suboptimal: false,
            },
            AcquireOutcome::OutOfDate,
        ]);
        let mut window = MockWindow::new(800, 600);
        let mut frame_loop = FrameLoop::new(MAX_FRAMES_IN_FLIGHT);

        frame_loop.draw_frame(&mut backend, &mut window).unwrap();
        frame_loop.draw_frame(&mut backend, &mut window).unwrap();

        window.resize(1024, 768);
        let third = frame_loop.draw_frame(&mut backend, &mut window).unwrap();
        assert_eq!(third, FrameStatus::Skipped);
        assert_eq!(backend.calls.last(), Some(&Call::Rebuild(1024, 768)));
        assert_eq!(window.pending_resize, None);

        let fourth = frame_loop.draw_frame(&mut backend, &mut window).unwrap();
        assert!(matches!(fourth, FrameStatus::Presented { slot: 0, .. }));
        assert_eq!(backend.recorded_extents.last(), Some(&vk_extent(1024, 768)));
        assert_eq!(frame_loop.rebuilds(), 1);
    }

    fn vk_extent(width: u32, height: u32) -> trigon_rhi::vk::Extent2D {
        trigon_rhi::vk::Extent2D { width, height }
    }
}
