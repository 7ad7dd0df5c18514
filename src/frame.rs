// Frame scheduling: per-frame GPU records, the vertex ring cursor and the
// frame-slot state machine that paces the CPU against the GPU.

use anyhow::Result;
use ash::vk;
use std::sync::Arc;

use crate::backend::buffer::GpuBuffer;
use crate::backend::command::CommandPool;
use crate::backend::sync::FrameSync;
use crate::backend::VulkanDevice;

/// Frames the CPU may record ahead of completed GPU work
pub const FRAMES_IN_FLIGHT: usize = 2;

/// Byte cursor into a fixed-capacity vertex ring.
///
/// `offset <= capacity` always holds; a reservation that does not fit leaves the
/// cursor where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingCursor {
    capacity: u64,
    offset: u64,
}

impl RingCursor {
    pub fn new(capacity: u64) -> Self {
        Self { capacity, offset: 0 }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn remaining(&self) -> u64 {
        self.capacity - self.offset
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Claim `size` bytes, returning where they start
    pub fn try_reserve(&mut self, size: u64) -> Option<u64> {
        if size > self.remaining() {
            return None;
        }
        let start = self.offset;
        self.offset += size;
        Some(start)
    }
}

/// Where one frame slot is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    /// Fence waited, waiting for a swapchain image
    Acquiring,
    /// Image acquired; the slot's `image_available` semaphore has a pending
    /// signal that some submission must wait on
    Acquired,
    /// Command buffer open (`open == true`) or closed and ready to submit
    Recording { open: bool },
    /// Handed to the queue; the slot's fence signals when the GPU is done
    Submitted,
}

/// Pure bookkeeping for the frames in flight.
///
/// Frame numbers count successfully begun frames from 0. Every begun frame is
/// eventually submitted (or abandoned at submission) on the slot it was begun
/// on, and the current slot advances after that, so frame `n` runs on slot
/// `n % FRAMES_IN_FLIGHT`.
#[derive(Debug, Clone)]
pub struct FrameSlots {
    phases: [FramePhase; FRAMES_IN_FLIGHT],
    /// Frame number last submitted on each slot
    submitted: [Option<u64>; FRAMES_IN_FLIGHT],
    current: usize,
    begun: u64,
}

impl Default for FrameSlots {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSlots {
    pub fn new() -> Self {
        Self {
            phases: [FramePhase::Idle; FRAMES_IN_FLIGHT],
            submitted: [None; FRAMES_IN_FLIGHT],
            current: 0,
            begun: 0,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn phase(&self) -> FramePhase {
        self.phases[self.current]
    }

    pub fn phase_of(&self, slot: usize) -> FramePhase {
        self.phases[slot]
    }

    pub fn frames_begun(&self) -> u64 {
        self.begun
    }

    /// Number of the frame being recorded or waiting for submission
    pub fn recording_frame(&self) -> Option<u64> {
        match self.phase() {
            FramePhase::Recording { .. } => Some(self.begun - 1),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.phase() == FramePhase::Recording { open: true }
    }

    /// Most recently begun frame, whether or not it has been submitted
    pub fn last_begun(&self) -> Option<u64> {
        self.begun.checked_sub(1)
    }

    /// Enter `Acquiring` on the current slot.
    ///
    /// Returns the frame whose fence must be waited on first: the one submitted
    /// on this slot `FRAMES_IN_FLIGHT` frames ago, if any.
    pub fn start_acquire(&mut self) -> Option<u64> {
        self.phases[self.current] = FramePhase::Acquiring;
        self.submitted[self.current]
    }

    /// The swapchain handed out an image for the current slot
    pub fn image_acquired(&mut self) {
        if self.phase() == FramePhase::Acquiring {
            self.phases[self.current] = FramePhase::Acquired;
        }
    }

    /// The frame could not be started; the slot goes back to idle and its last
    /// submission is still the one to wait on next time.
    ///
    /// Returns true if an image had already been acquired, in which case the
    /// caller must consume the `image_available` signal before the slot
    /// acquires again.
    pub fn abandon_acquire(&mut self) -> bool {
        match self.phase() {
            FramePhase::Acquiring => {
                self.phases[self.current] = FramePhase::Idle;
                false
            }
            FramePhase::Acquired => {
                self.phases[self.current] = FramePhase::Idle;
                true
            }
            _ => false,
        }
    }

    /// Image acquired and command buffer opened; returns the new frame number
    pub fn start_recording(&mut self) -> u64 {
        let frame = self.begun;
        self.begun += 1;
        self.phases[self.current] = FramePhase::Recording { open: true };
        frame
    }

    /// Close recording. Returns false if no frame was open.
    pub fn finish_recording(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.phases[self.current] = FramePhase::Recording { open: false };
        true
    }

    /// Record the outcome of submitting the closed frame and advance to the
    /// next slot. `submitted == false` means the queue rejected the work, so
    /// the slot's fence will not signal and must not be waited on.
    ///
    /// Returns the frame number, or `None` if there was no closed frame.
    pub fn complete(&mut self, submitted: bool) -> Option<u64> {
        if self.phase() != (FramePhase::Recording { open: false }) {
            return None;
        }
        let frame = self.begun - 1;
        if submitted {
            self.phases[self.current] = FramePhase::Submitted;
            self.submitted[self.current] = Some(frame);
        } else {
            self.phases[self.current] = FramePhase::Idle;
            self.submitted[self.current] = None;
        }
        self.current = (self.current + 1) % FRAMES_IN_FLIGHT;
        Some(frame)
    }

    /// Highest frame number the GPU is known to be done with, valid right
    /// after `start_recording` returned `frame`
    pub fn completed_through(frame: u64) -> Option<u64> {
        frame.checked_sub(FRAMES_IN_FLIGHT as u64)
    }
}

/// What to do about the requested swapchain size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeAction {
    /// The swapchain is up to date
    Keep,
    /// Rebuild the swapchain-sized resources now
    Rebuild { width: u32, height: u32 },
    /// A frame is being recorded; the next `begin_frame` rebuilds
    Defer,
    /// Zero-sized window; keep the current swapchain and skip rendering
    Minimized,
}

/// The size the host window asked for and whether the swapchain still has to
/// catch up with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeState {
    width: u32,
    height: u32,
    pending: bool,
}

impl ResizeState {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, pending: false }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// The window was resized. `recording` is whether a frame is between
    /// `begin_frame` and `present`.
    pub fn request(&mut self, width: u32, height: u32, recording: bool) -> ResizeAction {
        self.width = width;
        self.height = height;
        self.pending = true;
        match self.next_action() {
            ResizeAction::Rebuild { .. } if recording => ResizeAction::Defer,
            action => action,
        }
    }

    /// The swapchain went stale or suboptimal, or presenting failed
    pub fn mark_stale(&mut self) {
        self.pending = true;
    }

    /// What `begin_frame` has to do before acquiring an image
    pub fn next_action(&self) -> ResizeAction {
        if !self.pending {
            ResizeAction::Keep
        } else if self.width == 0 || self.height == 0 {
            ResizeAction::Minimized
        } else {
            ResizeAction::Rebuild { width: self.width, height: self.height }
        }
    }

    /// The swapchain now matches the requested size
    pub fn rebuilt(&mut self) {
        self.pending = false;
    }
}

/// GPU resources for one frame in flight
pub struct FrameRecord {
    pub cmd: vk::CommandBuffer,
    pub sync: FrameSync,
    pub ring: GpuBuffer,
    pub cursor: RingCursor,
}

impl FrameRecord {
    pub fn new(
        device: Arc<VulkanDevice>,
        pool: &CommandPool,
        ring_size: vk::DeviceSize,
    ) -> Result<Self> {
        let sync = FrameSync::new(Arc::clone(&device))?;
        let ring = GpuBuffer::vertex_ring(device, ring_size)?;
        let cmd = pool.allocate(1)?[0];

        Ok(Self {
            cmd,
            sync,
            cursor: RingCursor::new(ring.size),
            ring,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_frame(slots: &mut FrameSlots) -> (Option<u64>, usize, u64) {
        let slot = slots.current();
        let wait = slots.start_acquire();
        let frame = slots.start_recording();
        assert!(slots.finish_recording());
        assert_eq!(slots.complete(true), Some(frame));
        (wait, slot, frame)
    }

    #[test]
    fn cursor_starts_at_zero_and_advances() {
        let mut cursor = RingCursor::new(100);
        assert_eq!(cursor.offset(), 0);
        assert_eq!(cursor.try_reserve(36), Some(0));
        assert_eq!(cursor.try_reserve(36), Some(36));
        assert_eq!(cursor.offset(), 72);
        cursor.reset();
        assert_eq!(cursor.offset(), 0);
    }

    #[test]
    fn oversized_reservation_leaves_cursor_unchanged() {
        let mut cursor = RingCursor::new(100);
        cursor.try_reserve(40).unwrap();
        let too_big = cursor.capacity() - cursor.offset() + 1;
        assert_eq!(cursor.try_reserve(too_big), None);
        assert_eq!(cursor.offset(), 40);
        // Exactly filling the ring is fine
        assert_eq!(cursor.try_reserve(60), Some(40));
        assert_eq!(cursor.offset(), cursor.capacity());
        assert_eq!(cursor.try_reserve(1), None);
    }

    #[test]
    fn each_frame_waits_on_the_one_two_back() {
        let mut slots = FrameSlots::new();
        for n in 0..10u64 {
            let (wait, slot, frame) = run_frame(&mut slots);
            assert_eq!(frame, n);
            assert_eq!(slot, (n % 2) as usize);
            assert_eq!(wait, n.checked_sub(2));
        }
        assert_eq!(slots.frames_begun(), 10);
    }

    #[test]
    fn failed_acquire_keeps_slot_and_wait_target() {
        let mut slots = FrameSlots::new();
        run_frame(&mut slots);
        run_frame(&mut slots);

        // Frame 2 on slot 0: acquire fails twice, then succeeds
        assert_eq!(slots.start_acquire(), Some(0));
        slots.abandon_acquire();
        assert_eq!(slots.phase(), FramePhase::Idle);
        assert_eq!(slots.current(), 0);
        assert_eq!(slots.start_acquire(), Some(0));
        slots.abandon_acquire();

        let (wait, slot, frame) = run_frame(&mut slots);
        assert_eq!((wait, slot, frame), (Some(0), 0, 2));
    }

    #[test]
    fn rejected_submission_is_not_waited_on() {
        let mut slots = FrameSlots::new();
        slots.start_acquire();
        slots.start_recording();
        slots.finish_recording();
        assert_eq!(slots.complete(false), Some(0));
        assert_eq!(slots.phase_of(0), FramePhase::Idle);

        run_frame(&mut slots);
        // Back on slot 0, nothing in flight there
        assert_eq!(slots.start_acquire(), None);
    }

    #[test]
    fn phases_follow_the_cycle() {
        let mut slots = FrameSlots::new();
        assert_eq!(slots.phase(), FramePhase::Idle);
        slots.start_acquire();
        assert_eq!(slots.phase(), FramePhase::Acquiring);
        slots.start_recording();
        assert!(slots.is_open());
        assert_eq!(slots.recording_frame(), Some(0));
        assert!(slots.finish_recording());
        assert!(!slots.is_open());
        assert!(!slots.finish_recording());
        slots.complete(true);
        assert_eq!(slots.phase_of(0), FramePhase::Submitted);
        assert_eq!(slots.current(), 1);
        assert_eq!(slots.recording_frame(), None);
    }

    #[test]
    fn complete_without_closed_frame_is_ignored() {
        let mut slots = FrameSlots::new();
        assert_eq!(slots.complete(true), None);
        slots.start_acquire();
        slots.start_recording();
        // Still open
        assert_eq!(slots.complete(true), None);
        assert_eq!(slots.current(), 0);
    }

    #[test]
    fn abandoning_after_acquire_reports_the_pending_signal() {
        let mut slots = FrameSlots::new();

        slots.start_acquire();
        assert!(!slots.abandon_acquire());

        slots.start_acquire();
        slots.image_acquired();
        assert_eq!(slots.phase(), FramePhase::Acquired);
        assert!(slots.abandon_acquire());
        assert_eq!(slots.phase(), FramePhase::Idle);
        assert_eq!(slots.current(), 0);

        // Nothing to abandon once recording
        slots.start_acquire();
        slots.image_acquired();
        slots.start_recording();
        assert!(!slots.abandon_acquire());
        assert!(slots.is_open());
    }

    #[test]
    fn resize_while_idle_rebuilds_now() {
        let mut resize = ResizeState::new(800, 600);
        assert_eq!(resize.next_action(), ResizeAction::Keep);

        assert_eq!(
            resize.request(1024, 768, false),
            ResizeAction::Rebuild { width: 1024, height: 768 }
        );
        resize.rebuilt();
        assert!(!resize.is_pending());
        assert_eq!(resize.size(), (1024, 768));
    }

    #[test]
    fn resize_while_recording_waits_for_the_next_frame() {
        let mut slots = FrameSlots::new();
        let mut resize = ResizeState::new(800, 600);
        slots.start_acquire();
        slots.image_acquired();
        slots.start_recording();

        let recording = slots.recording_frame().is_some();
        assert_eq!(resize.request(640, 480, recording), ResizeAction::Defer);

        // Still deferred after end_frame, until present completes the frame
        slots.finish_recording();
        assert!(slots.recording_frame().is_some());
        slots.complete(true);
        assert_eq!(
            resize.next_action(),
            ResizeAction::Rebuild { width: 640, height: 480 }
        );
    }

    #[test]
    fn minimized_window_keeps_the_request_until_restored() {
        let mut resize = ResizeState::new(800, 600);
        assert_eq!(resize.request(0, 600, false), ResizeAction::Minimized);
        assert_eq!(resize.request(0, 0, true), ResizeAction::Minimized);
        assert_eq!(resize.next_action(), ResizeAction::Minimized);

        assert_eq!(
            resize.request(800, 600, false),
            ResizeAction::Rebuild { width: 800, height: 600 }
        );
    }

    #[test]
    fn stale_swapchain_rebuilds_at_the_last_size() {
        let mut resize = ResizeState::new(800, 600);
        resize.mark_stale();
        assert_eq!(
            resize.next_action(),
            ResizeAction::Rebuild { width: 800, height: 600 }
        );
        resize.rebuilt();
        assert_eq!(resize.next_action(), ResizeAction::Keep);
    }

    #[test]
    fn completed_through_lags_by_frames_in_flight() {
        assert_eq!(FrameSlots::completed_through(0), None);
        assert_eq!(FrameSlots::completed_through(1), None);
        assert_eq!(FrameSlots::completed_through(2), Some(0));
        assert_eq!(FrameSlots::completed_through(7), Some(5));
    }
}
