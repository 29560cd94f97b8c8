//! The per-frame synchronization state machine
//!
//! `FramePipeline` owns only the current slot index and the slot count;
//! every device-touching operation goes through the [`FrameDriver`]
//! capability set. The real renderer implements the driver against
//! Vulkan; tests implement it with a scripted mock, which is how the
//! ordering invariants are verified without a GPU.
//!
//! Per-slot lifecycle: wait for the slot-free gate, acquire a swapchain
//! image, update per-frame state, record, arm the gate, submit, present,
//! advance `(index + 1) % N`. A stale acquire aborts the step without
//! advancing; a stale present (or a pending resize notification)
//! rebuilds surface resources and still advances.

use crate::vulkan::context::{VulkanError, VulkanResult};

/// Result of requesting the next presentable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    /// Image acquired. `suboptimal` means the chain still works but no
    /// longer matches the surface exactly; the image is used anyway and
    /// staleness is dealt with at present time.
    Acquired { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface and must be rebuilt
    /// before any image can be acquired.
    OutOfDate,
}

/// Result of queuing a presentation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentResult {
    Presented,
    /// Out-of-date or suboptimal at present time. The image may still
    /// have been displayed; the chain must be rebuilt either way.
    Stale,
}

/// What a frame step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Submitted and presented normally.
    Rendered,
    /// Submitted and presented, then surface resources were rebuilt.
    RenderedAndRebuilt,
    /// Acquire reported the chain stale; nothing was submitted and the
    /// slot index did not advance. The caller retries next iteration.
    SkippedStale,
}

/// Device operations the frame pipeline drives, one call per phase.
///
/// Implementations must uphold the signal chain: `submit` waits on the
/// slot's image-available signal and signals both render-complete and
/// the slot-free gate; `present` waits on render-complete.
pub trait FrameDriver {
    /// Block until the slot's previous submission has retired.
    fn wait_slot_free(&mut self, slot: usize) -> VulkanResult<()>;

    /// Arm the slot-free gate for reuse.
    ///
    /// Called only once the step is committed to submitting, so an
    /// aborted acquire leaves the gate signaled and the next wait on
    /// this slot cannot deadlock.
    fn arm_slot_gate(&mut self, slot: usize) -> VulkanResult<()>;

    /// Request the next presentable image, signaling the slot's
    /// image-available semaphore on completion.
    fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireResult>;

    /// Write this slot's per-frame state (uniform block). CPU-only.
    fn update_frame_state(&mut self, slot: usize) -> VulkanResult<()>;

    /// Reset and re-record the slot's command recording against the
    /// acquired image's framebuffer.
    fn record_draw_commands(&mut self, slot: usize, image_index: u32) -> VulkanResult<()>;

    /// Enqueue the recording on the graphics queue.
    fn submit(&mut self, slot: usize) -> VulkanResult<()>;

    /// Enqueue presentation of the acquired image.
    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentResult>;

    /// Consume the external resize notification. True at most once per
    /// resize; only consulted after present.
    fn take_resize_pending(&mut self) -> bool;

    /// Drain the device and rebuild the swapchain and everything sized
    /// to it. Frame slots and their signals survive.
    fn rebuild_surface_resources(&mut self) -> VulkanResult<()>;
}

/// Slot-cycling state machine. See the module docs for the protocol.
pub struct FramePipeline {
    current_slot: usize,
    slot_count: usize,
}

impl FramePipeline {
    pub fn new(slot_count: usize) -> VulkanResult<Self> {
        if slot_count == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "Frame pipeline requires at least one slot".to_string(),
            });
        }
        Ok(Self {
            current_slot: 0,
            slot_count,
        })
    }

    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Run one frame step.
    ///
    /// The slot index advances on every outcome except
    /// [`FrameOutcome::SkippedStale`]; a present-time rebuild still
    /// advances because the frame was submitted.
    pub fn step(&mut self, driver: &mut dyn FrameDriver) -> VulkanResult<FrameOutcome> {
        let slot = self.current_slot;

        driver.wait_slot_free(slot)?;

        let image_index = match driver.acquire_image(slot)? {
            AcquireResult::Acquired { image_index, .. } => image_index,
            AcquireResult::OutOfDate => {
                driver.rebuild_surface_resources()?;
                return Ok(FrameOutcome::SkippedStale);
            }
        };

        driver.update_frame_state(slot)?;
        driver.record_draw_commands(slot, image_index)?;

        // The gate is armed only now that a submission signaling it is
        // guaranteed; arming before acquire would deadlock the next wait
        // if acquire aborted the step.
        driver.arm_slot_gate(slot)?;
        driver.submit(slot)?;

        let present_result = driver.present(slot, image_index)?;
        let resize_pending = driver.take_resize_pending();

        let outcome = if present_result == PresentResult::Stale || resize_pending {
            driver.rebuild_surface_resources()?;
            FrameOutcome::RenderedAndRebuilt
        } else {
            FrameOutcome::Rendered
        };

        self.current_slot = (self.current_slot + 1) % self.slot_count;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted driver that models the slot-free gates and records the
    /// call sequence.
    struct MockDriver {
        /// Gate state per slot; true means signaled (slot free). New
        /// slots start signaled, as real fences are created signaled.
        gate_signaled: Vec<bool>,
        /// Acquire outcomes to replay; empty means always acquire image 0.
        acquire_script: VecDeque<AcquireResult>,
        /// Present outcomes to replay; empty means always Presented.
        present_script: VecDeque<PresentResult>,
        resize_pending: bool,
        submits: usize,
        rebuilds: usize,
        updates: Vec<usize>,
        recordings: Vec<(usize, u32)>,
        /// Set if any call violated the gate discipline.
        violation: Option<String>,
    }

    impl MockDriver {
        fn new(slot_count: usize) -> Self {
            Self {
                gate_signaled: vec![true; slot_count],
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                resize_pending: false,
                submits: 0,
                rebuilds: 0,
                updates: Vec::new(),
                recordings: Vec::new(),
                violation: None,
            }
        }

        fn script_acquire(&mut self, results: impl IntoIterator<Item = AcquireResult>) {
            self.acquire_script.extend(results);
        }

        fn script_present(&mut self, results: impl IntoIterator<Item = PresentResult>) {
            self.present_script.extend(results);
        }
    }

    impl FrameDriver for MockDriver {
        fn wait_slot_free(&mut self, slot: usize) -> VulkanResult<()> {
            // A real wait would block forever here; the mock flags it.
            if !self.gate_signaled[slot] {
                self.violation = Some(format!("wait on slot {} with unsignaled gate", slot));
            }
            Ok(())
        }

        fn arm_slot_gate(&mut self, slot: usize) -> VulkanResult<()> {
            self.gate_signaled[slot] = false;
            Ok(())
        }

        fn acquire_image(&mut self, _slot: usize) -> VulkanResult<AcquireResult> {
            Ok(self.acquire_script.pop_front().unwrap_or(AcquireResult::Acquired {
                image_index: 0,
                suboptimal: false,
            }))
        }

        fn update_frame_state(&mut self, slot: usize) -> VulkanResult<()> {
            self.updates.push(slot);
            Ok(())
        }

        fn record_draw_commands(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
            if !self.gate_signaled[slot] {
                self.violation = Some(format!("recording into slot {} while gate unsignaled", slot));
            }
            self.recordings.push((slot, image_index));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> VulkanResult<()> {
            if self.gate_signaled[slot] {
                self.violation = Some(format!("submit on slot {} without arming the gate", slot));
            }
            self.submits += 1;
            // The mock GPU retires instantly.
            self.gate_signaled[slot] = true;
            Ok(())
        }

        fn present(&mut self, _slot: usize, _image_index: u32) -> VulkanResult<PresentResult> {
            Ok(self.present_script.pop_front().unwrap_or(PresentResult::Presented))
        }

        fn take_resize_pending(&mut self) -> bool {
            std::mem::replace(&mut self.resize_pending, false)
        }

        fn rebuild_surface_resources(&mut self) -> VulkanResult<()> {
            self.rebuilds += 1;
            Ok(())
        }
    }

    #[test]
    fn test_zero_slots_rejected() {
        assert!(FramePipeline::new(0).is_err());
    }

    #[test]
    fn test_ten_steps_cycle_two_slots() {
        let mut pipeline = FramePipeline::new(2).unwrap();
        let mut driver = MockDriver::new(2);

        let mut slots = Vec::new();
        for _ in 0..10 {
            slots.push(pipeline.current_slot());
            assert_eq!(pipeline.step(&mut driver).unwrap(), FrameOutcome::Rendered);
        }

        assert_eq!(slots, vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
        assert_eq!(driver.submits, 10);
        assert_eq!(driver.rebuilds, 0);
        assert_eq!(driver.violation, None);
    }

    #[test]
    fn test_slot_index_is_steps_mod_slot_count() {
        let mut pipeline = FramePipeline::new(3).unwrap();
        let mut driver = MockDriver::new(3);

        for steps in 1..=7 {
            pipeline.step(&mut driver).unwrap();
            assert_eq!(pipeline.current_slot(), steps % 3);
        }
    }

    #[test]
    fn test_out_of_date_acquire_rebuilds_without_advancing() {
        let mut pipeline = FramePipeline::new(2).unwrap();
        let mut driver = MockDriver::new(2);
        driver.script_acquire([AcquireResult::OutOfDate]);

        assert_eq!(pipeline.step(&mut driver).unwrap(), FrameOutcome::SkippedStale);
        assert_eq!(pipeline.current_slot(), 0);
        assert_eq!(driver.rebuilds, 1);
        assert_eq!(driver.submits, 0);
        assert!(driver.recordings.is_empty());

        // The retry on the same slot proceeds normally.
        assert_eq!(pipeline.step(&mut driver).unwrap(), FrameOutcome::Rendered);
        assert_eq!(pipeline.current_slot(), 1);
        assert_eq!(driver.violation, None);
    }

    #[test]
    fn test_suboptimal_acquire_is_treated_as_success() {
        let mut pipeline = FramePipeline::new(2).unwrap();
        let mut driver = MockDriver::new(2);
        driver.script_acquire([AcquireResult::Acquired {
            image_index: 1,
            suboptimal: true,
        }]);

        assert_eq!(pipeline.step(&mut driver).unwrap(), FrameOutcome::Rendered);
        assert_eq!(driver.recordings, vec![(0, 1)]);
        assert_eq!(driver.rebuilds, 0);
    }

    #[test]
    fn test_stale_present_rebuilds_and_advances() {
        let mut pipeline = FramePipeline::new(2).unwrap();
        let mut driver = MockDriver::new(2);
        driver.script_present([PresentResult::Stale]);

        assert_eq!(pipeline.step(&mut driver).unwrap(), FrameOutcome::RenderedAndRebuilt);
        assert_eq!(pipeline.current_slot(), 1);
        assert_eq!(driver.rebuilds, 1);
        assert_eq!(driver.submits, 1);
    }

    #[test]
    fn test_resize_notification_rebuilds_exactly_once() {
        let mut pipeline = FramePipeline::new(2).unwrap();
        let mut driver = MockDriver::new(2);

        let mut slots = Vec::new();
        let mut outcomes = Vec::new();
        for frame in 0..10 {
            if frame == 5 {
                driver.resize_pending = true;
            }
            slots.push(pipeline.current_slot());
            outcomes.push(pipeline.step(&mut driver).unwrap());
        }

        assert_eq!(driver.rebuilds, 1);
        assert_eq!(outcomes[5], FrameOutcome::RenderedAndRebuilt);
        assert!(outcomes.iter().enumerate().all(|(i, &o)| i == 5 || o == FrameOutcome::Rendered));
        // The index never skips or double-advances across the rebuild.
        assert_eq!(slots, vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
        assert_eq!(driver.submits, 10);
        assert_eq!(driver.violation, None);
    }

    #[test]
    fn test_update_precedes_recording_on_same_slot() {
        let mut pipeline = FramePipeline::new(2).unwrap();
        let mut driver = MockDriver::new(2);

        pipeline.step(&mut driver).unwrap();

        assert_eq!(driver.updates, vec![0]);
        assert_eq!(driver.recordings, vec![(0, 0)]);
    }

    #[test]
    fn test_gate_discipline_holds_across_many_frames() {
        let mut pipeline = FramePipeline::new(2).unwrap();
        let mut driver = MockDriver::new(2);
        driver.script_acquire([
            AcquireResult::Acquired { image_index: 0, suboptimal: false },
            AcquireResult::OutOfDate,
            AcquireResult::Acquired { image_index: 2, suboptimal: false },
        ]);
        driver.script_present([PresentResult::Presented, PresentResult::Stale]);

        for _ in 0..20 {
            pipeline.step(&mut driver).unwrap();
        }
        assert_eq!(driver.violation, None);
    }
}
