// SPDX-License-Identifier: CEPL-1.0
//! Frames in flight.
//!
//! A fixed ring of N slots. Each slot owns a command buffer, an
//! image-acquired semaphore, a render-finished semaphore, a fence and a
//! persistently mapped uniform buffer with its descriptor set. A slot's
//! fence is the only thing that tells the host its previous GPU work has
//! retired, and nothing in the slot is touched before waiting on it. That
//! wait is what bounds how far the host runs ahead of the GPU: at most N
//! frames.
//!
//! [`FrameEngine`] holds the per-tick state machine and is independent of
//! Vulkan; it drives any [`FrameDriver`].

use crate::unwind::Unwind;
use crate::upload::{create_host_buffer, GpuBuffer};
use anyhow::{Context, Result};
use ash::{vk, Device};
use tracing::{debug, info};
use waku_render::{UniformData, WindowHost};

/// Where a slot is in its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotPhase {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// `suboptimal`: usable now, rebuild after present.
    Ready { image_index: u32, suboptimal: bool },
    /// Surface no longer matches the swapchain. Nothing was signaled.
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Presented,
    /// Acquire hit an out-of-date surface; rebuilt, nothing submitted.
    Skipped,
}

/// The device operations one tick is made of, each scoped to a slot.
pub trait FrameDriver {
    /// Block until the slot's fence is signaled. Unbounded.
    fn wait_for_slot(&mut self, slot: usize) -> Result<()>;
    /// Ask for the next image, signaling the slot's image-acquired semaphore.
    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome>;
    /// Put the slot's fence back to unsignaled.
    fn reset_slot_fence(&mut self, slot: usize) -> Result<()>;
    fn record_commands(&mut self, slot: usize, image_index: u32) -> Result<()>;
    fn write_uniforms(&mut self, slot: usize, data: &UniformData) -> Result<()>;
    /// Wait image-acquired, signal render-finished and the slot's fence.
    fn submit(&mut self, slot: usize) -> Result<()>;
    /// Present on the present queue, waiting render-finished.
    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome>;
    fn rebuild_swapchain(&mut self, host: &mut dyn WindowHost) -> Result<()>;
}

/// Round-robin over N slots, one tick at a time.
#[derive(Debug)]
pub struct FrameEngine {
    phases: Vec<SlotPhase>,
    current: usize,
    resize_requested: bool,
}

impl FrameEngine {
    pub fn new(slot_count: usize) -> Self {
        Self {
            phases: vec![SlotPhase::Idle; slot_count.max(1)],
            current: 0,
            resize_requested: false,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.phases.len()
    }

    /// Slot the next tick will use.
    pub fn current_slot(&self) -> usize {
        self.current
    }

    /// `None` past the last slot.
    pub fn phase(&self, slot: usize) -> Option<SlotPhase> {
        self.phases.get(slot).copied()
    }

    /// Rebuild after the next present, whatever present reports.
    pub fn request_resize(&mut self) {
        self.resize_requested = true;
    }

    #[cfg(test)]
    fn resize_pending(&self) -> bool {
        self.resize_requested
    }

    /// One full cycle on the current slot.
    ///
    /// The fence is reset only once an image is in hand. Resetting earlier
    /// and then bailing on an out-of-date acquire would leave a fence that
    /// no submission will ever signal, and the next wait on it would hang.
    pub fn tick<D>(
        &mut self,
        driver: &mut D,
        host: &mut dyn WindowHost,
        uniforms: &UniformData,
    ) -> Result<TickOutcome>
    where
        D: FrameDriver + ?Sized,
    {
        let slot = self.current;

        driver.wait_for_slot(slot)?;
        self.phases[slot] = SlotPhase::Acquiring;

        let (image_index, suboptimal) = match driver.acquire_image(slot)? {
            AcquireOutcome::Ready {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                info!("acquire: out of date, rebuilding (slot {slot})");
                self.resize_requested = false;
                driver.rebuild_swapchain(host)?;
                self.phases[slot] = SlotPhase::Idle;
                return Ok(TickOutcome::Skipped);
            }
        };

        self.phases[slot] = SlotPhase::Recording;
        driver.reset_slot_fence(slot)?;
        driver.record_commands(slot, image_index)?;
        driver.write_uniforms(slot, uniforms)?;

        self.phases[slot] = SlotPhase::Submitted;
        driver.submit(slot)?;

        self.phases[slot] = SlotPhase::Presenting;
        let presented = driver.present(slot, image_index)?;

        let resized = std::mem::take(&mut self.resize_requested);
        if suboptimal || resized || presented != PresentOutcome::Presented {
            debug!(
                "rebuild after present: acquire_suboptimal={suboptimal} present={presented:?} resized={resized}"
            );
            driver.rebuild_swapchain(host)?;
        }

        self.phases[slot] = SlotPhase::Idle;
        self.current = (slot + 1) % self.phases.len();
        Ok(TickOutcome::Presented)
    }
}

/// Vulkan objects owned by one slot.
pub struct FrameSlot {
    pub cmd: vk::CommandBuffer,
    pub image_acquired: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
    pub descriptor_set: vk::DescriptorSet,
    pub uniform: GpuBuffer,
    uniform_ptr: *mut u8,
}

impl FrameSlot {
    /// Copy into the mapped uniform buffer. Only call after the slot's
    /// fence wait.
    pub fn write_uniforms(&mut self, data: &UniformData) {
        let bytes = bytemuck::bytes_of(data);
        debug_assert!(bytes.len() as vk::DeviceSize <= self.uniform.size);
        // SAFETY: uniform_ptr maps the whole buffer for the slot's lifetime
        // and the GPU is not reading it (fence waited).
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.uniform_ptr, bytes.len()) };
    }
}

/// Slots plus the pool their descriptor sets come from.
pub struct FrameSlots {
    pub slots: Vec<FrameSlot>,
    pub descriptor_pool: vk::DescriptorPool,
}

impl FrameSlots {
    /// Fences start signaled so the first wait on each slot returns at once.
    pub unsafe fn create(
        device: &Device,
        mem_props: &vk::PhysicalDeviceMemoryProperties,
        cmd_pool: vk::CommandPool,
        set_layout: vk::DescriptorSetLayout,
        texture_view: vk::ImageView,
        sampler: vk::Sampler,
        count: usize,
    ) -> Result<Self> {
        let n = count as u32;
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: n,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: n,
            },
        ];
        let pool_ci = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            max_sets: n,
            pool_size_count: pool_sizes.len() as u32,
            p_pool_sizes: pool_sizes.as_ptr(),
            ..Default::default()
        };
        let descriptor_pool = unsafe { device.create_descriptor_pool(&pool_ci, None) }
            .context("create_descriptor_pool")?;
        // Destroying the pool also frees its sets.
        let mut guard = Unwind::new(device);
        guard.push(move |d: &Device| unsafe { d.destroy_descriptor_pool(descriptor_pool, None) });

        let layouts = vec![set_layout; count];
        let set_alloc = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool,
            descriptor_set_count: n,
            p_set_layouts: layouts.as_ptr(),
            ..Default::default()
        };
        let sets = unsafe { device.allocate_descriptor_sets(&set_alloc) }
            .context("allocate_descriptor_sets")?;

        let cmd_alloc = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: cmd_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: n,
            ..Default::default()
        };
        let cmds = unsafe { device.allocate_command_buffers(&cmd_alloc) }
            .context("allocate_command_buffers(frames)")?;
        let owned = cmds.clone();
        guard.push(move |d: &Device| unsafe { d.free_command_buffers(cmd_pool, &owned) });

        let sem_ci = vk::SemaphoreCreateInfo::default();
        let fence_ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };
        let ubo_size = std::mem::size_of::<UniformData>() as vk::DeviceSize;

        let mut slots = Vec::with_capacity(count);
        for (&cmd, &descriptor_set) in cmds.iter().zip(&sets) {
            let uniform = unsafe {
                create_host_buffer(device, mem_props, ubo_size, vk::BufferUsageFlags::UNIFORM_BUFFER)
            }?;
            // Freeing the memory drops the mapping with it.
            guard.push(move |d: &Device| unsafe { uniform.destroy(d) });
            let uniform_ptr = unsafe {
                device.map_memory(uniform.memory, 0, ubo_size, vk::MemoryMapFlags::empty())
            }
            .context("map_memory(uniform)")?
            .cast::<u8>();

            let buffer_info = vk::DescriptorBufferInfo {
                buffer: uniform.buffer,
                offset: 0,
                range: ubo_size,
            };
            let image_info = vk::DescriptorImageInfo {
                sampler,
                image_view: texture_view,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            };
            let writes = [
                vk::WriteDescriptorSet {
                    s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                    dst_set: descriptor_set,
                    dst_binding: 0,
                    descriptor_count: 1,
                    descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                    p_buffer_info: &buffer_info,
                    ..Default::default()
                },
                vk::WriteDescriptorSet {
                    s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                    dst_set: descriptor_set,
                    dst_binding: 1,
                    descriptor_count: 1,
                    descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    p_image_info: &image_info,
                    ..Default::default()
                },
            ];
            unsafe { device.update_descriptor_sets(&writes, &[]) };

            let image_acquired = unsafe { device.create_semaphore(&sem_ci, None) }
                .context("create_semaphore(image_acquired)")?;
            guard.push(move |d: &Device| unsafe { d.destroy_semaphore(image_acquired, None) });
            let render_finished = unsafe { device.create_semaphore(&sem_ci, None) }
                .context("create_semaphore(render_finished)")?;
            guard.push(move |d: &Device| unsafe { d.destroy_semaphore(render_finished, None) });
            let in_flight = unsafe { device.create_fence(&fence_ci, None) }.context("create_fence")?;
            guard.push(move |d: &Device| unsafe { d.destroy_fence(in_flight, None) });

            slots.push(FrameSlot {
                cmd,
                image_acquired,
                render_finished,
                in_flight,
                descriptor_set,
                uniform,
                uniform_ptr,
            });
        }

        guard.disarm();
        info!("{} frame slots ready", slots.len());
        Ok(Self {
            slots,
            descriptor_pool,
        })
    }

    /// Sync objects, uniform buffers, then the pool (which frees the sets).
    /// Command buffers go back with their pool.
    pub unsafe fn destroy(&mut self, device: &Device) {
        unsafe {
            for s in self.slots.drain(..) {
                device.destroy_fence(s.in_flight, None);
                device.destroy_semaphore(s.render_finished, None);
                device.destroy_semaphore(s.image_acquired, None);
                device.unmap_memory(s.uniform.memory);
                s.uniform.destroy(device);
            }
            device.destroy_descriptor_pool(self.descriptor_pool, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::mpsc;
    use std::sync::{Arc, Condvar, Mutex};
    use std::time::Duration;
    use waku_render::RenderSize;

    struct FixedHost;

    impl WindowHost for FixedHost {
        fn framebuffer_size(&self) -> RenderSize {
            RenderSize::new(800, 600)
        }
        fn wait_events(&mut self) {}
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Reset(usize),
        Record(usize, u32),
        Uniforms(usize),
        Submit(usize),
        Present(usize, u32),
        Rebuild,
    }

    #[derive(Clone, Copy, Debug, Default)]
    struct MockFence {
        signaled: bool,
        in_flight: bool,
        signals: u32,
    }

    /// GPU stand-in. A submitted slot retires the moment it is waited on.
    struct MockGpu {
        fences: Vec<MockFence>,
        calls: Vec<Call>,
        acquires: VecDeque<AcquireOutcome>,
        presents: VecDeque<PresentOutcome>,
        image_count: u32,
        next_image: u32,
    }

    impl MockGpu {
        fn new(slots: usize) -> Self {
            Self {
                fences: vec![
                    MockFence {
                        signaled: true,
                        ..Default::default()
                    };
                    slots
                ],
                calls: Vec::new(),
                acquires: VecDeque::new(),
                presents: VecDeque::new(),
                image_count: 3,
                next_image: 0,
            }
        }

        fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls.iter().filter(|c| pred(c)).count()
        }
    }

    impl FrameDriver for MockGpu {
        fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
            self.calls.push(Call::Wait(slot));
            let f = &mut self.fences[slot];
            if f.in_flight {
                f.in_flight = false;
                f.signaled = true;
                f.signals += 1;
            }
            assert!(f.signaled, "wait on slot {slot} would never return");
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
            self.calls.push(Call::Acquire(slot));
            Ok(self.acquires.pop_front().unwrap_or_else(|| {
                let image_index = self.next_image;
                self.next_image = (self.next_image + 1) % self.image_count;
                AcquireOutcome::Ready {
                    image_index,
                    suboptimal: false,
                }
            }))
        }

        fn reset_slot_fence(&mut self, slot: usize) -> Result<()> {
            self.calls.push(Call::Reset(slot));
            let f = &mut self.fences[slot];
            assert!(f.signaled && !f.in_flight, "reset of a busy fence");
            f.signaled = false;
            Ok(())
        }

        fn record_commands(&mut self, slot: usize, image_index: u32) -> Result<()> {
            self.calls.push(Call::Record(slot, image_index));
            let f = &self.fences[slot];
            assert!(!f.in_flight, "re-record while slot {slot} is in flight");
            assert!(!f.signaled, "record before fence reset");
            Ok(())
        }

        fn write_uniforms(&mut self, slot: usize, _data: &UniformData) -> Result<()> {
            self.calls.push(Call::Uniforms(slot));
            assert!(!self.fences[slot].in_flight);
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> Result<()> {
            self.calls.push(Call::Submit(slot));
            let f = &mut self.fences[slot];
            assert!(!f.signaled && !f.in_flight);
            f.in_flight = true;
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
            self.calls.push(Call::Present(slot, image_index));
            Ok(self.presents.pop_front().unwrap_or(PresentOutcome::Presented))
        }

        fn rebuild_swapchain(&mut self, _host: &mut dyn WindowHost) -> Result<()> {
            self.calls.push(Call::Rebuild);
            Ok(())
        }
    }

    fn run(engine: &mut FrameEngine, gpu: &mut MockGpu) -> TickOutcome {
        engine
            .tick(gpu, &mut FixedHost, &UniformData::default())
            .unwrap()
    }

    #[test]
    fn steady_state_follows_the_cycle() {
        let mut engine = FrameEngine::new(2);
        let mut gpu = MockGpu::new(2);
        assert_eq!(run(&mut engine, &mut gpu), TickOutcome::Presented);
        assert_eq!(
            gpu.calls,
            [
                Call::Wait(0),
                Call::Acquire(0),
                Call::Reset(0),
                Call::Record(0, 0),
                Call::Uniforms(0),
                Call::Submit(0),
                Call::Present(0, 0),
            ]
        );
        assert_eq!(engine.current_slot(), 1);
        assert_eq!(engine.phase(0), Some(SlotPhase::Idle));
        assert_eq!(engine.phase(2), None);
    }

    #[test]
    fn slots_rotate_round_robin() {
        let mut engine = FrameEngine::new(3);
        let mut gpu = MockGpu::new(3);
        let mut used = Vec::new();
        for _ in 0..7 {
            used.push(engine.current_slot());
            run(&mut engine, &mut gpu);
        }
        assert_eq!(used, [0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn fence_signals_once_per_cycle() {
        let mut engine = FrameEngine::new(2);
        let mut gpu = MockGpu::new(2);
        for _ in 0..10 {
            run(&mut engine, &mut gpu);
        }
        // Ten ticks over two slots: each slot submitted five times, and all
        // but the last submission has been waited on since.
        assert_eq!(gpu.fences[0].signals, 4);
        assert_eq!(gpu.fences[1].signals, 4);
        assert!(gpu.fences.iter().all(|f| f.in_flight));
        assert_eq!(gpu.count(|c| matches!(c, Call::Submit(_))), 10);
        assert_eq!(gpu.count(|c| matches!(c, Call::Reset(_))), 10);
    }

    #[test]
    fn out_of_date_acquire_rebuilds_and_skips() {
        let mut engine = FrameEngine::new(2);
        let mut gpu = MockGpu::new(2);
        gpu.acquires.push_back(AcquireOutcome::OutOfDate);

        assert_eq!(run(&mut engine, &mut gpu), TickOutcome::Skipped);
        assert_eq!(gpu.calls, [Call::Wait(0), Call::Acquire(0), Call::Rebuild]);
        // Fence untouched and still signaled; the slot is retried next tick.
        assert!(gpu.fences[0].signaled);
        assert_eq!(engine.current_slot(), 0);
        assert_eq!(engine.phase(0), Some(SlotPhase::Idle));

        assert_eq!(run(&mut engine, &mut gpu), TickOutcome::Presented);
        assert_eq!(gpu.count(|c| matches!(c, Call::Submit(_))), 1);
        assert_eq!(engine.current_slot(), 1);
    }

    #[test]
    fn suboptimal_acquire_draws_then_rebuilds() {
        let mut engine = FrameEngine::new(2);
        let mut gpu = MockGpu::new(2);
        gpu.acquires.push_back(AcquireOutcome::Ready {
            image_index: 2,
            suboptimal: true,
        });
        assert_eq!(run(&mut engine, &mut gpu), TickOutcome::Presented);
        let tail = &gpu.calls[gpu.calls.len() - 3..];
        assert_eq!(tail, [Call::Submit(0), Call::Present(0, 2), Call::Rebuild]);
    }

    #[test]
    fn degraded_present_rebuilds_after_present() {
        for outcome in [PresentOutcome::Suboptimal, PresentOutcome::OutOfDate] {
            let mut engine = FrameEngine::new(2);
            let mut gpu = MockGpu::new(2);
            gpu.presents.push_back(outcome);
            assert_eq!(run(&mut engine, &mut gpu), TickOutcome::Presented);

            let submit = gpu.calls.iter().position(|c| *c == Call::Submit(0)).unwrap();
            let present = gpu.calls.iter().position(|c| *c == Call::Present(0, 0)).unwrap();
            let rebuild = gpu.calls.iter().position(|c| *c == Call::Rebuild).unwrap();
            assert!(submit < present && present < rebuild);
            assert_eq!(engine.current_slot(), 1);
        }
    }

    #[test]
    fn resize_flag_rebuilds_once_after_present() {
        let mut engine = FrameEngine::new(2);
        let mut gpu = MockGpu::new(2);
        engine.request_resize();
        assert!(engine.resize_pending());

        run(&mut engine, &mut gpu);
        assert_eq!(gpu.calls.last(), Some(&Call::Rebuild));
        assert!(!engine.resize_pending());

        run(&mut engine, &mut gpu);
        assert_eq!(gpu.count(|c| *c == Call::Rebuild), 1);
    }

    #[test]
    fn single_slot_still_cycles() {
        let mut engine = FrameEngine::new(0);
        assert_eq!(engine.slot_count(), 1);
        let mut gpu = MockGpu::new(1);
        for _ in 0..3 {
            run(&mut engine, &mut gpu);
        }
        assert_eq!(gpu.fences[0].signals, 2);
    }

    /// Fences completed by the test thread instead of on wait.
    struct ThreadedGpu {
        fences: Arc<(Mutex<Vec<bool>>, Condvar)>,
        events: mpsc::Sender<Call>,
    }

    impl FrameDriver for ThreadedGpu {
        fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
            let (lock, cvar) = &*self.fences;
            let mut signaled = lock.lock().unwrap();
            while !signaled[slot] {
                signaled = cvar.wait(signaled).unwrap();
            }
            Ok(())
        }
        fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
            self.events.send(Call::Acquire(slot)).unwrap();
            Ok(AcquireOutcome::Ready {
                image_index: slot as u32,
                suboptimal: false,
            })
        }
        fn reset_slot_fence(&mut self, slot: usize) -> Result<()> {
            self.fences.0.lock().unwrap()[slot] = false;
            Ok(())
        }
        fn record_commands(&mut self, _slot: usize, _image_index: u32) -> Result<()> {
            Ok(())
        }
        fn write_uniforms(&mut self, _slot: usize, _data: &UniformData) -> Result<()> {
            Ok(())
        }
        fn submit(&mut self, slot: usize) -> Result<()> {
            self.events.send(Call::Submit(slot)).unwrap();
            Ok(())
        }
        fn present(&mut self, _slot: usize, _image_index: u32) -> Result<PresentOutcome> {
            Ok(PresentOutcome::Presented)
        }
        fn rebuild_swapchain(&mut self, _host: &mut dyn WindowHost) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn third_tick_blocks_until_slot_zero_retires() {
        let fences = Arc::new((Mutex::new(vec![true, true]), Condvar::new()));
        let (tx, rx) = mpsc::channel();
        let mut gpu = ThreadedGpu {
            fences: Arc::clone(&fences),
            events: tx,
        };
        let mut engine = FrameEngine::new(2);

        let worker = std::thread::spawn(move || {
            let u = UniformData::default();
            for _ in 0..3 {
                engine.tick(&mut gpu, &mut FixedHost, &u).unwrap();
            }
            engine.current_slot()
        });

        let timeout = Duration::from_secs(5);
        assert_eq!(rx.recv_timeout(timeout), Ok(Call::Acquire(0)));
        assert_eq!(rx.recv_timeout(timeout), Ok(Call::Submit(0)));
        assert_eq!(rx.recv_timeout(timeout), Ok(Call::Acquire(1)));
        assert_eq!(rx.recv_timeout(timeout), Ok(Call::Submit(1)));

        // Tick 2 reuses slot 0, whose work has not been marked complete.
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(200)),
            Err(mpsc::RecvTimeoutError::Timeout)
        );

        {
            let (lock, cvar) = &*fences;
            lock.lock().unwrap()[0] = true;
            cvar.notify_all();
        }
        assert_eq!(rx.recv_timeout(timeout), Ok(Call::Acquire(0)));
        assert_eq!(rx.recv_timeout(timeout), Ok(Call::Submit(0)));
        assert_eq!(worker.join().unwrap(), 1);
    }
}
