//! Raw, visible and indirect-argument buffers for the grass field.
//!
//! Raw and visible buffers are counter-bearing: a fixed-capacity record
//! region plus a separate 4-byte atomic counter. Counters are reset by a
//! `clear_buffer` recorded into the frame's encoder, which orders the reset
//! before the dispatch that follows it in the same encoder.

use crate::core::error::Error;
use crate::core::types::Result;
use crate::grass::params::{IndirectDrawArgs, InstanceRecord, CULL_WORKGROUP_SIZE};

/// Largest record count a device can both store and cull.
///
/// Each counter-bearing buffer is one storage binding, and the cull pass
/// dispatches one workgroup axis of `CULL_WORKGROUP_SIZE` threads.
pub fn max_records(limits: &wgpu::Limits) -> u32 {
    let by_bytes = limits
        .max_buffer_size
        .min(limits.max_storage_buffer_binding_size as u64)
        / InstanceRecord::STRIDE;
    let by_dispatch = limits.max_compute_workgroups_per_dimension as u64 * CULL_WORKGROUP_SIZE as u64;
    by_bytes.min(by_dispatch).min(u32::MAX as u64) as u32
}

/// Record region plus atomic append counter
pub struct CounterBuffer {
    records: wgpu::Buffer,
    counter: wgpu::Buffer,
    capacity: u32,
}

impl CounterBuffer {
    fn new(device: &wgpu::Device, label: &str, capacity: u32, usage: wgpu::BufferUsages) -> Self {
        let records = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label}_records")),
            size: capacity as u64 * InstanceRecord::STRIDE,
            usage: wgpu::BufferUsages::STORAGE | usage,
            mapped_at_creation: false,
        });

        let counter = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label}_counter")),
            size: std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self { records, counter, capacity }
    }

    /// Zero the counter. Must precede every dispatch that appends.
    pub fn reset_counter(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(&self.counter, 0, None);
    }

    pub fn records(&self) -> &wgpu::Buffer {
        &self.records
    }

    pub fn counter(&self) -> &wgpu::Buffer {
        &self.counter
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    fn destroy(&self) {
        self.records.destroy();
        self.counter.destroy();
    }
}

struct AllocatedBuffers {
    raw: CounterBuffer,
    visible: CounterBuffer,
    args: wgpu::Buffer,
}

/// Owner of the three instance buffers. Capacity changes always reallocate.
pub struct InstanceBufferSet {
    buffers: Option<AllocatedBuffers>,
    max_records: u32,
}

impl InstanceBufferSet {
    pub fn new(limits: &wgpu::Limits) -> Self {
        Self {
            buffers: None,
            max_records: max_records(limits),
        }
    }

    /// Release any existing buffers, then create fresh ones for `capacity`
    /// records.
    pub fn allocate(&mut self, device: &wgpu::Device, capacity: u32) -> Result<()> {
        self.release();

        let requested = capacity as u64 * InstanceRecord::STRIDE;
        if capacity == 0 || capacity > self.max_records {
            return Err(Error::AllocationFailure {
                requested,
                limit: self.max_records as u64 * InstanceRecord::STRIDE,
            });
        }

        let raw = CounterBuffer::new(device, "grass_raw", capacity, wgpu::BufferUsages::empty());
        // Visible records double as the per-instance vertex stream
        let visible = CounterBuffer::new(device, "grass_visible", capacity, wgpu::BufferUsages::VERTEX);
        let args = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_indirect_args"),
            size: IndirectDrawArgs::SIZE,
            usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::debug!("Allocated grass buffers: {} records ({} KB each)", capacity, requested / 1024);
        self.buffers = Some(AllocatedBuffers { raw, visible, args });
        Ok(())
    }

    /// Destroy the buffers. Safe to call repeatedly or before any allocation.
    pub fn release(&mut self) {
        if let Some(buffers) = self.buffers.take() {
            buffers.raw.destroy();
            buffers.visible.destroy();
            buffers.args.destroy();
        }
    }

    /// Record capacity, 0 when not allocated
    pub fn capacity(&self) -> u32 {
        self.buffers.as_ref().map_or(0, |b| b.raw.capacity())
    }

    pub fn raw(&self) -> Option<&CounterBuffer> {
        self.buffers.as_ref().map(|b| &b.raw)
    }

    pub fn visible(&self) -> Option<&CounterBuffer> {
        self.buffers.as_ref().map(|b| &b.visible)
    }

    pub fn args(&self) -> Option<&wgpu::Buffer> {
        self.buffers.as_ref().map(|b| &b.args)
    }
}

impl Drop for InstanceBufferSet {
    fn drop(&mut self) {
        self.release();
    }
}
