//! Shared helpers for `cirrus-gpu` integration tests.

#![allow(dead_code)]

use cirrus_gpu::{
    BufferDescriptor, BufferId, BufferUsages, Device, DeviceDescriptor, SoftwareBackend,
};

pub fn device_with_backend() -> (Device, SoftwareBackend) {
    let backend = SoftwareBackend::new();
    let device = Device::new(Box::new(backend.clone()), &DeviceDescriptor::default());
    (device, backend)
}

pub fn copy_dst_buffer(device: &mut Device, size: u64) -> BufferId {
    device.create_buffer(&BufferDescriptor {
        size,
        usage: BufferUsages::COPY_DST,
    })
}
