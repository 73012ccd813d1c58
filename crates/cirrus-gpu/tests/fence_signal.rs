//! Fence creation, signaling, and device-confirmed completion.

mod common;

use common::device_with_backend;
use cirrus_gpu::{
    DeviceErrorKind, DeviceEvent, Fence, FenceDescriptor, SubmissionSerial,
};
use pretty_assertions::assert_eq;

#[test]
fn absent_descriptor_inherits_the_device_default() {
    let (mut device, _backend) = device_with_backend();
    let queue = device.queue();

    let fence = queue.create_fence(&mut device, None);
    assert!(!fence.is_error());
    assert_eq!(fence.signaled_value(&device), 0);
    assert_eq!(fence.completed_value(&device), 0);
}

#[test]
fn descriptor_initial_value_is_respected() {
    let (mut device, _backend) = device_with_backend();
    let queue = device.queue();

    let fence = queue.create_fence(&mut device, Some(&FenceDescriptor { initial_value: 5 }));
    assert_eq!(fence.signaled_value(&device), 5);

    queue.signal(&mut device, &fence, 5);
    assert_eq!(
        device.pop_error().unwrap().kind,
        DeviceErrorKind::Validation
    );

    queue.signal(&mut device, &fence, 6);
    assert_eq!(device.pop_error(), None);
    assert_eq!(fence.signaled_value(&device), 6);
}

#[test]
fn signal_values_must_strictly_increase() {
    let (mut device, _backend) = device_with_backend();
    let queue = device.queue();
    let fence = queue.create_fence(&mut device, None);

    queue.signal(&mut device, &fence, 2);
    assert_eq!(device.pop_error(), None);
    assert_eq!(fence.signaled_value(&device), 2);

    // Equal and lower values are rejected, not coerced.
    queue.signal(&mut device, &fence, 2);
    let err = device.pop_error().expect("validation error");
    assert!(err.message.contains("not greater"), "{}", err.message);
    queue.signal(&mut device, &fence, 1);
    assert!(device.pop_error().is_some());
    assert_eq!(fence.signaled_value(&device), 2);

    queue.signal(&mut device, &fence, 3);
    assert_eq!(device.pop_error(), None);
    assert_eq!(fence.signaled_value(&device), 3);
}

#[test]
fn signaled_value_updates_immediately_but_completion_waits_for_the_device() {
    let (mut device, _backend) = device_with_backend();
    let queue = device.queue();
    let fence = queue.create_fence(&mut device, None);

    queue.submit(&mut device, vec![]);
    queue.signal(&mut device, &fence, 1);

    // The request is host-visible right away; completion is not.
    assert_eq!(fence.signaled_value(&device), 1);
    assert_eq!(fence.completed_value(&device), 0);

    let events = device.tick(device.last_submitted_serial());
    assert!(events.contains(&DeviceEvent::FenceCompleted {
        fence: fence.id().unwrap(),
        value: 1
    }));
    assert_eq!(fence.completed_value(&device), 1);
}

#[test]
fn signal_with_no_outstanding_work_completes_on_the_next_tick() {
    let (mut device, _backend) = device_with_backend();
    let queue = device.queue();
    let fence = queue.create_fence(&mut device, None);

    queue.signal(&mut device, &fence, 4);
    let events = device.tick(SubmissionSerial::ZERO);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::FenceCompleted { value: 4, .. }))
            .count(),
        1
    );
    assert_eq!(fence.completed_value(&device), 4);
}

#[test]
fn signaling_a_fence_on_a_foreign_queue_always_fails() {
    let (mut device_a, _backend_a) = device_with_backend();
    let (mut device_b, _backend_b) = device_with_backend();
    let queue_a = device_a.queue();
    let queue_b = device_b.queue();

    let fence = queue_a.create_fence(&mut device_a, None);

    queue_b.signal(&mut device_b, &fence, 1);
    let err = device_b.pop_error().expect("validation error");
    assert_eq!(err.kind, DeviceErrorKind::Validation);
    assert!(
        err.message.contains("queue that created it"),
        "{}",
        err.message
    );
    assert_eq!(fence.signaled_value(&device_a), 0);
}

#[test]
fn destroying_a_fence_does_not_block_pending_completion() {
    let (mut device, _backend) = device_with_backend();
    let queue = device.queue();
    let fence = queue.create_fence(&mut device, None);
    let fence_id = fence.id().unwrap();

    queue.submit(&mut device, vec![]);
    queue.signal(&mut device, &fence, 1);
    device.destroy_fence(&fence);

    // Accessors fall back to the designated default once state is gone.
    assert_eq!(fence.signaled_value(&device), 0);

    // The tracker's bookkeeping outlives the fence; completion still drains.
    let events = device.tick(device.last_submitted_serial());
    assert!(events.contains(&DeviceEvent::FenceCompleted {
        fence: fence_id,
        value: 1
    }));
}

#[test]
fn signaling_a_destroyed_fence_fails_validation() {
    let (mut device, _backend) = device_with_backend();
    let queue = device.queue();
    let fence = queue.create_fence(&mut device, None);

    device.destroy_fence(&fence);
    queue.signal(&mut device, &fence, 1);
    assert_eq!(
        device.pop_error().unwrap().kind,
        DeviceErrorKind::Validation
    );
}

#[test]
fn unsignalable_initial_value_yields_an_error_fence() {
    let (mut device, _backend) = device_with_backend();
    let queue = device.queue();

    let fence = queue.create_fence(
        &mut device,
        Some(&FenceDescriptor {
            initial_value: u64::MAX,
        }),
    );
    assert!(fence.is_error());
    assert_eq!(
        device.pop_error().unwrap().kind,
        DeviceErrorKind::Validation
    );
}

#[test]
fn error_fence_accessors_return_defaults_and_operations_reject_it() {
    let (mut device, _backend) = device_with_backend();
    let queue = device.queue();

    let fence = Fence::error();
    assert_eq!(fence.signaled_value(&device), 0);
    assert_eq!(fence.completed_value(&device), 0);

    queue.signal(&mut device, &fence, 1);
    assert_eq!(
        device.pop_error().unwrap().kind,
        DeviceErrorKind::Validation
    );
}

#[test]
fn create_fence_on_a_lost_device_is_a_silent_error_fence() {
    let (mut device, _backend) = device_with_backend();
    let queue = device.queue();

    device.lose();
    let fence = queue.create_fence(&mut device, None);
    assert!(fence.is_error());
    assert_eq!(device.pop_error(), None);
}
