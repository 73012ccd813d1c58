//! `Queue::submit`: validation, ordering, error scopes, and lost-device
//! behavior.

mod common;

use common::{copy_dst_buffer, device_with_backend};
use cirrus_gpu::{
    CommandBuffer, CommandBufferResourceUsage, Device, DeviceDescriptor, DeviceErrorKind,
    DeviceEvent, ErrorScopeId, PassResourceUsage, QueueOp, SoftwareBackend, SubmissionSerial,
    TextureDescriptor, TextureUsages, TextureUse,
};
use cirrus_gpu::{BufferId, FenceDescriptor};
use pretty_assertions::assert_eq;

fn empty_cb(label: &str) -> CommandBuffer {
    CommandBuffer::new(Some(label), CommandBufferResourceUsage::default())
}

fn cb_with_top_level_buffer(label: &str, buffer: BufferId) -> CommandBuffer {
    CommandBuffer::new(
        Some(label),
        CommandBufferResourceUsage {
            top_level_buffers: vec![buffer],
            ..Default::default()
        },
    )
}

#[test]
fn work_units_dispatch_in_array_order_under_one_serial() {
    let (mut device, backend) = device_with_backend();
    let queue = device.queue();

    queue.submit(&mut device, vec![empty_cb("a"), empty_cb("b")]);
    assert_eq!(device.pop_error(), None);

    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0, SubmissionSerial(1));
    assert_eq!(
        submissions[0].1,
        vec![
            QueueOp::ExecuteCommandBuffer {
                label: Some("a".into())
            },
            QueueOp::ExecuteCommandBuffer {
                label: Some("b".into())
            },
        ]
    );
}

#[test]
fn successive_submits_get_successive_serials() {
    let (mut device, backend) = device_with_backend();
    let queue = device.queue();

    queue.submit(&mut device, vec![empty_cb("a")]);
    queue.submit(&mut device, vec![empty_cb("b")]);

    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].0, SubmissionSerial(1));
    assert_eq!(submissions[1].0, SubmissionSerial(2));
    assert_eq!(
        submissions[0].1,
        vec![QueueOp::ExecuteCommandBuffer {
            label: Some("a".into())
        }]
    );
    assert_eq!(
        submissions[1].1,
        vec![QueueOp::ExecuteCommandBuffer {
            label: Some("b".into())
        }]
    );
}

#[test]
fn a_destroyed_buffer_rejects_the_whole_batch() {
    let (mut device, backend) = device_with_backend();
    let queue = device.queue();
    let ok_buffer = copy_dst_buffer(&mut device, 8);
    let bad_buffer = copy_dst_buffer(&mut device, 8);
    device.destroy_buffer(bad_buffer);

    queue.submit(
        &mut device,
        vec![
            cb_with_top_level_buffer("ok", ok_buffer),
            cb_with_top_level_buffer("bad", bad_buffer),
        ],
    );

    // All-or-nothing: the valid work unit was not dispatched either.
    assert_eq!(backend.submission_count(), 0);
    let err = device.pop_error().expect("resource state error");
    assert_eq!(err.kind, DeviceErrorKind::ResourceState);
    assert!(err.message.contains("top-level"), "{}", err.message);
}

#[test]
fn a_mapped_per_pass_buffer_rejects_the_batch() {
    let (mut device, backend) = device_with_backend();
    let queue = device.queue();
    let buffer = copy_dst_buffer(&mut device, 8);
    device.buffer_map_complete(buffer);

    let cb = CommandBuffer::new(
        Some("pass"),
        CommandBufferResourceUsage {
            per_pass: vec![PassResourceUsage {
                buffers: vec![buffer],
                textures: vec![],
            }],
            ..Default::default()
        },
    );
    queue.submit(&mut device, vec![cb]);

    assert_eq!(backend.submission_count(), 0);
    let err = device.pop_error().expect("resource state error");
    assert_eq!(err.kind, DeviceErrorKind::ResourceState);
    assert!(err.message.contains("per-pass"), "{}", err.message);
    assert!(err.message.contains("mapped"), "{}", err.message);
}

#[test]
fn texture_usage_must_cover_how_the_work_unit_uses_it() {
    let (mut device, backend) = device_with_backend();
    let queue = device.queue();
    let texture = device.create_texture(&TextureDescriptor {
        usage: TextureUsages::TEXTURE_BINDING,
    });

    let cb = CommandBuffer::new(
        Some("blit"),
        CommandBufferResourceUsage {
            top_level_textures: vec![TextureUse {
                texture,
                usage: TextureUsages::COPY_DST,
            }],
            ..Default::default()
        },
    );
    queue.submit(&mut device, vec![cb]);

    assert_eq!(backend.submission_count(), 0);
    let err = device.pop_error().expect("resource state error");
    assert_eq!(err.kind, DeviceErrorKind::ResourceState);
    assert!(err.message.contains("does not allow"), "{}", err.message);
}

#[test]
fn destroyed_texture_rejects_the_batch() {
    let (mut device, backend) = device_with_backend();
    let queue = device.queue();
    let texture = device.create_texture(&TextureDescriptor {
        usage: TextureUsages::all(),
    });
    device.destroy_texture(texture);

    let cb = CommandBuffer::new(
        None,
        CommandBufferResourceUsage {
            top_level_textures: vec![TextureUse {
                texture,
                usage: TextureUsages::COPY_SRC,
            }],
            ..Default::default()
        },
    );
    queue.submit(&mut device, vec![cb]);

    assert_eq!(backend.submission_count(), 0);
    assert_eq!(
        device.pop_error().unwrap().kind,
        DeviceErrorKind::ResourceState
    );
}

#[test]
fn unknown_resource_ids_fail_validation() {
    let (mut device, backend) = device_with_backend();
    let queue = device.queue();

    queue.submit(
        &mut device,
        vec![cb_with_top_level_buffer("dangling", BufferId(999))],
    );

    assert_eq!(backend.submission_count(), 0);
    assert_eq!(
        device.pop_error().unwrap().kind,
        DeviceErrorKind::Validation
    );
}

#[test]
fn the_error_queue_rejects_submission() {
    let (mut device, backend) = device_with_backend();
    let queue = cirrus_gpu::Queue::error();

    queue.submit(&mut device, vec![empty_cb("nope")]);

    assert_eq!(backend.submission_count(), 0);
    let err = device.pop_error().expect("validation error");
    assert!(err.message.contains("queue handle"), "{}", err.message);
}

#[test]
fn lost_device_turns_every_operation_into_a_silent_no_op() {
    let (mut device, backend) = device_with_backend();
    let queue = device.queue();
    let buffer = copy_dst_buffer(&mut device, 8);
    let fence = queue.create_fence(&mut device, None);

    device.lose();

    queue.submit(&mut device, vec![empty_cb("dropped")]);
    queue.signal(&mut device, &fence, 1);
    queue.write_buffer(&mut device, buffer, 0, &[0; 4]);
    let lost_fence = queue.create_fence(&mut device, Some(&FenceDescriptor { initial_value: 9 }));

    assert_eq!(backend.submission_count(), 0);
    assert_eq!(device.pop_error(), None);
    assert!(lost_fence.is_error());
    assert_eq!(fence.signaled_value(&device), 0);
}

#[test]
fn the_active_error_scope_retires_only_after_the_submission_completes() {
    let (mut device, _backend) = device_with_backend();
    let queue = device.queue();

    device.enter_error_scope(ErrorScopeId(7));
    queue.submit(&mut device, vec![empty_cb("scoped")]);

    // Not yet complete: nothing retires.
    assert_eq!(device.tick(SubmissionSerial::ZERO), vec![]);

    let events = device.tick(device.last_submitted_serial());
    assert_eq!(
        events,
        vec![DeviceEvent::ErrorScopeRetired {
            scope: ErrorScopeId(7)
        }]
    );
}

#[test]
fn signal_registers_the_error_scope_like_a_submit_does() {
    let (mut device, _backend) = device_with_backend();
    let queue = device.queue();
    let fence = queue.create_fence(&mut device, None);

    device.enter_error_scope(ErrorScopeId(3));
    queue.signal(&mut device, &fence, 1);

    let events = device.tick(SubmissionSerial::ZERO);
    assert!(events.contains(&DeviceEvent::ErrorScopeRetired {
        scope: ErrorScopeId(3)
    }));
}

#[test]
fn disabling_validation_skips_submit_preconditions() {
    let backend = SoftwareBackend::new();
    let mut device = Device::new(
        Box::new(backend.clone()),
        &DeviceDescriptor {
            validation_enabled: false,
        },
    );
    let queue = device.queue();
    let buffer = copy_dst_buffer(&mut device, 8);
    device.destroy_buffer(buffer);

    queue.submit(
        &mut device,
        vec![cb_with_top_level_buffer("unchecked", buffer)],
    );

    assert_eq!(device.pop_error(), None);
    assert_eq!(backend.submission_count(), 1);
}

#[test]
fn pending_writes_flush_before_the_submissions_command_buffers() {
    let (mut device, backend) = device_with_backend();
    let queue = device.queue();
    let buffer = copy_dst_buffer(&mut device, 8);

    queue.write_buffer(&mut device, buffer, 0, &[5; 4]);
    queue.submit(&mut device, vec![empty_cb("consumer")]);

    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].1.len(), 2);
    assert!(matches!(
        submissions[0].1[0],
        QueueOp::CopyStagingToBuffer { .. }
    ));
    assert!(matches!(
        submissions[0].1[1],
        QueueOp::ExecuteCommandBuffer { .. }
    ));
}

#[test]
fn a_failed_submit_leaves_pending_writes_for_the_next_flush() {
    let (mut device, backend) = device_with_backend();
    let queue = device.queue();
    let buffer = copy_dst_buffer(&mut device, 8);

    queue.write_buffer(&mut device, buffer, 0, &[9; 4]);
    queue.submit(
        &mut device,
        vec![cb_with_top_level_buffer("bad", BufferId(999))],
    );
    assert!(device.pop_error().is_some());
    assert_eq!(backend.submission_count(), 0);

    // The staged write was not part of the rejected submission; it flushes
    // with the next successful one.
    queue.submit(&mut device, vec![]);
    assert_eq!(device.read_buffer(buffer, 0, 4).unwrap(), vec![9, 9, 9, 9]);
}
