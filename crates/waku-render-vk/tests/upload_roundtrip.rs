// SPDX-License-Identifier: CEPL-1.0
//! Needs a Vulkan driver. Run with `--ignored`; returns early when no loader
//! or device is present.

use ash::{vk, Entry};
use waku_render::Vertex;
use waku_render_vk::device::create_instance;
use waku_render_vk::upload::Uploader;

fn vertices(n: usize) -> Vec<Vertex> {
    (0..n)
        .map(|i| {
            let f = i as f32;
            Vertex {
                pos: [f, -f, f * 0.5],
                color: [1.0, f / (n as f32 + 1.0), 0.25],
                uv: [f.sin(), f.cos()],
            }
        })
        .collect()
}

#[test]
#[ignore]
fn vertex_upload_reads_back_bit_identical() {
    let Ok(entry) = (unsafe { Entry::load() }) else {
        eprintln!("no Vulkan loader, skipping");
        return;
    };
    let instance = unsafe { create_instance(&entry, None, false) }.unwrap();

    let picked = unsafe { instance.enumerate_physical_devices() }
        .unwrap()
        .into_iter()
        .find_map(|phys| {
            let families =
                unsafe { instance.get_physical_device_queue_family_properties(phys) };
            families
                .iter()
                .position(|f| f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|i| (phys, i as u32))
        });
    let Some((phys, family)) = picked else {
        eprintln!("no graphics-capable device, skipping");
        unsafe { instance.destroy_instance(None) };
        return;
    };

    let priorities = [1.0f32];
    let qci = vk::DeviceQueueCreateInfo {
        s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
        queue_family_index: family,
        queue_count: 1,
        p_queue_priorities: priorities.as_ptr(),
        ..Default::default()
    };
    let dci = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: 1,
        p_queue_create_infos: &qci,
        ..Default::default()
    };
    let device = unsafe { instance.create_device(phys, &dci, None) }.unwrap();
    let queue = unsafe { device.get_device_queue(family, 0) };
    let pool_ci = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        queue_family_index: family,
        ..Default::default()
    };
    let pool = unsafe { device.create_command_pool(&pool_ci, None) }.unwrap();
    let mem_props = unsafe { instance.get_physical_device_memory_properties(phys) };
    let uploader = Uploader::new(&device, mem_props, queue, pool);

    for n in [0usize, 1, 1000] {
        let verts = vertices(n);
        let bytes: &[u8] = bytemuck::cast_slice(&verts);
        let buf = unsafe {
            uploader.upload_buffer(
                bytes,
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_SRC,
            )
        }
        .unwrap();
        assert_eq!(buf.size as usize, n * std::mem::size_of::<Vertex>());

        let back = unsafe { uploader.read_back(&buf) }.unwrap();
        assert_eq!(back.len(), bytes.len(), "n={n}");
        assert!(back == bytes, "payload differs for n={n}");
        unsafe { buf.destroy(&device) };
    }

    unsafe {
        device.destroy_command_pool(pool, None);
        device.destroy_device(None);
        instance.destroy_instance(None);
    }
}
