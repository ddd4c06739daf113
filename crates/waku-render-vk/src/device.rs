// SPDX-License-Identifier: CEPL-1.0
//! Instance, surface, physical device and logical device bootstrap.

use crate::error::RenderError;
use crate::unwind::Unwind;
use anyhow::{Context, Result};
use ash::ext::debug_utils as ext_debug;
use ash::khr::{surface, swapchain};
use ash::{vk, Device, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use std::ffi::{c_char, CStr};
use tracing::{debug, error, info, warn};
use waku_render::RenderConfig;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const APP_NAME: &CStr = c"Waku";

/// Graphics and present may be the same family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Prefer one family that does both; otherwise the first graphics family
/// and the first present family.
pub fn find_queue_families(
    props: &[vk::QueueFamilyProperties],
    supports_present: impl Fn(u32) -> bool,
) -> Option<QueueFamilies> {
    let is_graphics =
        |i: usize| props[i].queue_count > 0 && props[i].queue_flags.contains(vk::QueueFlags::GRAPHICS);

    if let Some(i) = (0..props.len()).find(|&i| is_graphics(i) && supports_present(i as u32)) {
        return Some(QueueFamilies {
            graphics: i as u32,
            present: i as u32,
        });
    }
    let graphics = (0..props.len()).find(|&i| is_graphics(i))?;
    let present = (0..props.len() as u32).find(|&i| supports_present(i))?;
    Some(QueueFamilies {
        graphics: graphics as u32,
        present,
    })
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the loader hands us a valid callback-data struct for the call.
    let msg = unsafe { CStr::from_ptr((*data).p_message) }.to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("[vulkan] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[vulkan] {msg}");
    } else {
        debug!("[vulkan] {msg}");
    }
    vk::FALSE
}

/// Whether the validation layer is installed.
pub unsafe fn validation_available(entry: &Entry) -> bool {
    unsafe { entry.enumerate_instance_layer_properties() }
        .unwrap_or_default()
        .iter()
        .any(|l| unsafe { CStr::from_ptr(l.layer_name.as_ptr()) } == VALIDATION_LAYER)
}

/// Create an instance. `display` adds the WSI extensions for that display;
/// `None` gives a headless instance.
pub unsafe fn create_instance(
    entry: &Entry,
    display: Option<RawDisplayHandle>,
    validation: bool,
) -> Result<Instance> {
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: APP_NAME.as_ptr(),
        application_version: 0,
        p_engine_name: APP_NAME.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut exts: Vec<*const c_char> = match display {
        Some(dh) => ash_window::enumerate_required_extensions(dh)
            .context("enumerate_required_extensions")?
            .to_vec(),
        None => Vec::new(),
    };
    if validation {
        exts.push(ext_debug::NAME.as_ptr());
    }
    let layers = [VALIDATION_LAYER.as_ptr()];
    let (enabled_layer_count, pp_enabled_layer_names) = if validation {
        (layers.len() as u32, layers.as_ptr())
    } else {
        (0, std::ptr::null())
    };

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: exts.len() as u32,
        pp_enabled_extension_names: exts.as_ptr(),
        enabled_layer_count,
        pp_enabled_layer_names,
        ..Default::default()
    };
    unsafe { entry.create_instance(&create_info, None) }.context("create_instance")
}

unsafe fn create_debug_messenger(
    entry: &Entry,
    instance: &Instance,
) -> Result<(ext_debug::Instance, vk::DebugUtilsMessengerEXT)> {
    let loader = ext_debug::Instance::new(entry, instance);
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    let messenger = unsafe { loader.create_debug_utils_messenger(&ci, None) }
        .context("create_debug_utils_messenger")?;
    Ok((loader, messenger))
}

/// First depth format with optimal-tiling depth attachment support.
pub unsafe fn pick_depth_format(instance: &Instance, phys: vk::PhysicalDevice) -> Result<vk::Format> {
    [
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
    ]
    .into_iter()
    .find(|&fmt| {
        let props = unsafe { instance.get_physical_device_format_properties(phys, fmt) };
        props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
    .ok_or_else(|| RenderError::NoDepthFormat.into())
}

unsafe fn has_swapchain_extension(instance: &Instance, phys: vk::PhysicalDevice) -> bool {
    unsafe { instance.enumerate_device_extension_properties(phys) }
        .unwrap_or_default()
        .iter()
        .any(|e| unsafe { CStr::from_ptr(e.extension_name.as_ptr()) } == swapchain::NAME)
}

unsafe fn pick_physical_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
    let devices =
        unsafe { instance.enumerate_physical_devices() }.context("enumerate_physical_devices")?;

    for phys in devices {
        let props = unsafe { instance.get_physical_device_properties(phys) };
        let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }.to_string_lossy();

        let qprops = unsafe { instance.get_physical_device_queue_family_properties(phys) };
        let Some(families) = find_queue_families(&qprops, |i| unsafe {
            surface_loader
                .get_physical_device_surface_support(phys, i, surface)
                .unwrap_or(false)
        }) else {
            debug!("skip {name}: no graphics/present queue family");
            continue;
        };
        if !unsafe { has_swapchain_extension(instance, phys) } {
            debug!("skip {name}: no {:?}", swapchain::NAME);
            continue;
        }
        let formats = unsafe { surface_loader.get_physical_device_surface_formats(phys, surface) }
            .unwrap_or_default();
        let modes =
            unsafe { surface_loader.get_physical_device_surface_present_modes(phys, surface) }
                .unwrap_or_default();
        if formats.is_empty() || modes.is_empty() {
            debug!("skip {name}: surface has no formats or present modes");
            continue;
        }
        let feats = unsafe { instance.get_physical_device_features(phys) };
        if feats.sampler_anisotropy != vk::TRUE {
            debug!("skip {name}: no samplerAnisotropy");
            continue;
        }

        info!(
            "gpu: {name} (graphics family {}, present family {})",
            families.graphics, families.present
        );
        return Ok((phys, families));
    }
    Err(RenderError::NoSuitableGpu.into())
}

unsafe fn create_logical_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    families: QueueFamilies,
) -> Result<Device> {
    let priorities = [1.0_f32];
    let queue_infos: Vec<_> = families
        .unique()
        .into_iter()
        .map(|family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();

    let features = vk::PhysicalDeviceFeatures {
        sampler_anisotropy: vk::TRUE,
        ..Default::default()
    };
    let exts = [swapchain::NAME.as_ptr()];
    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: queue_infos.len() as u32,
        p_queue_create_infos: queue_infos.as_ptr(),
        enabled_extension_count: exts.len() as u32,
        pp_enabled_extension_names: exts.as_ptr(),
        p_enabled_features: &features,
        ..Default::default()
    };
    unsafe { instance.create_device(phys, &dinfo, None) }.context("create_device")
}

/// Device-level state shared by every other part of the renderer.
pub struct Gpu {
    pub entry: Entry,
    pub instance: Instance,
    debug: Option<(ext_debug::Instance, vk::DebugUtilsMessengerEXT)>,
    pub surface_loader: surface::Instance,
    pub surface: vk::SurfaceKHR,
    pub phys: vk::PhysicalDevice,
    pub device: Device,
    pub families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub swapchain_loader: swapchain::Device,
    pub depth_format: vk::Format,
    pub max_anisotropy: f32,
}

impl Gpu {
    // STRICT ORDER:
    // 1) instance (WSI + optional debug ext)
    // 2) surface from THIS instance
    // 3) physical device + queue families checked AGAINST this surface
    // 4) logical device
    pub unsafe fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        cfg: &RenderConfig,
    ) -> Result<Self> {
        let dh = display
            .display_handle()
            .map_err(|e| anyhow::anyhow!("{e}"))?
            .as_raw();
        let wh = window
            .window_handle()
            .map_err(|e| anyhow::anyhow!("{e}"))?
            .as_raw();

        let entry = unsafe { Entry::load() }.map_err(RenderError::from)?;

        let mut validation = cfg.validation;
        if validation && !unsafe { validation_available(&entry) } {
            warn!("validation requested but {VALIDATION_LAYER:?} is not installed");
            validation = false;
        }
        let instance = unsafe { create_instance(&entry, Some(dh), validation) }?;
        let mut guard = Unwind::new(&instance);
        guard.push(|i: &Instance| unsafe { i.destroy_instance(None) });

        let debug = if validation {
            let (loader, messenger) = unsafe { create_debug_messenger(&entry, &instance) }?;
            let l = loader.clone();
            guard.push(move |_: &Instance| unsafe { l.destroy_debug_utils_messenger(messenger, None) });
            Some((loader, messenger))
        } else {
            None
        };

        let surface_loader = surface::Instance::new(&entry, &instance);
        let surface = unsafe { ash_window::create_surface(&entry, &instance, dh, wh, None) }
            .context("ash_window::create_surface")?;
        let sl = surface_loader.clone();
        guard.push(move |_: &Instance| unsafe { sl.destroy_surface(surface, None) });

        let (phys, families) =
            unsafe { pick_physical_device(&instance, &surface_loader, surface) }?;
        let device = unsafe { create_logical_device(&instance, phys, families) }?;
        let d = device.clone();
        guard.push(move |_: &Instance| unsafe { d.destroy_device(None) });
        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let swapchain_loader = swapchain::Device::new(&instance, &device);

        let depth_format = unsafe { pick_depth_format(&instance, phys) }?;
        let limits = unsafe { instance.get_physical_device_properties(phys) }.limits;
        guard.disarm();
        info!(
            "validation={} depth_format={:?} max_anisotropy={}",
            validation, depth_format, limits.max_sampler_anisotropy
        );

        Ok(Self {
            entry,
            instance,
            debug,
            surface_loader,
            surface,
            phys,
            device,
            families,
            graphics_queue,
            present_queue,
            swapchain_loader,
            depth_format,
            max_anisotropy: limits.max_sampler_anisotropy,
        })
    }

    pub fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        unsafe { self.instance.get_physical_device_memory_properties(self.phys) }
    }

    /// Device first, then surface and messenger, instance last. Every
    /// child object must already be gone.
    pub unsafe fn destroy(&self) {
        unsafe {
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some((loader, messenger)) = &self.debug {
                loader.destroy_debug_utils_messenger(*messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}
