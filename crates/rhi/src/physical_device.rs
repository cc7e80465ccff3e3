//! Physical device (GPU) selection.
//!
//! This module picks the device/queue/surface combination every other
//! component runs on.
//!
//! # Overview
//!
//! A device is suitable when:
//! 1. One of its queue families supports graphics
//! 2. One of its queue families (possibly the same) can present to the surface
//! 3. It supports every required device extension
//! 4. The surface reports at least one format and one present mode for it
//!
//! With [`SelectionPolicy::FirstSuitable`] the first suitable device in
//! enumeration order wins. [`SelectionPolicy::PreferDiscrete`] scores the
//! suitable devices and takes the best one, keeping enumeration order for ties.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_rhi::instance::Instance;
//! use vkframe_rhi::surface::Surface;
//! use vkframe_rhi::physical_device::{select_device, SelectionPolicy, REQUIRED_DEVICE_EXTENSIONS};
//!
//! # fn example(instance: Arc<Instance>, surface: Arc<Surface>) -> Result<(), vkframe_rhi::RhiError> {
//! let caps = select_device(&instance, &surface, REQUIRED_DEVICE_EXTENSIONS, SelectionPolicy::FirstSuitable)?;
//! println!("Selected GPU: {}", caps.device_name());
//! # Ok(())
//! # }
//! ```

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::surface::Surface;
use crate::swapchain::SwapchainSupportDetails;

/// Device extensions needed to present.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// How to choose among several suitable devices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// First suitable device in enumeration order.
    #[default]
    FirstSuitable,
    /// Highest [`rate_device`] score, enumeration order breaking ties.
    PreferDiscrete,
}

/// Queue family indices for graphics and presentation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family that supports presentation to a surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both a graphics and a present family were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the distinct family indices, graphics first.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);

        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }

        families
    }
}

/// Everything the rest of the engine needs to know about the chosen device.
///
/// `swapchain_support` is the snapshot taken during selection; the swapchain
/// re-queries it on every (re)creation because the surface extent changes.
#[derive(Clone)]
pub struct DeviceCapabilities {
    /// Vulkan physical device handle.
    pub physical_device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types, used for memory-type selection.
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Graphics queue family.
    pub graphics_family: u32,
    /// Present queue family (may equal `graphics_family`).
    pub present_family: u32,
    /// Surface formats, present modes and capabilities.
    pub swapchain_support: SwapchainSupportDetails,
}

impl DeviceCapabilities {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        device_type_name(self.properties.device_type)
    }

    /// Queue families as an index set.
    pub fn queue_families(&self) -> QueueFamilyIndices {
        QueueFamilyIndices {
            graphics_family: Some(self.graphics_family),
            present_family: Some(self.present_family),
        }
    }

    /// Total device-local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        device_local_memory(&self.memory_properties)
    }
}

impl std::fmt::Debug for DeviceCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCapabilities")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("graphics_family", &self.graphics_family)
            .field("present_family", &self.present_family)
            .field("formats", &self.swapchain_support.formats.len())
            .field("present_modes", &self.swapchain_support.present_modes)
            .finish()
    }
}

/// Suitability facts gathered for one enumerated device.
#[derive(Clone, Debug, Default)]
pub struct DeviceCandidate {
    /// Queue families found on the device.
    pub queue_families: QueueFamilyIndices,
    /// Required extensions the device lacks.
    pub missing_extensions: Vec<String>,
    /// The surface reported at least one format and one present mode.
    pub swapchain_adequate: bool,
    /// Preference score, only consulted by [`SelectionPolicy::PreferDiscrete`].
    pub score: u32,
}

impl DeviceCandidate {
    /// Whether the device meets every mandatory capability.
    pub fn is_suitable(&self) -> bool {
        self.queue_families.is_complete()
            && self.missing_extensions.is_empty()
            && self.swapchain_adequate
    }
}

/// Picks the index of the candidate to use under `policy`.
///
/// Returns `None` when no candidate is suitable.
pub fn pick_candidate(candidates: &[DeviceCandidate], policy: SelectionPolicy) -> Option<usize> {
    let mut suitable = candidates
        .iter()
        .enumerate()
        .filter(|(_, candidate)| candidate.is_suitable());

    match policy {
        SelectionPolicy::FirstSuitable => suitable.next().map(|(index, _)| index),
        SelectionPolicy::PreferDiscrete => suitable
            .fold(None, |best: Option<(usize, u32)>, (index, candidate)| match best {
                Some((_, best_score)) if best_score >= candidate.score => best,
                _ => Some((index, candidate.score)),
            })
            .map(|(index, _)| index),
    }
}

/// Keeps a successful evaluation; a failed one becomes a candidate that is
/// never suitable, so the remaining devices are still considered.
fn settle_evaluation(index: usize, result: RhiResult<DeviceCandidate>) -> DeviceCandidate {
    result.unwrap_or_else(|e| {
        warn!("Skipping GPU {}: capability query failed: {}", index, e);
        DeviceCandidate::default()
    })
}

/// Finds the graphics and present queue families.
///
/// The graphics family is the first family with graphics support. The present
/// family is the graphics family when it can present, otherwise the first
/// family that can.
///
/// # Errors
///
/// Propagates errors from the `supports_present` query.
pub fn find_queue_families<F>(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: F,
) -> RhiResult<QueueFamilyIndices>
where
    F: FnMut(u32) -> RhiResult<bool>,
{
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }
        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics_family = Some(i);
            break;
        }
    }

    if let Some(graphics) = indices.graphics_family
        && supports_present(graphics)?
    {
        indices.present_family = Some(graphics);
        return Ok(indices);
    }

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count > 0 && Some(i) != indices.graphics_family && supports_present(i)? {
            indices.present_family = Some(i);
            break;
        }
    }

    Ok(indices)
}

/// Returns the names in `required` that `available` does not list.
pub fn missing_extensions(
    available: &[vk::ExtensionProperties],
    required: &[&CStr],
) -> Vec<String> {
    required
        .iter()
        .filter(|&&name| {
            !available
                .iter()
                .any(|ext| ext.extension_name_as_c_str() == Ok(name))
        })
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

/// Rates a physical device; higher is better.
pub fn rate_device(
    properties: &vk::PhysicalDeviceProperties,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
) -> u32 {
    let mut score = match properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 100_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 10_000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1_000,
        vk::PhysicalDeviceType::CPU => 100,
        _ => 1,
    };

    score += properties.limits.max_image_dimension2_d.min(16_384);

    let vram_mb = (device_local_memory(memory_properties) / (1024 * 1024)) as u32;
    score += vram_mb.min(16_000);

    score
}

/// Selects the device to render with.
///
/// # Errors
///
/// - [`RhiError::NoVulkanSupport`] if enumeration returns no devices
/// - [`RhiError::NoSuitableDevice`] if no device meets the requirements
/// - Any Vulkan error raised while enumerating or querying the chosen device
///
/// A device whose capability queries fail is skipped rather than failing the
/// whole selection.
pub fn select_device(
    instance: &Instance,
    surface: &Surface,
    required_extensions: &[&CStr],
    policy: SelectionPolicy,
) -> RhiResult<DeviceCapabilities> {
    let vk_instance = instance.handle();
    let devices = unsafe { vk_instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoVulkanSupport);
    }

    info!("Found {} GPU(s)", devices.len());

    let candidates: Vec<_> = devices
        .iter()
        .enumerate()
        .map(|(index, &device)| {
            settle_evaluation(
                index,
                evaluate_device(vk_instance, device, surface, required_extensions),
            )
        })
        .collect();

    let Some(index) = pick_candidate(&candidates, policy) else {
        warn!("No suitable GPU found with required capabilities");
        return Err(RhiError::NoSuitableDevice);
    };

    let physical_device = devices[index];
    let families = candidates[index].queue_families;
    let (Some(graphics_family), Some(present_family)) =
        (families.graphics_family, families.present_family)
    else {
        return Err(RhiError::NoSuitableDevice);
    };

    let capabilities = DeviceCapabilities {
        physical_device,
        properties: unsafe { vk_instance.get_physical_device_properties(physical_device) },
        memory_properties: unsafe {
            vk_instance.get_physical_device_memory_properties(physical_device)
        },
        graphics_family,
        present_family,
        swapchain_support: SwapchainSupportDetails::query(physical_device, surface)?,
    };

    info!(
        "Selected GPU: '{}' ({}), graphics family {}, present family {}, policy {:?}",
        capabilities.device_name(),
        capabilities.device_type_name(),
        graphics_family,
        present_family,
        policy
    );

    Ok(capabilities)
}

/// Selects a device for offscreen transfer work, without a surface.
///
/// The returned record uses the graphics family for presentation as well and
/// carries empty swapchain support; it must not be used to build a swapchain.
///
/// # Errors
///
/// - [`RhiError::NoVulkanSupport`] if enumeration returns no devices
/// - [`RhiError::NoSuitableDevice`] if no device has a graphics queue
pub fn select_headless_device(instance: &Instance) -> RhiResult<DeviceCapabilities> {
    let vk_instance = instance.handle();
    let devices = unsafe { vk_instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        return Err(RhiError::NoVulkanSupport);
    }

    for physical_device in devices {
        let families =
            unsafe { vk_instance.get_physical_device_queue_family_properties(physical_device) };
        let indices = find_queue_families(&families, |_| Ok(true))?;

        if let Some(graphics_family) = indices.graphics_family {
            let capabilities = DeviceCapabilities {
                physical_device,
                properties: unsafe { vk_instance.get_physical_device_properties(physical_device) },
                memory_properties: unsafe {
                    vk_instance.get_physical_device_memory_properties(physical_device)
                },
                graphics_family,
                present_family: graphics_family,
                swapchain_support: SwapchainSupportDetails::default(),
            };
            debug!("Headless device: {:?}", capabilities);
            return Ok(capabilities);
        }
    }

    Err(RhiError::NoSuitableDevice)
}

fn evaluate_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: &Surface,
    required_extensions: &[&CStr],
) -> RhiResult<DeviceCandidate> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let available = unsafe { instance.enumerate_device_extension_properties(device)? };

    let queue_families =
        find_queue_families(&families, |family| surface.supports_present(device, family))?;
    let missing = missing_extensions(&available, required_extensions);

    let swapchain_adequate = if queue_families.is_complete() && missing.is_empty() {
        SwapchainSupportDetails::query(device, surface)?.is_adequate()
    } else {
        false
    };

    let candidate = DeviceCandidate {
        queue_families,
        missing_extensions: missing,
        swapchain_adequate,
        score: rate_device(&properties, &memory_properties),
    };

    let name = properties
        .device_name_as_c_str()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "Unknown".to_string());

    if candidate.is_suitable() {
        debug!(
            "GPU '{}' ({}) is suitable, score {}",
            name,
            device_type_name(properties.device_type),
            candidate.score
        );
    } else {
        debug!(
            "GPU '{}' skipped: graphics={}, present={}, missing extensions {:?}, swapchain adequate={}",
            name,
            queue_families.graphics_family.is_some(),
            queue_families.present_family.is_some(),
            candidate.missing_extensions,
            candidate.swapchain_adequate
        );
    }

    Ok(candidate)
}

fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "Other",
    }
}

fn device_local_memory(memory_properties: &vk::PhysicalDeviceMemoryProperties) -> u64 {
    memory_properties
        .memory_heaps
        .iter()
        .take(memory_properties.memory_heap_count as usize)
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn extension(name: &CStr) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (dst, &src) in props.extension_name.iter_mut().zip(name.to_bytes()) {
            *dst = src as std::ffi::c_char;
        }
        props
    }

    fn suitable(score: u32) -> DeviceCandidate {
        DeviceCandidate {
            queue_families: QueueFamilyIndices {
                graphics_family: Some(0),
                present_family: Some(0),
            },
            missing_extensions: Vec::new(),
            swapchain_adequate: true,
            score,
        }
    }

    #[test]
    fn test_queue_family_indices_default() {
        let indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());
        assert!(indices.unique_families().is_empty());
    }

    #[test]
    fn test_unique_families() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(shared.unique_families(), vec![0]);

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(split.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_find_queue_families_prefers_shared_family() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let indices = find_queue_families(&families, |_| Ok(true)).unwrap();
        assert_eq!(indices.graphics_family, Some(1));
        assert_eq!(indices.present_family, Some(1));
    }

    #[test]
    fn test_find_queue_families_separate_present() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::TRANSFER),
        ];
        let indices = find_queue_families(&families, |i| Ok(i == 2)).unwrap();
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, Some(2));
    }

    #[test]
    fn test_find_queue_families_no_graphics() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        let indices = find_queue_families(&families, |_| Ok(true)).unwrap();
        assert_eq!(indices.graphics_family, None);
        assert_eq!(indices.present_family, Some(0));
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_find_queue_families_skips_empty_families() {
        let mut empty = family(vk::QueueFlags::GRAPHICS);
        empty.queue_count = 0;
        let families = [empty, family(vk::QueueFlags::GRAPHICS)];
        let indices = find_queue_families(&families, |_| Ok(true)).unwrap();
        assert_eq!(indices.graphics_family, Some(1));
    }

    #[test]
    fn test_find_queue_families_propagates_query_error() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let result = find_queue_families(&families, |_| {
            Err(RhiError::VulkanError(vk::Result::ERROR_SURFACE_LOST_KHR))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_extensions() {
        let available = [extension(ash::khr::swapchain::NAME)];
        assert!(missing_extensions(&available, REQUIRED_DEVICE_EXTENSIONS).is_empty());

        let missing = missing_extensions(&[], REQUIRED_DEVICE_EXTENSIONS);
        assert_eq!(missing, vec!["VK_KHR_swapchain".to_string()]);
    }

    #[test]
    fn test_candidate_suitability() {
        assert!(suitable(0).is_suitable());

        let mut no_present = suitable(0);
        no_present.queue_families.present_family = None;
        assert!(!no_present.is_suitable());

        let mut missing = suitable(0);
        missing.missing_extensions.push("VK_KHR_swapchain".into());
        assert!(!missing.is_suitable());

        let mut no_formats = suitable(0);
        no_formats.swapchain_adequate = false;
        assert!(!no_formats.is_suitable());
    }

    #[test]
    fn test_pick_first_suitable_in_order() {
        let mut unsuitable = suitable(999_999);
        unsuitable.swapchain_adequate = false;
        let candidates = [unsuitable, suitable(10), suitable(500)];

        assert_eq!(
            pick_candidate(&candidates, SelectionPolicy::FirstSuitable),
            Some(1)
        );
    }

    #[test]
    fn test_pick_prefer_discrete_takes_best_score() {
        let candidates = [suitable(10), suitable(500), suitable(500)];
        assert_eq!(
            pick_candidate(&candidates, SelectionPolicy::PreferDiscrete),
            Some(1)
        );
    }

    #[test]
    fn test_failed_evaluation_skips_device() {
        let failed = settle_evaluation(
            0,
            Err(RhiError::VulkanError(vk::Result::ERROR_INITIALIZATION_FAILED)),
        );
        assert!(!failed.is_suitable());

        let candidates = [failed, settle_evaluation(1, Ok(suitable(10)))];
        assert_eq!(
            pick_candidate(&candidates, SelectionPolicy::FirstSuitable),
            Some(1)
        );
        assert_eq!(
            pick_candidate(&candidates[..1], SelectionPolicy::PreferDiscrete),
            None
        );
    }

    #[test]
    fn test_pick_none_suitable() {
        let mut candidate = suitable(0);
        candidate.queue_families.graphics_family = None;
        assert_eq!(
            pick_candidate(&[candidate], SelectionPolicy::FirstSuitable),
            None
        );
        assert_eq!(pick_candidate(&[], SelectionPolicy::PreferDiscrete), None);
    }

    #[test]
    fn test_rate_device_prefers_discrete() {
        let memory = vk::PhysicalDeviceMemoryProperties::default();
        let discrete = vk::PhysicalDeviceProperties {
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            ..Default::default()
        };
        let integrated = vk::PhysicalDeviceProperties {
            device_type: vk::PhysicalDeviceType::INTEGRATED_GPU,
            ..Default::default()
        };
        assert!(rate_device(&discrete, &memory) > rate_device(&integrated, &memory));
    }
}
