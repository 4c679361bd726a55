use std::cmp::Ordering;

use ash::vk;
use vulkan::{
    cmp_device_types, contains_extension, Device, DeviceConfiguration, KhrPortabilitySubsetFn,
    PhysicalDevice, PhysicalDeviceFeatures, QueueFamilyProperties, QueueFlags, VkResult,
};

pub struct DeviceCandidate {
    physical_device: PhysicalDevice,
    device_configuration: DeviceConfiguration,
}

impl DeviceCandidate {
    pub fn new(physical_device: PhysicalDevice) -> VkResult<Option<Self>> {
        if !supports_culling(physical_device.features()) {
            return Ok(None);
        }
        let mut extension_names = Vec::new();
        if contains_extension(physical_device.extensions(), KhrPortabilitySubsetFn::name()) {
            extension_names.push(KhrPortabilitySubsetFn::name());
        }
        let main_queue_family_index = match physical_device
            .queue_families()
            .iter()
            .enumerate()
            .map(|(index, properties)| (index as u32, properties))
            .filter(|(_, properties)| queue_family_supports_culling(properties))
            .max_by_key(|(_, properties)| properties.queue_count)
            .map(|(index, _)| index)
        {
            Some(index) => index,
            None => return Ok(None),
        };
        let device_configuration = DeviceConfiguration {
            extension_names,
            features: culling_features(),
            main_queue_family_index,
        };
        Ok(Some(Self {
            physical_device,
            device_configuration,
        }))
    }

    pub fn name(&self) -> String {
        self.physical_device.name()
    }

    pub fn create(self) -> Result<Device, vulkan::Error> {
        self.physical_device.create(self.device_configuration)
    }
}

/// Features the culling kernels and the indirect draws rely on.
fn culling_features() -> PhysicalDeviceFeatures {
    let mut features = PhysicalDeviceFeatures::default();
    features.vulkan_10.features.multi_draw_indirect = vk::TRUE;
    features.vulkan_11.shader_draw_parameters = vk::TRUE;
    features.vulkan_12.draw_indirect_count = vk::TRUE;
    features.vulkan_12.scalar_block_layout = vk::TRUE;
    features.vulkan_12.vulkan_memory_model = vk::TRUE;
    features.vulkan_12.vulkan_memory_model_device_scope = vk::TRUE;
    features
}

fn supports_culling(supported: &PhysicalDeviceFeatures) -> bool {
    [
        supported.vulkan_10.features.multi_draw_indirect,
        supported.vulkan_11.shader_draw_parameters,
        supported.vulkan_12.draw_indirect_count,
        supported.vulkan_12.scalar_block_layout,
        supported.vulkan_12.vulkan_memory_model,
        supported.vulkan_12.vulkan_memory_model_device_scope,
    ]
    .iter()
    .all(|feature| *feature == vk::TRUE)
}

impl PartialEq for DeviceCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DeviceCandidate {}

impl PartialOrd for DeviceCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DeviceCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_device_types(
            self.physical_device
                .properties()
                .vulkan_10
                .properties
                .device_type,
            other
                .physical_device
                .properties()
                .vulkan_10
                .properties
                .device_type,
        )
    }
}

/// Best candidate among `devices`, skipping devices that cannot run the culling pipeline.
pub fn best_candidate(devices: Vec<PhysicalDevice>) -> VkResult<Option<DeviceCandidate>> {
    devices
        .into_iter()
        .try_fold(None, |best: Option<DeviceCandidate>, device| {
            Ok(match DeviceCandidate::new(device)? {
                Some(candidate) => match best {
                    Some(best) if best >= candidate => Some(best),
                    _ => Some(candidate),
                },
                None => best,
            })
        })
}

fn queue_family_supports_culling(properties: &QueueFamilyProperties) -> bool {
    properties
        .queue_flags
        .contains(QueueFlags::COMPUTE | QueueFlags::GRAPHICS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_enabled_feature_is_required() {
        assert!(supports_culling(&culling_features()));
        let mut features = culling_features();
        features.vulkan_12.vulkan_memory_model_device_scope = vk::FALSE;
        assert!(!supports_culling(&features));
        let mut features = culling_features();
        features.vulkan_12.draw_indirect_count = vk::FALSE;
        assert!(!supports_culling(&features));
    }

    #[test]
    fn default_features_are_rejected() {
        assert!(!supports_culling(&PhysicalDeviceFeatures::default()));
    }
}
