use std::{cmp::Ordering, sync::Arc};

use ash::{
    prelude::VkResult,
    vk::{
        self, DeviceCreateInfo, DeviceQueueCreateInfo, ExtensionProperties, KhrPortabilitySubsetFn, PhysicalDeviceFeatures2,
        PhysicalDevicePortabilitySubsetFeaturesKHR, PhysicalDeviceProperties2,
        PhysicalDeviceType, PhysicalDeviceVulkan11Features, PhysicalDeviceVulkan12Features,
        QueueFamilyProperties,
    },
};
use semver::{Comparator, Op, Prerelease, Version};

use crate::{chain::ChainBuilder, contains_extension, VersionExt};

use super::{Device, DeviceConfiguration, Error, Instance};

#[derive(Clone)]
pub struct PhysicalDevice {
    pub(super) instance: Arc<Instance>,
    pub(super) handle: vk::PhysicalDevice,
    pub(super) properties: PhysicalDeviceProperties,
    pub(super) features: PhysicalDeviceFeatures,
    pub(super) extensions: Vec<ExtensionProperties>,
    pub(super) queue_families: Vec<QueueFamilyProperties>,
}

impl PhysicalDevice {
    /// Returns `None` for devices below Vulkan 1.2, which lack indirect count draws.
    pub(super) fn new(
        instance: Arc<Instance>,
        handle: vk::PhysicalDevice,
    ) -> VkResult<Option<Self>> {
        let extensions = unsafe { instance.inner.enumerate_device_extension_properties(handle) }?;
        let queue_families = unsafe {
            instance
                .inner
                .get_physical_device_queue_family_properties(handle)
        };
        let mut properties = PhysicalDeviceProperties::default();
        properties.vulkan_10.properties =
            unsafe { instance.inner.get_physical_device_properties(handle) };
        let api_version = Version::from_u32(properties.vulkan_10.properties.api_version);
        let supported = Comparator {
            op: Op::GreaterEq,
            major: 1,
            minor: Some(2),
            patch: None,
            pre: Prerelease::EMPTY,
        }
        .matches(&api_version);
        if !supported {
            return Ok(None);
        }
        unsafe {
            instance
                .inner
                .get_physical_device_properties2(handle, &mut properties.vulkan_10)
        };
        let mut features = PhysicalDeviceFeatures::default();
        unsafe {
            instance
                .inner
                .get_physical_device_features2(handle, features.chain(&extensions))
        };
        Ok(Some(Self {
            instance,
            handle,
            extensions,
            queue_families,
            properties,
            features,
        }))
    }

    pub fn features(&self) -> &PhysicalDeviceFeatures {
        &self.features
    }

    pub fn extensions(&self) -> &[ExtensionProperties] {
        &self.extensions
    }

    pub fn queue_families(&self) -> &[QueueFamilyProperties] {
        &self.queue_families
    }

    pub fn properties(&self) -> &PhysicalDeviceProperties {
        &self.properties
    }

    pub fn name(&self) -> String {
        unsafe { crate::to_cstr(&self.properties.vulkan_10.properties.device_name) }
            .to_string_lossy()
            .into_owned()
    }

    pub fn create(self, mut configuration: DeviceConfiguration) -> Result<Device, Error> {
        let queue_priorities = [1.0];
        let queue_create_infos = [DeviceQueueCreateInfo::builder()
            .queue_family_index(configuration.main_queue_family_index)
            .queue_priorities(&queue_priorities)
            .build()];
        let extension_names_ptr: Vec<_> = configuration
            .extension_names
            .iter()
            .map(|c| c.as_ptr())
            .collect();
        let create_info = DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names_ptr)
            .push_next(configuration.features.chain(&self.extensions));
        let device = unsafe {
            self.instance
                .inner
                .create_device(self.handle, &create_info, None)?
        };
        Device::new(self, device, configuration)
    }
}

#[derive(Clone, Debug, Default)]
pub struct PhysicalDeviceFeatures {
    pub vulkan_10: PhysicalDeviceFeatures2,
    pub portability_subset: PhysicalDevicePortabilitySubsetFeaturesKHR,
    pub vulkan_11: PhysicalDeviceVulkan11Features,
    pub vulkan_12: PhysicalDeviceVulkan12Features,
}

impl PhysicalDeviceFeatures {
    fn chain(&mut self, extensions: &[ExtensionProperties]) -> &mut PhysicalDeviceFeatures2 {
        let mut chain_builder = ChainBuilder::new(&mut self.vulkan_10);
        if contains_extension(extensions, KhrPortabilitySubsetFn::name()) {
            chain_builder.push(&mut self.portability_subset)
        }
        chain_builder.push(&mut self.vulkan_11);
        chain_builder.push(&mut self.vulkan_12);
        &mut self.vulkan_10
    }
}

#[derive(Default, Clone, Debug)]
pub struct PhysicalDeviceProperties {
    pub vulkan_10: PhysicalDeviceProperties2,
}

pub fn cmp_device_types(a: PhysicalDeviceType, b: PhysicalDeviceType) -> Ordering {
    device_type_priority(a).cmp(&device_type_priority(b))
}

fn device_type_priority(device_type: PhysicalDeviceType) -> u32 {
    match device_type {
        PhysicalDeviceType::DISCRETE_GPU => 5,
        PhysicalDeviceType::INTEGRATED_GPU => 4,
        PhysicalDeviceType::CPU => 3,
        PhysicalDeviceType::VIRTUAL_GPU => 2,
        PhysicalDeviceType::OTHER => 1,
        _ => 0,
    }
}
