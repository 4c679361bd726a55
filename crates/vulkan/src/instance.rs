use std::{
    ffi::CStr,
    sync::Arc,
};

use ash::{
    prelude::VkResult,
    vk::{
        api_version_major, api_version_minor, api_version_patch, make_api_version,
        ApplicationInfo, InstanceCreateInfo,
    },
    Entry,
};
use semver::Version;

use super::{Error, PhysicalDevice};

pub struct Instance {
    pub(super) inner: ash::Instance,
    pub(super) entry: Entry,
}

impl Instance {
    pub fn new(
        application_name: &CStr,
        application_version: Version,
        validation: bool,
    ) -> Result<Self, Error> {
        let entry = unsafe { Entry::new() }?;
        let layer_names: Vec<&CStr> = if validation {
            vec![CStr::from_bytes_with_nul(b"VK_LAYER_KHRONOS_validation\0")
                .expect("literal is nul terminated")]
        } else {
            vec![]
        };
        let application_info = ApplicationInfo::builder()
            .api_version(make_api_version(0, 1, 2, 0))
            .application_name(application_name)
            .application_version(application_version.to_u32());
        let layer_names_ptr: Vec<_> = layer_names.iter().map(|c| c.as_ptr()).collect();
        let create_info = InstanceCreateInfo::builder()
            .enabled_layer_names(&layer_names_ptr)
            .application_info(&application_info);
        let inner = unsafe { entry.create_instance(&create_info, None) }?;
        Ok(Self { inner, entry })
    }

    pub fn physical_devices(self: &Arc<Self>) -> VkResult<Vec<PhysicalDevice>> {
        Ok(unsafe { self.inner.enumerate_physical_devices() }?
            .into_iter()
            .filter_map(|handle| PhysicalDevice::new(self.clone(), handle).ok().flatten())
            .collect())
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe { self.inner.destroy_instance(None) }
    }
}

pub trait VersionExt {
    fn to_u32(&self) -> u32;

    fn from_u32(version: u32) -> Self;
}

impl VersionExt for Version {
    fn to_u32(&self) -> u32 {
        make_api_version(0, self.major as u32, self.minor as u32, self.patch as u32)
    }

    fn from_u32(version: u32) -> Self {
        Self::new(
            api_version_major(version) as u64,
            api_version_minor(version) as u64,
            api_version_patch(version) as u64,
        )
    }
}
