use std::ffi::c_void;

use ash::vk::{
    PhysicalDeviceFeatures2, PhysicalDevicePortabilitySubsetFeaturesKHR,
    PhysicalDeviceVulkan11Features, PhysicalDeviceVulkan12Features,
};

pub trait Chainable {
    fn set_next(&mut self, next: *mut c_void);
}

macro_rules! chainable {
    ($($ty:ty),*) => {
        $(impl Chainable for $ty {
            fn set_next(&mut self, next: *mut c_void) {
                self.p_next = next;
            }
        })*
    };
}

chainable!(
    PhysicalDeviceFeatures2,
    PhysicalDeviceVulkan11Features,
    PhysicalDeviceVulkan12Features,
    PhysicalDevicePortabilitySubsetFeaturesKHR
);

pub struct ChainBuilder<'a>(&'a mut dyn Chainable);

impl<'a> ChainBuilder<'a> {
    pub fn new<T: Chainable>(start: &'a mut T) -> Self {
        Self(start)
    }

    pub fn push<T: Chainable>(&mut self, next: &'a mut T) {
        self.0.set_next(next as *mut T as _);
        self.0 = next;
    }
}
