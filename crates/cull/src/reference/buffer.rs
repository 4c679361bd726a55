use std::{
    any::{type_name, Any},
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

use vulkan::Pod;

use crate::BufferUsage;

/// Host memory standing in for a device buffer, holding a `Vec` of one element type.
#[derive(Clone)]
pub struct Buffer {
    name: Rc<str>,
    usage: BufferUsage,
    data: Rc<RefCell<Box<dyn Any>>>,
}

impl Buffer {
    pub(super) fn new<T: Pod>(usage: BufferUsage, len: usize, name: &str) -> Self {
        Self {
            name: name.into(),
            usage,
            data: Rc::new(RefCell::new(Box::new(vec![T::zeroed(); len]))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn read<T: Pod>(&self) -> Ref<'_, [T]> {
        let name = &self.name;
        Ref::map(self.data.borrow(), |data| match data.downcast_ref::<Vec<T>>() {
            Some(data) => data.as_slice(),
            None => panic!("buffer {} does not hold {}", name, type_name::<T>()),
        })
    }

    pub fn write<T: Pod>(&self) -> RefMut<'_, [T]> {
        let name = &self.name;
        RefMut::map(self.data.borrow_mut(), |data| {
            match data.downcast_mut::<Vec<T>>() {
                Some(data) => data.as_mut_slice(),
                None => panic!("buffer {} does not hold {}", name, type_name::<T>()),
            }
        })
    }

    pub fn to_vec<T: Pod>(&self) -> Vec<T> {
        self.read::<T>().to_vec()
    }
}

pub struct SceneBindings {
    pub constants: Buffer,
    pub objects: Buffer,
    pub meshlets: Buffer,
    pub vertices: Buffer,
    pub triangles: Buffer,
    pub object_visibility: Buffer,
    pub meshlet_visibility: Buffer,
    pub triangle_visibility: Buffer,
}

pub struct PassBindings {
    pub commands: Buffer,
    pub counter: Buffer,
    pub flags: Buffer,
    pub dispatch: Buffer,
}

pub struct BatchBindings {
    pub indices: Buffer,
    pub triangles: Buffer,
    pub draw: Buffer,
}

pub enum Bindings {
    Scene(SceneBindings),
    Pass(PassBindings),
    Batch(BatchBindings),
}

impl Bindings {
    pub fn scene(&self) -> &SceneBindings {
        match self {
            Self::Scene(bindings) => bindings,
            _ => panic!("expected scene bindings"),
        }
    }

    pub fn pass(&self) -> &PassBindings {
        match self {
            Self::Pass(bindings) => bindings,
            _ => panic!("expected pass bindings"),
        }
    }

    pub fn batch(&self) -> &BatchBindings {
        match self {
            Self::Batch(bindings) => bindings,
            _ => panic!("expected batch bindings"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_storage() {
        let buffer = Buffer::new::<u32>(BufferUsage::Counter, 2, "counter");
        let clone = buffer.clone();
        clone.write::<u32>()[1] = 5;
        assert_eq!(buffer.to_vec::<u32>(), vec![0, 5]);
        assert_eq!(buffer.name(), "counter");
    }

    #[test]
    #[should_panic]
    fn element_type_is_checked() {
        let buffer = Buffer::new::<u32>(BufferUsage::Storage, 1, "visibility");
        buffer.read::<f32>();
    }
}
