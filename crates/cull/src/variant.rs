use std::ops::Index;

use cull_gpu::{VARIANT_CULL, VARIANT_REOCCLUSION, VARIANT_SINGLE};

/// Permutation of the culling kernels, selected by a specialization constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CullVariant {
    /// First pass, tests against the previous frame's pyramid.
    Cull,
    /// Second pass, retests what the first pass rejected against the fresh pyramid.
    Reocclusion,
    /// Only pass of a frame, does not record triangle visibility.
    Single,
}

impl CullVariant {
    pub const ALL: [Self; 3] = [Self::Cull, Self::Reocclusion, Self::Single];

    pub fn id(self) -> u32 {
        match self {
            Self::Cull => VARIANT_CULL,
            Self::Reocclusion => VARIANT_REOCCLUSION,
            Self::Single => VARIANT_SINGLE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Cull => "cull",
            Self::Reocclusion => "reocclusion",
            Self::Single => "single",
        }
    }
}

/// One `T` per variant.
pub struct VariantTable<T>([T; 3]);

impl<T> VariantTable<T> {
    pub fn new<E>(mut f: impl FnMut(CullVariant) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self([
            f(CullVariant::Cull)?,
            f(CullVariant::Reocclusion)?,
            f(CullVariant::Single)?,
        ]))
    }
}

impl<T> Index<CullVariant> for VariantTable<T> {
    type Output = T;

    fn index(&self, variant: CullVariant) -> &Self::Output {
        &self.0[variant.id() as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_keyed_by_variant() {
        let table = VariantTable::new(|variant| Ok::<_, ()>(variant.name())).unwrap();
        for variant in CullVariant::ALL.iter() {
            assert_eq!(table[*variant], variant.name());
        }
    }
}
