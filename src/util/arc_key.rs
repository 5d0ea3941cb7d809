use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Compares and hashes an [`Arc`] by the allocation it points to.
pub(crate) struct ArcKey<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized> Clone for ArcKey<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: ?Sized> PartialEq for ArcKey<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Eq for ArcKey<T> {}

impl<T: ?Sized> Hash for ArcKey<T> {
    fn hash<H>(&self, hasher: &mut H)
    where
        H: Hasher,
    {
        hasher.write_usize(Arc::as_ptr(&self.0) as *const () as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_not_value() {
        let a = Arc::new(1);
        let b = Arc::new(1);
        let set: HashSet<_> = [ArcKey(a.clone()), ArcKey(a), ArcKey(b)].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
