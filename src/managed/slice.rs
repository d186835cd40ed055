use core::ops::{Deref, DerefMut};
use core::slice;

/// A sequence of elements in borrowed or owned storage.
///
/// The borrowed variants make it possible to hand a statically allocated
/// buffer to a container without involving an allocator, while the owned
/// variant (only with feature `std`) keeps setup code in hosted programs
/// short.
#[derive(Debug)]
pub enum Slice<'a, T> {
    /// A single element.
    One(T),
    /// A borrowed slice of elements.
    Borrowed(&'a mut [T]),
    /// Owned storage, only available with `std`.
    #[cfg(any(feature = "std", test))]
    Many(Vec<T>),
}

impl<'a, T> Slice<'a, T> {
    /// A slice with no elements at all.
    pub fn empty() -> Self {
        Slice::Borrowed(&mut [])
    }
}

impl<'a, T> From<&'a mut [T]> for Slice<'a, T> {
    fn from(slice: &'a mut [T]) -> Self {
        Slice::Borrowed(slice)
    }
}

#[cfg(any(feature = "std", test))]
impl<T> From<Vec<T>> for Slice<'_, T> {
    fn from(vec: Vec<T>) -> Self {
        Slice::Many(vec)
    }
}

impl<T> Deref for Slice<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        match self {
            Slice::One(element) => slice::from_ref(element),
            Slice::Borrowed(slice) => slice,
            #[cfg(any(feature = "std", test))]
            Slice::Many(vec) => vec,
        }
    }
}

impl<T> DerefMut for Slice<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        match self {
            Slice::One(element) => slice::from_mut(element),
            Slice::Borrowed(slice) => slice,
            #[cfg(any(feature = "std", test))]
            Slice::Many(vec) => vec,
        }
    }
}
