// Shared ownership handle with an explicit, opt-in copy-on-write split.
//
// A group of handles shares two heap allocations: the value (kept in a
// `RefCell` so every member can reach it mutably without aliasing a `&mut T`)
// and a plain `Cell<usize>` counting the members. Both are released together
// by whichever handle drops the count to zero.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

use log::{debug, trace};

use crate::error::{HandleError, Result};

// ============================================================================
// Storage
// ============================================================================

fn alloc_count(members: usize) -> NonNull<Cell<usize>> {
    NonNull::from(Box::leak(Box::new(Cell::new(members))))
}

fn alloc_value<T>(value: T) -> NonNull<RefCell<T>> {
    NonNull::from(Box::leak(Box::new(RefCell::new(value))))
}

/// A reference-counted pointer to a heap value of type `T`.
///
/// Copies made with [`Clone`] join the same group and observe each other's
/// writes. [`SharedHandle::detach`] splits a handle off onto a private deep
/// copy; nothing is ever copied implicitly.
///
/// The count is not atomic, so the handle is neither `Send` nor `Sync`.
pub struct SharedHandle<T> {
    value: Option<NonNull<RefCell<T>>>,
    count: Option<NonNull<Cell<usize>>>,
    _marker: PhantomData<RefCell<T>>,
}

impl<T> SharedHandle<T> {
    /// Creates an empty handle. Its count is allocated and reads 0.
    pub fn new() -> Self {
        SharedHandle {
            value: None,
            count: Some(alloc_count(0)),
            _marker: PhantomData,
        }
    }

    /// Moves `value` to the heap and becomes its only owner.
    pub fn from_value(value: T) -> Self {
        SharedHandle {
            value: Some(alloc_value(value)),
            count: Some(alloc_count(1)),
            _marker: PhantomData,
        }
    }

    pub fn from_box(value: Box<T>) -> Self {
        Self::from_value(*value)
    }

    /// Takes ownership of whatever `slot` holds and leaves `None` behind.
    ///
    /// An empty slot produces an empty handle.
    pub fn adopt(slot: &mut Option<Box<T>>) -> Self {
        match slot.take() {
            Some(value) => Self::from_box(value),
            None => Self::new(),
        }
    }

    /// Takes ownership of a raw pointer and nulls the caller's variable.
    ///
    /// A null pointer produces an empty handle.
    ///
    /// # Safety
    ///
    /// A non-null `*raw` must come from [`Box::into_raw`] and must not be
    /// owned or freed by anything else afterwards.
    pub unsafe fn adopt_raw(raw: &mut *mut T) -> Self {
        let ptr = mem::replace(raw, ptr::null_mut());
        if ptr.is_null() {
            Self::new()
        } else {
            Self::from_box(Box::from_raw(ptr))
        }
    }

    /// Number of handles sharing the value, 0 when empty or moved out of.
    pub fn ref_count(&self) -> usize {
        match (self.value, self.count) {
            // SAFETY: a live handle's count pointer stays valid until it releases it.
            (Some(_), Some(count)) => unsafe { count.as_ref() }.get(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Returns true when both handles share one value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.value, other.value) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Shared access to the value.
    pub fn get(&self) -> Result<Ref<'_, T>> {
        self.cell()?
            .try_borrow()
            .map_err(|_| HandleError::Borrowed)
    }

    /// Mutable access to the value. Writes are seen by the whole group.
    pub fn get_mut(&self) -> Result<RefMut<'_, T>> {
        self.cell()?
            .try_borrow_mut()
            .map_err(|_| HandleError::Borrowed)
    }

    /// Raw pointer to the value, for reaching its members directly.
    pub fn as_ptr(&self) -> Result<NonNull<T>> {
        NonNull::new(self.cell()?.as_ptr()).ok_or(HandleError::NullAccess)
    }

    fn cell(&self) -> Result<&RefCell<T>> {
        match self.value {
            // SAFETY: the group keeps the value alive while `self` is a member.
            Some(value) => Ok(unsafe { value.as_ref() }),
            None => Err(HandleError::NullAccess),
        }
    }

    /// Moves this handle's membership into a new handle.
    ///
    /// The count is unchanged. `self` is left with no value and no count.
    pub fn take(&mut self) -> Self {
        SharedHandle {
            value: self.value.take(),
            count: self.count.take(),
            _marker: PhantomData,
        }
    }

    /// Leaves the current group and joins the one `rhs` belongs to.
    ///
    /// Assigning from a member of the same group changes nothing. Returns
    /// `self` so assignments chain: `c.assign(b.assign(&a))`.
    pub fn assign(&mut self, rhs: &Self) -> &mut Self {
        if !self.ptr_eq(rhs) {
            *self = rhs.clone();
            trace!("copy-assigned handle, count now {}", self.ref_count());
        }
        self
    }

    /// Leaves the current group and steals `rhs`'s membership, clearing `rhs`.
    pub fn assign_from(&mut self, rhs: &mut Self) -> &mut Self {
        *self = rhs.take();
        trace!("move-assigned handle, count now {}", self.ref_count());
        self
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Splits this handle off its group onto a private deep copy.
    ///
    /// Returns false, changing nothing, when the handle is empty or already
    /// the sole owner. Otherwise the old group loses one member and this
    /// handle owns a fresh copy with a count of 1. If `T::clone` panics the
    /// handle and its group are left as they were.
    ///
    /// # Panics
    ///
    /// Panics if another handle currently holds a mutable borrow of the value.
    /// Use [`SharedHandle::try_detach`] to get an error instead.
    pub fn detach(&mut self) -> bool
    where
        T: Clone,
    {
        match self.try_detach() {
            Ok(split) => split,
            Err(err) => panic!("cannot detach: {}", err),
        }
    }

    pub fn try_detach(&mut self) -> Result<bool>
    where
        T: Clone,
    {
        self.try_detach_with(|value| Ok(value.clone()))
    }

    /// Like [`SharedHandle::detach`], with a caller-supplied, fallible deep copy.
    ///
    /// The old group is only touched after `copy` has produced the new value,
    /// so an error from `copy` leaves everything unchanged.
    pub fn try_detach_with<E, F>(&mut self, copy: F) -> Result<bool, E>
    where
        F: FnOnce(&T) -> Result<T, E>,
        E: From<HandleError>,
    {
        if self.ref_count() <= 1 {
            return Ok(false);
        }

        let copied = {
            let current = self.get()?;
            copy(&*current)?
        };

        self.release();
        self.value = Some(alloc_value(copied));
        self.count = Some(alloc_count(1));
        debug!("detached handle onto a private copy");
        Ok(true)
    }

    /// Returns the value if this handle is its only owner.
    pub fn try_unwrap(mut self) -> std::result::Result<T, Self> {
        match (self.value, self.count) {
            (Some(value), Some(count)) if self.ref_count() == 1 => {
                self.value = None;
                self.count = None;
                // SAFETY: a count of 1 means no other handle refers to either allocation.
                let cell = unsafe {
                    drop(Box::from_raw(count.as_ptr()));
                    Box::from_raw(value.as_ptr())
                };
                Ok(cell.into_inner())
            }
            _ => Err(self),
        }
    }

    // Leaves the group, freeing the value and count if this was the last
    // member. Always leaves `self` with neither.
    fn release(&mut self) {
        let Some(count) = self.count.take() else {
            return;
        };

        match self.value.take() {
            // SAFETY: an empty handle's zero count is never shared.
            None => unsafe { drop(Box::from_raw(count.as_ptr())) },
            Some(value) => {
                // SAFETY: the count outlives every member of the group.
                let members = unsafe { count.as_ref() };
                let remaining = members.get() - 1;
                members.set(remaining);

                if remaining == 0 {
                    debug!("last handle released, freeing shared value");
                    // SAFETY: no member is left to observe either allocation.
                    unsafe {
                        drop(Box::from_raw(count.as_ptr()));
                        drop(Box::from_raw(value.as_ptr()));
                    }
                } else {
                    trace!("released handle, {} remaining", remaining);
                }
            }
        }
    }
}

impl<T> Clone for SharedHandle<T> {
    /// Joins this handle's group. Copying an empty handle gives a new empty
    /// handle with its own zero count.
    fn clone(&self) -> Self {
        match (self.value, self.count) {
            (Some(value), Some(count)) => {
                // SAFETY: `self` keeps the count alive.
                let members = unsafe { count.as_ref() };
                members.set(members.get() + 1);
                trace!("joined group, count now {}", members.get());
                SharedHandle {
                    value: Some(value),
                    count: Some(count),
                    _marker: PhantomData,
                }
            }
            _ => SharedHandle::new(),
        }
    }
}

impl<T> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> Default for SharedHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<T> for SharedHandle<T> {
    fn from(value: T) -> Self {
        Self::from_value(value)
    }
}

impl<T> From<Box<T>> for SharedHandle<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell() {
            Ok(cell) => f
                .debug_struct("SharedHandle")
                .field("count", &self.ref_count())
                .field("value", cell)
                .finish(),
            Err(_) => f.write_str("SharedHandle(<empty>)"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================


// ============================================================================
// Property tests
// ============================================================================
