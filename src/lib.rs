//! Reference-counted handles with explicit copy-on-write.
//!
//! A [`SharedHandle`] owns a heap value together with every handle copied
//! from it. Copies see each other's writes; a handle that needs its own
//! version calls [`SharedHandle::detach`], which deep-copies the value only
//! when it is actually shared.
//!
//! ```
//! use shared_handle::{HandleError, SharedHandle};
//!
//! let mut first = SharedHandle::from_value(3.5);
//! let second = first.clone();
//! assert_eq!(first.ref_count(), 2);
//!
//! assert!(first.detach());
//! *first.get_mut()? = 1.0;
//! assert_eq!(*second.get()?, 3.5);
//! assert_eq!(second.ref_count(), 1);
//!
//! let mut moved = second;
//! let _owner = moved.take();
//! assert_eq!(moved.get().err(), Some(HandleError::NullAccess));
//! # Ok::<(), HandleError>(())
//! ```

pub mod error;
pub mod handle;
#[cfg(feature = "serde")]
mod serialize;

pub use error::{HandleError, Result};
pub use handle::SharedHandle;
