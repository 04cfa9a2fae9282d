//! `serde` support, enabled with the `serde` feature.
//!
//! A handle is written as an optional value: `None` when empty. Reading one
//! back always produces a fresh group, so sharing between handles is not
//! preserved across a round trip.

use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::HandleError;
use crate::handle::SharedHandle;

impl<T: Serialize> Serialize for SharedHandle<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.get() {
            Ok(value) => serializer.serialize_some(&*value),
            Err(HandleError::NullAccess) => serializer.serialize_none(),
            Err(err) => Err(S::Error::custom(err)),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for SharedHandle<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => SharedHandle::from_value(value),
            None => SharedHandle::new(),
        })
    }
}
