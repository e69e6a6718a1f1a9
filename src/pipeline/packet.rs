//! Type-erased data packet exchanged between nodes.
//!
//! A `Packet` carries one payload of any `Send + Sync + 'static` type behind an
//! `Arc`, so cloning is cheap and every clone refers to the same payload.
//! Typed access is checked against the stored type tag and returns
//! [`PacketError::TypeMismatch`] instead of misinterpreting the payload.

use crate::pipeline::error::PacketError;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Stored payload with the type tag used for checked retrieval.
#[derive(Clone)]
struct Payload {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// Unit of data flowing through streams.
///
/// `Packet::default()` is the invalid (empty) packet; output ports refuse to
/// send it.
#[derive(Clone, Default)]
pub struct Packet {
    payload: Option<Payload>,
}

impl Packet {
    /// Wrap a value into a valid packet tagged with its type.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an already shared value without copying it.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            payload: Some(Payload {
                value,
                type_name: std::any::type_name::<T>(),
            }),
        }
    }

    /// The invalid packet.
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.payload.is_some()
    }

    /// Whether the payload is exactly of type `T`. Always false for an empty packet.
    pub fn is_type<T: Any>(&self) -> bool {
        self.payload
            .as_ref()
            .is_some_and(|p| (*p.value).type_id() == TypeId::of::<T>())
    }

    /// Name of the stored type, if any.
    pub fn type_name(&self) -> Option<&'static str> {
        self.payload.as_ref().map(|p| p.type_name)
    }

    /// Borrow the payload as `T`.
    pub fn get<T: Any>(&self) -> Result<&T, PacketError> {
        let payload = self.payload.as_ref().ok_or(PacketError::Empty)?;
        payload
            .value
            .downcast_ref::<T>()
            .ok_or(PacketError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: payload.type_name,
            })
    }

    /// Clone the payload out as `T`.
    pub fn get_cloned<T: Any + Clone>(&self) -> Result<T, PacketError> {
        self.get::<T>().cloned()
    }

    /// Shared handle to the payload as `T`.
    pub fn get_arc<T: Any + Send + Sync>(&self) -> Result<Arc<T>, PacketError> {
        let payload = self.payload.as_ref().ok_or(PacketError::Empty)?;
        Arc::clone(&payload.value)
            .downcast::<T>()
            .map_err(|_| PacketError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: payload.type_name,
            })
    }

    /// Whether both packets refer to the same payload instance.
    pub fn ptr_eq(&self, other: &Packet) -> bool {
        match (&self.payload, &other.payload) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a.value, &b.value),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Some(p) => f.debug_tuple("Packet").field(&p.type_name).finish(),
            None => write!(f, "Packet(<empty>)"),
        }
    }
}
