//! Fixed-capacity envelope for variable-length payloads.
//!
//! The exchange layer only moves fixed-size trivially-copyable values. A
//! message whose serialized size varies rides inside a [`PackedFrame`]: a
//! fixed byte buffer plus a self-describing length, itself a plain Pod
//! value any buffer variant can carry. Serialization is bincode, the same
//! codec the rest of the stack uses on the wire.

use crate::error::{AxonError, AxonResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Capacity of the embedded byte buffer. Oversized payloads are rejected
/// at pack time, never silently truncated.
pub const ENVELOPE_CAPACITY: usize = 2048;

/// A serialized message in a fixed-size, exchange-safe container.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct PackedFrame {
    len: u32,
    data: [u8; ENVELOPE_CAPACITY],
}

// Enable zero-copy exchange with bytemuck
unsafe impl bytemuck::Pod for PackedFrame {}
unsafe impl bytemuck::Zeroable for PackedFrame {}

impl PackedFrame {
    pub fn empty() -> Self {
        Self {
            len: 0,
            data: [0; ENVELOPE_CAPACITY],
        }
    }

    /// Serialize `msg` into the envelope, replacing any previous content.
    /// Fails with [`AxonError::Encoding`] when the encoded form does not
    /// fit.
    pub fn pack<M: Serialize>(&mut self, msg: &M) -> AxonResult<()> {
        let size = bincode::serialized_size(msg)
            .map_err(|e| AxonError::encoding(format!("Failed to size payload: {}", e)))?;
        if size > ENVELOPE_CAPACITY as u64 {
            return Err(AxonError::encoding(format!(
                "Payload of {} bytes exceeds envelope capacity {}",
                size, ENVELOPE_CAPACITY
            )));
        }
        let size = size as usize;
        bincode::serialize_into(&mut self.data[..size], msg)
            .map_err(|e| AxonError::encoding(format!("Failed to serialize payload: {}", e)))?;
        self.len = size as u32;
        Ok(())
    }

    /// Deserialize the envelope content. Fails with
    /// [`AxonError::Encoding`] on a corrupt length or undecodable bytes,
    /// which is what an empty (never packed) envelope yields.
    pub fn unpack<M: DeserializeOwned>(&self) -> AxonResult<M> {
        let len = self.len as usize;
        if len > ENVELOPE_CAPACITY {
            return Err(AxonError::encoding(format!(
                "Corrupt envelope length {}",
                len
            )));
        }
        bincode::deserialize(&self.data[..len])
            .map_err(|e| AxonError::encoding(format!("Failed to deserialize payload: {}", e)))
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The serialized bytes currently held.
    pub fn as_bytes(&self) -> &[u8] {
        let len = (self.len as usize).min(ENVELOPE_CAPACITY);
        &self.data[..len]
    }
}

impl Default for PackedFrame {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for PackedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedFrame")
            .field("len", &self.len)
            .field("capacity", &ENVELOPE_CAPACITY)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Telemetry {
        name: String,
        samples: Vec<f32>,
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let msg = Telemetry {
            name: "left_knee".into(),
            samples: vec![0.5, -1.25, 3.0],
        };

        let mut envelope = PackedFrame::empty();
        envelope.pack(&msg).unwrap();
        assert!(!envelope.is_empty());

        let restored: Telemetry = envelope.unpack().unwrap();
        assert_eq!(restored, msg);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let msg = Telemetry {
            name: "x".repeat(4096),
            samples: Vec::new(),
        };

        let mut envelope = PackedFrame::empty();
        let err = envelope.pack(&msg).unwrap_err();
        assert!(matches!(err, AxonError::Encoding(_)));
        // The envelope is untouched by a failed pack.
        assert!(envelope.is_empty());
    }

    #[test]
    fn test_corrupt_length_rejected() {
        let mut envelope = PackedFrame::empty();
        envelope.len = (ENVELOPE_CAPACITY + 1) as u32;

        let err = envelope.unpack::<Telemetry>().unwrap_err();
        assert!(matches!(err, AxonError::Encoding(_)));
    }

    #[test]
    fn test_repack_replaces_content() {
        let mut envelope = PackedFrame::empty();
        envelope
            .pack(&Telemetry {
                name: "first".into(),
                samples: vec![1.0; 100],
            })
            .unwrap();
        let first_len = envelope.len();

        envelope
            .pack(&Telemetry {
                name: "second".into(),
                samples: Vec::new(),
            })
            .unwrap();
        assert!(envelope.len() < first_len);

        let restored: Telemetry = envelope.unpack().unwrap();
        assert_eq!(restored.name, "second");
    }
}
