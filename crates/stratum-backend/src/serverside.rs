//! The server-side codec handler (§4.9): applies a transformation object's
//! codec to bytes crossing the client/server boundary, mode by mode.
//!
//! `Client` mode is a dumb byte-range passthrough — the client owns the
//! entire codec round trip and the stored bytes are already ciphertext.
//! `Server` mode inflates stored ciphertext to plaintext before replying,
//! and does the read-modify-write reconstruction itself on write when the
//! codec isn't partial-accessible (the client never assembles a whole
//! object for this mode — it forwards raw sub-operations). `Transport`
//! mode's storage is always plaintext (the client already decoded/encoded
//! across the wire), so reads only need a fresh encode of whatever slice
//! was requested, and writes only need a decode-and-store with no
//! reconstruction — the client, not the server, did any whole-object
//! assembly this mode requires.

use stratum_core::transform::{self, TransformationCaller};
use stratum_core::{StratumError, Transformation, TransformationMode};

use crate::metadata::MetadataRecord;
use crate::object::{ObjectBackend, ObjectHandle};

/// Apply `transformation`'s read-side handling for each `(length, offset)`
/// sub-read, returning `(data, bytes_read)` per sub-read in the same order.
pub fn server_read(
    backend: &dyn ObjectBackend,
    handle: &ObjectHandle,
    transformation: &Transformation,
    record: &MetadataRecord,
    reads: &[(u64, u64)],
) -> Result<Vec<(Vec<u8>, u64)>, StratumError> {
    match transformation.mode() {
        TransformationMode::Client => reads
            .iter()
            .map(|&(length, offset)| {
                let mut buf = vec![0u8; length as usize];
                let n = backend.read(handle, &mut buf, offset)?;
                buf.truncate(n);
                Ok((buf, n as u64))
            })
            .collect(),

        TransformationMode::Server => {
            if transform::need_whole_object(transformation, TransformationCaller::ServerRead) {
                let stored_len = record.transformed_size;
                let mut raw = vec![0u8; stored_len as usize];
                if stored_len > 0 {
                    backend.read(handle, &mut raw, 0)?;
                }
                let plain =
                    transform::apply(transformation, TransformationCaller::ServerRead, &raw, 0)?
                        .data;
                if (plain.len() as u64) < record.original_size {
                    return Err(StratumError::Codec(format!(
                        "decode produced {} bytes, expected at least {} (original_size)",
                        plain.len(),
                        record.original_size
                    )));
                }
                Ok(reads
                    .iter()
                    .map(|&(length, offset)| {
                        let avail = (plain.len() as u64).saturating_sub(offset);
                        let eff = length.min(avail) as usize;
                        let start = offset as usize;
                        (plain[start..start + eff].to_vec(), eff as u64)
                    })
                    .collect())
            } else {
                reads
                    .iter()
                    .map(|&(length, offset)| {
                        let mut buf = vec![0u8; length as usize];
                        let n = backend.read(handle, &mut buf, offset)?;
                        buf.truncate(n);
                        let decoded = transform::apply(
                            transformation,
                            TransformationCaller::ServerRead,
                            &buf,
                            offset,
                        )?;
                        Ok((decoded.data, n as u64))
                    })
                    .collect()
            }
        }

        TransformationMode::Transport => reads
            .iter()
            .map(|&(length, offset)| {
                let mut buf = vec![0u8; length as usize];
                let n = backend.read(handle, &mut buf, offset)?;
                buf.truncate(n);
                let encoded =
                    transform::apply(transformation, TransformationCaller::ServerRead, &buf, offset)?;
                Ok((encoded.data, n as u64))
            })
            .collect(),
    }
}

/// Apply `transformation`'s write-side handling for `(offset, data)` pairs
/// already produced by the client's own `ClientWrite` pass, updating
/// `record`'s sizes in place.
pub fn server_write(
    backend: &dyn ObjectBackend,
    handle: &ObjectHandle,
    transformation: &Transformation,
    record: &mut MetadataRecord,
    writes: &[(u64, Vec<u8>)],
) -> Result<(), StratumError> {
    match transformation.mode() {
        TransformationMode::Client => {
            let mut max_end = record.original_size.max(record.transformed_size);
            for (offset, data) in writes {
                backend.write(handle, data, *offset)?;
                max_end = max_end.max(offset + data.len() as u64);
            }
            record.original_size = max_end;
            record.transformed_size = max_end;
            Ok(())
        }

        TransformationMode::Server => {
            if transform::need_whole_object(transformation, TransformationCaller::ServerWrite) {
                let original_size = record.original_size;
                let mut plain = if original_size > 0 {
                    let stored_len = record.transformed_size;
                    let mut raw = vec![0u8; stored_len as usize];
                    if stored_len > 0 {
                        backend.read(handle, &mut raw, 0)?;
                    }
                    transform::apply(transformation, TransformationCaller::ServerRead, &raw, 0)?
                        .data
                } else {
                    Vec::new()
                };

                let new_size = writes
                    .iter()
                    .map(|(offset, data)| offset + data.len() as u64)
                    .chain(std::iter::once(original_size))
                    .max()
                    .unwrap_or(0);
                plain.resize(new_size as usize, 0);
                for (offset, data) in writes {
                    let start = *offset as usize;
                    plain[start..start + data.len()].copy_from_slice(data);
                }

                let encoded =
                    transform::apply(transformation, TransformationCaller::ServerWrite, &plain, 0)?;
                backend.write(handle, &encoded.data, 0)?;
                record.original_size = new_size;
                record.transformed_size = encoded.data.len() as u64;
            } else {
                let mut max_end = record.original_size;
                for (offset, data) in writes {
                    let encoded = transform::apply(
                        transformation,
                        TransformationCaller::ServerWrite,
                        data,
                        *offset,
                    )?;
                    backend.write(handle, &encoded.data, encoded.offset)?;
                    max_end = max_end.max(offset + data.len() as u64);
                }
                record.original_size = max_end;
                record.transformed_size = max_end;
            }
            Ok(())
        }

        TransformationMode::Transport => {
            let mut max_end = record.original_size;
            for (offset, data) in writes {
                let decoded = transform::apply(
                    transformation,
                    TransformationCaller::ServerWrite,
                    data,
                    *offset,
                )?;
                backend.write(handle, &decoded.data, decoded.offset)?;
                max_end = max_end.max(decoded.offset + decoded.data.len() as u64);
            }
            record.original_size = max_end;
            record.transformed_size = max_end;
            Ok(())
        }
    }
}
