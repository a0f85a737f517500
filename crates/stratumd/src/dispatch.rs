//! Routes an incoming wire [`Message`] to the configured object/KV back
//! ends, including the mode-aware transformation path in
//! `stratum_backend::serverside`.

use bytes::Bytes;
use stratum_backend::{KvBackend, MetadataRecord, ObjectBackend};
use stratum_core::wire::{ops, Message, MessageType, WireTransformation, FLAG_REPLY};
use stratum_core::{StratumError, Transformation, TransformationKind, TransformationMode};

use stratum_api::DaemonStats;

pub struct Dispatcher {
    pub object_backend: Box<dyn ObjectBackend>,
    pub kv_backend: Box<dyn KvBackend>,
    pub stats: DaemonStats,
}

impl Dispatcher {
    pub fn new(object_backend: Box<dyn ObjectBackend>, kv_backend: Box<dyn KvBackend>) -> Self {
        Self {
            object_backend,
            kv_backend,
            stats: DaemonStats::new(),
        }
    }

    /// Handle one request, returning the reply to send back.
    pub fn handle(&self, request: Message) -> Message {
        self.stats.record_request();
        let reply_kind = request.kind;
        match self.dispatch(request) {
            Ok((header_payload, ops)) => Message::new(reply_kind, FLAG_REPLY, header_payload, ops),
            Err(e) => {
                tracing::warn!(error = %e, "request failed");
                Message::new(
                    reply_kind,
                    FLAG_REPLY,
                    Bytes::from(e.to_string().into_bytes()),
                    Vec::new(),
                )
            }
        }
    }

    fn dispatch(&self, request: Message) -> Result<(Bytes, Vec<Bytes>), StratumError> {
        match request.kind {
            MessageType::ObjectCreate | MessageType::TransformationObjectCreate => {
                let (ns, name) = ops::decode_object_ref(request.header_payload)?;
                self.object_backend.create(&ns, &name)?;
                Ok((Bytes::new(), vec![Bytes::new()]))
            }
            MessageType::ObjectDelete | MessageType::TransformationObjectDelete => {
                let (ns, name) = ops::decode_object_ref(request.header_payload)?;
                self.object_backend.delete(&ns, &name)?;
                Ok((Bytes::new(), vec![Bytes::new()]))
            }
            MessageType::TransformationObjectStatus => {
                let (ns, name) = ops::decode_object_ref(request.header_payload)?;
                let handle = self.object_backend.open(&ns, &name)?;
                let status = self.object_backend.status(&handle)?;
                self.object_backend.close(handle);
                Ok((Bytes::new(), vec![ops::encode_read(status.size, 0)]))
            }
            MessageType::TransformationObjectRead => self.transformation_read(request),
            MessageType::TransformationObjectWrite => self.transformation_write(request),
            MessageType::KvPut => {
                let ns = ops::decode_name(request.header_payload)?;
                let mut reply_ops = Vec::with_capacity(request.ops.len());
                for op in request.ops {
                    let (key, value) = ops::decode_kv_put(op)?;
                    self.kv_backend.put(&ns, &key, value.to_vec())?;
                    reply_ops.push(Bytes::new());
                }
                Ok((Bytes::new(), reply_ops))
            }
            MessageType::KvDelete => {
                let ns = ops::decode_name(request.header_payload)?;
                let mut reply_ops = Vec::with_capacity(request.ops.len());
                for op in request.ops {
                    let key = ops::decode_kv_get(op)?;
                    self.kv_backend.delete(&ns, &key)?;
                    reply_ops.push(Bytes::new());
                }
                Ok((Bytes::new(), reply_ops))
            }
            MessageType::KvGet => {
                let ns = ops::decode_name(request.header_payload)?;
                let mut reply_ops = Vec::with_capacity(request.ops.len());
                for op in request.ops {
                    let key = ops::decode_kv_get(op)?;
                    let value = self.kv_backend.get(&ns, &key)?;
                    reply_ops.push(ops::encode_kv_get_reply(value.as_deref()));
                }
                Ok((Bytes::new(), reply_ops))
            }
            MessageType::KvGetByPrefix | MessageType::KvGetAll => {
                let ns = ops::decode_name(request.header_payload)?;
                let prefix = request
                    .ops
                    .into_iter()
                    .next()
                    .map(ops::decode_name)
                    .transpose()?
                    .unwrap_or_default();
                let entries = self.kv_backend.iterate(&ns, &prefix)?;
                let reply_ops = entries
                    .into_iter()
                    .map(|(key, value)| ops::encode_kv_put(&key, &value))
                    .collect();
                Ok((Bytes::new(), reply_ops))
            }
            MessageType::Ping => Ok((Bytes::new(), vec![Bytes::new()])),
            other => Err(StratumError::Config(format!(
                "unsupported request type on the wire: {other:?}"
            ))),
        }
    }

    fn transformation_read(&self, request: Message) -> Result<(Bytes, Vec<Bytes>), StratumError> {
        let (ns, name) = ops::decode_object_ref(request.header_payload)?;
        let handle = self.object_backend.open(&ns, &name)?;

        let mut reads = Vec::with_capacity(request.ops.len());
        let mut record = None;
        let mut transformation = None;
        for op in request.ops {
            let (length, offset, wt, original_size, transformed_size) =
                ops::decode_transformation_read(op)?;
            reads.push((length, offset));
            record.get_or_insert_with(|| metadata_from_wire(wt, original_size, transformed_size));
            transformation.get_or_insert_with(|| transformation_from_wire(wt));
        }
        let record = record.expect("at least one read op");
        let transformation = transformation.expect("at least one read op");

        let results = stratum_backend::server_read(
            self.object_backend.as_ref(),
            &handle,
            &transformation,
            &record,
            &reads,
        )?;
        self.object_backend.close(handle);
        self.stats
            .record_bytes_read(results.iter().map(|(_, n)| *n).sum());

        let wt = WireTransformation::new(transformation.kind() as u8, transformation.mode() as u8);
        let reply_ops = results
            .into_iter()
            .map(|(data, _)| {
                ops::encode_transformation_write(
                    0,
                    wt,
                    record.original_size,
                    record.transformed_size,
                    &data,
                )
            })
            .collect();
        Ok((Bytes::new(), reply_ops))
    }

    fn transformation_write(&self, request: Message) -> Result<(Bytes, Vec<Bytes>), StratumError> {
        let (ns, name) = ops::decode_object_ref(request.header_payload)?;
        let handle = self.object_backend.open(&ns, &name)?;

        let mut writes = Vec::with_capacity(request.ops.len());
        let mut record = None;
        let mut transformation = None;
        let mut bytes_written = 0u64;
        for op in request.ops {
            let (offset, wt, original_size, transformed_size, data) =
                ops::decode_transformation_write(op)?;
            bytes_written += data.len() as u64;
            writes.push((offset, data.to_vec()));
            record.get_or_insert_with(|| metadata_from_wire(wt, original_size, transformed_size));
            transformation.get_or_insert_with(|| transformation_from_wire(wt));
        }
        let mut record = record.expect("at least one write op");
        let transformation = transformation.expect("at least one write op");

        stratum_backend::server_write(
            self.object_backend.as_ref(),
            &handle,
            &transformation,
            &mut record,
            &writes,
        )?;
        self.object_backend.close(handle);
        self.stats.record_bytes_written(bytes_written);

        let wt = WireTransformation::new(transformation.kind() as u8, transformation.mode() as u8);
        let reply_op = ops::encode_transformation_write(
            0,
            wt,
            record.original_size,
            record.transformed_size,
            &[],
        );
        Ok((Bytes::new(), vec![reply_op]))
    }
}

fn metadata_from_wire(wt: WireTransformation, original_size: u64, transformed_size: u64) -> MetadataRecord {
    MetadataRecord {
        transformation_kind: wt.kind,
        transformation_mode: wt.mode,
        original_size,
        transformed_size,
        chunk_count: None,
        chunk_size: None,
    }
}

fn transformation_from_wire(wt: WireTransformation) -> Transformation {
    Transformation::new(
        TransformationKind::from_u8(wt.kind).unwrap_or(TransformationKind::None),
        TransformationMode::from_u8(wt.mode).unwrap_or(TransformationMode::Server),
    )
}
