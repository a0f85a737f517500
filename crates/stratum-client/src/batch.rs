//! Deferred-execution batch queue (§4.5).
//!
//! Operations are queued with [`Batch::add`] and only take effect on
//! [`Batch::execute`]. Execution walks the queue once, partitioning it into
//! maximal runs of consecutive operations that share the same
//! `(operation_kind, object_key)` — a contiguous same-object same-kind run
//! of `Read`/`Write` operations is the coalescing unit: it becomes a single
//! [`FlatObject::read`]/[`write`](FlatObject::write) call carrying every
//! sub-op in the run, rather than one wire round trip per operation.
//!
//! Known issue this closes: a lone `Create` defaults to
//! [`SafetyConfig::Network`] already (see [`FlatObject::create`]), but a
//! `Create` immediately followed by other operations on the same object
//! later in the same batch must not downgrade below `Network` even if the
//! batch's own safety is `None` — otherwise a crash between the create and
//! the write it set up for could leave the object's metadata record
//! unobservable to the next batch. `execute` escalates such creates before
//! running them.

use std::sync::Arc;

use stratum_core::{config::SafetyConfig, StratumError};

use crate::flat::FlatObject;
use crate::operation::{Operation, OperationKind, OperationPayload, OperationResult};

pub struct Batch {
    safety: SafetyConfig,
    ops: Vec<Operation>,
}

impl Batch {
    pub fn new(safety: SafetyConfig) -> Self {
        Self {
            safety,
            ops: Vec::new(),
        }
    }

    pub fn add(&mut self, object: Arc<FlatObject>, payload: OperationPayload) {
        self.ops.push(Operation::new(object, payload));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Run every queued operation, in the coalesced runs described above,
    /// and record each one's outcome on itself. Returns the completed
    /// operations in their original insertion order.
    pub async fn execute(mut self) -> Result<Vec<Operation>, StratumError> {
        let escalate: Vec<bool> = (0..self.ops.len())
            .map(|i| self.creates_needing_escalation(i))
            .collect();

        let mut i = 0;
        while i < self.ops.len() {
            let run_end = self.run_end(i);
            self.execute_run(i, run_end, escalate[i]).await?;
            i = run_end;
        }

        Ok(self.ops)
    }

    /// True only for a `Create` at index `i` whose object has a later
    /// operation anywhere in the batch.
    fn creates_needing_escalation(&self, i: usize) -> bool {
        if self.ops[i].kind() != OperationKind::Create {
            return false;
        }
        let key = owned_key(&self.ops[i]);
        self.ops[i + 1..]
            .iter()
            .any(|op| owned_key(op) == key)
    }

    /// End (exclusive) of the maximal run starting at `i` that shares `i`'s
    /// `(operation_kind, object_key)`.
    fn run_end(&self, i: usize) -> usize {
        let kind = self.ops[i].kind();
        let key = owned_key(&self.ops[i]);
        let mut j = i + 1;
        while j < self.ops.len() && self.ops[j].kind() == kind && owned_key(&self.ops[j]) == key {
            j += 1;
        }
        j
    }

    async fn execute_run(
        &mut self,
        start: usize,
        end: usize,
        escalate_create: bool,
    ) -> Result<(), StratumError> {
        match self.ops[start].kind() {
            OperationKind::Create => {
                for idx in start..end {
                    let object = self.ops[idx].object.clone();
                    let (kind, mode) = match &self.ops[idx].payload {
                        OperationPayload::Create { kind, mode } => (*kind, *mode),
                        _ => unreachable!("run partitioned by kind"),
                    };
                    let safety = if escalate_create {
                        self.safety.max(SafetyConfig::Network)
                    } else {
                        self.safety
                    };
                    let result = object
                        .create_with_safety(kind, mode, safety)
                        .await
                        .map(|_| OperationResult::Created);
                    self.ops[idx].result = Some(result);
                }
            }
            OperationKind::Delete => {
                for idx in start..end {
                    let object = self.ops[idx].object.clone();
                    let result = object.delete().await.map(|_| OperationResult::Deleted);
                    self.ops[idx].result = Some(result);
                }
            }
            OperationKind::Status => {
                for idx in start..end {
                    let object = self.ops[idx].object.clone();
                    let result = object
                        .status()
                        .await
                        .map(|(_, original_size, transformed_size, _)| OperationResult::Status {
                            original_size,
                            transformed_size,
                        });
                    self.ops[idx].result = Some(result);
                }
            }
            OperationKind::Read => {
                let object = self.ops[start].object.clone();
                let subs: Vec<(u64, u64)> = (start..end)
                    .map(|idx| match &self.ops[idx].payload {
                        OperationPayload::Read { length, offset } => (*length, *offset),
                        _ => unreachable!("run partitioned by kind"),
                    })
                    .collect();
                match object.read(&subs).await {
                    Ok(results) => {
                        for (idx, (data, bytes_read)) in (start..end).zip(results) {
                            self.ops[idx].result =
                                Some(Ok(OperationResult::Read { data, bytes_read }));
                        }
                    }
                    Err(e) => {
                        let message = e.to_string();
                        for idx in start..end {
                            self.ops[idx].result = Some(Err(StratumError::Backend(message.clone())));
                        }
                    }
                }
            }
            OperationKind::Write => {
                let object = self.ops[start].object.clone();
                let subs: Vec<(u64, Vec<u8>)> = (start..end)
                    .map(|idx| match &self.ops[idx].payload {
                        OperationPayload::Write { offset, data } => (*offset, data.clone()),
                        _ => unreachable!("run partitioned by kind"),
                    })
                    .collect();
                match object.write(&subs).await {
                    Ok((written, _, _)) => {
                        for (idx, bytes_written) in (start..end).zip(written) {
                            self.ops[idx].result = Some(Ok(OperationResult::Written { bytes_written }));
                        }
                    }
                    Err(e) => {
                        let message = e.to_string();
                        for idx in start..end {
                            self.ops[idx].result = Some(Err(StratumError::Backend(message.clone())));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn owned_key(op: &Operation) -> (String, String) {
    let (ns, name) = op.object_key();
    (ns.to_string(), name.to_string())
}
