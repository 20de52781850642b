//! Trace service: the operations behind the trace routes.
//!
//! Every trace runs against a fresh flow/topology snapshot fetched from the
//! collaborators. The snapshot is only read while tracing, so concurrent
//! requests never interfere with one another.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use sdntrace_core::{
    FlowTables, PacketFields, TopologySnapshot, TraceError, TraceRequest, TraceResult, TraceWalker,
};

use crate::clients::{fetch_snapshot, FlowSource, TopologySource};
use crate::error::ApiError;
use crate::store::{format_elapsed, TraceRecord, TraceStore};

/// A successful trace that has not been stored yet.
struct FinishedTrace {
    result: TraceResult,
    start_time: String,
    total_time: String,
    request: TraceRequest,
}

pub struct TraceService {
    flows: Arc<dyn FlowSource>,
    topology: Arc<dyn TopologySource>,
    store: Arc<TraceStore>,
}

impl TraceService {
    pub fn new(
        flows: Arc<dyn FlowSource>,
        topology: Arc<dyn TopologySource>,
        store: Arc<TraceStore>,
    ) -> Self {
        TraceService {
            flows,
            topology,
            store,
        }
    }

    async fn snapshot(&self) -> Result<(FlowTables, TopologySnapshot), ApiError> {
        Ok(fetch_snapshot(self.flows.as_ref(), self.topology.as_ref()).await?)
    }

    /// Walks one request. No id is taken and nothing is stored here.
    fn compute(
        &self,
        walker: &TraceWalker<'_, TopologySnapshot>,
        request: TraceRequest,
        fields: PacketFields,
    ) -> Result<FinishedTrace, TraceError> {
        let start_time = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S%.6f")
            .to_string();
        let started = Instant::now();

        let result = walker.tracepath(fields)?;

        Ok(FinishedTrace {
            result,
            start_time,
            total_time: format_elapsed(started.elapsed()),
            request,
        })
    }

    fn keep(&self, finished: FinishedTrace) -> TraceRecord {
        let record = TraceRecord {
            request_id: self.store.next_id(),
            result: finished.result,
            start_time: finished.start_time,
            total_time: finished.total_time,
            request: finished.request,
        };
        tracing::info!(
            request_id = record.request_id,
            steps = record.result.len(),
            total_time = %record.total_time,
            "trace finished"
        );
        self.store.insert(record.clone());
        record
    }

    /// Traces a single request.
    ///
    /// The request is validated before any collaborator is contacted.
    pub async fn trace(&self, body: Value) -> Result<TraceRecord, ApiError> {
        let request = TraceRequest::from_value(body)?;
        let fields = request.to_fields()?;
        tracing::info!(dpid = %fields.dpid, in_port = fields.in_port, "trace requested");

        let (flows, topology) = self.snapshot().await?;
        let walker = TraceWalker::new(&topology, &flows);
        let finished = self.compute(&walker, request, fields)?;
        Ok(self.keep(finished))
    }

    /// Traces every request against one shared snapshot.
    ///
    /// A malformed entry yields an empty result without failing the batch.
    /// A pipeline regression in any entry fails the whole batch; every
    /// entry is still walked, but none of the batch is stored.
    pub async fn traces(&self, bodies: Vec<Value>) -> Result<Vec<TraceResult>, ApiError> {
        let (flows, topology) = self.snapshot().await?;
        let walker = TraceWalker::new(&topology, &flows);

        let mut finished = Vec::with_capacity(bodies.len());
        let mut regression = None;
        for (index, body) in bodies.into_iter().enumerate() {
            let parsed = TraceRequest::from_value(body)
                .and_then(|request| request.to_fields().map(|fields| (request, fields)));
            match parsed {
                Ok((request, fields)) => match self.compute(&walker, request, fields) {
                    Ok(trace) => finished.push(Some(trace)),
                    Err(err) => {
                        tracing::warn!(index, error = %err, "batch entry failed");
                        regression.get_or_insert(err);
                        finished.push(None);
                    }
                },
                Err(err) => {
                    tracing::warn!(index, error = %err, "skipping malformed batch entry");
                    finished.push(None);
                }
            }
        }

        if let Some(err) = regression {
            return Err(err.into());
        }
        Ok(finished
            .into_iter()
            .map(|trace| match trace {
                Some(trace) => self.keep(trace).result,
                None => Vec::new(),
            })
            .collect())
    }

    pub fn get_result(&self, id: u64) -> Result<TraceRecord, ApiError> {
        self.store
            .get(id)
            .ok_or_else(|| ApiError::NotFound(format!("trace {} not found", id)))
    }

    pub fn list(&self) -> Vec<TraceRecord> {
        self.store.list()
    }
}
