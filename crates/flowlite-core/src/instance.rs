//! The durable unit of per-instance state (spec §3 "Instance record").

use crate::ids::InstanceId;
use crate::status::StageStatus;

/// Everything the persister owns for one flow instance.
///
/// `version` is an opaque CAS token; persisters are free to interpret it
/// (a counter, an etag, a row `xmin`, ...). The engine only ever compares it
/// for equality and never inspects its internal structure.
#[derive(Debug, Clone)]
pub struct InstanceData<S, D> {
    pub flow_instance_id: InstanceId,
    pub state: D,
    pub stage: S,
    pub stage_status: StageStatus,
    pub version: u64,
}
