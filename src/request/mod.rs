//! Per-item request preparation: raw configuration, parameter resolution and
//! canonical body construction.

mod body;
mod item;
mod resolve;

pub use body::RequestBody;
pub use item::{
    DeploymentSelection, DeterminismConfig, ItemConfig, OutputFlags, SamplingOverrides,
    StopInput, WorkItem,
};
pub use resolve::{
    parse_stop_sequences, resolve, resolve_all, DeterminismSettings, ResolvedRequestParams,
    SamplingOptions,
};
