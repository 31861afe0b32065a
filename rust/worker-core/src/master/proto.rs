//! Wire messages for the `iterativereduce.MasterService` gRPC service.
//!
//! The message layout mirrors the service definition below; field tags are
//! part of the wire contract and must not be renumbered.
//!
//! ```text
//! service MasterService {
//!   rpc Startup(StartupRequest)             returns (StartupResponse);
//!   rpc Progress(ProgressReport)            returns (Empty);
//!   rpc Update(UpdateRequest)               returns (UpdateResponse);
//!   rpc Waiting(WaitingRequest)             returns (WaitingResponse);
//!   rpc Fetch(FetchRequest)                 returns (FetchResponse);
//!   rpc Complete(ProgressReport)            returns (CompleteResponse);
//!   rpc MetricsReport(MetricsReportRequest) returns (Empty);
//! }
//! ```

/// Fully-qualified gRPC service name.
pub const SERVICE_NAME: &str = "iterativereduce.MasterService";

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Empty {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartupRequest {
    #[prost(string, tag = "1")]
    pub worker_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileSplit {
    #[prost(string, tag = "1")]
    pub path: ::prost::alloc::string::String,
    #[prost(int64, tag = "2")]
    pub offset: i64,
    #[prost(int64, tag = "3")]
    pub length: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartupConfiguration {
    #[prost(message, optional, tag = "1")]
    pub split: ::core::option::Option<FileSplit>,
    #[prost(int32, tag = "2")]
    pub batch_size: i32,
    #[prost(int32, tag = "3")]
    pub iterations: i32,
    #[prost(map = "string, string", tag = "4")]
    pub properties: ::std::collections::HashMap<
        ::prost::alloc::string::String,
        ::prost::alloc::string::String,
    >,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceError {
    #[prost(string, tag = "1")]
    pub description: ::prost::alloc::string::String,
}

/// Exactly one of `config` / `error` is set by a well-behaved master.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartupResponse {
    #[prost(message, optional, tag = "1")]
    pub config: ::core::option::Option<StartupConfiguration>,
    #[prost(message, optional, tag = "2")]
    pub error: ::core::option::Option<ServiceError>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProgressReport {
    #[prost(string, tag = "1")]
    pub worker_id: ::prost::alloc::string::String,
    #[prost(map = "string, string", tag = "2")]
    pub report: ::std::collections::HashMap<
        ::prost::alloc::string::String,
        ::prost::alloc::string::String,
    >,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateRequest {
    #[prost(string, tag = "1")]
    pub worker_id: ::prost::alloc::string::String,
    #[prost(bytes = "bytes", tag = "2")]
    pub data: ::prost::bytes::Bytes,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct UpdateResponse {
    #[prost(bool, tag = "1")]
    pub accepted: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WaitingRequest {
    #[prost(string, tag = "1")]
    pub worker_id: ::prost::alloc::string::String,
    #[prost(int32, tag = "2")]
    pub last_update: i32,
    #[prost(int64, tag = "3")]
    pub waiting_ms: i64,
}

/// Negative `update_id` means no new update is ready yet.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct WaitingResponse {
    #[prost(int32, tag = "1")]
    pub update_id: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FetchRequest {
    #[prost(string, tag = "1")]
    pub worker_id: ::prost::alloc::string::String,
    #[prost(int32, tag = "2")]
    pub update_id: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FetchResponse {
    #[prost(bytes = "bytes", tag = "1")]
    pub data: ::prost::bytes::Bytes,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct CompleteResponse {
    #[prost(bool, tag = "1")]
    pub acknowledged: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MetricsReportRequest {
    #[prost(string, tag = "1")]
    pub worker_id: ::prost::alloc::string::String,
    #[prost(map = "string, int64", tag = "2")]
    pub metrics: ::std::collections::HashMap<::prost::alloc::string::String, i64>,
}
