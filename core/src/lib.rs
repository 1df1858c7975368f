//! Client core for the Zoho Reports row and import API.
//!
//! # Overview
//! Builds `HttpRequest` values and normalizes `HttpResponse` values without
//! touching the network (host-does-IO pattern). A `Transport` executes the
//! round-trip; `UreqTransport` is the blocking one bundled behind the `ureq`
//! feature.
//!
//! # Design
//! - `ReportsClient` is stateless: it holds only its validated configuration.
//! - Each action is split into `build_*` (produces request) and
//!   `parse_response` (consumes response), so the I/O boundary is explicit.
//! - `insert` / `update` / `delete` / `import` send exactly one request and
//!   return exactly one `ServiceResult`.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
#[cfg(feature = "ureq")]
pub mod transport;
pub mod types;

pub use client::{build_criteria, normalize_response, Action, ReportsClient, ServiceResult};
pub use config::ClientConfig;
pub use error::{ReportsError, ServiceError, TransportError};
pub use http::{HttpBody, HttpMethod, HttpRequest, HttpResponse, MultipartForm, Part, Transport};
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use types::{
    CellValue, FileType, Filter, ImportOptions, ImportPayload, ImportType, OnImportError, RowData,
};
