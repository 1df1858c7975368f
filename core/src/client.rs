//! Stateless request builder and response normalizer for the reports API.
//!
//! # Design
//! `ReportsClient` holds only its resolved configuration and carries no
//! mutable state between calls. Each action is split into a `build_*` method
//! that produces an `HttpRequest` and `parse_response`, which consumes an
//! `HttpResponse`. The `insert` / `update` / `delete` / `import` methods
//! glue the two together around a caller-supplied `Transport`, issuing
//! exactly one request and returning exactly one result.

use std::io::Read;
use std::path::Path;

use log::{debug, warn};
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ReportsError, TransportError};
use crate::http::{HttpBody, HttpRequest, HttpResponse, MultipartForm, Part, Transport};
use crate::types::{FileType, Filter, ImportOptions, ImportPayload, ImportType, RowData};

/// Outcome of one reports call: the parsed response body or an error.
pub type ServiceResult = Result<Value, ReportsError>;

pub const CRITERIA_FIELD: &str = "ZOHO_CRITERIA";

/// Logical actions and their fixed `ZOHO_ACTION` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Insert,
    Update,
    Delete,
    Import,
}

impl Action {
    pub fn code(&self) -> &'static str {
        match self {
            Action::Insert => "ADDROW",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
            Action::Import => "IMPORT",
        }
    }
}

/// Client for one account and database on the reports service.
///
/// Builds `HttpRequest` values and normalizes `HttpResponse` values without
/// touching the network; the `Transport` passed to the action methods does
/// the round-trip.
#[derive(Debug, Clone)]
pub struct ReportsClient {
    base_url: Url,
    account_user: String,
    auth_token: String,
    database_name: String,
}

impl ReportsClient {
    pub fn new(config: ClientConfig) -> Result<Self, ReportsError> {
        if config.account_user.trim().is_empty() {
            return Err(ReportsError::Configuration("account_user"));
        }
        if config.auth_token.trim().is_empty() {
            return Err(ReportsError::Configuration("auth_token"));
        }
        if config.database_name.trim().is_empty() {
            return Err(ReportsError::Configuration("database_name"));
        }

        let raw = config.resolved_base_url();
        let base_url = Url::parse(raw).map_err(|e| ReportsError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ReportsError::InvalidBaseUrl {
                url: raw.to_string(),
                reason: "not a hierarchical URL".to_string(),
            });
        }

        Ok(Self {
            base_url,
            account_user: config.account_user,
            auth_token: config.auth_token,
            database_name: config.database_name,
        })
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// `{base}/api/{user}/{db}/{table}?ZOHO_ACTION=..&authtoken=..`
    pub fn build_url(&self, table: &str, action: Action) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "api",
                self.account_user.as_str(),
                self.database_name.as_str(),
                table,
            ]);
        }
        url.query_pairs_mut()
            .append_pair("ZOHO_ACTION", action.code())
            .append_pair("ZOHO_OUTPUT_FORMAT", "JSON")
            .append_pair("ZOHO_ERROR_FORMAT", "JSON")
            .append_pair("ZOHO_API_VERSION", "1.0")
            .append_pair("authtoken", &self.auth_token);
        url.into()
    }

    pub fn build_insert(&self, table: &str, row: &RowData) -> Result<HttpRequest, ReportsError> {
        require_table(table)?;
        require_row(row)?;
        Ok(self.form_request(table, Action::Insert, row_pairs(row)))
    }

    /// Columns in `row` win over the criteria field if the names collide.
    pub fn build_update(
        &self,
        table: &str,
        filter: Option<&Filter>,
        row: &RowData,
    ) -> Result<HttpRequest, ReportsError> {
        require_table(table)?;
        require_row(row)?;
        let mut pairs = Vec::with_capacity(row.len() + 1);
        if let Some(criteria) = filter.and_then(build_criteria) {
            if row.get(CRITERIA_FIELD).is_none() {
                pairs.push((CRITERIA_FIELD.to_string(), criteria));
            }
        }
        pairs.extend(row_pairs(row));
        Ok(self.form_request(table, Action::Update, pairs))
    }

    pub fn build_delete(
        &self,
        table: &str,
        filter: Option<&Filter>,
    ) -> Result<HttpRequest, ReportsError> {
        require_table(table)?;
        let pairs = filter
            .and_then(build_criteria)
            .map(|criteria| vec![(CRITERIA_FIELD.to_string(), criteria)])
            .unwrap_or_default();
        Ok(self.form_request(table, Action::Delete, pairs))
    }

    pub fn build_import(
        &self,
        table: &str,
        payload: ImportPayload,
    ) -> Result<HttpRequest, ReportsError> {
        self.build_import_with(table, payload, &ImportOptions::default())
    }

    /// Reads a `Stream` payload to the end before returning.
    pub fn build_import_with(
        &self,
        table: &str,
        payload: ImportPayload,
        options: &ImportOptions,
    ) -> Result<HttpRequest, ReportsError> {
        require_table(table)?;
        if options.import_type == ImportType::UpdateAdd && options.matching_columns.is_empty() {
            return Err(ReportsError::validation(
                "UPDATEADD imports need at least one matching column",
            ));
        }

        let file = import_file(payload)?;
        let mut form = MultipartForm::new()
            .part(Part::file(
                "ZOHO_FILE",
                &file.filename,
                file.file_type.mime(),
                file.data,
            ))
            .part(Part::text("ZOHO_IMPORT_FILETYPE", file.file_type.as_str()))
            .part(Part::text("ZOHO_IMPORT_TYPE", options.import_type.as_str()))
            .part(Part::text("ZOHO_AUTO_IDENTIFY", bool_str(options.auto_identify)))
            .part(Part::text("ZOHO_CREATE_TABLE", bool_str(options.create_table)))
            .part(Part::text("ZOHO_ON_IMPORT_ERROR", options.on_error.as_str()));
        if options.import_type == ImportType::UpdateAdd {
            form = form.part(Part::text(
                "ZOHO_MATCHING_COLUMNS",
                &options.matching_columns.join(","),
            ));
        }

        debug!(
            "built {} request for table {table} ({} upload)",
            Action::Import.code(),
            file.file_type.as_str()
        );
        Ok(HttpRequest::post(
            self.build_url(table, Action::Import),
            HttpBody::Multipart(form),
        ))
    }

    pub fn parse_response(&self, response: HttpResponse) -> ServiceResult {
        normalize_response(Ok(response))
    }

    pub fn insert<T: Transport + ?Sized>(
        &self,
        transport: &T,
        table: &str,
        row: &RowData,
    ) -> ServiceResult {
        let request = self.build_insert(table, row)?;
        send(transport, &request)
    }

    pub fn update<T: Transport + ?Sized>(
        &self,
        transport: &T,
        table: &str,
        filter: Option<&Filter>,
        row: &RowData,
    ) -> ServiceResult {
        let request = self.build_update(table, filter, row)?;
        send(transport, &request)
    }

    pub fn delete<T: Transport + ?Sized>(
        &self,
        transport: &T,
        table: &str,
        filter: Option<&Filter>,
    ) -> ServiceResult {
        let request = self.build_delete(table, filter)?;
        send(transport, &request)
    }

    pub fn import<T: Transport + ?Sized>(
        &self,
        transport: &T,
        table: &str,
        payload: ImportPayload,
    ) -> ServiceResult {
        let request = self.build_import(table, payload)?;
        send(transport, &request)
    }

    pub fn import_with<T: Transport + ?Sized>(
        &self,
        transport: &T,
        table: &str,
        payload: ImportPayload,
        options: &ImportOptions,
    ) -> ServiceResult {
        let request = self.build_import_with(table, payload, options)?;
        send(transport, &request)
    }

    fn form_request(
        &self,
        table: &str,
        action: Action,
        pairs: Vec<(String, String)>,
    ) -> HttpRequest {
        debug!(
            "built {} request for table {table} ({} fields)",
            action.code(),
            pairs.len()
        );
        HttpRequest::post(self.build_url(table, action), HttpBody::Form(pairs))
    }
}

/// Render a filter as a criteria expression, or `None` for an empty filter.
///
/// One column gives `("c"='v')`; several give `(("a"='1') and ("b"='2'))`.
/// Values are inserted verbatim, so a `'` inside a value breaks the
/// expression.
pub fn build_criteria(filter: &Filter) -> Option<String> {
    let clauses: Vec<String> = filter
        .iter()
        .map(|(column, value)| format!("(\"{column}\"='{value}')"))
        .collect();
    match clauses.len() {
        0 => None,
        1 => clauses.into_iter().next(),
        _ => Some(format!("({})", clauses.join(" and "))),
    }
}

/// Turn a transport outcome into a `ServiceResult`.
///
/// A 200 whose body is not JSON succeeds with the raw body as a JSON string.
/// Any other status is an error: `Api` when the body is JSON (carrying its
/// `"response"` member), `NonJsonErrorBody` otherwise.
pub fn normalize_response(outcome: Result<HttpResponse, TransportError>) -> ServiceResult {
    let response = outcome.map_err(ReportsError::Transport)?;
    let parsed = serde_json::from_str::<Value>(&response.body);

    if response.status != 200 {
        warn!("reports API returned status {}", response.status);
        return Err(match parsed {
            Ok(body) => ReportsError::Api {
                status: response.status,
                response: body.get("response").cloned(),
            },
            Err(_) => ReportsError::NonJsonErrorBody {
                status: response.status,
                body: response.body,
            },
        });
    }

    Ok(parsed.unwrap_or(Value::String(response.body)))
}

fn send<T: Transport + ?Sized>(transport: &T, request: &HttpRequest) -> ServiceResult {
    normalize_response(transport.execute(request))
}

fn require_table(table: &str) -> Result<(), ReportsError> {
    if table.trim().is_empty() {
        return Err(ReportsError::validation("a table name is required"));
    }
    Ok(())
}

fn require_row(row: &RowData) -> Result<(), ReportsError> {
    if row.is_empty() {
        return Err(ReportsError::validation(
            "at least one column is required for INSERT or UPDATE",
        ));
    }
    Ok(())
}

fn row_pairs(row: &RowData) -> Vec<(String, String)> {
    row.iter()
        .map(|(column, value)| (column.to_string(), value.to_string()))
        .collect()
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

struct ImportFile {
    filename: String,
    file_type: FileType,
    data: Vec<u8>,
}

fn import_file(payload: ImportPayload) -> Result<ImportFile, ReportsError> {
    let file = match payload {
        ImportPayload::Stream {
            filename,
            mut reader,
        } => {
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            // Only the final path component goes on the wire.
            let filename = Path::new(&filename)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(filename);
            let file_type = if filename.ends_with(".csv") {
                FileType::Csv
            } else {
                FileType::Json
            };
            ImportFile {
                filename,
                file_type,
                data,
            }
        }
        ImportPayload::Rows(rows) => {
            if rows.is_empty() {
                return Err(ReportsError::validation("import rows are empty"));
            }
            ImportFile {
                filename: "data.json".to_string(),
                file_type: FileType::Json,
                data: serde_json::to_vec(&rows)?,
            }
        }
        ImportPayload::Text(text) => ImportFile {
            filename: "data.csv".to_string(),
            file_type: FileType::Csv,
            data: text.into_bytes(),
        },
    };
    if file.data.is_empty() {
        return Err(ReportsError::validation("import payload is empty"));
    }
    Ok(file)
}
