//! In-memory stand-in for the Zoho Reports row and import API.
//!
//! Serves `POST /api/{user}/{db}/{table}` and dispatches on `ZOHO_ACTION`,
//! answering with the same JSON envelope the real service uses:
//! `{"response":{"uri","action","result"|"error"}}`.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const ERR_INVALID_AUTHTOKEN: u32 = 8535;
pub const ERR_INVALID_ACTION: u32 = 8504;
pub const ERR_TABLE_NOT_PRESENT: u32 = 7138;
pub const ERR_NO_COLUMNS: u32 = 8016;
pub const ERR_INVALID_CRITERIA: u32 = 8507;
pub const ERR_IMPORT_FAILED: u32 = 7232;

pub type Row = BTreeMap<String, String>;

/// Rows of one table plus the column order they were first seen in.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    fn note_columns<'a>(&mut self, columns: impl IntoIterator<Item = &'a String>) {
        for column in columns {
            if !self.columns.contains(column) {
                self.columns.push(column.clone());
            }
        }
    }

    fn push(&mut self, row: Row) {
        self.note_columns(row.keys());
        self.rows.push(row);
    }

    /// `row` laid out in table column order; absent cells are empty.
    fn cells<'a>(&'a self, row: &'a Row) -> Vec<&'a str> {
        self.columns
            .iter()
            .map(|c| row.get(c).map(String::as_str).unwrap_or_default())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    pub auth_token: String,
    pub tables: HashMap<String, Table>,
}

impl Store {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            tables: HashMap::new(),
        }
    }

    /// Register an empty table, as if created in the web UI.
    pub fn with_table(mut self, name: impl Into<String>) -> Self {
        self.tables.entry(name.into()).or_default();
        self
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables
            .get(table)
            .map(|t| t.rows.as_slice())
            .unwrap_or_default()
    }

    pub fn into_db(self) -> Db {
        Arc::new(RwLock::new(self))
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app(db: Db) -> Router {
    Router::new()
        .route("/api/{user}/{database}/{table}", post(dispatch))
        .with_state(db)
}

pub async fn run(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app(db)).await
}

/// Names the request in every reply envelope.
struct Reply {
    uri: String,
    action: String,
}

impl Reply {
    fn ok(&self, result: Value) -> Response {
        Json(json!({
            "response": {"uri": self.uri, "action": self.action, "result": result}
        }))
        .into_response()
    }

    fn error(&self, status: StatusCode, code: u32, message: impl Into<String>) -> Response {
        let message = message.into();
        log::debug!("{} {} -> {status} ({code}: {message})", self.action, self.uri);
        (
            status,
            Json(json!({
                "response": {
                    "uri": self.uri,
                    "action": self.action,
                    "error": {"code": code, "message": message}
                }
            })),
        )
            .into_response()
    }
}

async fn dispatch(
    State(db): State<Db>,
    Path((user, database, table)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
    request: Request,
) -> Response {
    let reply = Reply {
        uri: format!("/api/{user}/{database}/{table}"),
        action: params.get("ZOHO_ACTION").cloned().unwrap_or_default(),
    };

    let token_ok = params.get("authtoken") == Some(&db.read().await.auth_token);
    if !token_ok {
        return reply.error(
            StatusCode::UNAUTHORIZED,
            ERR_INVALID_AUTHTOKEN,
            "Invalid authtoken",
        );
    }

    match reply.action.as_str() {
        "ADDROW" | "UPDATE" | "DELETE" => {
            let Form(fields) = match Form::<Vec<(String, String)>>::from_request(request, &()).await {
                Ok(form) => form,
                Err(rejection) => return rejection.into_response(),
            };
            let mut store = db.write().await;
            match reply.action.as_str() {
                "ADDROW" => add_row(&reply, &mut store, &table, fields),
                "UPDATE" => update_rows(&reply, &mut store, &table, fields),
                _ => delete_rows(&reply, &mut store, &table, fields),
            }
        }
        "IMPORT" => {
            let multipart = match Multipart::from_request(request, &()).await {
                Ok(multipart) => multipart,
                Err(rejection) => return rejection.into_response(),
            };
            let upload = match read_upload(multipart).await {
                Ok(upload) => upload,
                Err(message) => {
                    return reply.error(StatusCode::BAD_REQUEST, ERR_IMPORT_FAILED, message)
                }
            };
            let mut store = db.write().await;
            import_rows(&reply, &mut store, &table, upload)
        }
        other => reply.error(
            StatusCode::BAD_REQUEST,
            ERR_INVALID_ACTION,
            format!("Invalid ZOHO_ACTION {other:?}"),
        ),
    }
}

fn add_row(reply: &Reply, store: &mut Store, table: &str, fields: Vec<(String, String)>) -> Response {
    if fields.is_empty() {
        return reply.error(StatusCode::BAD_REQUEST, ERR_NO_COLUMNS, "No column values given");
    }
    let target = store.tables.entry(table.to_string()).or_default();
    target.note_columns(fields.iter().map(|(k, _)| k));
    let row: Row = fields.into_iter().collect();
    let result = json!({"column_order": target.columns, "rows": [target.cells(&row)]});

    target.push(row);
    reply.ok(result)
}

fn update_rows(
    reply: &Reply,
    store: &mut Store,
    table: &str,
    fields: Vec<(String, String)>,
) -> Response {
    let (criteria, updates) = split_criteria(fields);
    if updates.is_empty() {
        return reply.error(StatusCode::BAD_REQUEST, ERR_NO_COLUMNS, "No column values given");
    }
    let clauses = match criteria.as_deref().map(parse_criteria).transpose() {
        Ok(clauses) => clauses.unwrap_or_default(),
        Err(message) => return reply.error(StatusCode::BAD_REQUEST, ERR_INVALID_CRITERIA, message),
    };
    let Some(target) = store.tables.get_mut(table) else {
        return table_missing(reply, table);
    };

    let mut updated = 0;
    for row in target.rows.iter_mut().filter(|row| matches_all(row, &clauses)) {
        for (column, value) in &updates {
            row.insert(column.clone(), value.clone());
        }
        updated += 1;
    }
    let columns: Vec<&String> = updates.iter().map(|(k, _)| k).collect();
    reply.ok(json!({"updatedColumns": columns, "updatedRows": updated.to_string()}))
}

fn delete_rows(
    reply: &Reply,
    store: &mut Store,
    table: &str,
    fields: Vec<(String, String)>,
) -> Response {
    let (criteria, _) = split_criteria(fields);
    let clauses = match criteria.as_deref().map(parse_criteria).transpose() {
        Ok(clauses) => clauses.unwrap_or_default(),
        Err(message) => return reply.error(StatusCode::BAD_REQUEST, ERR_INVALID_CRITERIA, message),
    };
    let Some(target) = store.tables.get_mut(table) else {
        return table_missing(reply, table);
    };

    let before = target.rows.len();
    target.rows.retain(|row| !matches_all(row, &clauses));
    let deleted = before - target.rows.len();
    reply.ok(json!({"deletedrows": deleted.to_string()}))
}

/// Parts of an import request.
#[derive(Debug, Default)]
struct Upload {
    file: Vec<u8>,
    fields: HashMap<String, String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, String> {
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        let name = field.name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| e.to_string())?;
        if name == "ZOHO_FILE" {
            upload.file = data.to_vec();
        } else {
            upload
                .fields
                .insert(name, String::from_utf8_lossy(&data).into_owned());
        }
    }
    Ok(upload)
}

fn import_rows(reply: &Reply, store: &mut Store, table: &str, upload: Upload) -> Response {
    let field = |name: &str| upload.fields.get(name).map(String::as_str).unwrap_or_default();

    if !store.tables.contains_key(table) {
        if field("ZOHO_CREATE_TABLE") != "true" {
            return table_missing(reply, table);
        }
        store.tables.insert(table.to_string(), Table::default());
    }

    let parsed = match field("ZOHO_IMPORT_FILETYPE") {
        "CSV" => parse_csv(&upload.file),
        "JSON" => parse_json(&upload.file),
        other => Err(format!("Unsupported ZOHO_IMPORT_FILETYPE {other:?}")),
    };
    let rows = match parsed {
        Ok(rows) => rows,
        Err(message) => return reply.error(StatusCode::BAD_REQUEST, ERR_IMPORT_FAILED, message),
    };

    let import_type = field("ZOHO_IMPORT_TYPE");
    let matching: Vec<&str> = field("ZOHO_MATCHING_COLUMNS")
        .split(',')
        .filter(|c| !c.is_empty())
        .collect();
    let Some(target) = store.tables.get_mut(table) else {
        return table_missing(reply, table);
    };
    let operation = match import_type {
        "APPEND" => "appended",
        "TRUNCATEADD" => {
            target.rows.clear();
            "truncatedandadded"
        }
        "UPDATEADD" if !matching.is_empty() => "updatedandadded",
        other => {
            return reply.error(
                StatusCode::BAD_REQUEST,
                ERR_IMPORT_FAILED,
                format!("Unsupported ZOHO_IMPORT_TYPE {other:?}"),
            )
        }
    };

    let total = rows.len();
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for column in row.keys() {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        let existing = if import_type == "UPDATEADD" {
            target
                .rows
                .iter_mut()
                .find(|r| matching.iter().all(|c| r.get(*c) == row.get(*c)))
        } else {
            None
        };
        match existing {
            Some(existing) => existing.extend(row),
            None => target.push(row),
        }
    }

    let column_details: serde_json::Map<String, Value> = columns
        .iter()
        .map(|c| (c.clone(), Value::String("Plain Text".to_string())))
        .collect();
    reply.ok(json!({
        "importSummary": {
            "importType": import_type,
            "totalColumnCount": columns.len(),
            "selectedColumnCount": columns.len(),
            "totalRowCount": total,
            "successRowCount": total,
            "warnings": 0,
            "importOperation": operation,
        },
        "columnDetails": column_details,
        "importErrors": "",
    }))
}

fn table_missing(reply: &Reply, table: &str) -> Response {
    reply.error(
        StatusCode::BAD_REQUEST,
        ERR_TABLE_NOT_PRESENT,
        format!("Table {table:?} is not present in the database"),
    )
}

fn split_criteria(fields: Vec<(String, String)>) -> (Option<String>, Vec<(String, String)>) {
    let mut criteria = None;
    let mut rest = Vec::new();
    for (key, value) in fields {
        if key == "ZOHO_CRITERIA" {
            criteria = Some(value);
        } else {
            rest.push((key, value));
        }
    }
    (criteria, rest)
}

/// Parse `("a"='1')` or `(("a"='1') and ("b"='2'))` into column/value pairs.
pub fn parse_criteria(expr: &str) -> Result<Vec<(String, String)>, String> {
    let mut clauses = Vec::new();
    let mut rest = expr.trim();
    while let Some(start) = rest.find("(\"") {
        let after = &rest[start + 2..];
        let (column, after) = after
            .split_once("\"='")
            .ok_or_else(|| format!("Invalid criteria {expr:?}"))?;
        let (value, after) = after
            .split_once("')")
            .ok_or_else(|| format!("Invalid criteria {expr:?}"))?;
        clauses.push((column.to_string(), value.to_string()));
        rest = after;
    }
    if clauses.is_empty() {
        return Err(format!("Invalid criteria {expr:?}"));
    }
    Ok(clauses)
}

fn matches_all(row: &Row, clauses: &[(String, String)]) -> bool {
    clauses
        .iter()
        .all(|(column, value)| row.get(column) == Some(value))
}

fn parse_csv(data: &[u8]) -> Result<Vec<Row>, String> {
    let mut reader = csv::Reader::from_reader(data);
    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    reader
        .records()
        .map(|record| -> Result<Row, String> {
            let record = record.map_err(|e| e.to_string())?;
            Ok(headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect())
        })
        .collect()
}

fn parse_json(data: &[u8]) -> Result<Vec<Row>, String> {
    let objects: Vec<serde_json::Map<String, Value>> =
        serde_json::from_slice(data).map_err(|e| e.to_string())?;
    Ok(objects
        .into_iter()
        .map(|object| {
            object
                .into_iter()
                .map(|(k, v)| {
                    let text = match v {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (k, text)
                })
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_criteria() {
        assert_eq!(
            parse_criteria("(\"Region\"='East')").unwrap(),
            vec![("Region".to_string(), "East".to_string())]
        );
    }

    #[test]
    fn parse_compound_criteria() {
        assert_eq!(
            parse_criteria("((\"a\"='1') and (\"b\"='two words'))").unwrap(),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "two words".to_string())
            ]
        );
    }

    #[test]
    fn parse_criteria_rejects_garbage() {
        assert!(parse_criteria("Region = East").is_err());
        assert!(parse_criteria("(\"Region\"='East").is_err());
    }

    #[test]
    fn csv_rows_use_header_names() {
        let rows = parse_csv(b"Name,Age\nJane,31\nBob,40\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["Name"], "Bob");
        assert_eq!(rows[1]["Age"], "40");
    }

    #[test]
    fn json_rows_stringify_scalars() {
        let rows = parse_json(br#"[{"Name":"Jane","Age":31,"Active":true}]"#).unwrap();
        assert_eq!(rows[0]["Name"], "Jane");
        assert_eq!(rows[0]["Age"], "31");
        assert_eq!(rows[0]["Active"], "true");
    }

    #[test]
    fn json_rejects_non_array() {
        assert!(parse_json(b"{\"a\":1}").is_err());
    }

    #[test]
    fn table_tracks_first_seen_column_order() {
        let mut table = Table::default();
        table.push([("b".to_string(), "1".to_string())].into_iter().collect());
        table.push([("a".to_string(), "2".to_string())].into_iter().collect());
        assert_eq!(table.columns, vec!["b".to_string(), "a".to_string()]);

        let row: Row = [("a".to_string(), "9".to_string())].into_iter().collect();
        assert_eq!(table.cells(&row), vec!["", "9"]);
    }

    #[test]
    fn store_rows_of_unknown_table_is_empty() {
        let store = Store::new("t").with_table("Known");
        assert!(store.rows("Known").is_empty());
        assert!(store.rows("Unknown").is_empty());
    }
}
