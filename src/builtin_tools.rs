//! # Built-in tools
//!
//! Concrete [`Tool`] implementations applications commonly need:
//! calculator, datetime, filesystem, database, and http. Each is built to
//! documented sandbox rules and tested against them.

use crate::tools::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ============================================================================
// CALCULATOR
// ============================================================================

/// Evaluates arithmetic expressions via `evalexpr`.
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression and return the numeric result."
    }

    fn input_schema(&self) -> Value {
        crate::utils::schema_object(
            serde_json::json!({"expression": {"type": "string", "description": "arithmetic expression, e.g. (3 + 4) * 5"}})
                .as_object()
                .unwrap()
                .clone(),
            vec!["expression".to_string()],
        )
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let Some(expression) = input.get("expression").and_then(Value::as_str) else {
            return ToolResult::error("missing required field 'expression'", "invalid_input");
        };
        match evalexpr::eval(expression) {
            Ok(value) => ToolResult::success(value.to_string()),
            Err(e) => ToolResult::error(format!("failed to evaluate expression: {e}"), "invalid_expression"),
        }
    }
}

// ============================================================================
// DATETIME
// ============================================================================

/// Reports the current time, optionally formatted with a `chrono` strftime string.
pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "datetime"
    }

    fn description(&self) -> &str {
        "Return the current UTC date and time, optionally formatted."
    }

    fn input_schema(&self) -> Value {
        crate::utils::schema_object(
            serde_json::json!({"format": {"type": "string", "description": "optional strftime format string"}})
                .as_object()
                .unwrap()
                .clone(),
            Vec::new(),
        )
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let now = chrono::Utc::now();
        match input.get("format").and_then(Value::as_str) {
            Some(format) => ToolResult::success(now.format(format).to_string()),
            None => ToolResult::success(now.to_rfc3339()),
        }
    }
}

// ============================================================================
// FILESYSTEM
// ============================================================================

/// Reads/writes files under an `allowed_paths` whitelist, enforcing
/// `max_file_size` and an optional read-only mode.
pub struct FilesystemTool {
    allowed_paths: Vec<PathBuf>,
    max_file_size: u64,
    read_only: bool,
}

impl FilesystemTool {
    /// Build a filesystem tool sandboxed to `allowed_paths`.
    pub fn new(allowed_paths: Vec<PathBuf>, max_file_size: u64, read_only: bool) -> Self {
        Self { allowed_paths, max_file_size, read_only }
    }

    fn is_allowed(&self, path: &Path) -> bool {
        self.allowed_paths.iter().any(|allowed| path.starts_with(allowed))
    }
}

#[async_trait]
impl Tool for FilesystemTool {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn description(&self) -> &str {
        "Read or write a file within the configured allowed paths."
    }

    fn input_schema(&self) -> Value {
        crate::utils::schema_object(
            serde_json::json!({
                "operation": {"type": "string", "description": "\"read\" or \"write\""},
                "path": {"type": "string", "description": "file path"},
                "content": {"type": "string", "description": "content to write (write only)"},
            })
            .as_object()
            .unwrap()
            .clone(),
            vec!["operation".to_string(), "path".to_string()],
        )
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let Some(operation) = input.get("operation").and_then(Value::as_str) else {
            return ToolResult::error("missing required field 'operation'", "invalid_input");
        };
        let Some(path) = input.get("path").and_then(Value::as_str) else {
            return ToolResult::error("missing required field 'path'", "invalid_input");
        };
        let path = PathBuf::from(path);
        if !self.is_allowed(&path) {
            return ToolResult::error(format!("path '{}' is not in the allowed paths", path.display()), "forbidden");
        }

        match operation {
            "read" => match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.len() > self.max_file_size => {
                    ToolResult::error(format!("file exceeds max_file_size of {} bytes", self.max_file_size), "too_large")
                }
                Ok(_) => match tokio::fs::read_to_string(&path).await {
                    Ok(content) => ToolResult::success(content),
                    Err(e) => ToolResult::error(format!("failed to read file: {e}"), "io_error"),
                },
                Err(e) => ToolResult::error(format!("failed to stat file: {e}"), "io_error"),
            },
            "write" => {
                if self.read_only {
                    return ToolResult::error("filesystem tool is in read-only mode", "forbidden");
                }
                let Some(content) = input.get("content").and_then(Value::as_str) else {
                    return ToolResult::error("missing required field 'content'", "invalid_input");
                };
                if content.len() as u64 > self.max_file_size {
                    return ToolResult::error(format!("content exceeds max_file_size of {} bytes", self.max_file_size), "too_large");
                }
                match tokio::fs::write(&path, content).await {
                    Ok(()) => ToolResult::success("ok"),
                    Err(e) => ToolResult::error(format!("failed to write file: {e}"), "io_error"),
                }
            }
            other => ToolResult::error(format!("unknown operation '{other}'"), "invalid_input"),
        }
    }
}

// ============================================================================
// DATABASE
// ============================================================================

/// A minimal query-execution interface. No concrete RDBMS driver is in
/// scope — persistence back-ends are external collaborators; this is the
/// seam a real driver plugs into.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `query` and return result rows as JSON objects.
    async fn query(&self, query: &str) -> Result<Vec<Value>, String>;
}

/// An in-memory [`QueryExecutor`] test double.
pub struct InMemoryExecutor {
    rows: Vec<Value>,
}

impl InMemoryExecutor {
    /// Build an executor that always returns `rows`, regardless of the query text.
    pub fn new(rows: Vec<Value>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl QueryExecutor for InMemoryExecutor {
    async fn query(&self, _query: &str) -> Result<Vec<Value>, String> {
        Ok(self.rows.clone())
    }
}

const DANGEROUS_SQL_SUFFIXES: &[&str] = &["into outfile", "load_file"];

/// Runs queries against a [`QueryExecutor`], restricted to `allowed_tables`
/// and an operation whitelist; `read_only` rejects anything but `SELECT` and
/// blocks known dangerous SQL constructs regardless of the whitelist.
pub struct DatabaseTool {
    executor: Arc<dyn QueryExecutor>,
    allowed_tables: Vec<String>,
    allowed_operations: Vec<String>,
    read_only: bool,
}

impl DatabaseTool {
    /// Build a database tool sandboxed to `allowed_tables`/`allowed_operations`.
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        allowed_tables: Vec<String>,
        allowed_operations: Vec<String>,
        read_only: bool,
    ) -> Self {
        Self { executor, allowed_tables, allowed_operations, read_only }
    }

    fn operation_of(query: &str) -> String {
        query.trim().split_whitespace().next().unwrap_or("").to_uppercase()
    }

    fn references_allowed_table(&self, query: &str) -> bool {
        let lower = query.to_lowercase();
        self.allowed_tables.iter().any(|table| lower.contains(&table.to_lowercase()))
    }

    fn is_dangerous(query: &str) -> bool {
        let lower = query.to_lowercase();
        DANGEROUS_SQL_SUFFIXES.iter().any(|pattern| lower.contains(pattern))
    }
}

#[async_trait]
impl Tool for DatabaseTool {
    fn name(&self) -> &str {
        "database"
    }

    fn description(&self) -> &str {
        "Run a SQL query against the configured database, subject to table and operation sandboxing."
    }

    fn input_schema(&self) -> Value {
        crate::utils::schema_object(
            serde_json::json!({"query": {"type": "string", "description": "SQL query text"}})
                .as_object()
                .unwrap()
                .clone(),
            vec!["query".to_string()],
        )
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let Some(query) = input.get("query").and_then(Value::as_str) else {
            return ToolResult::error("missing required field 'query'", "invalid_input");
        };

        if Self::is_dangerous(query) {
            return ToolResult::error("query contains a disallowed construct", "forbidden");
        }

        let operation = Self::operation_of(query);
        if self.read_only && operation != "SELECT" {
            return ToolResult::error("database tool is in read-only mode; only SELECT is allowed", "forbidden");
        }
        if !self.allowed_operations.iter().any(|op| op.eq_ignore_ascii_case(&operation)) {
            return ToolResult::error(format!("operation '{operation}' is not allowed"), "forbidden");
        }
        if !self.allowed_tables.is_empty() && !self.references_allowed_table(query) {
            return ToolResult::error("query does not reference an allowed table", "forbidden");
        }

        match self.executor.query(query).await {
            Ok(rows) => ToolResult::success_json(&rows),
            Err(e) => ToolResult::error(format!("query failed: {e}"), "query_error"),
        }
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Outbound HTTP GET/POST via `reqwest`, restricted to an allowed-hosts list.
pub struct HttpTool {
    http: reqwest::Client,
    allowed_hosts: Vec<String>,
}

impl HttpTool {
    /// Build an http tool sandboxed to `allowed_hosts`.
    pub fn new(allowed_hosts: Vec<String>) -> Self {
        Self { http: reqwest::Client::new(), allowed_hosts }
    }

    fn host_allowed(&self, url: &reqwest::Url) -> bool {
        match url.host_str() {
            Some(host) => self.allowed_hosts.iter().any(|allowed| allowed == host),
            None => false,
        }
    }
}

#[async_trait]
impl Tool for HttpTool {
    fn name(&self) -> &str {
        "http"
    }

    fn description(&self) -> &str {
        "Make an outbound HTTP GET or POST request to an allowed host."
    }

    fn input_schema(&self) -> Value {
        crate::utils::schema_object(
            serde_json::json!({
                "method": {"type": "string", "description": "\"GET\" or \"POST\""},
                "url": {"type": "string", "description": "target URL"},
                "body": {"type": "string", "description": "request body (POST only)"},
            })
            .as_object()
            .unwrap()
            .clone(),
            vec!["method".to_string(), "url".to_string()],
        )
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let Some(method) = input.get("method").and_then(Value::as_str) else {
            return ToolResult::error("missing required field 'method'", "invalid_input");
        };
        let Some(url) = input.get("url").and_then(Value::as_str) else {
            return ToolResult::error("missing required field 'url'", "invalid_input");
        };
        let parsed = match reqwest::Url::parse(url) {
            Ok(u) => u,
            Err(e) => return ToolResult::error(format!("invalid url: {e}"), "invalid_input"),
        };
        if !self.host_allowed(&parsed) {
            return ToolResult::error(format!("host '{}' is not allowed", parsed.host_str().unwrap_or("")), "forbidden");
        }

        let request = match method.to_uppercase().as_str() {
            "GET" => self.http.get(parsed),
            "POST" => {
                let body = input.get("body").and_then(Value::as_str).unwrap_or("").to_string();
                self.http.post(parsed).body(body)
            }
            other => return ToolResult::error(format!("unsupported method '{other}'"), "invalid_input"),
        };

        match request.send().await {
            Ok(response) => match response.text().await {
                Ok(text) => ToolResult::success(text),
                Err(e) => ToolResult::error(format!("failed to read response body: {e}"), "io_error"),
            },
            Err(e) => ToolResult::error(format!("request failed: {e}"), "transport_error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_calculator_evaluates_expression() {
        let tool = CalculatorTool;
        let result = tool.execute(serde_json::json!({"expression": "(3 + 4) * 2"})).await;
        assert_eq!(result.text(), "14");
    }

    #[tokio::test]
    async fn test_calculator_rejects_invalid_expression() {
        let tool = CalculatorTool;
        let result = tool.execute(serde_json::json!({"expression": "not math"})).await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_datetime_returns_rfc3339_by_default() {
        let tool = DateTimeTool;
        let result = tool.execute(serde_json::json!({})).await;
        assert!(!result.is_error());
        assert!(result.text().contains('T'));
    }

    #[tokio::test]
    async fn test_filesystem_rejects_path_outside_allowlist() {
        let tool = FilesystemTool::new(vec![PathBuf::from("/tmp/allowed")], 1024, false);
        let result = tool
            .execute(serde_json::json!({"operation": "read", "path": "/etc/passwd"}))
            .await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_filesystem_read_only_blocks_write() {
        let tool = FilesystemTool::new(vec![PathBuf::from("/tmp")], 1024, true);
        let result = tool
            .execute(serde_json::json!({"operation": "write", "path": "/tmp/f.txt", "content": "x"}))
            .await;
        assert!(result.is_error());
        assert_eq!(result.text(), "filesystem tool is in read-only mode");
    }

    #[tokio::test]
    async fn test_database_read_only_rejects_non_select() {
        let executor = Arc::new(InMemoryExecutor::new(vec![]));
        let tool = DatabaseTool::new(executor, vec!["users".to_string()], vec!["SELECT".to_string()], true);
        let result = tool.execute(serde_json::json!({"query": "DELETE FROM users"})).await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_database_blocks_dangerous_suffixes_even_if_whitelisted() {
        let executor = Arc::new(InMemoryExecutor::new(vec![]));
        let tool = DatabaseTool::new(
            executor,
            vec!["users".to_string()],
            vec!["SELECT".to_string()],
            false,
        );
        let result = tool
            .execute(serde_json::json!({"query": "SELECT * FROM users INTO OUTFILE '/tmp/x'"}))
            .await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_database_rejects_unreferenced_table() {
        let executor = Arc::new(InMemoryExecutor::new(vec![serde_json::json!({"id": 1})]));
        let tool = DatabaseTool::new(executor, vec!["users".to_string()], vec!["SELECT".to_string()], true);
        let result = tool.execute(serde_json::json!({"query": "SELECT * FROM orders"})).await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_database_allows_whitelisted_select() {
        let executor = Arc::new(InMemoryExecutor::new(vec![serde_json::json!({"id": 1})]));
        let tool = DatabaseTool::new(executor, vec!["users".to_string()], vec!["SELECT".to_string()], true);
        let result = tool.execute(serde_json::json!({"query": "SELECT * FROM users"})).await;
        assert!(!result.is_error());
    }

    #[tokio::test]
    async fn test_http_rejects_disallowed_host() {
        let tool = HttpTool::new(vec!["api.example.com".to_string()]);
        let result = tool
            .execute(serde_json::json!({"method": "GET", "url": "https://evil.example.org/data"}))
            .await;
        assert!(result.is_error());
    }
}
