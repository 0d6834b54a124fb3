use std::{
    io::{self, Write},
    sync::Mutex,
};

use serde_json::{Value, json};

use super::{Sink, SinkError};
use crate::models::Report;

/// A sink that prints one JSON line per report item.
pub struct ConsoleSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    /// Creates a sink that writes to standard output.
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    /// Creates a sink that writes to the given writer.
    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self { out: Mutex::new(out) }
    }
}

/// Formats the report as `{"chain", "block", "data"}` lines. The payload is
/// embedded as JSON when it parses, as a string otherwise.
pub fn report_lines(report: &Report) -> Vec<String> {
    report
        .items()
        .iter()
        .map(|item| {
            let data = serde_json::from_str::<Value>(item.payload())
                .unwrap_or_else(|_| Value::String(item.payload().to_string()));
            json!({ "chain": report.chain(), "block": report.height(), "data": data }).to_string()
        })
        .collect()
}

#[async_trait::async_trait]
impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, report: &Report) -> Result<(), SinkError> {
        let lines = report_lines(report);
        let mut out = self.out.lock().map_err(|e| SinkError::Io(io::Error::other(e.to_string())))?;
        for line in lines {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_helpers::ReportBuilder;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_console_sink_writes_one_line_per_item() {
        let buffer = SharedBuffer::default();
        let sink = ConsoleSink::with_writer(Box::new(buffer.clone()));
        let report = ReportBuilder::new()
            .chain("Kusama")
            .height(99)
            .event("balances", "Transfer", r#"{"amount":5}"#)
            .event("system", "Remarked", "not json")
            .build();

        sink.deliver(&report).await.unwrap();

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<Value> =
            output.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], json!({"chain": "Kusama", "block": 99, "data": {"amount": 5}}));
        assert_eq!(lines[1]["data"], json!("not json"));
    }
}
