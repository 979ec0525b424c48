use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

#[allow(dead_code)]
struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Epoch seconds of 2024-01-15T00:00:00Z.
#[allow(dead_code)]
pub const DAY_START: i64 = 1_705_276_800;

/// Builds a capture directory (`charts/*.json`, `tables/*.json`) for one or
/// more devices.
#[allow(dead_code)]
pub struct CaptureFixture {
    pub dir: TempDir,
    traffic: Vec<Value>,
    domains: Vec<Value>,
    countries: Vec<Value>,
    protos: Vec<Value>,
    tables: Vec<(&'static str, Value)>,
}

#[allow(dead_code)]
impl CaptureFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
            traffic: Vec::new(),
            domains: Vec::new(),
            countries: Vec::new(),
            protos: Vec::new(),
            tables: Vec::new(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// `samples` are `(bucket_sec, up, down)`.
    pub fn traffic(mut self, mac: &str, samples: &[(i64, f64, f64)]) -> Self {
        let stats: Vec<Value> = samples
            .iter()
            .map(|(t, up, down)| json!({"bucket": t, "up_bytes": up, "down_bytes": down}))
            .collect();
        self.traffic.push(device_item(mac, Value::Array(stats)));
        self
    }

    /// `samples` are `(bucket_sec, {domain: count})`.
    pub fn domains(mut self, mac: &str, samples: &[(i64, Value)]) -> Self {
        let stats: Vec<Value> = samples
            .iter()
            .map(|(t, m)| json!({"bucket": t, "domains": m, "req_count": 1}))
            .collect();
        self.domains.push(device_item(mac, Value::Array(stats)));
        self
    }

    /// `samples` are `(bucket_sec, countries, companies)`.
    pub fn countries(mut self, mac: &str, samples: &[(i64, Value, Value)]) -> Self {
        let stats: Vec<Value> = samples
            .iter()
            .map(|(t, c, co)| json!({"bucket": t, "countries": c, "companies": co}))
            .collect();
        self.countries.push(device_item(mac, Value::Array(stats)));
        self
    }

    pub fn protos(mut self, mac: &str, samples: &[(i64, Value)]) -> Self {
        let stats: Vec<Value> = samples
            .iter()
            .map(|(t, m)| json!({"bucket": t, "protos": m}))
            .collect();
        self.protos.push(device_item(mac, Value::Array(stats)));
        self
    }

    /// A table file; `items` is the raw JSON array.
    pub fn table(mut self, kind: &'static str, items: Value) -> Self {
        self.tables.push((kind, items));
        self
    }

    /// Write everything out and return the fixture.
    pub fn write(self) -> Self {
        let root = self.dir.path();
        write_json(root, "charts/traffic.json", &Value::Array(self.traffic.clone()));
        write_json(root, "charts/domains.json", &Value::Array(self.domains.clone()));
        write_json(root, "charts/countries.json", &Value::Array(self.countries.clone()));
        write_json(root, "charts/protos.json", &Value::Array(self.protos.clone()));
        for (kind, items) in &self.tables {
            write_json(root, &format!("tables/{kind}.json"), items);
        }
        self
    }
}

#[allow(dead_code)]
fn device_item(mac: &str, stats: Value) -> Value {
    json!({"device": {"mac": mac, "ip": "10.0.0.2", "label": null, "hostname": "laptop"}, "stats": stats})
}

#[allow(dead_code)]
fn write_json(root: &Path, rel: &str, value: &Value) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}
