//! jsonpack 命令行工具
//!
//! 所有命令都走动态路径：JSON 输入转换为 [`Value`] 后按模式编码，
//! 解码结果转换回 JSON 输出。

use anyhow::{Context, Result};
use jsonpack_common::PackConfig;
use jsonpack_core::{Schema, Value};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::debug;

/// 初始化日志
///
/// 日志写到标准错误，标准输出只留给命令结果。
/// `RUST_LOG` 优先，未设置时使用 `default_level`。
pub fn init_logging(default_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(io::stderr))
        .with(filter)
        .init();
}

/// 读取 JSON 配置文件，未给出时使用默认配置
pub fn load_config(path: Option<&Path>) -> Result<PackConfig> {
    let Some(path) = path else {
        return Ok(PackConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("invalid config {}", path.display()))?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// 从文件编译模式，模式名取文件名
pub fn load_schema(path: &Path, config: &PackConfig) -> Result<Schema> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read schema {}", path.display()))?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("schema");
    Ok(Schema::compile_with(name, text, config)?)
}

/// 读取输入文件，未给出时读标准输入
pub fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => fs::read(path).with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut data = Vec::new();
            io::stdin().read_to_end(&mut data).context("failed to read stdin")?;
            Ok(data)
        }
    }
}

/// 写出结果，未给出文件时写标准输出
pub fn write_output(path: Option<&Path>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => fs::write(path, data).with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

/// 规范化的模式文本
pub fn check(schema: &Schema, pretty: bool) -> Result<String> {
    if !pretty {
        return Ok(schema.text().to_string());
    }
    let json: serde_json::Value = serde_json::from_str(schema.text())?;
    Ok(serde_json::to_string_pretty(&json)?)
}

/// 把 JSON 文本编码为二进制；`hex` 为 true 时输出十六进制文本
pub fn encode(schema: &Schema, input: &[u8], hex: bool) -> Result<Vec<u8>> {
    let json: serde_json::Value = serde_json::from_slice(input).context("input is not valid JSON")?;
    let bytes = schema.encode_value(&Value::from(json))?;
    debug!("Encoded {} bytes with schema {}", bytes.len(), schema.name());
    if hex {
        let mut text = hex::encode(&bytes).into_bytes();
        text.push(b'\n');
        return Ok(text);
    }
    Ok(bytes.to_vec())
}

/// 把二进制解码为 JSON 文本；`hex` 为 true 时输入是十六进制文本
pub fn decode(schema: &Schema, input: &[u8], hex: bool, pretty: bool) -> Result<String> {
    let raw;
    let data = if hex {
        let text = std::str::from_utf8(input).context("hex input is not UTF-8")?;
        let digits: String = text.split_whitespace().collect();
        raw = hex::decode(digits).context("invalid hex input")?;
        &raw[..]
    } else {
        input
    };
    let value = schema.decode_value(data)?;
    let json = serde_json::Value::from(value);
    let text = if pretty {
        serde_json::to_string_pretty(&json)?
    } else {
        serde_json::to_string(&json)?
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    const INFO: &str = r#"{
        "type": "object",
        "properties": {"name": {"type": "string"}, "area": {"type": "uint32le"}},
        "order": ["name", "area"]
    }"#;

    fn schema_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(INFO.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_encode_decode_hex() {
        let file = schema_file();
        let schema = load_schema(file.path(), &PackConfig::default()).unwrap();

        let out = encode(&schema, br#"{"name": "ab", "area": 888}"#, true).unwrap();
        assert_eq!(out, b"0261627803000000\n"[..]);

        let text = decode(&schema, &out, true, false).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json, serde_json::json!({"name": "ab", "area": 888}));
    }

    #[test]
    fn test_raw_roundtrip_through_files() {
        let file = schema_file();
        let schema = load_schema(file.path(), &PackConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("info.bin");

        let bytes = encode(&schema, br#"{"name": "ab", "area": 888}"#, false).unwrap();
        write_output(Some(&out), &bytes).unwrap();
        let data = read_input(Some(&out)).unwrap();
        assert_eq!(data, [0x02, b'a', b'b', 0x78, 0x03, 0x00, 0x00]);
        assert!(decode(&schema, &data, false, true).unwrap().contains("\"area\": 888"));
    }

    #[test]
    fn test_check_and_config() {
        let file = schema_file();
        let mut config_file = tempfile::NamedTempFile::new().unwrap();
        config_file
            .write_all(br#"{"max_string_length": 1}"#)
            .unwrap();
        let config = load_config(Some(config_file.path())).unwrap();
        assert_eq!(config.max_string_length, 1);

        let schema = load_schema(file.path(), &config).unwrap();
        assert!(check(&schema, false).unwrap().starts_with(r#"{"order":"#));
        assert!(decode(&schema, &[0x02, b'a', b'b', 0, 0, 0, 0], false, false).is_err());
    }

    #[test]
    fn test_errors_carry_context() {
        let file = schema_file();
        let schema = load_schema(file.path(), &PackConfig::default()).unwrap();
        let err = encode(&schema, b"{not json", false).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
        assert!(decode(&schema, b"zz", true, false).is_err());
        assert!(load_config(Some(Path::new("/nonexistent/jsonpack.json"))).is_err());
    }
}
