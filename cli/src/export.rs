//! CSV export sink.
//!
//! Every file starts with a UTF-8 BOM so spreadsheet tools pick the right
//! encoding for non-ASCII titles and organization names.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use surveyor_core::AssetRecord;
use surveyor_scanner::{ExportSink, ExportStage, Report, ScanError};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const ASSET_HEADER: [&str; 12] = [
    "OrgCode",
    "Domain",
    "Host",
    "Protocol",
    "URL",
    "IP",
    "Port",
    "StatusCode",
    "Length",
    "Title",
    "Source",
    "Reliability",
];

const DENSE_BLOCK_HEADER: [&str; 4] = ["CIDR", "IPCount", "Organizations", "Mixed"];

const FLAGGED_IP_HEADER: [&str; 5] = ["IP", "URLCount", "Domains", "Sources", "GeneratedAt"];

/// Writes `<run>_<name>.csv` files into a run directory.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    dir: PathBuf,
    run_name: String,
}

impl CsvExporter {
    /// Create an exporter for `dir`, prefixing files with `run_name`.
    pub fn new(dir: impl Into<PathBuf>, run_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            run_name: run_name.into(),
        }
    }

    /// Path of the file for `name`.
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}_{name}.csv", self.run_name))
    }

    fn write(&self, name: &str, header: &[&str], rows: Vec<Vec<String>>) -> Result<(), ScanError> {
        let path = self.path_for(name);
        write_csv(&path, header, &rows).map_err(|e| ScanError::Export {
            stage: name.to_string(),
            message: e.to_string(),
        })?;
        tracing::info!(rows = rows.len(), "Exported {}", path.display());
        Ok(())
    }
}

fn write_csv(path: &Path, header: &[&str], rows: &[Vec<String>]) -> csv::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn asset_row(record: &AssetRecord) -> Vec<String> {
    vec![
        record.organization.clone(),
        record.domain.clone(),
        record.host.clone(),
        record.protocol.clone(),
        record.url.clone(),
        record.ip.clone(),
        record.port.to_string(),
        record.status_code.to_string(),
        record.length.to_string(),
        record.title.clone(),
        record.source.clone(),
        record.trust_level.to_string(),
    ]
}

fn join<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    values
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(";")
}

impl ExportSink for CsvExporter {
    fn export_assets(&self, stage: ExportStage, rows: &[AssetRecord]) -> Result<(), ScanError> {
        self.write(stage.as_str(), &ASSET_HEADER, rows.iter().map(asset_row).collect())
    }

    fn export_report(&self, report: Report<'_>) -> Result<(), ScanError> {
        match report {
            Report::DenseBlocks(blocks) => {
                let rows = blocks
                    .iter()
                    .map(|block| {
                        vec![
                            block.cidr(),
                            block.ip_count.to_string(),
                            join(&block.organizations),
                            block.is_mixed.to_string(),
                        ]
                    })
                    .collect();
                self.write(report.name(), &DENSE_BLOCK_HEADER, rows)
            }
            Report::FlaggedIps(flagged) => {
                let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
                let rows = flagged
                    .iter()
                    .map(|ip| {
                        vec![
                            ip.ip.clone(),
                            ip.distinct_url_count.to_string(),
                            join(&ip.domains),
                            join(&ip.sources),
                            generated_at.clone(),
                        ]
                    })
                    .collect();
                self.write(report.name(), &FLAGGED_IP_HEADER, rows)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use surveyor_core::TrustLevel;
    use surveyor_scanner::IpFanout;
    use tempfile::TempDir;

    fn read(path: &Path) -> String {
        let bytes = std::fs::read(path).expect("read export");
        assert!(bytes.starts_with(UTF8_BOM));
        String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).expect("utf-8 export")
    }

    #[test]
    fn test_asset_export() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let exporter = CsvExporter::new(temp_dir.path(), "20260101_120000");
        let record = AssetRecord {
            organization: "示例单位".to_string(),
            domain: "example.com".to_string(),
            host: "example.com".to_string(),
            protocol: "https".to_string(),
            url: "https://example.com".to_string(),
            ip: "93.184.216.34".to_string(),
            port: 443,
            status_code: 200,
            length: 1256,
            title: "Example, Inc".to_string(),
            source: "fofa;quake".to_string(),
            trust_level: TrustLevel::KnownIp,
        };

        exporter
            .export_assets(ExportStage::RoundOne, &[record])
            .expect("export");

        let path = temp_dir.path().join("20260101_120000_step1.csv");
        let contents = read(&path);
        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some("OrgCode,Domain,Host,Protocol,URL,IP,Port,StatusCode,Length,Title,Source,Reliability")
        );
        assert_eq!(
            lines.next(),
            Some("示例单位,example.com,example.com,https,https://example.com,93.184.216.34,443,200,1256,\"Example, Inc\",fofa;quake,1")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_flagged_ip_export() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let exporter = CsvExporter::new(temp_dir.path(), "run");
        let flagged = vec![IpFanout {
            ip: "1.1.1.1".to_string(),
            distinct_url_count: 11,
            domains: BTreeSet::from(["a.example.com".to_string(), "b.example.com".to_string()]),
            sources: BTreeSet::from(["fofa".to_string()]),
        }];

        exporter
            .export_report(Report::FlaggedIps(&flagged))
            .expect("export");

        let contents = read(&exporter.path_for("ip_need_scan"));
        let row = contents.lines().nth(1).expect("data row");
        assert!(row.starts_with("1.1.1.1,11,a.example.com;b.example.com,fofa,"));
    }

    #[test]
    fn test_missing_directory_is_export_error() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let exporter = CsvExporter::new(temp_dir.path().join("missing"), "run");

        let result = exporter.export_report(Report::DenseBlocks(&[]));
        assert!(matches!(result, Err(ScanError::Export { .. })));
    }
}
