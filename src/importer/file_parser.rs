// ==========================================
// 八字排盘引擎 - 规则表格解析器
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 输出: 每行一个 表头 → 单元格文本 映射, 附源文件行号; 完全空白行跳过（不影响其余行的行号）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook, Reader, Xlsx};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// 原始行: 源文件行号 + 表头 → 单元格文本
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// 源文件中的行号（1 起, 表头为第 1 行）
    pub row: usize,
    pub fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn new(row: usize, fields: HashMap<String, String>) -> Self {
        Self { row, fields }
    }

    pub fn get(&self, header: &str) -> Option<&String> {
        self.fields.get(header)
    }

    fn is_blank(&self) -> bool {
        self.fields.values().all(|v| v.is_empty())
    }
}

/// 文件解析器
pub trait FileParser: Send + Sync {
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<RawRecord>>;
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 从任意输入流解析（条件列为 JSON, 需按 CSV 规则加引号）
    pub fn parse_reader<R: Read>(&self, input: R) -> ImportResult<Vec<RawRecord>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(input);

        // 去掉 UTF-8 BOM, 兼容 Excel 另存的 CSV
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut records = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            // 引号内换行时取记录起始行
            let row = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 2);
            let mut row_map = HashMap::new();

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    row_map.insert(header.clone(), value.trim().to_string());
                }
            }

            let raw = RawRecord::new(row, row_map);
            // 跳过完全空白的行
            if raw.is_blank() {
                continue;
            }

            records.push(raw);
        }

        Ok(records)
    }
}

impl FileParser for CsvParser {
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<RawRecord>> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        if let Some(ext) = file_path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        let file = File::open(file_path)?;
        self.parse_reader(file)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<RawRecord>> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if ext != "xlsx" && ext != "xls" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook: Xlsx<_> = open_workbook(file_path)
            .map_err(|e: calamine::XlsxError| ImportError::ExcelParseError(e.to_string()))?;

        // 读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;

        // 数据区可能不从 A1 开始
        let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
        let mut rows = range.rows();
        let header_row = rows
            .next()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无数据行".to_string()))?;

        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let mut records = Vec::new();
        for (idx, data_row) in rows.enumerate() {
            let mut row_map = HashMap::new();

            for (col_idx, cell) in data_row.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    row_map.insert(header.clone(), cell.to_string().trim().to_string());
                }
            }

            let raw = RawRecord::new(first_row + idx + 2, row_map);
            if raw.is_blank() {
                continue;
            }

            records.push(raw);
        }

        Ok(records)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<RawRecord>> {
        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => CsvParser.parse_to_raw_records(file_path),
            "xlsx" | "xls" => ExcelParser.parse_to_raw_records(file_path),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_csv_parser_quoted_json_column() {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "\u{feff}code,rule_type,condition,content,version").unwrap();
        writeln!(
            temp_file,
            r#"R1,t,"{{""gender"":{{""gender"":""male""}}}}",男命,1"#
        )
        .unwrap();

        let records = CsvParser.parse_to_raw_records(temp_file.path()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("code"), Some(&"R1".to_string()));
        assert_eq!(
            records[0].get("condition").map(String::as_str),
            Some(r#"{"gender":{"gender":"male"}}"#)
        );
    }

    #[test]
    fn test_csv_parser_skip_empty_rows() {
        let input = "code,content\nR1,a\n,\nR2,b\n";
        let records = CsvParser.parse_reader(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        // 行号按源文件计, 空白行之后不错位
        assert_eq!(records[0].row, 2);
        assert_eq!(records[1].row, 4);
        assert_eq!(records[1].get("code").map(String::as_str), Some("R2"));
    }

    #[test]
    fn test_csv_row_of_multiline_record() {
        let input = "code,content\nR1,\"line one\nline two\"\nR2,b\n";
        let records = CsvParser.parse_reader(input.as_bytes()).unwrap();
        assert_eq!(records[0].row, 2);
        assert_eq!(records[1].row, 4);
    }

    #[test]
    fn test_universal_parser_rejects_unknown_extension() {
        let result = UniversalFileParser.parse_to_raw_records(Path::new("rules.json"));
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));

        let missing = UniversalFileParser.parse_to_raw_records(Path::new("missing.csv"));
        assert!(matches!(missing, Err(ImportError::FileNotFound(_))));
    }
}
