use std::collections::HashMap;

use vcfdb_core::{HeaderLine, HeaderSummary, OtherLine};

/// Mandatory columns before FORMAT and the samples.
pub const FIXED_COLUMNS: [&str; 8] = ["#CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO"];

/// Declared `Type=` of an INFO or FORMAT field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Float,
    Flag,
    Character,
    String,
}

impl FieldType {
    pub fn from_declared(value: &str) -> Option<Self> {
        match value {
            "Integer" => Some(FieldType::Integer),
            "Float" => Some(FieldType::Float),
            "Flag" => Some(FieldType::Flag),
            "Character" => Some(FieldType::Character),
            "String" => Some(FieldType::String),
            _ => None,
        }
    }
}

///
/// Declared INFO and FORMAT field types of one file, used to type the
/// values of its data lines.
///
#[derive(Debug, Clone, Default)]
pub struct FieldTypes {
    pub info: HashMap<String, FieldType>,
    pub format: HashMap<String, FieldType>,
}

/// Everything the header of one file tells us.
#[derive(Debug, Clone, Default)]
pub struct ParsedHeader {
    pub summary: HeaderSummary,
    pub samples: Vec<String>,
    pub types: FieldTypes,
}

///
/// Accumulates `##` meta lines, then reads the sample names from the
/// `#CHROM` column line.
///
#[derive(Debug, Default)]
pub struct HeaderBuilder {
    parsed: ParsedHeader,
}

impl HeaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Add one meta line, given without its leading `##`.
    ///
    pub fn push_meta_line(&mut self, line: &str) -> Result<(), String> {
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| format!("malformed header line `##{}`", line))?;

        let summary = &mut self.parsed.summary;
        let target = match key {
            "fileformat" => {
                summary.fileformat = value.to_string();
                return Ok(());
            }
            "INFO" => &mut summary.infos,
            "FORMAT" => &mut summary.formats,
            "FILTER" => &mut summary.filters,
            "contig" => &mut summary.contigs,
            _ => {
                summary.others.push(OtherLine {
                    key: key.to_string(),
                    value: value.to_string(),
                });
                return Ok(());
            }
        };

        let attributes = parse_structured(value)
            .ok_or_else(|| format!("malformed {} header line `##{}`", key, line))?;
        let id = attribute(&attributes, "ID")
            .ok_or_else(|| format!("{} header line without ID: `##{}`", key, line))?
            .to_string();

        let declared = attribute(&attributes, "Type").and_then(FieldType::from_declared);
        match (key, declared) {
            ("INFO", Some(ty)) => {
                self.parsed.types.info.insert(id.clone(), ty);
            }
            ("FORMAT", Some(ty)) => {
                self.parsed.types.format.insert(id.clone(), ty);
            }
            _ => {}
        }

        target.push(HeaderLine {
            id,
            line: line.to_string(),
        });
        Ok(())
    }

    ///
    /// Finish the header with its `#CHROM` column line.
    ///
    pub fn finish(mut self, column_line: &str) -> Result<ParsedHeader, String> {
        let columns: Vec<&str> = column_line.split('\t').collect();
        if columns.len() < FIXED_COLUMNS.len() || columns[..FIXED_COLUMNS.len()] != FIXED_COLUMNS {
            return Err(format!("malformed column header line `{}`", column_line));
        }
        if columns.len() > FIXED_COLUMNS.len() {
            if columns[FIXED_COLUMNS.len()] != "FORMAT" {
                return Err(format!(
                    "expected FORMAT column, found `{}`",
                    columns[FIXED_COLUMNS.len()]
                ));
            }
            self.parsed.samples = columns[FIXED_COLUMNS.len() + 1..]
                .iter()
                .map(|s| s.to_string())
                .collect();
        }
        Ok(self.parsed)
    }
}

fn attribute<'a>(attributes: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

///
/// Split `<ID=DP,Number=1,Type=Integer,Description="a, b">` into its
/// key/value pairs. Commas inside quotes do not separate pairs; quotes
/// are stripped from values.
///
fn parse_structured(value: &str) -> Option<Vec<(String, String)>> {
    let body = value.strip_prefix('<')?.strip_suffix('>')?;

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in body.chars() {
        match c {
            _ if escaped => {
                current.push(c);
                escaped = false;
            }
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if in_quotes {
        return None;
    }
    fields.push(current);

    fields
        .into_iter()
        .filter(|f| !f.is_empty())
        .map(|f| {
            f.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    fn test_structured_line_with_quoted_commas() {
        let attrs = parse_structured(r#"<ID=DP,Number=1,Type=Integer,Description="Depth, total">"#).unwrap();
        assert_eq!(attribute(&attrs, "ID"), Some("DP"));
        assert_eq!(attribute(&attrs, "Type"), Some("Integer"));
        assert_eq!(attribute(&attrs, "Description"), Some("Depth, total"));
    }

    #[rstest]
    #[case("<ID=DP")]
    #[case(r#"<ID=DP,Description="open>"#)]
    #[case("<ID>")]
    fn test_structured_line_malformed(#[case] value: &str) {
        assert!(parse_structured(value).is_none());
    }

    #[rstest]
    fn test_builder_sorts_lines() {
        let mut builder = HeaderBuilder::new();
        builder.push_meta_line("fileformat=VCFv4.2").unwrap();
        builder
            .push_meta_line(r#"INFO=<ID=AF,Number=A,Type=Float,Description="Allele freq">"#)
            .unwrap();
        builder
            .push_meta_line(r#"FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">"#)
            .unwrap();
        builder
            .push_meta_line(r#"FILTER=<ID=q10,Description="Quality below 10">"#)
            .unwrap();
        builder.push_meta_line("contig=<ID=chr1,length=248956422>").unwrap();
        builder.push_meta_line("source=caller-1.0").unwrap();

        let parsed = builder
            .finish("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNA001\tNA002")
            .unwrap();

        assert_eq!(parsed.summary.fileformat, "VCFv4.2");
        assert_eq!(parsed.summary.infos[0].id, "AF");
        assert_eq!(parsed.summary.formats[0].id, "GT");
        assert_eq!(parsed.summary.filters[0].id, "q10");
        assert_eq!(parsed.summary.contigs[0].line, "contig=<ID=chr1,length=248956422>");
        assert_eq!(
            parsed.summary.others,
            vec![OtherLine {
                key: "source".to_string(),
                value: "caller-1.0".to_string()
            }]
        );
        assert_eq!(parsed.types.info.get("AF"), Some(&FieldType::Float));
        assert_eq!(parsed.types.format.get("GT"), Some(&FieldType::String));
        assert_eq!(parsed.samples, vec!["NA001", "NA002"]);
    }

    #[rstest]
    fn test_sites_only_header_has_no_samples() {
        let parsed = HeaderBuilder::new()
            .finish("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO")
            .unwrap();
        assert!(parsed.samples.is_empty());
    }

    #[rstest]
    #[case("#CHROM\tPOS\tID")]
    #[case("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tNA001")]
    fn test_bad_column_line(#[case] line: &str) {
        assert!(HeaderBuilder::new().finish(line).is_err());
    }
}
