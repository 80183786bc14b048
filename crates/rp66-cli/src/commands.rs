//! Subcommand implementations
//!
//! Each command loads the file, builds serializable summaries and writes
//! them in the requested format.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use rp66_core::{
    DanglingReference, LoadConfig, LogicalFile, Mark, Matcher, StorageUnitLabel, TypeRegistry,
    TypedObject, Value, load_with,
};
use serde::Serialize;
use tracing::debug;

use crate::OutputFormat;

fn open(path: &Path, config: &LoadConfig) -> Result<Vec<LogicalFile>> {
    let files = load_with(path, config, &TypeRegistry::default())
        .with_context(|| format!("loading {}", path.display()))?;
    debug!("{}: {} logical files", path.display(), files.len());
    Ok(files)
}

fn write_json<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// One line of `files`
#[derive(Debug, Serialize)]
pub struct FileSummary {
    /// Position in the physical file, from 0
    pub index: usize,
    /// Where the logical file was opened
    pub offset: Mark,
    /// Ended in a broken record
    pub broken: bool,
    /// Storage unit label in effect
    pub storage_unit_label: Option<StorageUnitLabel>,
    /// Distinct metadata objects
    pub objects: usize,
    /// Frame data records
    pub frame_records: usize,
}

fn object_counts(file: &LogicalFile) -> Result<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    for object_type in file.types() {
        let n = file.find(&object_type, None, Matcher::Exact)?.len();
        counts.insert(object_type, n);
    }
    Ok(counts)
}

/// List logical files
pub fn files(
    path: &Path,
    config: &LoadConfig,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let mut summaries = Vec::new();
    for (index, file) in open(path, config)?.iter().enumerate() {
        summaries.push(FileSummary {
            index,
            offset: file.offset(),
            broken: file.is_broken(),
            storage_unit_label: file.storage_unit_label().cloned(),
            objects: object_counts(file)?.values().sum(),
            frame_records: file.format_data_index().values().map(Vec::len).sum(),
        });
    }

    match format {
        OutputFormat::Json => write_json(out, &summaries),
        OutputFormat::Text => {
            for s in &summaries {
                write!(
                    out,
                    "{:>3}  offset {}+{}  {} objects  {} frame records",
                    s.index, s.offset.offset, s.offset.skip, s.objects, s.frame_records
                )?;
                if let Some(label) = &s.storage_unit_label {
                    write!(out, "  set {}", label.storage_set_id.trim())?;
                }
                if s.broken {
                    write!(out, "  (broken)")?;
                }
                writeln!(out)?;
            }
            Ok(())
        }
    }
}

/// Type counts of one logical file
#[derive(Debug, Serialize)]
pub struct TypeSummary {
    /// Position in the physical file, from 0
    pub index: usize,
    /// Distinct objects per type
    pub types: BTreeMap<String, usize>,
}

/// List object types per logical file
pub fn types(
    path: &Path,
    config: &LoadConfig,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let mut summaries = Vec::new();
    for (index, file) in open(path, config)?.iter().enumerate() {
        summaries.push(TypeSummary {
            index,
            types: object_counts(file)?,
        });
    }

    match format {
        OutputFormat::Json => write_json(out, &summaries),
        OutputFormat::Text => {
            for s in &summaries {
                writeln!(out, "logical file {}", s.index)?;
                for (object_type, n) in &s.types {
                    writeln!(out, "  {object_type:<28}{n:>6}")?;
                }
            }
            Ok(())
        }
    }
}

/// Object selection for `objects`
#[derive(Debug, Clone, Copy)]
pub struct ObjectQuery<'a> {
    /// Object type
    pub object_type: &'a str,
    /// Object name
    pub name: Option<&'a str>,
    /// Literal matching
    pub exact: bool,
    /// Resolve references
    pub links: bool,
}

/// One attribute of an object
#[derive(Debug, Serialize)]
pub struct AttributeSummary {
    /// Label
    pub label: String,
    /// Units, empty if none
    pub units: String,
    /// Values
    pub values: Vec<Value>,
}

/// One object
#[derive(Debug, Serialize)]
pub struct ObjectSummary {
    /// Logical file the object belongs to
    pub file: usize,
    /// Identity
    pub fingerprint: String,
    /// Whether the type has a schema
    pub known: bool,
    /// Attributes in template order
    pub attributes: Vec<AttributeSummary>,
    /// Resolved reference targets per label, `None` for dangling
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, Vec<Option<String>>>,
}

fn summarize_object(file: usize, object: &TypedObject) -> ObjectSummary {
    let links = object
        .linked_labels()
        .into_iter()
        .map(|label| {
            let targets = object
                .linked(&label)
                .iter()
                .map(|t| t.as_ref().map(|t| t.fingerprint().to_string()))
                .collect();
            (label, targets)
        })
        .collect();

    ObjectSummary {
        file,
        fingerprint: object.fingerprint().to_string(),
        known: object.is_known(),
        attributes: object
            .raw()
            .attributes
            .iter()
            .map(|a| AttributeSummary {
                label: a.label.clone(),
                units: a.units.clone(),
                values: a.values.clone(),
            })
            .collect(),
        links,
    }
}

/// Print objects matching a query
pub fn objects(
    path: &Path,
    config: &LoadConfig,
    query: &ObjectQuery<'_>,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let matcher = if query.exact {
        Matcher::Exact
    } else {
        Matcher::Pattern
    };

    let mut summaries = Vec::new();
    for (index, file) in open(path, config)?.iter().enumerate() {
        if query.links {
            file.link();
        }
        for object in file.find(query.object_type, query.name, matcher)? {
            summaries.push(summarize_object(index, &object));
        }
    }

    match format {
        OutputFormat::Json => write_json(out, &summaries),
        OutputFormat::Text => {
            for s in &summaries {
                writeln!(out, "[{}] {}", s.file, s.fingerprint)?;
                for a in &s.attributes {
                    let values: Vec<String> = a.values.iter().map(ToString::to_string).collect();
                    write!(out, "    {:<24}{}", a.label, values.join(", "))?;
                    if !a.units.is_empty() {
                        write!(out, " [{}]", a.units)?;
                    }
                    writeln!(out)?;
                }
                for (label, targets) in &s.links {
                    let targets: Vec<&str> = targets
                        .iter()
                        .map(|t| t.as_deref().unwrap_or("<missing>"))
                        .collect();
                    writeln!(out, "    {label} -> {}", targets.join(", "))?;
                }
            }
            Ok(())
        }
    }
}

/// Link outcome of one logical file
#[derive(Debug, Serialize)]
pub struct LinkSummary {
    /// Position in the physical file, from 0
    pub index: usize,
    /// Resolved reference slots
    pub resolved: usize,
    /// Distinct dangling references
    pub dangling: Vec<DanglingReference>,
}

/// Link every logical file and report dangling references
pub fn link(
    path: &Path,
    config: &LoadConfig,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let summaries: Vec<LinkSummary> = open(path, config)?
        .iter()
        .enumerate()
        .map(|(index, file)| {
            let report = file.link();
            LinkSummary {
                index,
                resolved: report.resolved,
                dangling: report.dangling,
            }
        })
        .collect();

    match format {
        OutputFormat::Json => write_json(out, &summaries),
        OutputFormat::Text => {
            for s in &summaries {
                writeln!(
                    out,
                    "logical file {}: {} resolved, {} dangling",
                    s.index,
                    s.resolved,
                    s.dangling.len()
                )?;
                for d in &s.dangling {
                    writeln!(out, "    {} {} -> {}", d.from, d.label, d.target)?;
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;
    use test_utils::{
        AttrValue, SetBuilder, explicit_record, file_header, storage_unit_label, visible_records,
        write_temp,
    };

    fn sample() -> NamedTempFile {
        let channels = SetBuilder::named("CHANNEL", "0")
            .template("LONG-NAME")
            .object(1, 0, "GR")
            .value(&AttrValue::ascii("Gamma ray"))
            .build();
        let frame = SetBuilder::named("FRAME", "0")
            .template("CHANNELS")
            .object(1, 0, "F1")
            .value(&AttrValue::obnames(&[(1, 0, "GR"), (1, 0, "SP")]))
            .build();
        let segments = vec![
            file_header("1", "LF1"),
            explicit_record(3, &channels),
            explicit_record(4, &frame),
        ];
        let mut bytes = storage_unit_label(1, "CLI TEST");
        bytes.extend(visible_records(&segments, 8192));
        write_temp(&bytes)
    }

    fn output(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn files_text() {
        let file = sample();
        let text = output(|out| files(file.path(), &LoadConfig::default(), OutputFormat::Text, out));
        assert_eq!(
            text,
            "  0  offset 80+0  3 objects  0 frame records  set CLI TEST\n"
        );
    }

    #[test]
    fn types_json() {
        let file = sample();
        let text = output(|out| types(file.path(), &LoadConfig::default(), OutputFormat::Json, out));
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json[0]["types"]["CHANNEL"], 1);
        assert_eq!(json[0]["types"]["FRAME"], 1);
        assert_eq!(json[0]["types"]["FILE-HEADER"], 1);
    }

    #[test]
    fn objects_with_links() {
        let file = sample();
        let query = ObjectQuery {
            object_type: "FRAME",
            name: None,
            exact: true,
            links: true,
        };
        let text = output(|out| {
            objects(file.path(), &LoadConfig::default(), &query, OutputFormat::Text, out)
        });
        assert!(text.contains("[0] T.FRAME-I.F1-O.1-C.0"));
        assert!(text.contains("CHANNELS -> T.CHANNEL-I.GR-O.1-C.0, <missing>"));
    }

    #[test]
    fn objects_by_pattern() {
        let file = sample();
        let query = ObjectQuery {
            object_type: "chan",
            name: Some("g"),
            exact: false,
            links: false,
        };
        let text = output(|out| {
            objects(file.path(), &LoadConfig::default(), &query, OutputFormat::Text, out)
        });
        assert!(text.contains("LONG-NAME"));
        assert!(text.contains("Gamma ray"));
    }

    #[test]
    fn link_reports_dangling() {
        let file = sample();
        let text = output(|out| link(file.path(), &LoadConfig::default(), OutputFormat::Text, out));
        assert!(text.starts_with("logical file 0: 1 resolved, 1 dangling\n"));
        assert!(text.contains("T.FRAME-I.F1-O.1-C.0 CHANNELS -> T.CHANNEL-I.SP-O.1-C.0"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut out = Vec::new();
        let err = files(
            Path::new("/nonexistent/well.dlis"),
            &LoadConfig::default(),
            OutputFormat::Text,
            &mut out,
        )
        .unwrap_err();
        assert!(err.to_string().contains("loading /nonexistent/well.dlis"));
    }
}
