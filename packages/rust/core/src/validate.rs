//! Parse a candidate and validate each element into a [`HeritageSite`].
//!
//! Nothing in here returns an error. A candidate that is not a JSON array
//! produces an empty report; an element that breaks the schema is dropped with
//! one warning and the remaining elements are still processed.

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use harvest_shared::{HeritageSite, SchemaVersion, SiteType, YearRange};

/// Schema knobs for the validator.
#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    pub schema: SchemaVersion,
    pub years: YearRange,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            schema: SchemaVersion::default(),
            years: YearRange::current(),
        }
    }
}

/// Why an array element was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("element is not a JSON object")]
    NotAnObject,

    #[error("`{0}` is missing, empty, or not a string")]
    InvalidText(&'static str),

    #[error("`registered_year` is missing or not numeric")]
    NonNumericYear,

    #[error("`registered_year` {year} is outside {min}..={max}")]
    YearOutOfRange { year: i128, min: i32, max: i32 },

    #[error("unrecognized `type` {0}")]
    UnknownType(String),
}

/// A dropped element and its position in the parsed array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub index: usize,
    pub reason: RejectReason,
}

/// Outcome of validating one candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Accepted records, in input order.
    pub sites: Vec<HeritageSite>,
    /// Dropped elements, in input order.
    pub rejections: Vec<Rejection>,
    /// Set when the candidate was not a JSON array; `sites` is then empty.
    pub parse_error: Option<String>,
}

impl ValidationReport {
    fn parse_failure(message: String) -> Self {
        Self {
            parse_error: Some(message),
            ..Default::default()
        }
    }
}

/// Parse `candidate` and validate every element.
#[instrument(skip_all, fields(schema = %opts.schema, len = candidate.len()))]
pub fn validate_candidate(candidate: &str, opts: &ValidationOptions) -> ValidationReport {
    let value: Value = match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "candidate is not valid JSON, no records produced");
            return ValidationReport::parse_failure(e.to_string());
        }
    };

    let elements = match value {
        Value::Array(elements) => elements,
        other => {
            let kind = json_kind(&other);
            warn!(kind, "candidate is not a JSON array, no records produced");
            return ValidationReport::parse_failure(format!("expected a JSON array, got {kind}"));
        }
    };

    let mut report = ValidationReport::default();
    for (index, element) in elements.iter().enumerate() {
        match validate_element(element, opts) {
            Ok(site) => report.sites.push(site),
            Err(reason) => {
                warn!(index, %reason, "dropping invalid record");
                report.rejections.push(Rejection { index, reason });
            }
        }
    }

    debug!(
        parsed = elements.len(),
        accepted = report.sites.len(),
        rejected = report.rejections.len(),
        "validation complete"
    );

    report
}

/// Validate a single array element.
pub fn validate_element(
    element: &Value,
    opts: &ValidationOptions,
) -> Result<HeritageSite, RejectReason> {
    let object = element.as_object().ok_or(RejectReason::NotAnObject)?;

    let name = required_text(object, "name")?;
    let registered_year = registered_year(object, &opts.years)?;
    let description = required_text(object, "description")?;
    let kind = if opts.schema.has_site_type() {
        site_type(object)?
    } else {
        None
    };

    Ok(HeritageSite {
        name,
        registered_year,
        kind,
        description,
    })
}

fn required_text(object: &Map<String, Value>, key: &'static str) -> Result<String, RejectReason> {
    match object.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(RejectReason::InvalidText(key)),
    }
}

/// Integers, or strings holding an integer. Floats and everything else are
/// non-numeric; integers too wide for `i32` are out of range.
fn registered_year(object: &Map<String, Value>, years: &YearRange) -> Result<i32, RejectReason> {
    let year = match object.get("registered_year") {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        Some(Value::String(s)) => s.trim().parse::<i128>().ok(),
        _ => None,
    }
    .ok_or(RejectReason::NonNumericYear)?;

    match i32::try_from(year) {
        Ok(y) if years.contains(i64::from(y)) => Ok(y),
        _ => Err(RejectReason::YearOutOfRange {
            year,
            min: years.min,
            max: years.max,
        }),
    }
}

/// Absent or `null` means "no type"; anything else must name a [`SiteType`].
fn site_type(object: &Map<String, Value>) -> Result<Option<SiteType>, RejectReason> {
    match object.get("type") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s
            .parse::<SiteType>()
            .map(Some)
            .map_err(|_| RejectReason::UnknownType(format!("{s:?}"))),
        Some(other) => Err(RejectReason::UnknownType(other.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    /// Shared buffer that collects formatted log output.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl LogBuffer {
        fn warn_lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .filter(|line| line.contains(" WARN "))
                .map(str::to_string)
                .collect()
        }
    }

    /// Run the validator with a subscriber that records WARN and above.
    fn validate_logged(
        candidate: &str,
        opts: &ValidationOptions,
    ) -> (ValidationReport, Vec<String>) {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let report =
            tracing::subscriber::with_default(subscriber, || validate_candidate(candidate, opts));
        (report, logs.warn_lines())
    }

    fn opts(schema: SchemaVersion) -> ValidationOptions {
        ValidationOptions {
            schema,
            years: YearRange { min: 1850, max: 2027 },
        }
    }

    fn v1() -> ValidationOptions {
        opts(SchemaVersion::V1)
    }

    #[test]
    fn single_clean_record() {
        let report = validate_candidate(
            r#"[{"name":"Yakushima","registered_year":1993,"description":"A subtropical island."}]"#,
            &v1(),
        );
        assert_eq!(
            report.sites,
            vec![HeritageSite {
                name: "Yakushima".into(),
                registered_year: 1993,
                kind: None,
                description: "A subtropical island.".into(),
            }]
        );
        assert!(report.rejections.is_empty());
        assert!(report.parse_error.is_none());
    }

    #[test]
    fn clean_input_preserves_count_and_fields() {
        let input = serde_json::json!([
            {"name": "Horyu-ji Area", "registered_year": 1993, "description": "Wooden temples."},
            {"name": "Himeji-jo", "registered_year": 1993, "description": "A castle."},
            {"name": "Shiretoko", "registered_year": 2005, "description": "A peninsula."},
            {"name": "Himeji-jo", "registered_year": 1993, "description": "A castle."}
        ]);
        let report = validate_candidate(&input.to_string(), &v1());
        assert_eq!(report.sites.len(), 4);

        let expected: Vec<HeritageSite> = serde_json::from_value(input).unwrap();
        assert_eq!(report.sites, expected);
    }

    #[test]
    fn one_non_numeric_year_drops_exactly_one() {
        let input = r#"[
            {"name": "A", "registered_year": 1993, "description": "a"},
            {"name": "B", "registered_year": "nineteen ninety", "description": "b"},
            {"name": "C", "registered_year": 2000, "description": "c"}
        ]"#;
        let report = validate_candidate(input, &v1());
        let names: Vec<&str> = report.sites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["A", "C"]);
        assert_eq!(
            report.rejections,
            vec![Rejection {
                index: 1,
                reason: RejectReason::NonNumericYear,
            }]
        );
    }

    #[test]
    fn each_dropped_record_logs_one_warning() {
        let input = r#"[
            {"name": "A", "registered_year": 1993, "description": "a"},
            {"name": "B", "registered_year": "x", "description": "b"},
            {"name": "C", "registered_year": 2000, "description": "c"}
        ]"#;
        let (report, warnings) = validate_logged(input, &v1());
        assert_eq!(report.sites.len(), 2);
        assert_eq!(warnings.len(), 1, "warnings: {warnings:?}");
        assert!(warnings[0].contains("dropping invalid record"));
        assert!(warnings[0].contains("index=1"));
    }

    #[test]
    fn clean_input_logs_no_warnings() {
        let input = r#"[{"name":"A","registered_year":1993,"description":"a"}]"#;
        let (report, warnings) = validate_logged(input, &v1());
        assert_eq!(report.sites.len(), 1);
        assert!(warnings.is_empty(), "warnings: {warnings:?}");
    }

    #[test]
    fn invalid_json_yields_empty_report() {
        let report = validate_candidate("I'm sorry, I cannot provide that.", &v1());
        assert!(report.sites.is_empty());
        assert!(report.rejections.is_empty());
        assert!(report.parse_error.is_some());
    }

    #[test]
    fn non_array_top_level_is_parse_failure() {
        let report = validate_candidate(r#"{"name":"A"}"#, &v1());
        assert!(report.sites.is_empty());
        assert_eq!(
            report.parse_error.as_deref(),
            Some("expected a JSON array, got an object")
        );
    }

    #[test]
    fn empty_array_is_not_a_failure() {
        let report = validate_candidate("[]", &v1());
        assert!(report.sites.is_empty());
        assert!(report.parse_error.is_none());
    }

    #[test]
    fn missing_and_blank_text_fields_are_rejected() {
        let input = r#"[
            {"registered_year": 1993, "description": "no name"},
            {"name": "   ", "registered_year": 1993, "description": "blank name"},
            {"name": "No description", "registered_year": 1993},
            {"name": 42, "registered_year": 1993, "description": "numeric name"}
        ]"#;
        let report = validate_candidate(input, &v1());
        assert!(report.sites.is_empty());
        let reasons: Vec<RejectReason> = report.rejections.into_iter().map(|r| r.reason).collect();
        assert_eq!(
            reasons,
            vec![
                RejectReason::InvalidText("name"),
                RejectReason::InvalidText("name"),
                RejectReason::InvalidText("description"),
                RejectReason::InvalidText("name"),
            ]
        );
    }

    #[test]
    fn year_bounds_are_enforced() {
        let input = r#"[
            {"name": "Old", "registered_year": 1849, "description": "too early"},
            {"name": "Edge", "registered_year": 1850, "description": "ok"},
            {"name": "Future", "registered_year": 2028, "description": "too late"},
            {"name": "Huge", "registered_year": 99999999999, "description": "overflow"}
        ]"#;
        let report = validate_candidate(input, &v1());
        assert_eq!(report.sites.len(), 1);
        assert_eq!(report.sites[0].name, "Edge");
        assert_eq!(
            report.rejections[0].reason,
            RejectReason::YearOutOfRange {
                year: 1849,
                min: 1850,
                max: 2027
            }
        );
        assert_eq!(report.rejections.len(), 3);
    }

    #[test]
    fn years_wider_than_i64_are_out_of_range() {
        let input = r#"[
            {"name": "U64", "registered_year": 18446744073709551615, "description": "max u64"},
            {"name": "Text", "registered_year": "18446744073709551616", "description": "wide"}
        ]"#;
        let report = validate_candidate(input, &v1());
        assert!(report.sites.is_empty());
        assert_eq!(
            report.rejections[0].reason,
            RejectReason::YearOutOfRange {
                year: 18_446_744_073_709_551_615,
                min: 1850,
                max: 2027
            }
        );
        assert!(matches!(
            report.rejections[1].reason,
            RejectReason::YearOutOfRange { year: 18_446_744_073_709_551_616, .. }
        ));
    }

    #[test]
    fn year_representations() {
        let input = r#"[
            {"name": "Quoted", "registered_year": " 1996 ", "description": "ok"},
            {"name": "Float", "registered_year": 1996.5, "description": "no"},
            {"name": "Null", "registered_year": null, "description": "no"},
            {"name": "Bool", "registered_year": true, "description": "no"}
        ]"#;
        let report = validate_candidate(input, &v1());
        assert_eq!(report.sites.len(), 1);
        assert_eq!(report.sites[0].registered_year, 1996);
        assert!(
            report
                .rejections
                .iter()
                .all(|r| r.reason == RejectReason::NonNumericYear)
        );
    }

    #[test]
    fn non_object_elements_are_dropped() {
        let input = r#"["Yakushima", 1993, null, {"name":"A","registered_year":2000,"description":"a"}]"#;
        let report = validate_candidate(input, &v1());
        assert_eq!(report.sites.len(), 1);
        assert_eq!(report.rejections.len(), 3);
        assert!(
            report
                .rejections
                .iter()
                .all(|r| r.reason == RejectReason::NotAnObject)
        );
    }

    #[test]
    fn v1_ignores_type() {
        let input = r#"[{"name":"A","registered_year":2000,"type":"volcanic","description":"a"}]"#;
        let report = validate_candidate(input, &v1());
        assert_eq!(report.sites.len(), 1);
        assert_eq!(report.sites[0].kind, None);
    }

    #[test]
    fn v2_validates_type() {
        let input = r#"[
            {"name": "A", "registered_year": 2000, "type": "Natural", "description": "a"},
            {"name": "B", "registered_year": 2000, "description": "no type"},
            {"name": "C", "registered_year": 2000, "type": "volcanic", "description": "c"},
            {"name": "D", "registered_year": 2000, "type": 3, "description": "d"},
            {"name": "E", "registered_year": 2000, "type": null, "description": "e"}
        ]"#;
        let report = validate_candidate(input, &opts(SchemaVersion::V2));
        let kinds: Vec<(&str, Option<SiteType>)> = report
            .sites
            .iter()
            .map(|s| (s.name.as_str(), s.kind))
            .collect();
        assert_eq!(
            kinds,
            [
                ("A", Some(SiteType::Natural)),
                ("B", None),
                ("E", None)
            ]
        );
        assert_eq!(
            report.rejections[0].reason,
            RejectReason::UnknownType("\"volcanic\"".into())
        );
        assert_eq!(report.rejections[1].reason, RejectReason::UnknownType("3".into()));
    }

    #[test]
    fn text_fields_are_kept_verbatim() {
        let input = r#"[{"name":" Yakushima ","registered_year":1993,"description":"Island.\n"}]"#;
        let report = validate_candidate(input, &v1());
        assert_eq!(report.sites[0].name, " Yakushima ");
        assert_eq!(report.sites[0].description, "Island.\n");
    }

    #[test]
    fn reject_reason_messages() {
        assert_eq!(
            RejectReason::InvalidText("name").to_string(),
            "`name` is missing, empty, or not a string"
        );
        assert_eq!(
            RejectReason::YearOutOfRange {
                year: 1700,
                min: 1850,
                max: 2027
            }
            .to_string(),
            "`registered_year` 1700 is outside 1850..=2027"
        );
    }
}
