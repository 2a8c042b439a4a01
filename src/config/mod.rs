//! Run configuration tables.
//!
//! Two flat, whitespace-separated text tables configure a run:
//!
//! - the run table (`input.txt`): `key value` rows naming directories, the
//!   branch selection and the plotting scale
//! - the parameter table (`default.txt`): `name value attribute [stage]` rows
//!   overriding model parameters for one fitting stage
//!
//! Both are parsed once into immutable values; `app` merges them with CLI
//! flags into a [`RunConfig`] that is passed explicitly to every component.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::{CurveMode, FitStage, ParamAttr};
use crate::error::AppError;
use crate::models::ModelKind;

/// Number of untagged parameter rows applied to the initial-guess stage.
pub const DEFAULT_INITIAL_ROWS: usize = 2;

/// Fully resolved configuration of one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub mode: CurveMode,
    pub log_scale: bool,
    pub plots: bool,
    #[serde(skip)]
    pub progress: bool,
    pub params: ParameterTable,
}

/// Values read from the run table. Every field is optional so CLI flags and
/// environment variables can fill the gaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputTable {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub mode: Option<CurveMode>,
    pub log_scale: Option<bool>,
    pub initial_rows: Option<usize>,
}

/// One parameter override row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamOverride {
    pub name: String,
    pub value: f64,
    pub attr: ParamAttr,
    pub stage: FitStage,
    /// 1-based line number in the source table.
    pub line: usize,
}

/// Ordered parameter overrides, each bound to exactly one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterTable {
    pub rows: Vec<ParamOverride>,
}

impl ParameterTable {
    pub fn for_stage(&self, stage: FitStage) -> impl Iterator<Item = &ParamOverride> {
        self.rows.iter().filter(move |r| r.stage == stage)
    }

    /// Check every row against the model of its stage.
    ///
    /// Runs before any fitting so a typo in a parameter name cannot abort a
    /// batch halfway through.
    pub fn validate(&self, source: &str) -> Result<(), AppError> {
        for row in &self.rows {
            let model = ModelKind::for_stage(row.stage);
            if !model.has_param(&row.name) {
                return Err(AppError::config(format!(
                    "{source}:{}: unknown parameter '{}' for the {} stage ({} model has: {}).",
                    row.line,
                    row.name,
                    row.stage.as_str(),
                    model.display_name(),
                    model.param_names().join(", ")
                )));
            }
        }

        for stage in [FitStage::Initial, FitStage::Final] {
            let mut params = ModelKind::for_stage(stage).default_params();
            crate::fit::apply_overrides(&mut params, self.for_stage(stage));
            if let Some(p) = params.iter().find(|p| !(p.lower_bound <= p.upper_bound)) {
                return Err(AppError::config(format!(
                    "{source}: {} stage bounds for '{}' are inverted: lower={} upper={}.",
                    stage.as_str(),
                    p.name,
                    p.lower_bound,
                    p.upper_bound
                )));
            }
        }
        Ok(())
    }
}

/// Read and parse the run table.
pub fn read_input_table(path: &Path) -> Result<InputTable, AppError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::config(format!("Failed to read run table '{}': {e}", path.display())))?;
    parse_input_table(&text, &path.display().to_string())
}

pub fn parse_input_table(text: &str, source: &str) -> Result<InputTable, AppError> {
    let mut table = InputTable::default();

    for (line_no, fields) in table_rows(text) {
        if fields.len() != 2 {
            return Err(AppError::config(format!(
                "{source}:{line_no}: expected 'key value', got {} fields.",
                fields.len()
            )));
        }
        let (key, value) = (fields[0], fields[1]);
        match key.to_ascii_lowercase().as_str() {
            "input_dir" => table.input_dir = Some(PathBuf::from(value)),
            "output_dir" => table.output_dir = Some(PathBuf::from(value)),
            "curve" | "which_curve" => {
                let mode = CurveMode::parse(value).ok_or_else(|| {
                    AppError::config(format!(
                        "{source}:{line_no}: curve must be extension, retraction or both (got '{value}')."
                    ))
                })?;
                table.mode = Some(mode);
            }
            "log_scale" | "use_log" => {
                let flag = parse_bool(value).ok_or_else(|| {
                    AppError::config(format!("{source}:{line_no}: '{value}' is not a boolean."))
                })?;
                table.log_scale = Some(flag);
            }
            "initial_rows" => {
                let n = value.parse::<usize>().map_err(|_| {
                    AppError::config(format!(
                        "{source}:{line_no}: initial_rows must be a non-negative integer (got '{value}')."
                    ))
                })?;
                table.initial_rows = Some(n);
            }
            "extra_filter" => {
                log::warn!(
                    "{source}:{line_no}: extra_filter is ignored; distances <= 1e-6 are always filtered."
                );
            }
            other => {
                return Err(AppError::config(format!("{source}:{line_no}: unknown key '{other}'.")));
            }
        }
    }

    Ok(table)
}

/// Read and parse the parameter override table.
pub fn read_parameter_table(path: &Path, initial_rows: usize) -> Result<ParameterTable, AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::config(format!("Failed to read parameter table '{}': {e}", path.display()))
    })?;
    parse_parameter_table(&text, &path.display().to_string(), initial_rows)
}

/// Parse `name value attribute [stage]` rows.
///
/// Rows either all carry a stage tag or none does; untagged tables are split by
/// position, the first `initial_rows` rows going to the initial stage.
pub fn parse_parameter_table(text: &str, source: &str, initial_rows: usize) -> Result<ParameterTable, AppError> {
    struct Raw<'a> {
        line: usize,
        name: &'a str,
        value: f64,
        attr: ParamAttr,
        stage: Option<FitStage>,
    }

    let mut raw = Vec::new();
    for (line, fields) in table_rows(text) {
        if !(3..=4).contains(&fields.len()) {
            return Err(AppError::config(format!(
                "{source}:{line}: expected 'name value attribute [stage]', got {} fields.",
                fields.len()
            )));
        }
        let attr = ParamAttr::parse(fields[2]).ok_or_else(|| {
            AppError::config(format!(
                "{source}:{line}: unknown attribute '{}' (expected value, lower_bound, upper_bound or fixed).",
                fields[2]
            ))
        })?;
        let value = parse_value(fields[1], attr).ok_or_else(|| {
            AppError::config(format!("{source}:{line}: '{}' is not a valid value.", fields[1]))
        })?;
        let stage = match fields.get(3) {
            Some(tag) => Some(FitStage::parse(tag).ok_or_else(|| {
                AppError::config(format!(
                    "{source}:{line}: unknown stage '{tag}' (expected initial or final)."
                ))
            })?),
            None => None,
        };
        raw.push(Raw {
            line,
            name: fields[0],
            value,
            attr,
            stage,
        });
    }

    let tagged = raw.iter().filter(|r| r.stage.is_some()).count();
    if tagged != 0 && tagged != raw.len() {
        return Err(AppError::config(format!(
            "{source}: either every row or no row may carry a stage tag ({tagged} of {} rows are tagged).",
            raw.len()
        )));
    }

    let rows = raw
        .into_iter()
        .enumerate()
        .map(|(i, r)| ParamOverride {
            name: r.name.to_string(),
            value: r.value,
            attr: r.attr,
            stage: r.stage.unwrap_or(if i < initial_rows {
                FitStage::Initial
            } else {
                FitStage::Final
            }),
            line: r.line,
        })
        .collect();

    Ok(ParameterTable { rows })
}

/// Non-empty rows split on whitespace, with `#` comments removed.
fn table_rows(text: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    text.lines().enumerate().filter_map(|(i, line)| {
        let content = line.split('#').next().unwrap_or("");
        let fields: Vec<&str> = content.split_whitespace().collect();
        (!fields.is_empty()).then_some((i + 1, fields))
    })
}

fn parse_value(s: &str, attr: ParamAttr) -> Option<f64> {
    if attr == ParamAttr::Fixed {
        if let Some(flag) = parse_bool(s) {
            return Some(if flag { 1.0 } else { 0.0 });
        }
    }
    let v = s.parse::<f64>().ok()?;
    match attr {
        // Bounds may be infinite; values may not.
        ParamAttr::LowerBound | ParamAttr::UpperBound => (!v.is_nan()).then_some(v),
        ParamAttr::Value | ParamAttr::Fixed => v.is_finite().then_some(v),
    }
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_table_reads_known_keys() {
        let text = "\
# run settings
input_dir   data/raw
output_dir  out      # results go here
which_curve both
use_log     False
extra_filter True
";
        let t = parse_input_table(text, "input.txt").unwrap();
        assert_eq!(t.input_dir, Some(PathBuf::from("data/raw")));
        assert_eq!(t.output_dir, Some(PathBuf::from("out")));
        assert_eq!(t.mode, Some(CurveMode::Both));
        assert_eq!(t.log_scale, Some(false));
        assert_eq!(t.initial_rows, None);
    }

    #[test]
    fn input_table_rejects_unknown_key_and_bad_mode() {
        let err = parse_input_table("colour red\n", "input.txt").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("input.txt:1"));

        let err = parse_input_table("curve sideways\n", "input.txt").unwrap_err();
        assert!(err.message().contains("sideways"));
    }

    #[test]
    fn untagged_rows_split_by_position() {
        let text = "\
kT      4.11  fixed
DNA/Lc  2.8   value
DNA/Fc  30.6  fixed
DNA/St  900   lower_bound
";
        let table = parse_parameter_table(text, "default.txt", 2).unwrap();
        let initial: Vec<&str> = table.for_stage(FitStage::Initial).map(|r| r.name.as_str()).collect();
        let last: Vec<&str> = table.for_stage(FitStage::Final).map(|r| r.name.as_str()).collect();
        assert_eq!(initial, vec!["kT", "DNA/Lc"]);
        assert_eq!(last, vec!["DNA/Fc", "DNA/St"]);
        assert_eq!(table.rows[3].line, 4);
        assert!(table.validate("default.txt").is_ok());
    }

    #[test]
    fn tagged_rows_ignore_position() {
        let text = "\
DNA/Fc  30.6  fixed  final
DNA/Lc  2.8   value  initial
DNA/Lc  2.9   value  final
";
        let table = parse_parameter_table(text, "default.txt", 2).unwrap();
        let initial: Vec<f64> = table.for_stage(FitStage::Initial).map(|r| r.value).collect();
        let last: Vec<f64> = table.for_stage(FitStage::Final).map(|r| r.value).collect();
        assert_eq!(initial, vec![2.8]);
        assert_eq!(last, vec![30.6, 2.9]);
    }

    #[test]
    fn mixed_tagging_is_rejected() {
        let text = "DNA/Lc 2.8 value initial\nDNA/Lp 50 value\n";
        let err = parse_parameter_table(text, "default.txt", 2).unwrap_err();
        assert!(err.message().contains("stage tag"));
    }

    #[test]
    fn unknown_parameter_for_stage_fails_validation() {
        // The Odijk model has no twist parameters.
        let table = parse_parameter_table("DNA/g0 -600 value initial\n", "default.txt", 0).unwrap();
        let err = table.validate("default.txt").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("DNA/g0"));
        assert!(err.message().contains("default.txt:1"));
    }

    #[test]
    fn inverted_bounds_fail_validation() {
        let text = "DNA/Lp 10 upper_bound final\nDNA/Lp 20 lower_bound final\n";
        let table = parse_parameter_table(text, "default.txt", 0).unwrap();
        assert!(table.validate("default.txt").is_err());
    }

    #[test]
    fn bad_values_and_attributes_are_rejected() {
        assert!(parse_parameter_table("DNA/Lc abc value\n", "d", 2).is_err());
        assert!(parse_parameter_table("DNA/Lc 2.8 colour\n", "d", 2).is_err());
        assert!(parse_parameter_table("DNA/Lc 2.8\n", "d", 2).is_err());
        let t = parse_parameter_table("DNA/Lc inf upper_bound\nkT true fixed\n", "d", 2).unwrap();
        assert!(t.rows[0].value.is_infinite());
        assert_eq!(t.rows[1].value, 1.0);
    }
}
