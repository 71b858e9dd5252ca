//! Interactive choice of the analysis parameters.

use super::operator::Operator;
use crate::config::AnalysisParams;
use std::str::FromStr;

/// Ask for each analysis parameter, keeping `defaults` on empty input.
pub fn prompt_params<O: Operator>(operator: &mut O, defaults: AnalysisParams) -> AnalysisParams {
    let segment_time_secs = ask_value(
        operator,
        &format!(
            "Enter segment time in seconds (default {}): ",
            defaults.segment_time_secs
        ),
        defaults.segment_time_secs,
        |v: &u32| *v > 0,
    );
    let lf_filter_hz = ask_value(
        operator,
        &format!("Enter LF filter value (default {} Hz): ", defaults.lf_filter_hz),
        defaults.lf_filter_hz,
        |v: &f64| v.is_finite() && *v > 0.0,
    );
    let hf_filter_hz = ask_value(
        operator,
        &format!("Enter HF filter value (default {} Hz): ", defaults.hf_filter_hz),
        defaults.hf_filter_hz,
        |v: &f64| v.is_finite() && *v > 0.0,
    );
    let max_segments = ask_value(
        operator,
        &format!(
            "Enter the maximum number of segments in each file (default {}): ",
            defaults.max_segments
        ),
        defaults.max_segments,
        |_: &u32| true,
    );

    AnalysisParams {
        segment_time_secs,
        lf_filter_hz,
        hf_filter_hz,
        max_segments,
    }
}

fn ask_value<O, T>(operator: &mut O, prompt: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    O: Operator,
    T: FromStr,
{
    loop {
        let answer = operator.ask(prompt);
        let answer = answer.trim();
        if answer.is_empty() {
            return default;
        }
        match answer.parse::<T>() {
            Ok(value) if valid(&value) => return value,
            _ => println!("Invalid value '{answer}', please enter a positive number."),
        }
    }
}

/// Print the settings the run will use.
pub fn print_params(params: &AnalysisParams) {
    println!("Analysis settings:");
    println!("  Segment time:  {} s", params.segment_time_secs);
    println!("  LF filter:     {} Hz", params.lf_filter_hz);
    println!("  HF filter:     {} Hz", params.hf_filter_hz);
    println!("  Segments:      {}", params.max_segments);
}
