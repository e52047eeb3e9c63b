//! Formula commands.
//!
//! # Usage
//!
//! ```bash
//! stockline-cli formula check "on_hand - committed"
//! stockline-cli formula eval "incoming - committed" --incoming 40 --committed 12
//! ```

use std::fmt::Write as _;

use stockline_core::{Formula, FormulaError, Inputs, format_quantity};

/// Parse a formula and print its normalized form and inputs.
///
/// # Errors
///
/// Returns `FormulaError` if the formula does not parse.
pub fn check(expression: &str) -> Result<(), FormulaError> {
    let report = check_report(expression)?;

    #[allow(clippy::print_stdout)]
    {
        print!("{report}");
    }
    Ok(())
}

/// Evaluate a formula against sample inputs and print the result.
///
/// # Errors
///
/// Returns `FormulaError` if the formula does not parse or fails to evaluate
/// (division by zero, overflow).
pub fn eval(expression: &str, inputs: &Inputs) -> Result<(), FormulaError> {
    let value = evaluate(expression, inputs)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{value}");
    }
    Ok(())
}

fn check_report(expression: &str) -> Result<String, FormulaError> {
    let formula = Formula::parse(expression)?;
    let variables = formula
        .variables()
        .iter()
        .map(|v| v.as_str())
        .collect::<Vec<_>>();

    let mut report = String::new();
    let _ = writeln!(report, "ok: {formula}");
    if variables.is_empty() {
        let _ = writeln!(report, "reads: (no inputs)");
    } else {
        let _ = writeln!(report, "reads: {}", variables.join(", "));
    }
    Ok(report)
}

fn evaluate(expression: &str, inputs: &Inputs) -> Result<String, FormulaError> {
    let formula = Formula::parse(expression)?;
    let value = formula.evaluate(inputs)?;
    Ok(format_quantity(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_check_report_lists_inputs() {
        let report = check_report("incoming - committed").unwrap();
        assert!(report.contains("ok: incoming - committed"));
        assert!(report.contains("reads: incoming, committed"));
    }

    #[test]
    fn test_check_report_constant() {
        let report = check_report("42").unwrap();
        assert!(report.contains("(no inputs)"));
    }

    #[test]
    fn test_check_rejects_unknown_variable() {
        assert!(matches!(
            check_report("on_hand - reserved"),
            Err(FormulaError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_evaluate() {
        let inputs = Inputs::new(10, 5, 3);
        assert_eq!(evaluate("on_hand - committed", &inputs).unwrap(), "7");
        assert_eq!(evaluate("(on_hand + incoming) / 2", &inputs).unwrap(), "7.5");
        assert_eq!(
            evaluate("on_hand / (committed - 3)", &inputs),
            Err(FormulaError::DivisionByZero)
        );
    }
}
