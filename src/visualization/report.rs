use crate::analysis::ParameterErrors;
use crate::optimizer::AnnealingResult;
use crate::transform::TransformParams;

fn params_row(label: &str, p: &TransformParams) -> String {
    format!(
        "| {:<9} | {:>9.3} | {:>7.4} | {:>8.2} | {:>8.2} |",
        label,
        p.angle_degrees(),
        p.scale,
        p.tx,
        p.ty
    )
}

/// Table of expected vs recovered parameters, as printed by the CLI
pub fn format_summary(expected: Option<&TransformParams>, result: &AnnealingResult) -> String {
    let mut lines = vec![
        "=== Registration Results ===".to_string(),
        "| Params    | Angle (°) | Scale   | tx (px)  | ty (px)  |".to_string(),
        "|-----------|-----------|---------|----------|----------|".to_string(),
    ];

    if let Some(expected) = expected {
        lines.push(params_row("Expected", expected));
    }
    lines.push(params_row("Recovered", &result.best_params));
    lines.push(String::new());

    lines.push(format!(
        "Score: {:.4} (initial {:.4})",
        result.best_score, result.initial_score
    ));
    lines.push(format!(
        "Iterations: {}, accepted moves: {}, final temperature: {:.3e}",
        result.iterations, result.accepted_moves, result.final_temperature
    ));
    lines.push(format!("Processing Time: {:.2}ms", result.processing_time_ms));

    if let Some(expected) = expected {
        let errors = ParameterErrors::between(&result.best_params, expected);
        lines.push(format!(
            "Error: rotation={:.2}°, scale={:.4}, translation={:.2}px",
            errors.angle_degrees,
            errors.scale,
            errors.translation_magnitude()
        ));
    }

    lines.join("\n")
}

pub fn print_summary(expected: Option<&TransformParams>, result: &AnnealingResult) {
    println!("{}", format_summary(expected, result));
}
