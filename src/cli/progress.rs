use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

pub fn create_progress_bar(
    multi: &MultiProgress,
    total: Option<u64>,
    unit: &str,
) -> Result<ProgressBar> {
    let pb = if let Some(total) = total {
        let pb = multi.add(ProgressBar::new(total));
        pb.set_style(ProgressStyle::with_template(&format!(
            "{{bar:40.cyan/blue}} {{pos}}/{{len}} {unit} ({{percent}}%)\n{{msg}} | elapsed: {{elapsed_precise}} | ETA: {{eta_precise}}"
        ))?);

        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    } else {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template(&format!(
            "{{spinner:.green}} {{pos}} {unit}\n{{msg}} | elapsed: {{elapsed_precise}}"
        ))?);

        pb
    };
    Ok(pb)
}

/// Spinner for work without a measurable position.
pub fn create_spinner(multi: &MultiProgress, message: &str) -> Result<ProgressBar> {
    let pb = multi.add(ProgressBar::new_spinner());
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.green} {msg} | elapsed: {elapsed_precise}",
    )?);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message(message.to_string());
    Ok(pb)
}
